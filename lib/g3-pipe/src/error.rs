/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 ByteDance and/or its affiliates.
 */

use std::io;
use std::sync::Arc;

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PipeError {
    #[error("concurrent pipe reads are not supported")]
    ReadInProgress,
    #[error("no read operation in progress")]
    NoReadInProgress,
    #[error("advance position out of the read range")]
    InvalidAdvance,
    #[error("this pipe end is already completed")]
    AlreadyCompleted,
    #[error("peer pipe end completed with error: {0:?}")]
    Faulted(Arc<io::Error>),
}

impl From<PipeError> for io::Error {
    fn from(e: PipeError) -> io::Error {
        match e {
            PipeError::Faulted(inner) => {
                io::Error::new(inner.kind(), PipeError::Faulted(inner))
            }
            _ => io::Error::other(e),
        }
    }
}
