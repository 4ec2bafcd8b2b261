/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use super::PipeConfig;
use super::reader::PipeReader;
use super::state::PipeShared;
use super::writer::PipeWriter;

/// Create a unidirectional buffered pipe.
pub fn new_pipe(config: &PipeConfig) -> (PipeReader, PipeWriter) {
    let shared = Arc::new(PipeShared::new(*config));
    (
        PipeReader::new(Arc::clone(&shared)),
        PipeWriter::new(shared),
    )
}

/// One end of a bidirectional in-memory channel: read from `input`,
/// write to `output`.
#[derive(Clone)]
pub struct DuplexPipe {
    pub input: PipeReader,
    pub output: PipeWriter,
}

impl DuplexPipe {
    pub fn new(input: PipeReader, output: PipeWriter) -> Self {
        DuplexPipe { input, output }
    }

    /// Two connected ends over a pair of pipes. What one end writes to its
    /// `output`, the other end reads from its `input`.
    pub fn pair(
        left_to_right: &PipeConfig,
        right_to_left: &PipeConfig,
    ) -> (DuplexPipe, DuplexPipe) {
        let (r1, w1) = new_pipe(left_to_right);
        let (r2, w2) = new_pipe(right_to_left);
        (
            DuplexPipe {
                input: r2,
                output: w1,
            },
            DuplexPipe {
                input: r1,
                output: w2,
            },
        )
    }
}
