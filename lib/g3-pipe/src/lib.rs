/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 ByteDance and/or its affiliates.
 */

mod config;
mod duplex;
mod error;
mod reader;
mod state;
mod writer;

pub use config::PipeConfig;
pub use duplex::{DuplexPipe, new_pipe};
pub use error::PipeError;
pub use reader::{PipeReader, ReadData, ReadView};
pub use writer::{FlushStatus, PipeWriter};
