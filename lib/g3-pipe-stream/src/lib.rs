/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 ByteDance and/or its affiliates.
 */

mod stream;
pub use stream::{PipeStream, ReadCancelled, is_read_cancelled};

mod adapter;
pub use adapter::{PipeStreamAdapter, PipeStreamAdapterConfig};

mod logging;
pub use logging::LoggingStream;

mod middleware;
pub use middleware::{LoggingDuplexPipe, with_connection_logging};
