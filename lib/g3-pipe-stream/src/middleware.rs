/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 ByteDance and/or its affiliates.
 */

use std::future::Future;

use g3_pipe::{DuplexPipe, PipeReader, PipeWriter};

use super::adapter::{PipeStreamAdapter, PipeStreamAdapterConfig};
use super::logging::LoggingStream;
use super::stream::PipeStream;

/// A duplex pipe whose traffic is dumped to the trace log on its way to
/// and from the wrapped transport.
pub struct LoggingDuplexPipe {
    adapter: PipeStreamAdapter<LoggingStream<PipeStream>>,
}

impl LoggingDuplexPipe {
    pub fn new(transport: DuplexPipe, config: &PipeStreamAdapterConfig) -> Self {
        LoggingDuplexPipe {
            adapter: PipeStreamAdapter::new(transport, config, LoggingStream::new),
        }
    }

    pub fn input(&mut self) -> &mut PipeReader {
        self.adapter.input()
    }

    pub fn output(&mut self) -> &mut PipeWriter {
        self.adapter.output()
    }

    pub fn duplex(&mut self) -> DuplexPipe {
        self.adapter.duplex()
    }

    pub fn cancel_pending_read(&self) {
        self.adapter.cancel_pending_read()
    }

    pub async fn shutdown(&mut self) {
        self.adapter.shutdown().await
    }
}

/// Run `next` with a logged view of `transport`, then hand the original
/// transport back together with the delegate's result.
pub async fn with_connection_logging<F, Fut, T>(
    transport: DuplexPipe,
    config: &PipeStreamAdapterConfig,
    next: F,
) -> (DuplexPipe, T)
where
    F: FnOnce(DuplexPipe) -> Fut,
    Fut: Future<Output = T>,
{
    let restore = transport.clone();
    let mut pipe = LoggingDuplexPipe::new(transport, config);
    let value = next(pipe.duplex()).await;
    pipe.shutdown().await;
    (restore, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use g3_pipe::PipeConfig;

    #[tokio::test]
    async fn restores_original_transport() {
        let pipe_config = PipeConfig::default();
        let (local, mut remote) = DuplexPipe::pair(&pipe_config, &pipe_config);

        let (mut restored, got) = with_connection_logging(
            local,
            &PipeStreamAdapterConfig::default(),
            |mut pipe| async move {
                pipe.output.write_slice(b"in-session").unwrap();
                pipe.output.flush().await.unwrap();
                42
            },
        )
        .await;
        assert_eq!(got, 42);

        // session bytes went through to the transport
        let view = remote.input.try_read().unwrap().unwrap();
        assert_eq!(view.len(), 10);
        let mut buf = [0u8; 10];
        view.copy_to(&mut buf);
        assert_eq!(&buf, b"in-session");
        remote.input.advance_to(10).unwrap();

        // the restored transport works in both directions
        restored.output.write_slice(b"after").unwrap();
        let view = remote.input.try_read().unwrap().unwrap();
        assert_eq!(view.len(), 5);
        remote.input.advance_to(5).unwrap();

        remote.output.write_slice(b"back").unwrap();
        let view = restored.input.try_read().unwrap().unwrap();
        assert_eq!(view.len(), 4);
        let mut buf = [0u8; 4];
        view.copy_to(&mut buf);
        assert_eq!(&buf, b"back");
        restored.input.advance_to(4).unwrap();
    }
}
