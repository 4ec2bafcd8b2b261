/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 ByteDance and/or its affiliates.
 */

use std::io;

use log::error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::task::JoinHandle;

use g3_pipe::{DuplexPipe, PipeConfig, PipeError, PipeReader, PipeWriter, new_pipe};

use super::stream::{PipeStream, is_read_cancelled};

const DEFAULT_READ_BUFFER_SIZE: usize = 4096;
const MINIMAL_READ_BUFFER_SIZE: usize = 256;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PipeStreamAdapterConfig {
    input_pipe: PipeConfig,
    output_pipe: PipeConfig,
    read_buffer_size: usize,
}

impl Default for PipeStreamAdapterConfig {
    fn default() -> Self {
        PipeStreamAdapterConfig {
            input_pipe: PipeConfig::default(),
            output_pipe: PipeConfig::default(),
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl PipeStreamAdapterConfig {
    pub fn set_input_pipe(&mut self, config: PipeConfig) {
        self.input_pipe = config;
    }

    #[inline]
    pub fn input_pipe(&self) -> PipeConfig {
        self.input_pipe
    }

    pub fn set_output_pipe(&mut self, config: PipeConfig) {
        self.output_pipe = config;
    }

    #[inline]
    pub fn output_pipe(&self) -> PipeConfig {
        self.output_pipe
    }

    pub fn set_read_buffer_size(&mut self, size: usize) {
        self.read_buffer_size = size.max(MINIMAL_READ_BUFFER_SIZE);
    }

    #[inline]
    pub fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }
}

/// Re-expose a decorated stream as a fresh duplex pipe.
///
/// The transport pipes are wrapped in a [`PipeStream`], decorated by
/// `create_stream`, and bridged back to pipe handles by two background
/// tasks, so a byte-stream decorator can sit between two pipe users.
/// Each pump starts on first access to its side.
pub struct PipeStreamAdapter<S> {
    bridge: PipeStream,
    input_reader: PipeReader,
    output_writer: PipeWriter,
    read_buffer_size: usize,
    input_parts: Option<(ReadHalf<S>, PipeWriter)>,
    output_parts: Option<(WriteHalf<S>, PipeReader)>,
    input_task: Option<JoinHandle<()>>,
    output_task: Option<JoinHandle<()>>,
    shut_down: bool,
}

impl<S> PipeStreamAdapter<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    pub fn new<F>(
        transport: DuplexPipe,
        config: &PipeStreamAdapterConfig,
        create_stream: F,
    ) -> Self
    where
        F: FnOnce(PipeStream) -> S,
    {
        let bridge = PipeStream::new(transport.input, transport.output, true);
        let stream = create_stream(bridge.clone());
        let (read_half, write_half) = tokio::io::split(stream);
        let (input_reader, input_writer) = new_pipe(&config.input_pipe);
        let (output_reader, output_writer) = new_pipe(&config.output_pipe);
        PipeStreamAdapter {
            bridge,
            input_reader,
            output_writer,
            read_buffer_size: config.read_buffer_size,
            input_parts: Some((read_half, input_writer)),
            output_parts: Some((write_half, output_reader)),
            input_task: None,
            output_task: None,
            shut_down: false,
        }
    }

    /// Application-side reader for bytes arriving through the decorated
    /// stream. First access starts the inbound pump.
    pub fn input(&mut self) -> &mut PipeReader {
        if !self.shut_down
            && let Some((stream, writer)) = self.input_parts.take()
        {
            let read_buffer_size = self.read_buffer_size;
            self.input_task = Some(tokio::spawn(pump_input(stream, writer, read_buffer_size)));
        }
        &mut self.input_reader
    }

    /// Application-side writer for bytes leaving through the decorated
    /// stream. First access starts the outbound pump.
    pub fn output(&mut self) -> &mut PipeWriter {
        if !self.shut_down
            && let Some((stream, reader)) = self.output_parts.take()
        {
            self.output_task = Some(tokio::spawn(pump_output(reader, stream)));
        }
        &mut self.output_writer
    }

    /// Both sides as one duplex handle, pumps running.
    pub fn duplex(&mut self) -> DuplexPipe {
        let input = self.input().clone();
        let output = self.output().clone();
        DuplexPipe::new(input, output)
    }

    /// End an in-flight read on the decorated stream.
    pub fn cancel_pending_read(&self) {
        self.bridge.cancel_pending_read();
    }

    /// Orderly stop. Outbound bytes written before this call are pushed
    /// through the decorated stream before the outbound pump is joined;
    /// the inbound pump is then released by a read cancel and joined.
    /// The transport pipes themselves stay open.
    pub async fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.shut_down = true;
        self.output_writer.complete(None);
        self.input_reader.complete(None);
        if let Some(handle) = self.output_task.take() {
            let _ = handle.await;
        }
        self.bridge.cancel_pending_read();
        if let Some(handle) = self.input_task.take() {
            let _ = handle.await;
        }
    }
}

/// Move bytes read from the decorated stream into the input pipe until
/// end of stream, a stream error, or the pipe reader goes away.
async fn pump_input<S>(mut stream: ReadHalf<S>, mut writer: PipeWriter, read_buffer_size: usize)
where
    S: AsyncRead,
{
    let mut error: Option<io::Error> = None;
    loop {
        let dst = writer.writable(read_buffer_size);
        let nr = match stream.read(dst).await {
            Ok(n) => n,
            Err(e) => {
                if !is_read_cancelled(&e) {
                    error = Some(e);
                }
                break;
            }
        };
        if writer.advance(nr).is_err() {
            break;
        }
        if nr == 0 {
            break;
        }
        match writer.flush().await {
            Ok(status) => {
                if status.is_completed() {
                    break;
                }
            }
            Err(_) => break,
        }
    }
    writer.complete(error);
}

/// Drain the output pipe into the decorated stream. An empty view is a
/// flush request from the application; a completed view ends the pump
/// after a final flush. A stream write failure is reported back through
/// the pipe so later application flushes fail.
async fn pump_output<S>(mut reader: PipeReader, mut stream: WriteHalf<S>)
where
    S: AsyncWrite,
{
    loop {
        let view = match reader.read().await {
            Ok(view) => view,
            Err(e) => {
                if !matches!(e, PipeError::Faulted(_)) {
                    error!("output pipe read failed: {e}");
                }
                reader.complete(None);
                break;
            }
        };
        let done = view.is_completed();
        let mut io_result = Ok(());
        if view.is_empty() {
            if !done {
                io_result = stream.flush().await;
            }
        } else {
            for seg in view.segments() {
                if let Err(e) = stream.write_all(seg).await {
                    io_result = Err(e);
                    break;
                }
            }
        }
        let consumed = view.len();
        if reader.advance_to(consumed).is_err() {
            break;
        }
        match io_result {
            Ok(_) => {
                if done {
                    let _ = stream.flush().await;
                    reader.complete(None);
                    break;
                }
            }
            Err(e) => {
                error!("stream write failed: {e}");
                reader.complete(Some(e));
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_adapter(
        config: &PipeStreamAdapterConfig,
    ) -> (PipeStreamAdapter<PipeStream>, DuplexPipe) {
        let pipe_config = PipeConfig::default();
        let (local, remote) = DuplexPipe::pair(&pipe_config, &pipe_config);
        (PipeStreamAdapter::new(local, config, |s| s), remote)
    }

    #[test]
    fn config_clamps_read_buffer() {
        let mut config = PipeStreamAdapterConfig::default();
        assert_eq!(config.read_buffer_size(), DEFAULT_READ_BUFFER_SIZE);
        config.set_read_buffer_size(1);
        assert_eq!(config.read_buffer_size(), MINIMAL_READ_BUFFER_SIZE);
    }

    #[tokio::test]
    async fn outbound_delivered_by_shutdown() {
        let (mut adapter, mut remote) = identity_adapter(&PipeStreamAdapterConfig::default());
        adapter.output().write_slice(b"hello").unwrap();
        adapter.shutdown().await;
        let view = remote.input.try_read().unwrap().unwrap();
        assert_eq!(view.len(), 5);
        let mut buf = [0u8; 5];
        view.copy_to(&mut buf);
        assert_eq!(&buf, b"hello");
        remote.input.advance_to(5).unwrap();
    }

    #[tokio::test]
    async fn inbound_reaches_application() {
        let (mut adapter, mut remote) = identity_adapter(&PipeStreamAdapterConfig::default());
        remote.output.write_slice(b"ping").unwrap();
        let view = adapter.input().read().await.unwrap();
        assert_eq!(view.len(), 4);
        let mut buf = [0u8; 4];
        view.copy_to(&mut buf);
        assert_eq!(&buf, b"ping");
        adapter.input().advance_to(4).unwrap();
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn inbound_eof_propagates() {
        let (mut adapter, mut remote) = identity_adapter(&PipeStreamAdapterConfig::default());
        remote.output.write_slice(b"fin").unwrap();
        remote.output.complete(None);
        let view = adapter.input().read().await.unwrap();
        assert_eq!(view.len(), 3);
        adapter.input().advance_to(3).unwrap();
        let view = adapter.input().read().await.unwrap();
        assert!(view.is_empty());
        assert!(view.is_completed());
        adapter.input().advance_to(0).unwrap();
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn flush_passes_through() {
        let (mut adapter, mut remote) = identity_adapter(&PipeStreamAdapterConfig::default());
        adapter.output().flush().await.unwrap();
        let view = remote.input.read().await.unwrap();
        assert!(view.is_empty());
        assert!(!view.is_completed());
        remote.input.advance_to(0).unwrap();
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn transport_write_failure_fails_flush() {
        let mut out_pipe = PipeConfig::default();
        out_pipe.set_pause_threshold(1);
        let mut config = PipeStreamAdapterConfig::default();
        config.set_output_pipe(out_pipe);
        let (mut adapter, mut remote) = identity_adapter(&config);
        remote
            .input
            .complete(Some(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone")));
        let output = adapter.output();
        output.write_slice(b"x").unwrap();
        let err = output.flush().await.unwrap_err();
        assert!(matches!(err, PipeError::Faulted(ref e) if e.kind() == io::ErrorKind::BrokenPipe));
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn transport_read_failure_fails_input() {
        let (mut adapter, mut remote) = identity_adapter(&PipeStreamAdapterConfig::default());
        remote.output.complete(Some(io::Error::new(
            io::ErrorKind::ConnectionAborted,
            "aborted",
        )));
        let err = adapter.input().read().await.unwrap_err();
        assert!(
            matches!(err, PipeError::Faulted(ref e) if e.kind() == io::ErrorKind::ConnectionAborted)
        );
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn shutdown_without_pumps() {
        let (mut adapter, _remote) = identity_adapter(&PipeStreamAdapterConfig::default());
        adapter.shutdown().await;
        adapter.shutdown().await;
    }

    #[tokio::test]
    async fn transport_survives_shutdown() {
        let pipe_config = PipeConfig::default();
        let (local, mut remote) = DuplexPipe::pair(&pipe_config, &pipe_config);
        let mut transport = local.clone();
        let mut adapter =
            PipeStreamAdapter::new(local, &PipeStreamAdapterConfig::default(), |s| s);
        let _ = adapter.duplex();
        adapter.shutdown().await;

        // a later user of the same transport pipes starts clean
        remote.output.write_slice(b"post").unwrap();
        let view = transport.input.try_read().unwrap().unwrap();
        assert!(!view.is_cancelled());
        assert_eq!(view.len(), 4);
        transport.input.advance_to(4).unwrap();

        transport.output.write_slice(b"back").unwrap();
        let view = remote.input.try_read().unwrap().unwrap();
        assert_eq!(view.len(), 4);
        let mut buf = [0u8; 4];
        view.copy_to(&mut buf);
        assert_eq!(&buf, b"back");
        remote.input.advance_to(4).unwrap();
    }
}
