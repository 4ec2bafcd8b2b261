/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 ByteDance and/or its affiliates.
 */

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll, ready};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use g3_pipe::{PipeReader, PipeWriter, ReadView};

/// Payload of the `io::Error` a read fails with after
/// [`PipeStream::cancel_pending_read`].
#[derive(Debug, Error)]
#[error("stream read cancelled")]
pub struct ReadCancelled;

/// Check whether `e` came from a cooperative read cancel and not from a
/// real transfer failure.
pub fn is_read_cancelled(e: &io::Error) -> bool {
    e.get_ref().is_some_and(|inner| inner.is::<ReadCancelled>())
}

/// Classic byte stream over a pair of pipes: reads drain `reader`, writes
/// feed `writer`.
///
/// Handles are cheap clones sharing the same pipes, mainly so that one task
/// can [`PipeStream::cancel_pending_read`] while another sits in a read.
/// The pipes allow a single outstanding read; a second concurrent read
/// fails with an error instead of corrupting the first.
pub struct PipeStream {
    reader: PipeReader,
    writer: PipeWriter,
    error_on_cancel: bool,
    cancel_flag: Arc<AtomicBool>,
    flush_submitted: bool,
    write_done: bool,
}

impl Clone for PipeStream {
    fn clone(&self) -> Self {
        PipeStream {
            reader: self.reader.clone(),
            writer: self.writer.clone(),
            error_on_cancel: self.error_on_cancel,
            cancel_flag: Arc::clone(&self.cancel_flag),
            flush_submitted: false,
            write_done: false,
        }
    }
}

impl PipeStream {
    /// With `error_on_cancel` set, a cancelled read fails with a
    /// [`ReadCancelled`] error; otherwise the cancel is absorbed and the
    /// read keeps waiting for data.
    pub fn new(reader: PipeReader, writer: PipeWriter, error_on_cancel: bool) -> Self {
        PipeStream {
            reader,
            writer,
            error_on_cancel,
            cancel_flag: Arc::new(AtomicBool::new(false)),
            flush_submitted: false,
            write_done: false,
        }
    }

    /// End the in-flight (or next) read on any handle of this stream.
    /// One call ends exactly one read.
    pub fn cancel_pending_read(&self) {
        self.cancel_flag.store(true, Ordering::Relaxed);
        self.reader.cancel_pending_read();
    }

    /// Drain already-buffered bytes without suspending. `None` means a
    /// poll-based or async read is needed.
    pub fn try_read(&mut self, dst: &mut [u8]) -> io::Result<Option<usize>> {
        loop {
            let Some(view) = self.reader.try_read().map_err(io::Error::from)? else {
                return Ok(None);
            };
            if let Some(n) = self.consume_view(view, dst)? {
                return Ok(Some(n));
            }
        }
    }

    /// One pipe view in, at most one stream read result out. `None` is a
    /// view that carried nothing for us; the caller reads again.
    fn consume_view(&mut self, view: ReadView, dst: &mut [u8]) -> io::Result<Option<usize>> {
        if view.is_cancelled()
            && self.error_on_cancel
            && self.cancel_flag.swap(false, Ordering::Relaxed)
        {
            self.reader.advance_to(0).map_err(io::Error::from)?;
            return Err(io::Error::other(ReadCancelled));
        }
        if !view.is_empty() {
            let n = view.copy_to(dst);
            self.reader.advance_to(n).map_err(io::Error::from)?;
            return Ok(Some(n));
        }
        let completed = view.is_completed();
        self.reader.advance_to(0).map_err(io::Error::from)?;
        if completed { Ok(Some(0)) } else { Ok(None) }
    }
}

impl AsyncRead for PipeStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = &mut *self;
        loop {
            let view = ready!(this.reader.poll_read(cx)).map_err(io::Error::from)?;
            let n = match this.consume_view(view, buf.initialize_unfilled())? {
                Some(n) => n,
                None => continue,
            };
            buf.advance(n);
            return Poll::Ready(Ok(()));
        }
    }
}

impl AsyncWrite for PipeStream {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = &mut *self;
        ready!(this.writer.poll_ready(cx)).map_err(io::Error::from)?;
        this.writer.write_slice(buf).map_err(io::Error::from)?;
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = &mut *self;
        if !this.flush_submitted {
            this.writer.submit().map_err(io::Error::from)?;
            this.flush_submitted = true;
        }
        let r = ready!(this.writer.poll_ready(cx)).map_err(io::Error::from);
        this.flush_submitted = false;
        Poll::Ready(r)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        if self.write_done {
            return Poll::Ready(Ok(()));
        }
        ready!(self.as_mut().poll_flush(cx))?;
        let this = &mut *self;
        this.writer.complete(None);
        this.write_done = true;
        Poll::Ready(Ok(()))
    }
}
