/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 ByteDance and/or its affiliates.
 */

use std::io;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::{Bytes, BytesMut};

use super::PipeError;
use super::state::PipeShared;

#[derive(Clone, Copy, Debug)]
pub struct FlushStatus {
    completed: bool,
}

impl FlushStatus {
    /// The reader side has already completed; further writes go nowhere.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

/// Writing end of a buffered pipe.
///
/// Staged bytes become visible to the reader only on [`PipeWriter::submit`],
/// [`PipeWriter::flush`] or [`PipeWriter::complete`]. Staging is local to
/// each handle; the pipe expects a single writer.
pub struct PipeWriter {
    shared: Arc<PipeShared>,
    staging: BytesMut,
    pending: Vec<Bytes>,
}

impl Clone for PipeWriter {
    fn clone(&self) -> Self {
        PipeWriter {
            shared: Arc::clone(&self.shared),
            staging: BytesMut::new(),
            pending: Vec::new(),
        }
    }
}

impl PipeWriter {
    pub(crate) fn new(shared: Arc<PipeShared>) -> Self {
        PipeWriter {
            shared,
            staging: BytesMut::new(),
            pending: Vec::new(),
        }
    }

    /// Staging memory of at least `size_hint` bytes. Reused memory is not
    /// re-zeroed; commit only bytes actually written.
    pub fn writable(&mut self, size_hint: usize) -> &mut [u8] {
        let want = size_hint.max(self.shared.config().segment_size());
        if self.staging.len() < want {
            self.staging.resize(want, 0);
        }
        &mut self.staging[..]
    }

    /// Commit `n` staged bytes. They become visible on the next submit.
    pub fn advance(&mut self, n: usize) -> Result<(), PipeError> {
        if n > self.staging.len() {
            return Err(PipeError::InvalidAdvance);
        }
        if n > 0 {
            let seg = self.staging.split_to(n).freeze();
            self.pending.push(seg);
        }
        Ok(())
    }

    /// Copy, commit and publish in one step, without waiting out
    /// backpressure. Pair with [`PipeWriter::poll_ready`].
    pub fn write_slice(&mut self, data: &[u8]) -> Result<(), PipeError> {
        if !data.is_empty() {
            self.pending.push(Bytes::copy_from_slice(data));
        }
        self.shared.publish(&mut self.pending, false)
    }

    /// Publish committed bytes and wake the reader. Publishing nothing
    /// records a flush signal: the reader's next read completes with an
    /// empty, non-completed view.
    pub fn submit(&mut self) -> Result<(), PipeError> {
        self.shared.publish(&mut self.pending, true)
    }

    /// Backpressure gate: `Pending` while unconsumed bytes stay at or above
    /// the pause threshold.
    pub fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), PipeError>> {
        self.shared.poll_ready(cx)
    }

    pub async fn flush(&mut self) -> Result<FlushStatus, PipeError> {
        self.submit()?;
        std::future::poll_fn(|cx| self.shared.poll_ready(cx)).await?;
        Ok(FlushStatus {
            completed: self.shared.is_reader_completed(),
        })
    }

    /// Terminal. Committed bytes are published first, then the reader
    /// observes end of stream after draining, or the error if one is given.
    /// Later calls are a no-op.
    pub fn complete(&mut self, error: Option<io::Error>) {
        self.shared.complete_writer(error, &mut self.pending);
    }
}

#[cfg(test)]
mod tests {
    use super::super::{PipeConfig, new_pipe};
    use super::*;
    use tokio_test::task;
    use tokio_test::{assert_pending, assert_ready_ok};

    #[tokio::test]
    async fn stage_and_flush() {
        let (mut reader, mut writer) = new_pipe(&PipeConfig::default());
        let buf = writer.writable(8);
        assert!(buf.len() >= 8);
        buf[..3].copy_from_slice(b"abc");
        writer.advance(3).unwrap();
        // nothing visible until submit
        assert!(reader.try_read().unwrap().is_none());
        let status = writer.flush().await.unwrap();
        assert!(!status.is_completed());
        let view = reader.try_read().unwrap().unwrap();
        assert_eq!(view.len(), 3);
        let mut out = [0u8; 3];
        view.copy_to(&mut out);
        assert_eq!(&out, b"abc");
        reader.advance_to(3).unwrap();
    }

    #[test]
    fn advance_more_than_staged() {
        let (_reader, mut writer) = new_pipe(&PipeConfig::default());
        let staged = writer.writable(16).len();
        assert!(matches!(
            writer.advance(staged + 1),
            Err(PipeError::InvalidAdvance)
        ));
    }

    #[test]
    fn flush_waits_for_pause_threshold() {
        let mut config = PipeConfig::default();
        config.set_pause_threshold(4);
        config.set_resume_threshold(2);
        let (mut reader, mut writer) = new_pipe(&config);
        writer.write_slice(b"abcd").unwrap();
        let mut fut = task::spawn(writer.flush());
        assert_pending!(fut.poll());
        let view = reader.try_read().unwrap().unwrap();
        assert_eq!(view.len(), 4);
        reader.advance_to(1).unwrap();
        // still at 3 unconsumed bytes, above the resume threshold
        assert!(!fut.is_woken());
        let view = reader.try_read().unwrap().unwrap();
        assert_eq!(view.len(), 3);
        reader.advance_to(2).unwrap();
        assert!(fut.is_woken());
        let status = assert_ready_ok!(fut.poll());
        assert!(!status.is_completed());
    }

    #[test]
    fn reader_complete_wakes_parked_flush() {
        let mut config = PipeConfig::default();
        config.set_pause_threshold(2);
        let (mut reader, mut writer) = new_pipe(&config);
        writer.write_slice(b"xy").unwrap();
        let mut fut = task::spawn(writer.flush());
        assert_pending!(fut.poll());
        reader.complete(None);
        assert!(fut.is_woken());
        let status = assert_ready_ok!(fut.poll());
        assert!(status.is_completed());
    }

    #[tokio::test]
    async fn flush_after_reader_complete() {
        let (mut reader, mut writer) = new_pipe(&PipeConfig::default());
        reader.complete(None);
        writer.write_slice(b"dropped").unwrap();
        let status = writer.flush().await.unwrap();
        assert!(status.is_completed());
    }

    #[test]
    fn empty_submit_signals_reader() {
        let (mut reader, mut writer) = new_pipe(&PipeConfig::default());
        let mut fut = task::spawn(reader.read());
        assert_pending!(fut.poll());
        writer.submit().unwrap();
        assert!(fut.is_woken());
        let view = assert_ready_ok!(fut.poll());
        assert!(view.is_empty());
        assert!(!view.is_completed());
        assert!(!view.is_cancelled());
    }

    #[test]
    fn complete_commits_staged_bytes() {
        let (mut reader, mut writer) = new_pipe(&PipeConfig::default());
        let buf = writer.writable(4);
        buf[..2].copy_from_slice(b"ok");
        writer.advance(2).unwrap();
        writer.complete(None);
        let view = reader.try_read().unwrap().unwrap();
        assert_eq!(view.len(), 2);
        assert!(view.is_completed());
        reader.advance_to(2).unwrap();
    }

    #[test]
    fn write_after_complete_fails() {
        let (_reader, mut writer) = new_pipe(&PipeConfig::default());
        writer.complete(None);
        assert!(matches!(
            writer.write_slice(b"x"),
            Err(PipeError::AlreadyCompleted)
        ));
        assert!(matches!(writer.submit(), Err(PipeError::AlreadyCompleted)));
    }

    #[tokio::test]
    async fn reader_fault_fails_flush() {
        let (mut reader, mut writer) = new_pipe(&PipeConfig::default());
        reader.complete(Some(io::Error::new(io::ErrorKind::BrokenPipe, "gone")));
        writer.write_slice(b"x").unwrap();
        let err = writer.flush().await.unwrap_err();
        assert!(matches!(err, PipeError::Faulted(_)));
    }
}
