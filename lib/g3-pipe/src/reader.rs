/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 ByteDance and/or its affiliates.
 */

use std::future::Future;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use smallvec::SmallVec;

use super::PipeError;
use super::state::PipeShared;

/// A zero-copy snapshot of all buffered bytes at read time.
///
/// The view stays valid after the pipe moves on, but consumption is only
/// reported back through [`PipeReader::advance_to`], which must be called
/// before the next read.
#[derive(Debug)]
pub struct ReadView {
    segments: SmallVec<[Bytes; 4]>,
    len: usize,
    completed: bool,
    cancelled: bool,
}

impl ReadView {
    pub(crate) fn new(
        segments: SmallVec<[Bytes; 4]>,
        len: usize,
        completed: bool,
        cancelled: bool,
    ) -> Self {
        ReadView {
            segments,
            len,
            completed,
            cancelled,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// No more data will ever arrive after this view is drained.
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// A cancel request was consumed by this read.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    #[inline]
    pub fn segments(&self) -> &[Bytes] {
        &self.segments
    }

    /// Copy `min(self.len(), dst.len())` bytes from the front of the view.
    pub fn copy_to(&self, dst: &mut [u8]) -> usize {
        let mut copied = 0;
        for seg in &self.segments {
            if copied >= dst.len() {
                break;
            }
            let n = (dst.len() - copied).min(seg.len());
            dst[copied..copied + n].copy_from_slice(&seg[..n]);
            copied += n;
        }
        copied
    }
}

/// Reading end of a buffered pipe.
///
/// Handles are cheap clones over one shared pipe. The pipe itself allows a
/// single read at a time: a second read started while one is in flight, or
/// while a [`ReadView`] has not been advanced, fails with
/// [`PipeError::ReadInProgress`] without touching the first.
pub struct PipeReader {
    shared: Arc<PipeShared>,
    claim: Option<u64>,
}

impl Clone for PipeReader {
    fn clone(&self) -> Self {
        PipeReader {
            shared: Arc::clone(&self.shared),
            claim: None,
        }
    }
}

impl Drop for PipeReader {
    fn drop(&mut self) {
        self.shared.release_claim(&mut self.claim);
    }
}

impl PipeReader {
    pub(crate) fn new(shared: Arc<PipeShared>) -> Self {
        PipeReader {
            shared,
            claim: None,
        }
    }

    /// Non-suspending read. Returns `None` when nothing is ready; never
    /// registers a waker.
    pub fn try_read(&mut self) -> Result<Option<ReadView>, PipeError> {
        self.shared.try_read(&mut self.claim)
    }

    pub fn poll_read(&mut self, cx: &mut Context<'_>) -> Poll<Result<ReadView, PipeError>> {
        self.shared.poll_read(cx, &mut self.claim)
    }

    pub fn read(&mut self) -> ReadData<'_> {
        ReadData { reader: self }
    }

    /// Release the outstanding view, dropping `consumed` bytes and marking
    /// everything up to `consumed` as examined.
    pub fn advance_to(&mut self, consumed: usize) -> Result<(), PipeError> {
        self.shared.advance_to(consumed, consumed)
    }

    /// Release the outstanding view. Bytes up to `examined` will not wake
    /// the next read again by themselves; new data is required.
    pub fn advance_to_examined(
        &mut self,
        consumed: usize,
        examined: usize,
    ) -> Result<(), PipeError> {
        self.shared.advance_to(consumed, examined)
    }

    /// Request that the in-flight (or next) read complete at once with
    /// [`ReadView::is_cancelled`] set. One request is consumed by one read.
    pub fn cancel_pending_read(&self) {
        self.shared.cancel_read();
    }

    /// Terminal. Frees buffered data and fails the peer's next flush if an
    /// error is given. Later calls are a no-op.
    pub fn complete(&mut self, error: Option<io::Error>) {
        self.shared.complete_reader(error);
    }
}

#[must_use = "futures do nothing unless you `.await` or poll them"]
pub struct ReadData<'a> {
    reader: &'a mut PipeReader,
}

impl Drop for ReadData<'_> {
    fn drop(&mut self) {
        self.reader.shared.release_claim(&mut self.reader.claim);
    }
}

impl Future for ReadData<'_> {
    type Output = Result<ReadView, PipeError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.get_mut().reader.poll_read(cx)
    }
}
