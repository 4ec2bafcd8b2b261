/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 ByteDance and/or its affiliates.
 */

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, Waker};

use bytes::{Buf, Bytes};
use smallvec::SmallVec;

use super::{PipeConfig, PipeError, ReadView};

#[derive(Clone, Copy)]
enum ReadOp {
    Idle,
    Claimed(u64),
    Viewing(usize),
}

struct PipeState {
    segments: VecDeque<Bytes>,
    buffered: usize,
    examined: usize,
    read_op: ReadOp,
    next_claim: u64,
    cancel_pending: bool,
    flush_signal: bool,
    writer_done: bool,
    writer_error: Option<Arc<io::Error>>,
    reader_done: bool,
    reader_error: Option<Arc<io::Error>>,
    read_waker: Option<Waker>,
    write_waker: Option<Waker>,
}

impl PipeState {
    fn take_ready_view(&mut self) -> Option<Result<ReadView, PipeError>> {
        if let Some(e) = &self.writer_error {
            return Some(Err(PipeError::Faulted(e.clone())));
        }
        if self.cancel_pending
            || self.flush_signal
            || self.buffered > self.examined
            || self.writer_done
        {
            let cancelled = self.cancel_pending;
            self.cancel_pending = false;
            self.flush_signal = false;
            let segments: SmallVec<[Bytes; 4]> = self.segments.iter().cloned().collect();
            Some(Ok(ReadView::new(
                segments,
                self.buffered,
                self.writer_done,
                cancelled,
            )))
        } else {
            None
        }
    }

    fn consume(&mut self, mut n: usize) {
        self.buffered -= n;
        while n > 0 {
            let Some(front) = self.segments.front_mut() else {
                break;
            };
            if front.len() <= n {
                n -= front.len();
                self.segments.pop_front();
            } else {
                front.advance(n);
                n = 0;
            }
        }
    }

    fn drop_buffered(&mut self) {
        self.segments.clear();
        self.buffered = 0;
        self.examined = 0;
    }
}

pub(crate) struct PipeShared {
    config: PipeConfig,
    state: Mutex<PipeState>,
}

impl PipeShared {
    pub(crate) fn new(config: PipeConfig) -> Self {
        PipeShared {
            config,
            state: Mutex::new(PipeState {
                segments: VecDeque::new(),
                buffered: 0,
                examined: 0,
                read_op: ReadOp::Idle,
                next_claim: 0,
                cancel_pending: false,
                flush_signal: false,
                writer_done: false,
                writer_error: None,
                reader_done: false,
                reader_error: None,
                read_waker: None,
                write_waker: None,
            }),
        }
    }

    #[inline]
    pub(crate) fn config(&self) -> &PipeConfig {
        &self.config
    }

    pub(crate) fn try_read(
        &self,
        claim: &mut Option<u64>,
    ) -> Result<Option<ReadView>, PipeError> {
        let mut state = self.state.lock().unwrap();
        if state.reader_done {
            return Err(PipeError::AlreadyCompleted);
        }
        match state.read_op {
            ReadOp::Viewing(_) => return Err(PipeError::ReadInProgress),
            ReadOp::Claimed(id) if *claim != Some(id) => return Err(PipeError::ReadInProgress),
            _ => {}
        }
        match state.take_ready_view() {
            Some(Ok(view)) => {
                state.read_op = ReadOp::Viewing(view.len());
                *claim = None;
                Ok(Some(view))
            }
            Some(Err(e)) => {
                state.read_op = ReadOp::Idle;
                *claim = None;
                Err(e)
            }
            None => Ok(None),
        }
    }

    pub(crate) fn poll_read(
        &self,
        cx: &mut Context<'_>,
        claim: &mut Option<u64>,
    ) -> Poll<Result<ReadView, PipeError>> {
        let mut state = self.state.lock().unwrap();
        if state.reader_done {
            return Poll::Ready(Err(PipeError::AlreadyCompleted));
        }
        match state.read_op {
            ReadOp::Viewing(_) => return Poll::Ready(Err(PipeError::ReadInProgress)),
            ReadOp::Claimed(id) if *claim != Some(id) => {
                return Poll::Ready(Err(PipeError::ReadInProgress));
            }
            _ => {}
        }
        match state.take_ready_view() {
            Some(Ok(view)) => {
                state.read_op = ReadOp::Viewing(view.len());
                *claim = None;
                Poll::Ready(Ok(view))
            }
            Some(Err(e)) => {
                state.read_op = ReadOp::Idle;
                *claim = None;
                Poll::Ready(Err(e))
            }
            None => {
                let id = match state.read_op {
                    ReadOp::Claimed(id) => id,
                    _ => {
                        let id = state.next_claim;
                        state.next_claim += 1;
                        id
                    }
                };
                state.read_op = ReadOp::Claimed(id);
                *claim = Some(id);
                state.read_waker = Some(cx.waker().clone());
                Poll::Pending
            }
        }
    }

    pub(crate) fn advance_to(&self, consumed: usize, examined: usize) -> Result<(), PipeError> {
        let waker = {
            let mut state = self.state.lock().unwrap();
            let ReadOp::Viewing(len) = state.read_op else {
                return Err(PipeError::NoReadInProgress);
            };
            if consumed > examined || examined > len {
                return Err(PipeError::InvalidAdvance);
            }
            state.consume(consumed);
            state.examined = examined - consumed;
            state.read_op = ReadOp::Idle;
            if state.buffered == 0 || state.buffered < self.config.resume_threshold() {
                state.write_waker.take()
            } else {
                None
            }
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        Ok(())
    }

    pub(crate) fn cancel_read(&self) {
        let waker = {
            let mut state = self.state.lock().unwrap();
            if state.reader_done {
                return;
            }
            state.cancel_pending = true;
            state.read_waker.take()
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }

    pub(crate) fn complete_reader(&self, error: Option<io::Error>) {
        let (read_waker, write_waker) = {
            let mut state = self.state.lock().unwrap();
            if state.reader_done {
                return;
            }
            state.reader_done = true;
            state.reader_error = error.map(Arc::new);
            state.drop_buffered();
            state.read_op = ReadOp::Idle;
            (state.read_waker.take(), state.write_waker.take())
        };
        if let Some(waker) = read_waker {
            waker.wake();
        }
        if let Some(waker) = write_waker {
            waker.wake();
        }
    }

    pub(crate) fn release_claim(&self, claim: &mut Option<u64>) {
        if let Some(id) = claim.take() {
            let mut state = self.state.lock().unwrap();
            if matches!(state.read_op, ReadOp::Claimed(x) if x == id) {
                state.read_op = ReadOp::Idle;
            }
        }
    }

    pub(crate) fn publish(
        &self,
        pending: &mut Vec<Bytes>,
        signal_if_empty: bool,
    ) -> Result<(), PipeError> {
        let waker = {
            let mut state = self.state.lock().unwrap();
            if state.writer_done {
                return Err(PipeError::AlreadyCompleted);
            }
            let mut published = 0;
            for seg in pending.drain(..) {
                published += seg.len();
                state.segments.push_back(seg);
            }
            state.buffered += published;
            if state.reader_done {
                state.drop_buffered();
                return Ok(());
            }
            if published == 0 {
                if signal_if_empty {
                    state.flush_signal = true;
                    state.read_waker.take()
                } else {
                    None
                }
            } else {
                state.read_waker.take()
            }
        };
        if let Some(waker) = waker {
            waker.wake();
        }
        Ok(())
    }

    pub(crate) fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), PipeError>> {
        let mut state = self.state.lock().unwrap();
        if state.writer_done {
            return Poll::Ready(Err(PipeError::AlreadyCompleted));
        }
        if let Some(e) = &state.reader_error {
            return Poll::Ready(Err(PipeError::Faulted(e.clone())));
        }
        if state.reader_done {
            return Poll::Ready(Ok(()));
        }
        let pause = self.config.pause_threshold();
        if pause > 0 && state.buffered >= pause {
            state.write_waker = Some(cx.waker().clone());
            Poll::Pending
        } else {
            Poll::Ready(Ok(()))
        }
    }

    pub(crate) fn is_reader_completed(&self) -> bool {
        let state = self.state.lock().unwrap();
        state.reader_done
    }

    pub(crate) fn complete_writer(&self, error: Option<io::Error>, pending: &mut Vec<Bytes>) {
        let (read_waker, write_waker) = {
            let mut state = self.state.lock().unwrap();
            if state.writer_done {
                return;
            }
            for seg in pending.drain(..) {
                state.buffered += seg.len();
                state.segments.push_back(seg);
            }
            if state.reader_done {
                state.drop_buffered();
            }
            state.writer_done = true;
            state.writer_error = error.map(Arc::new);
            (state.read_waker.take(), state.write_waker.take())
        };
        if let Some(waker) = read_waker {
            waker.wake();
        }
        if let Some(waker) = write_waker {
            waker.wake();
        }
    }
}
