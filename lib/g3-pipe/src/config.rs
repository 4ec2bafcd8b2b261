/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 ByteDance and/or its affiliates.
 */

const DEFAULT_SEGMENT_SIZE: usize = 4096;
const MINIMAL_SEGMENT_SIZE: usize = 256;
const DEFAULT_PAUSE_THRESHOLD: usize = 64 * 1024;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct PipeConfig {
    segment_size: usize,
    pause_threshold: usize,
    resume_threshold: usize,
}

impl Default for PipeConfig {
    fn default() -> Self {
        PipeConfig {
            segment_size: DEFAULT_SEGMENT_SIZE,
            pause_threshold: DEFAULT_PAUSE_THRESHOLD,
            resume_threshold: DEFAULT_PAUSE_THRESHOLD / 2,
        }
    }
}

impl PipeConfig {
    pub fn set_segment_size(&mut self, size: usize) {
        self.segment_size = size.max(MINIMAL_SEGMENT_SIZE);
    }

    #[inline]
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Set the number of unconsumed bytes at which flush starts to wait.
    /// 0 disables backpressure.
    pub fn set_pause_threshold(&mut self, size: usize) {
        self.pause_threshold = size;
        if self.resume_threshold > size {
            self.resume_threshold = size;
        }
    }

    #[inline]
    pub fn pause_threshold(&self) -> usize {
        self.pause_threshold
    }

    pub fn set_resume_threshold(&mut self, size: usize) {
        self.resume_threshold = size.min(self.pause_threshold);
    }

    #[inline]
    pub fn resume_threshold(&self) -> usize {
        self.resume_threshold
    }
}
