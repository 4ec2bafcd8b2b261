/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2026 ByteDance and/or its affiliates.
 */

use std::io::{self, IoSlice};
use std::pin::Pin;
use std::task::{Context, Poll};

use log::trace;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

const BYTES_PER_LINE: usize = 16;
const GROUP_SIZE: usize = 8;

const HEX_CHARS: &[u8; 16] = b"0123456789ABCDEF";

/// Hex+ASCII dump of `data` under a `method[len]` header, 16 bytes per
/// line in two groups of 8, with the ASCII column aligned across lines.
/// Bytes outside printable ASCII show as `.`.
fn format_dump(method: &str, data: &[u8]) -> String {
    let mut out = format!("{method}[{}]", data.len());
    let mut chars = String::with_capacity(BYTES_PER_LINE + 1);
    for (i, b) in data.iter().enumerate() {
        if i % BYTES_PER_LINE == 0 {
            out.push('\n');
            chars.clear();
        }
        out.push(HEX_CHARS[(b >> 4) as usize] as char);
        out.push(HEX_CHARS[(b & 0x0f) as usize] as char);
        out.push(' ');
        chars.push(if b.is_ascii_graphic() || *b == b' ' {
            *b as char
        } else {
            '.'
        });
        if (i + 1) % BYTES_PER_LINE == 0 {
            out.push_str("  ");
            out.push_str(&chars);
        } else if (i + 1) % GROUP_SIZE == 0 {
            out.push(' ');
            chars.push(' ');
        }
    }
    let rem = data.len() % BYTES_PER_LINE;
    if rem > 0 {
        let mut pad = 2 + 3 * (BYTES_PER_LINE - rem);
        if rem < GROUP_SIZE {
            pad += 1;
        }
        for _ in 0..pad {
            out.push(' ');
        }
        out.push_str(&chars);
    }
    out
}

fn dump(method: &str, data: &[u8]) {
    if log::log_enabled!(log::Level::Trace) {
        trace!("{}", format_dump(method, data));
    }
}

/// Transparent stream decorator that dumps every byte moved in either
/// direction to the trace log.
pub struct LoggingStream<S> {
    inner: S,
}

impl<S> LoggingStream<S> {
    pub fn new(inner: S) -> Self {
        LoggingStream { inner }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S> AsyncRead for LoggingStream<S>
where
    S: AsyncRead + Unpin,
{
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let filled = buf.filled().len();
        let r = Pin::new(&mut self.inner).poll_read(cx, buf);
        if let Poll::Ready(Ok(())) = &r {
            dump("read", &buf.filled()[filled..]);
        }
        r
    }
}

impl<S> AsyncWrite for LoggingStream<S>
where
    S: AsyncWrite + Unpin,
{
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let r = Pin::new(&mut self.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &r {
            dump("write", &buf[..*n]);
        }
        r
    }

    fn poll_write_vectored(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let r = Pin::new(&mut self.inner).poll_write_vectored(cx, bufs);
        if let Poll::Ready(Ok(n)) = &r
            && log::log_enabled!(log::Level::Trace)
        {
            // only the accepted prefix was written
            let mut data = Vec::with_capacity(*n);
            let mut left = *n;
            for slice in bufs {
                if left == 0 {
                    break;
                }
                let take = left.min(slice.len());
                data.extend_from_slice(&slice[..take]);
                left -= take;
            }
            trace!("{}", format_dump("write", &data));
        }
        r
    }

    fn is_write_vectored(&self) -> bool {
        self.inner.is_write_vectored()
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_flush(cx)
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.inner).poll_shutdown(cx)
    }
}
