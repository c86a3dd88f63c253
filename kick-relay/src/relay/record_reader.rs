//! Framing for the relay process's stderr.
//!
//! ffmpeg redraws its progress line with `\r` and only ends ordinary messages
//! with `\n`, and pipe reads split or merge either kind arbitrarily. Records
//! here are delimited by either byte, so each progress update arrives as one
//! record regardless of how the bytes were chunked.

use std::io;

use memchr::memchr2;
use tokio::io::{AsyncRead, AsyncReadExt};

const READ_CHUNK: usize = 4096;

/// Undelimited output longer than this is cut into a record of its own.
const MAX_RECORD_LEN: usize = 64 * 1024;

/// Yields trimmed, non-empty text records from an async byte stream.
pub struct RecordReader<R> {
    inner: R,
    pending: Vec<u8>,
    eof: bool,
}

impl<R> RecordReader<R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: Vec::with_capacity(READ_CHUNK),
            eof: false,
        }
    }

    /// Next record, or `None` once the stream is exhausted.
    ///
    /// A trailing record without a delimiter is returned at EOF.
    pub async fn next_record(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(record) = self.take_delimited() {
                return Ok(Some(record));
            }

            if self.eof {
                let rest = std::mem::take(&mut self.pending);
                let record = decode(&rest);
                return Ok((!record.is_empty()).then_some(record));
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                self.eof = true;
            } else {
                self.pending.extend_from_slice(&chunk[..n]);
            }
        }
    }

    /// Pop the first complete non-empty record out of the buffer. A record
    /// never exceeds `MAX_RECORD_LEN`; longer runs are split.
    fn take_delimited(&mut self) -> Option<String> {
        loop {
            let window = self.pending.len().min(MAX_RECORD_LEN);
            let (end, consumed) = match memchr2(b'\n', b'\r', &self.pending[..window]) {
                Some(idx) => (idx, idx + 1),
                None if window == MAX_RECORD_LEN => (window, window),
                None => return None,
            };
            let record = decode(&self.pending[..end]);
            self.pending.drain(..consumed);
            if !record.is_empty() {
                return Some(record);
            }
        }
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}
