// Copyright 2025 Janek Bevendorff
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::io::{self, BufRead, Read};

/// Default read-ahead buffer size
pub const DEFAULT_BUF_SIZE: usize = 64 * 1024;


/// Buffered reader over a raw byte stream with lookahead.
///
/// Unlike [`std::io::BufReader`], [`LookaheadReader::peek`] can look at the next `n`
/// bytes even if they straddle a buffer refill. The reader also counts how many bytes
/// callers have consumed, so [`LookaheadReader::position`] is the offset in the raw
/// stream of the next unconsumed byte (bytes sitting in the buffer are not counted).
pub struct LookaheadReader<R> {
    inner: R,
    buf: Box<[u8]>,
    pos: usize,
    filled: usize,
    consumed: u64,
}

impl<R: Read> LookaheadReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_capacity(DEFAULT_BUF_SIZE, inner)
    }

    pub fn with_capacity(capacity: usize, inner: R) -> Self {
        LookaheadReader {
            inner,
            buf: vec![0u8; capacity.max(16)].into_boxed_slice(),
            pos: 0,
            filled: 0,
            consumed: 0,
        }
    }

    /// Offset of the next unconsumed byte in the underlying stream.
    pub fn position(&self) -> u64 {
        self.consumed
    }

    /// Number of bytes read from the underlying stream but not yet consumed.
    pub fn buffered(&self) -> usize {
        self.filled - self.pos
    }

    /// Look at up to `n` upcoming bytes without consuming them.
    ///
    /// Fewer than `n` bytes are returned only if the underlying stream ends first.
    pub fn peek(&mut self, n: usize) -> io::Result<&[u8]> {
        let n = n.min(self.buf.len());
        while self.buffered() < n {
            if self.pos > 0 {
                self.buf.copy_within(self.pos..self.filled, 0);
                self.filled -= self.pos;
                self.pos = 0;
            }
            match self.inner.read(&mut self.buf[self.filled..]) {
                Ok(0) => break,
                Ok(read) => self.filled += read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        let end = self.filled.min(self.pos + n);
        Ok(&self.buf[self.pos..end])
    }
}

impl<R: Read> Read for LookaheadReader<R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        // Large reads on an empty buffer go straight to the source
        if self.buffered() == 0 && out.len() >= self.buf.len() {
            let n = self.inner.read(out)?;
            self.consumed += n as u64;
            return Ok(n);
        }
        let n = {
            let available = self.fill_buf()?;
            let n = available.len().min(out.len());
            out[..n].copy_from_slice(&available[..n]);
            n
        };
        self.consume(n);
        Ok(n)
    }
}

impl<R: Read> BufRead for LookaheadReader<R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.pos >= self.filled {
            self.pos = 0;
            self.filled = 0;
            loop {
                match self.inner.read(&mut self.buf) {
                    Ok(n) => {
                        self.filled = n;
                        break;
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
        }
        Ok(&self.buf[self.pos..self.filled])
    }

    fn consume(&mut self, amt: usize) {
        let amt = amt.min(self.buffered());
        self.pos += amt;
        self.consumed += amt as u64;
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    /// Source that hands out at most `chunk` bytes per read call.
    struct Trickle<'a> {
        data: &'a [u8],
        chunk: usize,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            let n = self.chunk.min(out.len()).min(self.data.len());
            out[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_peek_across_short_reads() {
        let mut reader = LookaheadReader::with_capacity(16, Trickle { data: b"\x1f\x8brest", chunk: 1 });
        assert_eq!(reader.peek(2).unwrap(), b"\x1f\x8b");
        assert_eq!(reader.position(), 0);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"\x1f\x8brest");
        assert_eq!(reader.position(), 6);
    }

    #[test]
    fn test_peek_compacts_buffer() {
        let data = b"0123456789abcdefghij";
        let mut reader = LookaheadReader::with_capacity(16, Trickle { data, chunk: 16 });
        let mut skip = [0u8; 15];
        reader.read_exact(&mut skip).unwrap();
        assert_eq!(reader.buffered(), 1);
        assert_eq!(reader.peek(3).unwrap(), b"fgh");
        assert_eq!(reader.position(), 15);
    }

    #[test]
    fn test_peek_at_end_of_stream() {
        let mut reader = LookaheadReader::new(&b"x"[..]);
        assert_eq!(reader.peek(2).unwrap(), b"x");
        reader.consume(1);
        assert!(reader.peek(2).unwrap().is_empty());
        assert_eq!(reader.position(), 1);
    }

    #[test]
    fn test_position_excludes_buffered_bytes() {
        let mut reader = LookaheadReader::new(&b"line one\nline two\n"[..]);
        let mut line = String::new();
        reader.read_line(&mut line).unwrap();
        assert_eq!(line, "line one\n");
        assert_eq!(reader.position(), 9);
        assert_eq!(reader.buffered(), 9);
    }
}
