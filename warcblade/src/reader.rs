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

//! Sequential WARC record reader.
//!
//! [`ArchiveReader::next_record`] hands out one [`Record`] at a time. The record borrows
//! the reader, so the next record can only be requested once the current handle is gone,
//! and [`Record::close`] must be called to skip the rest of the body and validate the
//! trailer. Each record may be a gzip member of its own; compression is detected per
//! record by peeking at the magic bytes.

use std::io::{self, BufRead, BufReader, Read};
use flate2::bufread::GzDecoder;
use tracing::debug;

use crate::error::{Result, WarcError};
use crate::header::{parse_header_block, read_line, HeaderEncoding, HeaderMap};
use crate::http::{normalize_media_type, HTTP_MEDIA_TYPE};
use crate::record::WarcRecordType;
use crate::stream::LookaheadReader;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const VERSION_PREFIX: &[u8] = b"WARC/1.";
pub(crate) const RECORD_TRAILER: &[u8; 4] = b"\r\n\r\n";


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReaderState {
    /// Positioned at a record boundary
    Ready,
    /// A record handle is out and has not been closed
    Open,
    /// A framing error occurred, the stream position is meaningless
    Failed,
}

/// WARC record stream reader.
pub struct ArchiveReader<R> {
    inner: LookaheadReader<R>,
    state: ReaderState,
}

impl<R: Read> ArchiveReader<R> {
    /// Create a new reader over a raw (possibly gzip-per-record) WARC stream.
    pub fn new(reader: R) -> Self {
        ArchiveReader {
            inner: LookaheadReader::new(reader),
            state: ReaderState::Ready,
        }
    }

    /// Offset in the raw stream of the next unconsumed byte.
    ///
    /// Between records this is the start offset of the next record (or the stream length
    /// once the stream is exhausted). Offsets always refer to the raw, compressed bytes.
    pub fn position(&self) -> u64 {
        self.inner.position()
    }

    /// Read the next record header block.
    ///
    /// # Returns
    ///
    /// `Ok(Some(record))` if a record was framed, `Ok(None)` at the end of the stream.
    /// Requesting a record while a previous one has not been closed yields
    /// [`WarcError::RecordNotClosed`]; after any framing error the reader only
    /// returns [`WarcError::StreamFailed`].
    pub fn next_record(&mut self) -> Result<Option<Record<'_, R>>> {
        match self.state {
            ReaderState::Ready => {}
            ReaderState::Open => return Err(WarcError::RecordNotClosed),
            ReaderState::Failed => return Err(WarcError::StreamFailed),
        }

        let ArchiveReader { inner, state } = self;
        let offset = inner.position();
        match open_record(inner) {
            Ok(Some(framed)) => {
                debug!(
                    offset,
                    record_type = %framed.record_type,
                    content_length = framed.content_length,
                    compressed = framed.source.is_compressed(),
                    "framed record"
                );
                *state = ReaderState::Open;
                Ok(Some(Record {
                    version_minor: framed.version_minor,
                    record_type: framed.record_type,
                    headers: framed.headers,
                    content_length: framed.content_length,
                    remaining: framed.content_length,
                    offset,
                    source: framed.source,
                    state,
                }))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                *state = ReaderState::Failed;
                Err(e)
            }
        }
    }
}


/// Where record bytes come from: the raw stream or a decoder scoped to one gzip member.
enum Source<'a, R> {
    Plain(&'a mut LookaheadReader<R>),
    Gzip(BufReader<GzDecoder<&'a mut LookaheadReader<R>>>),
}

impl<R> Source<'_, R> {
    fn is_compressed(&self) -> bool {
        matches!(self, Source::Gzip(_))
    }
}

impl<R: Read> Read for Source<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Source::Plain(r) => r.read(buf),
            Source::Gzip(r) => r.read(buf),
        }
    }
}

impl<R: Read> BufRead for Source<'_, R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            Source::Plain(r) => r.fill_buf(),
            Source::Gzip(r) => r.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            Source::Plain(r) => r.consume(amt),
            Source::Gzip(r) => r.consume(amt),
        }
    }
}

struct Framed<'a, R> {
    version_minor: u32,
    record_type: WarcRecordType,
    headers: HeaderMap,
    content_length: u64,
    source: Source<'a, R>,
}

fn open_record<R: Read>(inner: &mut LookaheadReader<R>) -> Result<Option<Framed<'_, R>>> {
    let compressed = {
        let magic = inner.peek(GZIP_MAGIC.len())?;
        if magic.is_empty() {
            return Ok(None);
        }
        magic == GZIP_MAGIC
    };

    // A single-member decoder stops at the end of the current member
    let mut source = if compressed {
        Source::Gzip(BufReader::new(GzDecoder::new(inner)))
    } else {
        Source::Plain(inner)
    };

    let mut line = Vec::new();
    if read_line(&mut source, &mut line)? == 0 && !compressed {
        return Ok(None);
    }
    let version_minor = parse_version_line(&line)?;

    let mut headers = HeaderMap::new(HeaderEncoding::Unicode);
    headers.set_status_line(&line);
    parse_header_block(&mut source, &mut headers)?;

    let length = headers.get_first("Content-Length");
    let content_length = length.as_deref()
        .map(str::trim)
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or_else(|| WarcError::MissingOrInvalidLength(length.clone()))?;

    let record_type = WarcRecordType::from_header(headers.get_first("WARC-Type").as_deref());

    Ok(Some(Framed {
        version_minor,
        record_type,
        headers,
        content_length,
        source,
    }))
}

/// Parse a `WARC/1.<minor>` version line and return the minor version.
fn parse_version_line(line: &[u8]) -> Result<u32> {
    let malformed = || WarcError::MalformedVersionLine(String::from_utf8_lossy(line).into_owned());
    let minor = line.strip_prefix(VERSION_PREFIX).ok_or_else(malformed)?;
    if minor.is_empty() || !minor.iter().all(u8::is_ascii_digit) {
        return Err(malformed());
    }
    std::str::from_utf8(minor)
        .ok()
        .and_then(|m| m.parse::<u32>().ok())
        .ok_or_else(malformed)
}


/// A framed WARC record whose body is being read.
///
/// Reading through [`Read`] or [`BufRead`] yields the record body and never goes past the
/// declared `Content-Length`. The record must be finished with [`Record::close`].
pub struct Record<'a, R> {
    version_minor: u32,
    record_type: WarcRecordType,
    headers: HeaderMap,
    content_length: u64,
    remaining: u64,
    offset: u64,
    source: Source<'a, R>,
    state: &'a mut ReaderState,
}

impl<R: Read> Record<'_, R> {
    /// Minor version from the `WARC/1.<minor>` line.
    pub fn version_minor(&self) -> u32 {
        self.version_minor
    }

    /// Record type (same as `headers['WARC-Type']`).
    pub fn record_type(&self) -> WarcRecordType {
        self.record_type
    }

    /// WARC record headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Record ID (same as `headers['WARC-Record-ID']`).
    pub fn record_id(&self) -> Option<String> {
        self.headers.get_first("WARC-Record-ID")
    }

    /// Declared body length in bytes.
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    /// Body bytes not yet read.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Offset of the record start in the raw stream.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Whether the record was stored as its own gzip member.
    pub fn is_compressed(&self) -> bool {
        self.source.is_compressed()
    }

    /// Whether the record body is an HTTP message (`Content-Type: application/http`).
    pub fn is_http(&self) -> bool {
        self.headers.get_first("Content-Type")
            .and_then(|ct| normalize_media_type(&ct))
            .is_some_and(|t| t == HTTP_MEDIA_TYPE)
    }

    /// Skip the unread body, validate the record trailer and, for compressed records,
    /// check that the gzip member ends with the record.
    pub fn close(mut self) -> Result<()> {
        let result = self.finish();
        *self.state = match result {
            Ok(()) => ReaderState::Ready,
            Err(_) => ReaderState::Failed,
        };
        result
    }

    fn finish(&mut self) -> Result<()> {
        while self.remaining > 0 {
            let available = self.source.fill_buf()?.len() as u64;
            if available == 0 {
                return Err(WarcError::TruncatedRecord { remaining: self.remaining });
            }
            let n = available.min(self.remaining);
            self.source.consume(n as usize);
            self.remaining -= n;
        }

        let mut trailer = [0u8; 4];
        match self.source.read_exact(&mut trailer) {
            Ok(()) if &trailer == RECORD_TRAILER => {}
            Ok(()) => return Err(WarcError::InvalidTrailer),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Err(WarcError::InvalidTrailer),
            Err(e) => return Err(e.into()),
        }

        if let Source::Gzip(decoder) = &mut self.source {
            let mut probe = [0u8; 1];
            if decoder.read(&mut probe)? != 0 {
                return Err(WarcError::CompressedMemberOverrun);
            }
        }
        Ok(())
    }
}

impl<R: Read> Read for Record<'_, R> {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
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

impl<R: Read> BufRead for Record<'_, R> {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        if self.remaining == 0 {
            return Ok(&[]);
        }
        let remaining = self.remaining;
        let buf = self.source.fill_buf()?;
        let n = (buf.len() as u64).min(remaining) as usize;
        Ok(&buf[..n])
    }

    fn consume(&mut self, amt: usize) {
        let amt = (amt as u64).min(self.remaining);
        self.source.consume(amt as usize);
        self.remaining -= amt;
    }
}
