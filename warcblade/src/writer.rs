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

//! WARC record serialization.

use std::io::{self, Read, Write};
use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use tracing::trace;
use uuid::Uuid;

use crate::config::Compression;
use crate::error::{Result, WarcError};
use crate::header::{HeaderEncoding, HeaderMap};
use crate::reader::RECORD_TRAILER;
use crate::record::WarcRecordType;

/// Version line of written records
pub const WARC_VERSION: &str = "WARC/1.0";


/// Generate a fresh `WARC-Record-ID` value (`<urn:uuid:...>`).
pub fn new_record_id() -> String {
    format!("<urn:uuid:{}>", Uuid::new_v4())
}

/// Format a timestamp as a `WARC-Date` value.
pub fn format_warc_date(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}


/// Writes WARC records onto a stream.
///
/// `WARC-Type` and `Content-Length` are always set by the writer; values for these
/// headers passed by the caller are ignored.
pub struct WarcWriter<W: Write> {
    inner: W,
    compression: Compression,
}

impl<W: Write> WarcWriter<W> {
    /// Create a writer for uncompressed records.
    pub fn new(inner: W) -> Self {
        Self::with_compression(inner, Compression::None)
    }

    /// Create a writer. With [`Compression::Gzip`], every record is written as its own gzip member.
    pub fn with_compression(inner: W, compression: Compression) -> Self {
        WarcWriter { inner, compression }
    }

    /// Write a record with an in-memory body.
    ///
    /// # Returns
    ///
    /// Number of bytes written to the underlying stream
    pub fn write_record(&mut self, record_type: WarcRecordType, headers: &HeaderMap, body: &[u8]) -> Result<u64> {
        self.write_record_from(record_type, headers, body, body.len() as u64)
    }

    /// Write a record whose body is read from `body`.
    ///
    /// `body` must yield at least `length` bytes; only the first `length` bytes are used.
    /// Headers are written before the body is read, so a short body leaves a broken
    /// record behind and fails with [`WarcError::BodyLengthMismatch`].
    pub fn write_record_from<B: Read>(
        &mut self,
        record_type: WarcRecordType,
        headers: &HeaderMap,
        body: B,
        length: u64,
    ) -> Result<u64> {
        let block = record_header_block(record_type, headers, length);
        let mut out = CountingWriter { inner: &mut self.inner, count: 0 };
        match self.compression {
            Compression::None => write_frame(&mut out, &block, body, length)?,
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(&mut out, flate2::Compression::default());
                write_frame(&mut encoder, &block, body, length)?;
                encoder.finish()?;
            }
        }
        trace!(%record_type, length, written = out.count, "wrote record");
        Ok(out.count)
    }

    pub fn flush(&mut self) -> Result<()> {
        Ok(self.inner.flush()?)
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

fn record_header_block(record_type: WarcRecordType, headers: &HeaderMap, length: u64) -> HeaderMap {
    let mut block = HeaderMap::new(HeaderEncoding::Unicode);
    block.set_status_line(WARC_VERSION);
    block.append("WARC-Type", record_type.as_str());
    headers.iter_bytes()
        .filter(|(k, _)| !k.eq_ignore_ascii_case(b"WARC-Type") && !k.eq_ignore_ascii_case(b"Content-Length"))
        .for_each(|(k, v)| block.append_bytes(k, v));
    block.append("Content-Length", length.to_string());
    block
}

fn write_frame<O: Write, B: Read>(out: &mut O, block: &HeaderMap, body: B, length: u64) -> Result<()> {
    block.write(out)?;
    out.write_all(b"\r\n")?;
    let copied = io::copy(&mut body.take(length), out)?;
    if copied != length {
        return Err(WarcError::BodyLengthMismatch { expected: length, actual: copied });
    }
    out.write_all(RECORD_TRAILER)?;
    Ok(())
}

struct CountingWriter<W> {
    inner: W,
    count: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use crate::reader::ArchiveReader;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::default();
        for (k, v) in pairs {
            map.append(k, v);
        }
        map
    }

    #[test]
    fn test_write_layout() {
        let mut writer = WarcWriter::new(Vec::new());
        let fields = headers(&[("WARC-Target-URI", "http://example.com/")]);
        let written = writer.write_record(WarcRecordType::Resource, &fields, b"hello").unwrap();
        let out = writer.into_inner();
        assert_eq!(written, out.len() as u64);
        assert_eq!(
            out,
            b"WARC/1.0\r\nWARC-Type: resource\r\nWARC-Target-URI: http://example.com/\r\n\
              Content-Length: 5\r\n\r\nhello\r\n\r\n".to_vec()
        );
    }

    #[test]
    fn test_caller_length_and_type_are_replaced() {
        let mut writer = WarcWriter::new(Vec::new());
        let fields = headers(&[("Content-Length", "999"), ("warc-type", "metadata"), ("X-Other", "1")]);
        writer.write_record(WarcRecordType::Resource, &fields, b"abc").unwrap();
        let out = writer.into_inner();

        let mut reader = ArchiveReader::new(out.as_slice());
        let mut record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.content_length(), 3);
        assert_eq!(record.record_type(), WarcRecordType::Resource);
        assert_eq!(record.headers().get("Content-Length").as_deref(), Some("3"));
        assert_eq!(record.headers().get("X-Other").as_deref(), Some("1"));
        let mut body = Vec::new();
        record.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"abc");
        record.close().unwrap();
    }

    #[test]
    fn test_gzip_records_are_single_members() {
        let mut writer = WarcWriter::with_compression(Vec::new(), Compression::Gzip);
        let fields = headers(&[("WARC-Record-ID", new_record_id().as_str())]);
        let first = writer.write_record(WarcRecordType::Metadata, &fields, b"one").unwrap();
        let second = writer.write_record(WarcRecordType::Metadata, &fields, b"second body").unwrap();
        let out = writer.into_inner();
        assert_eq!(out.len() as u64, first + second);
        assert_eq!(&out[..2], b"\x1f\x8b");
        assert_eq!(&out[first as usize..first as usize + 2], b"\x1f\x8b");

        let mut reader = ArchiveReader::new(out.as_slice());
        let mut record = reader.next_record().unwrap().unwrap();
        assert!(record.is_compressed());
        let mut body = Vec::new();
        record.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"one");
        record.close().unwrap();
        assert_eq!(reader.position(), first);

        let record = reader.next_record().unwrap().unwrap();
        assert_eq!(record.offset(), first);
        assert_eq!(record.content_length(), 11);
        record.close().unwrap();
        assert_eq!(reader.position(), first + second);
    }

    #[test]
    fn test_short_body_source() {
        let mut writer = WarcWriter::new(Vec::new());
        let err = writer
            .write_record_from(WarcRecordType::Resource, &HeaderMap::default(), &b"abc"[..], 10)
            .unwrap_err();
        assert!(matches!(err, WarcError::BodyLengthMismatch { expected: 10, actual: 3 }));
    }

    #[test]
    fn test_record_id_and_date_format() {
        let id = new_record_id();
        assert!(id.starts_with("<urn:uuid:") && id.ends_with('>'));
        assert_eq!(id.len(), "<urn:uuid:>".len() + 36);

        let date = DateTime::parse_from_rfc3339("2020-01-02T03:04:05+00:00").unwrap().with_timezone(&Utc);
        assert_eq!(format_warc_date(date), "2020-01-02T03:04:05Z");
    }
}
