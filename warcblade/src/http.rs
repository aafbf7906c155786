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

//! HTTP messages encapsulated in WARC record bodies.

use std::io::{BufRead, Read};
use tracing::debug;

use crate::error::{Result, WarcError};
use crate::header::{parse_header_block, read_line, HeaderEncoding, HeaderMap};
use crate::reader::Record;

/// Media type of a record body holding an HTTP message
pub const HTTP_MEDIA_TYPE: &str = "application/http";


/// Status line and headers of an HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponseHead {
    headers: HeaderMap,
    status_code: u16,
}

impl HttpResponseHead {
    /// HTTP status code.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// HTTP headers, including the status line.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Plain HTTP Content-Type without additional fields such as `charset=`.
    pub fn content_type(&self) -> Option<String> {
        normalize_media_type(&self.headers.get_first("Content-Type")?)
    }
}

/// Read an HTTP response status line and header block.
///
/// Only the head is consumed; `reader` is left positioned at the start of the payload.
pub fn read_response_head<B: BufRead>(reader: &mut B) -> Result<HttpResponseHead> {
    let mut headers = HeaderMap::new(HeaderEncoding::Latin1);
    let mut line = Vec::new();
    if read_line(reader, &mut line)? == 0 {
        return Err(WarcError::EncapsulatedMessageParseFailure("empty message".to_string()));
    }
    headers.set_status_line(&line);

    let status_code = headers.status_code().ok_or_else(|| {
        WarcError::EncapsulatedMessageParseFailure(format!("malformed status line {:?}", headers.status_line()))
    })?;

    parse_header_block(reader, &mut headers)
        .map_err(|e| WarcError::EncapsulatedMessageParseFailure(e.to_string()))?;

    Ok(HttpResponseHead { headers, status_code })
}

/// Parse the HTTP response head stored in a record body.
///
/// Returns `None` if the record is not an HTTP record or its head cannot be parsed.
/// A failed parse does not affect the record framing: the record can still be closed.
pub fn extract_response<R: Read>(record: &mut Record<'_, R>) -> Option<HttpResponseHead> {
    if !record.is_http() {
        return None;
    }
    match read_response_head(record) {
        Ok(head) => Some(head),
        Err(err) => {
            debug!(offset = record.offset(), %err, "record has no usable HTTP response head");
            None
        }
    }
}

/// Reduce a `Content-Type` value to its lowercase `type/subtype`, dropping parameters.
///
/// Returns `None` if the value does not start with a valid media type.
pub fn normalize_media_type(value: &str) -> Option<String> {
    let base = value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    let valid = match base.split_once('/') {
        Some((kind, subtype)) => is_token(kind) && is_token(subtype),
        None => is_token(&base),
    };
    valid.then_some(base)
}

fn is_token(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| {
        b.is_ascii_graphic() && !b"()<>@,;:\\\"/[]?=".contains(&b)
    })
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Read};
    use crate::reader::ArchiveReader;

    fn response_record(content_type: &str, block: &[u8]) -> Vec<u8> {
        let mut out = format!(
            "WARC/1.0\r\nWARC-Type: response\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\n\r\n",
            block.len()
        ).into_bytes();
        out.extend_from_slice(block);
        out.extend_from_slice(b"\r\n\r\n");
        out
    }

    #[test]
    fn test_normalize_media_type() {
        assert_eq!(normalize_media_type("text/html; charset=utf-8").as_deref(), Some("text/html"));
        assert_eq!(normalize_media_type(" Text/HTML ").as_deref(), Some("text/html"));
        assert_eq!(normalize_media_type("application/http;msgtype=response").as_deref(), Some("application/http"));
        assert_eq!(normalize_media_type("text").as_deref(), Some("text"));
        assert_eq!(normalize_media_type(""), None);
        assert_eq!(normalize_media_type("; charset=utf-8"), None);
        assert_eq!(normalize_media_type("text/"), None);
        assert_eq!(normalize_media_type("text/html/x"), None);
        assert_eq!(normalize_media_type("te xt/html"), None);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for value in ["text/html; charset=utf-8", "IMAGE/PNG", "application/x-www-form-urlencoded"] {
            let once = normalize_media_type(value).unwrap();
            assert_eq!(normalize_media_type(&once).as_deref(), Some(once.as_str()));
        }
    }

    #[test]
    fn test_read_response_head() {
        let mut input = Cursor::new(&b"HTTP/1.1 301 Moved Permanently\r\n\
            Location: http://example.com/new\r\n\
            Content-Type: text/html; charset=iso-8859-1\r\n\
            \r\n\
            <html>"[..]);
        let head = read_response_head(&mut input).unwrap();
        assert_eq!(head.status_code(), 301);
        assert_eq!(head.content_type().as_deref(), Some("text/html"));
        assert_eq!(head.headers().reason_phrase().as_deref(), Some("Moved Permanently"));
        assert_eq!(head.headers().get("location").as_deref(), Some("http://example.com/new"));

        let mut rest = String::new();
        input.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "<html>");
    }

    #[test]
    fn test_duplicate_content_type_uses_first() {
        let mut input = Cursor::new(&b"HTTP/1.1 200 OK\r\n\
            Content-Type: text/html; charset=utf-8\r\n\
            Content-Type: text/plain\r\n\
            \r\n"[..]);
        let head = read_response_head(&mut input).unwrap();
        assert_eq!(head.content_type().as_deref(), Some("text/html"));
    }

    #[test]
    fn test_read_response_head_failures() {
        for input in [
            &b""[..],
            b"GET / HTTP/1.1\r\n\r\n",
            b"HTTP/1.1 OK\r\n\r\n",
            b"HTTP/1.1 200 OK\r\nBroken header\r\n\r\n",
            b"HTTP/1.1 200 OK\r\nA: b\r\n",
        ] {
            assert!(
                matches!(read_response_head(&mut Cursor::new(input)), Err(WarcError::EncapsulatedMessageParseFailure(_))),
                "input {:?}", String::from_utf8_lossy(input)
            );
        }
    }

    #[test]
    fn test_extract_stops_at_head() {
        let block = b"HTTP/1.0 200 OK\r\nContent-Type: image/png\r\n\r\nPNGDATA";
        let input = response_record("application/http; msgtype=response", block);
        let mut reader = ArchiveReader::new(input.as_slice());
        let mut record = reader.next_record().unwrap().unwrap();

        let head = extract_response(&mut record).unwrap();
        assert_eq!(head.status_code(), 200);
        assert_eq!(head.content_type().as_deref(), Some("image/png"));
        assert_eq!(record.remaining(), 7);
        record.close().unwrap();
        assert_eq!(reader.position(), input.len() as u64);
    }

    #[test]
    fn test_extract_never_reads_past_record() {
        // Header block is cut off by Content-Length; the next record must stay intact
        let block = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n";
        let mut input = response_record("application/http", block);
        let first_len = input.len() as u64;
        input.extend_from_slice(&response_record("application/http", b"HTTP/1.1 404 Not Found\r\n\r\n"));

        let mut reader = ArchiveReader::new(input.as_slice());
        let mut record = reader.next_record().unwrap().unwrap();
        assert!(extract_response(&mut record).is_none());
        assert_eq!(record.remaining(), 0);
        record.close().unwrap();
        assert_eq!(reader.position(), first_len);

        let mut record = reader.next_record().unwrap().unwrap();
        assert_eq!(extract_response(&mut record).map(|h| h.status_code()), Some(404));
        record.close().unwrap();
    }

    #[test]
    fn test_extract_ignores_non_http_records() {
        let input = response_record("text/plain", b"HTTP/1.1 200 OK\r\n\r\n");
        let mut reader = ArchiveReader::new(input.as_slice());
        let mut record = reader.next_record().unwrap().unwrap();
        assert!(extract_response(&mut record).is_none());
        assert_eq!(record.remaining(), record.content_length());
        record.close().unwrap();
    }
}
