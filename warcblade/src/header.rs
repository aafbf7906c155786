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

use std::io::{self, BufRead};
use encoding::{Encoding, DecoderTrap};
use encoding::all::WINDOWS_1252;

use crate::error::{Result, WarcError};


#[derive(Debug, Eq, PartialEq, Clone, Copy)]
pub enum HeaderEncoding {
    Unicode,
    Latin1
}

/// Dict-like type representing a WARC or HTTP header block.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderMap {
    encoding: HeaderEncoding,
    status_line: Vec<u8>,
    headers: Vec<(Vec<u8>, Vec<u8>)>,
}

impl Default for HeaderMap {
    fn default() -> Self {
        Self::new(HeaderEncoding::Unicode)
    }
}

impl HeaderMap {
    /// Create a new header map with the specified encoding.
    ///
    /// # Arguments
    ///
    /// * `encoding` - Header source encoding
    pub fn new(encoding: HeaderEncoding) -> Self {
        HeaderMap {
            encoding,
            status_line: Vec::new(),
            headers: Vec::new(),
        }
    }

    /// Get the header status line.
    pub fn status_line(&self) -> String {
        self.decode(&self.status_line)
    }

    /// Set status line contents.
    ///
    /// # Arguments
    ///
    /// * `status_line` - New status line
    pub fn set_status_line(&mut self, status_line: impl AsRef<[u8]>) {
        self.status_line = status_line.as_ref().to_vec();
    }

    /// HTTP status code (unset if header block is not an HTTP header block).
    pub fn status_code(&self) -> Option<u16> {
        if !self.status_line.starts_with(b"HTTP/") {
            return None;
        }
        let mut parts = self.status_line.splitn(3, |&b| b == b' ');
        // Skip HTTP/
        parts.next()?;
        let code = parts.next()?;
        if code.len() != 3 || !code.iter().all(u8::is_ascii_digit) {
            return None;
        }
        String::from_utf8_lossy(code).parse::<u16>().ok()
    }

    fn decode(&self, byte_str: &[u8]) -> String {
        match &self.encoding {
            HeaderEncoding::Unicode => String::from_utf8_lossy(byte_str).to_string(),
            HeaderEncoding::Latin1 => WINDOWS_1252.decode(byte_str, DecoderTrap::Replace)
                .unwrap_or_else(|_| String::new())
        }
    }

    /// HTTP reason phrase.
    /// Returns None if the header block is not an HTTP header block or no reason phrase was given.
    pub fn reason_phrase(&self) -> Option<String> {
        if !self.status_line.starts_with(b"HTTP/") {
            return None;
        }
        let mut parts = self.status_line.splitn(3, |&b| b == b' ');
        // Skip HTTP/ and status code
        parts.next()?;
        parts.next()?;
        Some(self.decode(parts.next()?))
    }

    /// Get value for (case-insensitive) header key a string.
    /// Duplicate headers are returned as a single value joined with `","`.
    ///
    /// # Arguments
    ///
    /// * `key` - Header key
    pub fn get(&self, key: &str) -> Option<String> {
        Some(self.decode(&self.get_bytes(key.as_bytes())?))
    }

    /// Get the first value for a (case-insensitive) header key.
    ///
    /// Use this for fields that are defined to occur only once, such as `Content-Length`.
    ///
    /// # Arguments
    ///
    /// * `key` - Header key
    pub fn get_first(&self, key: &str) -> Option<String> {
        let key = key.as_bytes();
        self.headers.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| self.decode(v))
    }

    /// Get value for (case-insensitive) header key as bytes.
    /// Duplicate headers are returned as a single value joined with `","`.
    ///
    /// # Arguments
    ///
    /// * `key` - Header key
    pub fn get_bytes(&self, key: &[u8]) -> Option<Vec<u8>> {
        let values: Vec<&[u8]> = self.headers.iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_slice())
            .collect();
        if !values.is_empty() {
            Some(values.as_slice().join(b",".as_slice()))
        } else {
            None
        }
    }

    /// Check if a (case-insensitive) header key exists.
    ///
    /// # Arguments
    ///
    /// * `key` - Header key
    pub fn contains_key(&self, key: &str) -> bool {
        let key_bytes = key.as_bytes();
        self.headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(key_bytes))
    }

    /// Insert new header and overwrite existing header(s) if the key already exists.
    ///
    /// If a header already exists, its first occurrence will be updated and
    /// all following occurrences will be dropped.
    ///
    /// # Arguments
    ///
    /// * `key` - Header key
    /// * `value` - Header value
    pub fn set(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) {
        self.set_bytes(key.as_ref().as_bytes(), value.as_ref().as_bytes());
    }

    /// Byte variant of [`HeaderMap::set`].
    pub fn set_bytes(&mut self, key: &[u8], value: &[u8]) {
        let mut found = false;
        self.headers.retain_mut(|h| {
            if !h.0.eq_ignore_ascii_case(key) {
                true
            } else if !found {
                *h = (key.trim_ascii().to_vec(), value.trim_ascii().to_vec());
                found = true;
                true
            } else {
                false
            }
        });
        if !found {
            self.headers.push((key.trim_ascii().to_vec(), value.trim_ascii().to_vec()));
        }
    }

    /// Remove all occurrences of a (case-insensitive) header key.
    ///
    /// Returns `true` if at least one header was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.headers.len();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(key.as_bytes()));
        self.headers.len() != before
    }

    /// Append header.
    ///
    /// Appending a new header is efficient and does not check for
    /// existing headers with the same name.
    ///
    /// # Arguments
    ///
    /// * `key` - Header key
    /// * `value` - Header value
    pub fn append(&mut self, key: impl AsRef<str>, value: impl AsRef<str>) {
        self.append_bytes(key.as_ref().as_bytes(), value.as_ref().as_bytes());
    }

    /// Byte variant of [`HeaderMap::append`].
    pub fn append_bytes(&mut self, key: &[u8], value: &[u8]) {
        self.headers.push((key.trim_ascii().to_vec(), value.trim_ascii().to_vec()));
    }

    /// Iterator of keys and values.
    pub fn items(&self) -> impl Iterator<Item = (String, String)> + use<'_> {
        self.headers
            .iter()
            .map(|(k, v)| (self.decode(k), self.decode(v)))
    }

    /// Iterator of raw keys and values.
    pub fn iter_bytes(&self) -> impl Iterator<Item = (&[u8], &[u8])> + use<'_> {
        self.headers
            .iter()
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Get the number of headers.
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Check if the header map is empty.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Write header block into stream.
    ///
    /// The status line (if any) and all headers are written, each terminated by `CRLF`.
    /// The blank line ending the block is left to the caller. Line breaks inside
    /// values are replaced with spaces so that a value cannot end the block early.
    pub fn write<W: io::Write>(&self, writer: &mut W) -> io::Result<usize> {
        let mut bytes_written = 0usize;
        if !self.status_line.is_empty() {
            let line = sanitize_line(&self.status_line);
            writer.write_all(&line)?;
            writer.write_all(b"\r\n")?;
            bytes_written += line.len() + 2;
        }
        for (key, value) in &self.headers {
            let key = sanitize_line(key);
            let value = sanitize_line(value);
            writer.write_all(&key)?;
            writer.write_all(b": ")?;
            writer.write_all(&value)?;
            writer.write_all(b"\r\n")?;
            bytes_written += key.len() + value.len() + 4;
        }
        Ok(bytes_written)
    }

    fn add_continuation(&mut self, value: &[u8]) -> bool {
        match self.headers.last_mut() {
            Some(last) => {
                if !last.1.is_empty() {
                    last.1.push(b' ');
                }
                last.1.extend_from_slice(value);
                true
            }
            None => false,
        }
    }
}

fn sanitize_line(bytes: &[u8]) -> Vec<u8> {
    bytes.iter()
        .map(|&b| if b == b'\r' || b == b'\n' { b' ' } else { b })
        .collect()
}

/// Read a single line, stripping the trailing `LF` or `CRLF`.
///
/// Returns the number of bytes consumed from `reader`, which is `0` only at end of stream.
pub(crate) fn read_line<R: BufRead>(reader: &mut R, line: &mut Vec<u8>) -> io::Result<usize> {
    line.clear();
    let n = reader.read_until(b'\n', line)?;
    if line.last() == Some(&b'\n') {
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
    }
    Ok(n)
}

/// Parse a header block from a buffered reader.
///
/// Reads `Name: value` lines up to and including the blank line that ends the block.
/// Lines starting with a space or tab continue the previous value.
///
/// # Arguments
///
/// * `reader` - Input reader
/// * `target` - Header map to fill
///
/// # Returns
///
/// Number of bytes read from `reader`
pub fn parse_header_block<R: BufRead>(reader: &mut R, target: &mut HeaderMap) -> Result<usize> {
    let mut bytes_consumed = 0;
    let mut line = Vec::new();

    loop {
        let n = read_line(reader, &mut line)?;
        if n == 0 {
            return Err(WarcError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "stream ended inside header block",
            )));
        }
        bytes_consumed += n;

        if line.is_empty() {
            break;
        }

        if line[0] == b' ' || line[0] == b'\t' {
            if !target.add_continuation(line.trim_ascii()) {
                return Err(WarcError::MalformedHeader(String::from_utf8_lossy(&line).into_owned()));
            }
            continue;
        }

        let colon_pos = line.iter().position(|&b| b == b':');
        let key = colon_pos.map(|pos| &line[..pos]).unwrap_or_default();
        if key.is_empty() || key.iter().any(|b| b.is_ascii_whitespace()) {
            return Err(WarcError::MalformedHeader(String::from_utf8_lossy(&line).into_owned()));
        }
        let value = &line[key.len() + 1..];
        target.append_bytes(key, value);
    }

    Ok(bytes_consumed)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(input: &[u8]) -> Result<(HeaderMap, usize)> {
        let mut headers = HeaderMap::default();
        let n = parse_header_block(&mut Cursor::new(input), &mut headers)?;
        Ok((headers, n))
    }

    #[test]
    fn test_parse_basic_block() {
        let (headers, n) = parse(b"WARC-Type: resource\r\nContent-Length: 5\r\n\r\nhello").unwrap();
        assert_eq!(n, 42);
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("warc-type").as_deref(), Some("resource"));
        assert_eq!(headers.get("CONTENT-LENGTH").as_deref(), Some("5"));
    }

    #[test]
    fn test_parse_accepts_bare_lf() {
        let (headers, _) = parse(b"A: 1\nB:2\n\n").unwrap();
        assert_eq!(headers.get("a").as_deref(), Some("1"));
        assert_eq!(headers.get("b").as_deref(), Some("2"));
    }

    #[test]
    fn test_parse_folded_value() {
        let (headers, _) = parse(b"X-Long: first\r\n  second\r\n\tthird\r\nY: z\r\n\r\n").unwrap();
        assert_eq!(headers.get("x-long").as_deref(), Some("first second third"));
        assert_eq!(headers.get("y").as_deref(), Some("z"));
    }

    #[test]
    fn test_duplicate_headers_joined() {
        let (headers, _) = parse(b"Set: a\r\nset: b\r\n\r\n").unwrap();
        assert_eq!(headers.get("SET").as_deref(), Some("a,b"));
        assert_eq!(headers.get_first("SET").as_deref(), Some("a"));
        assert_eq!(headers.get_first("missing"), None);
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn test_parse_rejects_malformed_lines() {
        assert!(matches!(parse(b"no colon here\r\n\r\n"), Err(WarcError::MalformedHeader(_))));
        assert!(matches!(parse(b"Bad Key: x\r\n\r\n"), Err(WarcError::MalformedHeader(_))));
        assert!(matches!(parse(b": x\r\n\r\n"), Err(WarcError::MalformedHeader(_))));
        assert!(matches!(parse(b" orphan\r\n\r\n"), Err(WarcError::MalformedHeader(_))));
    }

    #[test]
    fn test_parse_truncated_block() {
        match parse(b"A: 1\r\n") {
            Err(WarcError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_set_and_remove() {
        let mut headers = HeaderMap::default();
        headers.append("A", "1");
        headers.append("B", "2");
        headers.append("a", "3");
        headers.set("A", "4");
        assert_eq!(headers.get("a").as_deref(), Some("4"));
        assert_eq!(headers.len(), 2);
        assert!(headers.remove("b"));
        assert!(!headers.remove("b"));
        assert!(!headers.contains_key("B"));
    }

    #[test]
    fn test_status_line() {
        let mut headers = HeaderMap::new(HeaderEncoding::Latin1);
        headers.set_status_line("HTTP/1.1 404 Not Found");
        assert_eq!(headers.status_code(), Some(404));
        assert_eq!(headers.reason_phrase().as_deref(), Some("Not Found"));

        headers.set_status_line("HTTP/1.1 20 Short");
        assert_eq!(headers.status_code(), None);
        headers.set_status_line("WARC/1.0");
        assert_eq!(headers.status_code(), None);
    }

    #[test]
    fn test_latin1_decoding() {
        let mut headers = HeaderMap::new(HeaderEncoding::Latin1);
        headers.append_bytes(b"X-Name", b"caf\xe9");
        assert_eq!(headers.get("x-name").as_deref(), Some("café"));
    }

    #[test]
    fn test_write_sanitizes_line_breaks() {
        let mut headers = HeaderMap::default();
        headers.set_status_line("WARC/1.0");
        headers.append("X-Evil", "a\r\nWARC-Type: forged");
        let mut out = Vec::new();
        let n = headers.write(&mut out).unwrap();
        assert_eq!(n, out.len());
        assert_eq!(out, b"WARC/1.0\r\nX-Evil: a  WARC-Type: forged\r\n");
    }
}
