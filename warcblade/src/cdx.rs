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

//! CDX index generation.
//!
//! One line is produced per `response` record holding an HTTP response and per
//! `resource` record:
//!
//! ```text
//! - <timestamp> <uri> <media-type> <status> <digest> - - <length> <offset> <source>
//! ```
//!
//! `length` and `offset` are measured in the raw input, so for gzip-per-record files they
//! describe the compressed member. Undetermined fields are written as `-`; the redirect
//! and robots fields are never determined.

use std::fmt;
use std::io::{Read, Write};
use chrono::DateTime;
use tracing::{debug, info};

use crate::digest::strip_algorithm;
use crate::error::{Result, WarcError};
use crate::http::{extract_response, normalize_media_type, HttpResponseHead};
use crate::reader::ArchiveReader;
use crate::record::WarcRecordType;

/// `strftime` format of the CDX timestamp field
pub const CDX_TIME_FORMAT: &str = "%Y%m%d%H%M%S";

const PLACEHOLDER: &str = "-";


/// One CDX index line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdxLine {
    pub timestamp: String,
    pub uri: Option<String>,
    pub media_type: Option<String>,
    pub status: Option<u16>,
    pub digest: Option<String>,
    pub length: u64,
    pub offset: u64,
    pub source: String,
}

impl fmt::Display for CdxLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = self.status.map(|s| s.to_string());
        write!(
            f,
            "{sortkey} {} {} {} {} {} {redirect} {robots} {} {} {}",
            self.timestamp,
            self.uri.as_deref().unwrap_or(PLACEHOLDER),
            self.media_type.as_deref().unwrap_or(PLACEHOLDER),
            status.as_deref().unwrap_or(PLACEHOLDER),
            self.digest.as_deref().unwrap_or(PLACEHOLDER),
            self.length,
            self.offset,
            self.source,
            sortkey = PLACEHOLDER,
            redirect = PLACEHOLDER,
            robots = PLACEHOLDER,
        )
    }
}

/// What a framed record contributes to the index
enum Disposition {
    Skip,
    Response(Option<HttpResponseHead>),
    Resource(Option<String>),
}


/// Walks a WARC stream and produces [`CdxLine`]s.
pub struct CdxIndexer<R> {
    reader: ArchiveReader<R>,
    source: String,
    failed: bool,
}

impl<R: Read> CdxIndexer<R> {
    /// # Arguments
    ///
    /// * `input` - Raw WARC stream
    /// * `source` - Identifier written into the last field of each line (e.g. a file name)
    pub fn new(input: R, source: impl Into<String>) -> Self {
        CdxIndexer {
            reader: ArchiveReader::new(input),
            source: source.into(),
            failed: false,
        }
    }

    /// Produce the next index line, skipping records that are not indexed.
    ///
    /// Returns `Ok(None)` at the end of the stream. After an error the stream position is
    /// unknown and every further call fails with [`WarcError::StreamFailed`].
    pub fn next_line(&mut self) -> Result<Option<CdxLine>> {
        if self.failed {
            return Err(WarcError::StreamFailed);
        }
        let result = self.advance();
        self.failed = result.is_err();
        result
    }

    fn advance(&mut self) -> Result<Option<CdxLine>> {
        loop {
            let offset = self.reader.position();
            let Some(mut record) = self.reader.next_record()? else {
                return Ok(None);
            };

            let headers = record.headers();
            let uri = headers.get_first("WARC-Target-URI");
            let content_type = headers.get_first("Content-Type");
            let digest = headers.get_first("WARC-Payload-Digest")
                .map(|d| strip_algorithm(&d).to_string())
                .filter(|d| !d.is_empty());
            let date = headers.get_first("WARC-Date").unwrap_or_default();
            let timestamp = DateTime::parse_from_rfc3339(date.trim())
                .map_err(|source| WarcError::UnparsableDate { value: date.clone(), source })?
                .format(CDX_TIME_FORMAT)
                .to_string();

            let disposition = match record.record_type() {
                WarcRecordType::NoType => return Err(WarcError::MissingTypeHeader),
                WarcRecordType::Response if record.is_http() => {
                    Disposition::Response(extract_response(&mut record))
                }
                WarcRecordType::Resource => Disposition::Resource(content_type),
                _ => Disposition::Skip,
            };
            let record_type = record.record_type();
            record.close()?;

            let (media_type, status) = match disposition {
                Disposition::Skip => {
                    debug!(offset, %record_type, "record not indexed");
                    continue;
                }
                Disposition::Response(Some(head)) => (head.content_type(), Some(head.status_code())),
                Disposition::Response(None) => (None, None),
                Disposition::Resource(content_type) => {
                    (content_type.as_deref().and_then(normalize_media_type), Some(200))
                }
            };

            let end = self.reader.position();
            return Ok(Some(CdxLine {
                timestamp,
                uri,
                media_type,
                status,
                digest,
                length: end - offset,
                offset,
                source: self.source.clone(),
            }));
        }
    }
}

/// Index a whole WARC stream, writing one line per indexed record to `out`.
///
/// Lines written before an error remain valid.
///
/// # Returns
///
/// Number of lines written
pub fn write_index<R: Read, W: Write>(input: R, source: &str, out: &mut W) -> Result<u64> {
    let mut indexer = CdxIndexer::new(input, source);
    let mut lines = 0u64;
    while let Some(line) = indexer.next_line()? {
        writeln!(out, "{line}")?;
        lines += 1;
    }
    info!(source, lines, bytes = indexer.reader.position(), "indexed stream");
    Ok(lines)
}
