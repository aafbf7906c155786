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

//! Archiving an HTTP exchange as a `request` / `response` record pair.
//!
//! The response record carries a payload digest header, and headers precede the body in
//! a record, so the whole payload has to be seen before the response record can be
//! started. The payload is spilled into an anonymous temporary file while it is hashed
//! and copied from there into the record afterwards.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::digest::PayloadDigest;
use crate::error::Result;
use crate::header::HeaderMap;
use crate::record::WarcRecordType;
use crate::writer::{format_warc_date, new_record_id, WarcWriter};

const SPILL_BUF_SIZE: usize = 64 * 1024;
const REQUEST_CONTENT_TYPE: &str = "application/http; msgtype=request";
const RESPONSE_CONTENT_TYPE: &str = "application/http; msgtype=response";


/// An HTTP exchange ready to be archived.
pub struct CapturedExchange<B> {
    /// URI the exchange was requested for
    pub target_uri: String,
    /// Capture time
    pub date: DateTime<Utc>,
    /// Raw request line and headers, including the terminating blank line
    pub request_head: Vec<u8>,
    /// Response status line and headers
    pub response_head: HeaderMap,
    /// Response payload, exactly as received
    pub body: B,
}

/// Identifiers and sizes of an archived exchange.
#[derive(Debug, Clone)]
pub struct CaptureReceipt {
    pub request_id: String,
    pub response_id: String,
    pub payload_digest: String,
    pub payload_length: u64,
    pub bytes_written: u64,
}

/// Write `exchange` as a `request` record followed by a `response` record.
///
/// The spill file is removed when this function returns, whether it succeeds or not.
pub fn write_exchange<W: Write, B: Read>(
    writer: &mut WarcWriter<W>,
    exchange: CapturedExchange<B>,
) -> Result<CaptureReceipt> {
    let CapturedExchange { target_uri, date, request_head, response_head, mut body } = exchange;
    let date = format_warc_date(date);

    let (spill, payload_length, payload_digest) = spill_payload(&mut body)?;
    debug!(payload_length, %payload_digest, "payload spilled");

    let request_id = new_record_id();
    let mut headers = HeaderMap::default();
    headers.append("WARC-Record-ID", &request_id);
    headers.append("WARC-Target-URI", &target_uri);
    headers.append("WARC-Date", &date);
    headers.append("Content-Type", REQUEST_CONTENT_TYPE);
    let mut bytes_written = writer.write_record(WarcRecordType::Request, &headers, &request_head)?;

    let response_id = new_record_id();
    let mut headers = HeaderMap::default();
    headers.append("WARC-Record-ID", &response_id);
    headers.append("WARC-Target-URI", &target_uri);
    headers.append("WARC-Date", &date);
    headers.append("WARC-Concurrent-To", &request_id);
    headers.append("WARC-Payload-Digest", &payload_digest);
    headers.append("Content-Type", RESPONSE_CONTENT_TYPE);

    let head = serialize_response_head(&response_head)?;
    let block_length = head.len() as u64 + payload_length;
    bytes_written += writer.write_record_from(
        WarcRecordType::Response,
        &headers,
        Cursor::new(head).chain(spill),
        block_length,
    )?;

    info!(uri = %target_uri, payload_length, bytes_written, "archived exchange");
    Ok(CaptureReceipt {
        request_id,
        response_id,
        payload_digest,
        payload_length,
        bytes_written,
    })
}

/// Copy the payload into an anonymous temporary file, hashing it on the way.
fn spill_payload<B: Read>(body: &mut B) -> Result<(File, u64, String)> {
    let mut file = tempfile::tempfile()?;
    let mut digest = PayloadDigest::new();
    let mut buf = vec![0u8; SPILL_BUF_SIZE];
    loop {
        let n = match body.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        digest.update(&buf[..n]);
        file.write_all(&buf[..n])?;
    }
    file.flush()?;
    file.seek(SeekFrom::Start(0))?;
    let length = digest.len();
    Ok((file, length, digest.finish()))
}

/// Status line and headers as stored in the response record, hop-by-hop framing removed.
fn serialize_response_head(response_head: &HeaderMap) -> io::Result<Vec<u8>> {
    let mut head = response_head.clone();
    head.remove("Transfer-Encoding");
    let mut out = Vec::new();
    head.write(&mut out)?;
    out.extend_from_slice(b"\r\n");
    Ok(out)
}
