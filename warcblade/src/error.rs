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

//! Error types for WARC reading, writing and indexing.

use std::io;

/// Result type alias for warcblade operations
pub type Result<T> = std::result::Result<T, WarcError>;

/// Errors that can occur while framing, writing or indexing WARC records.
///
/// Everything except [`WarcError::EncapsulatedMessageParseFailure`] is fatal to the
/// stream it was raised on: after a framing error the byte position of the next
/// record cannot be trusted.
#[derive(Debug, thiserror::Error)]
pub enum WarcError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid WARC version line: {0:?}")]
    MalformedVersionLine(String),

    #[error("Malformed header line: {0:?}")]
    MalformedHeader(String),

    #[error("Missing or invalid Content-Length: {0:?}")]
    MissingOrInvalidLength(Option<String>),

    #[error("Stream ended inside a record body ({remaining} bytes missing)")]
    TruncatedRecord { remaining: u64 },

    #[error("Invalid record trailer")]
    InvalidTrailer,

    #[error("Gzip member is longer than WARC record")]
    CompressedMemberOverrun,

    #[error("Missing WARC-Type header")]
    MissingTypeHeader,

    #[error("Unparsable WARC-Date {value:?}: {source}")]
    UnparsableDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Malformed HTTP message: {0}")]
    EncapsulatedMessageParseFailure(String),

    #[error("Previous record was not closed")]
    RecordNotClosed,

    #[error("Stream is unusable after an earlier framing error")]
    StreamFailed,

    #[error("Record body ended after {actual} of {expected} declared bytes")]
    BodyLengthMismatch { expected: u64, actual: u64 },

    #[error("Fetch failed: {0}")]
    Fetch(#[from] reqwest::Error),
}
