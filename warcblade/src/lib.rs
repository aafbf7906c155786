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

//! Reading, writing and indexing WARC files.
//!
//! Records are framed by [`ArchiveReader`], which accepts uncompressed streams as well as
//! streams made of per-record gzip members, and written by [`WarcWriter`]. A live URL can
//! be archived with [`fetch()`] and [`write_exchange`], and a CDX index of a WARC stream
//! is produced by [`write_index`].

pub mod capture;
pub mod cdx;
pub mod config;
pub mod digest;
pub mod error;
pub mod fetch;
pub mod header;
pub mod http;
pub mod reader;
pub mod record;
pub mod stream;
pub mod writer;

pub use capture::{write_exchange, CaptureReceipt, CapturedExchange};
pub use cdx::{write_index, CdxIndexer, CdxLine};
pub use config::{Compression, FetchConfig};
pub use error::{Result, WarcError};
pub use fetch::fetch;
pub use header::{HeaderEncoding, HeaderMap};
pub use reader::{ArchiveReader, Record};
pub use record::WarcRecordType;
pub use writer::WarcWriter;
