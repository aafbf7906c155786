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

use std::io::{self, Write};
use data_encoding::BASE32;
use sha1::{Digest, Sha1};


/// SHA-1 payload digest in the `sha1:<BASE32>` form used by `WARC-Payload-Digest`.
///
/// Implements [`Write`] so it can sit behind a tee while a payload is copied.
#[derive(Default)]
pub struct PayloadDigest {
    hasher: Sha1,
    len: u64,
}

impl PayloadDigest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.len += data.len() as u64;
    }

    /// Number of bytes hashed so far.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Finish hashing and return the labelled digest, e.g. `sha1:3I42H3S6NNFQ2MSVX7XZKYAYSCX5QBYJ`.
    pub fn finish(self) -> String {
        let digest = self.hasher.finalize();
        format!("sha1:{}", BASE32.encode(&digest))
    }
}

impl Write for PayloadDigest {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Strip the `<algorithm>:` label from a digest header value.
pub fn strip_algorithm(value: &str) -> &str {
    value.split_once(':').map_or(value, |(_, digest)| digest).trim()
}
