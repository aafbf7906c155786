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

//! Fetching a live URL for archiving.

use std::io;
use chrono::Utc;
use reqwest::blocking::{Client, Response};
use reqwest::redirect::Policy;
use reqwest::Url;
use tracing::debug;

use crate::capture::CapturedExchange;
use crate::config::FetchConfig;
use crate::error::Result;
use crate::header::{HeaderEncoding, HeaderMap};


/// Issue a `GET` request for `url` and wrap the response for [`crate::capture::write_exchange`].
///
/// The body is not decoded: content codings are archived as sent by the server.
pub fn fetch(url: &str, config: &FetchConfig) -> Result<CapturedExchange<Response>> {
    let date = Utc::now();
    let client = Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(config.timeout)
        .redirect(Policy::limited(config.max_redirects))
        .build()?;

    let response = client
        .get(url)
        .header(reqwest::header::ACCEPT, "*/*")
        .send()?;
    debug!(url, final_url = %response.url(), status = %response.status(), "fetched");

    let request_head = request_head(response.url(), &config.user_agent)?;
    let response_head = response_head(&response);

    Ok(CapturedExchange {
        target_uri: url.to_string(),
        date,
        request_head,
        response_head,
        body: response,
    })
}

/// Request line and headers as sent for `url`.
fn request_head(url: &Url, user_agent: &str) -> io::Result<Vec<u8>> {
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    let mut host = url.host_str().unwrap_or_default().to_string();
    if let Some(port) = url.port() {
        host.push_str(&format!(":{port}"));
    }

    let mut head = HeaderMap::new(HeaderEncoding::Latin1);
    head.set_status_line(format!("GET {target} HTTP/1.1"));
    head.append("Host", host);
    head.append("User-Agent", user_agent);
    head.append("Accept", "*/*");

    let mut out = Vec::new();
    head.write(&mut out)?;
    out.extend_from_slice(b"\r\n");
    Ok(out)
}

fn response_head(response: &Response) -> HeaderMap {
    let mut head = HeaderMap::new(HeaderEncoding::Latin1);
    head.set_status_line(format!("{:?} {}", response.version(), response.status()));
    for (name, value) in response.headers() {
        head.append_bytes(name.as_str().as_bytes(), value.as_bytes());
    }
    head
}
