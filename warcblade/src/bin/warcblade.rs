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

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;
use anyhow::{bail, Context};
use clap::builder::FalseyValueParser;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use warcblade::config::{DEFAULT_TIMEOUT, DEFAULT_USER_AGENT};
use warcblade::{fetch, write_exchange, write_index, Compression, FetchConfig, WarcWriter};

/// Source identifier used when indexing standard input
const STDIN_SOURCE: &str = "/dev/stdin";


#[derive(Parser)]
#[command(name = "warcblade", version, about = "Archive URLs as WARC and index WARC files")]
struct Cli {
    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch a URL and write it to stdout as a request/response record pair
    Get {
        url: String,

        /// Write every record as its own gzip member
        #[arg(long, env = "WARCBLADE_GZIP", value_parser = FalseyValueParser::new())]
        gzip: bool,

        #[arg(long, env = "WARCBLADE_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
        user_agent: String,

        /// Request timeout in seconds
        #[arg(long, env = "WARCBLADE_TIMEOUT", default_value_t = DEFAULT_TIMEOUT.as_secs())]
        timeout: u64,
    },
    /// Write a CDX index of WARC files (or stdin) to stdout
    Cdx {
        files: Vec<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    match cli.command {
        Command::Get { url, gzip, user_agent, timeout } => {
            let config = FetchConfig {
                user_agent,
                timeout: Duration::from_secs(timeout),
                ..FetchConfig::default()
            };
            if let Err(e) = config.validate() {
                bail!("invalid configuration: {e}");
            }
            let exchange = fetch(&url, &config).with_context(|| format!("failed to fetch {url}"))?;
            let mut writer = WarcWriter::with_compression(&mut out, Compression::from_flag(gzip));
            write_exchange(&mut writer, exchange).with_context(|| format!("failed to archive {url}"))?;
            writer.flush()?;
        }
        Command::Cdx { files } => {
            if files.is_empty() {
                write_index(io::stdin().lock(), STDIN_SOURCE, &mut out).context("failed to index stdin")?;
            }
            for path in &files {
                let source = path.display().to_string();
                let file = File::open(path).with_context(|| format!("cannot open {source}"))?;
                let lines = write_index(file, &source, &mut out)
                    .with_context(|| format!("failed to index {source}"))?;
                info!(%source, lines, "done");
            }
        }
    }
    out.flush()?;
    Ok(())
}
