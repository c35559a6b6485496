// src/bin/cli.rs
//
//! CLI supporting `stat`, `get`, `ranges`, and `stream`.
//!
//! Examples:
//! ```bash
//! objfetch stat    file:///data/shard-0001.bin
//! objfetch get     file:///data/shard-0001.bin --range 0-4096 --out head.bin
//! objfetch get     file:///data/shard-0001.bin --suffix 1024 > tail.bin
//! objfetch ranges  file:///data/shard-0001.bin --range 500-510 --range 0-10
//! objfetch stream  file:///data/shard-0001.bin --min-chunk-size 16MiB
//! ```

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use futures_util::StreamExt;
use std::io::{self, ErrorKind, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use objfetch::{store_for_uri, ByteRange, FetchConfig, Fetcher, GetOptions, GetRange};

/// println! that exits quietly when stdout is a closed pipe
macro_rules! safe_println {
    ($($arg:tt)*) => {
        match writeln!(io::stdout(), $($arg)*) {
            Ok(_) => {},
            Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                // reader went away (piped into head)
                std::process::exit(0);
            }
            Err(e) => return Err(e.into())
        }
    };
}

/// `start-end` on the command line, end exclusive.
#[derive(Clone, Copy, Debug)]
struct RangeArg(ByteRange);

impl FromStr for RangeArg {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .with_context(|| format!("range `{s}` is not of the form START-END"))?;
        let start: u64 = start.trim().parse().with_context(|| format!("bad range start in `{s}`"))?;
        let end: u64 = end.trim().parse().with_context(|| format!("bad range end in `{s}`"))?;
        Ok(RangeArg(ByteRange::new(start, end)?))
    }
}

fn parse_size(s: &str) -> Result<usize> {
    let s = s.trim();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (digits, unit) = s.split_at(split);
    let value: usize = digits.parse().with_context(|| format!("bad size `{s}`"))?;
    let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kib" => 1 << 10,
        "m" | "mib" => 1 << 20,
        "g" | "gib" => 1 << 30,
        other => bail!("unknown size unit `{other}` in `{s}`"),
    };
    value.checked_mul(multiplier).with_context(|| format!("size `{s}` overflows"))
}

// -- Commands

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(short = 'v',
        long,
        action = ArgAction::Count,
        help = "Increase log verbosity: -v = Info, -vv = Debug, -vvv = Trace",
    )]
    verbose: u8,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show object metadata and attributes.
    Stat {
        uri: String,

        /// Address a specific object version
        #[arg(long = "object-version")]
        object_version: Option<String>,
    },

    /// Fetch an object, or part of one, to a file or stdout.
    Get {
        uri: String,

        /// Bounded range START-END (end exclusive, clamped to the object)
        #[arg(long, conflicts_with_all = ["offset", "suffix"])]
        range: Option<RangeArg>,

        /// Everything from this offset to the end
        #[arg(long, conflicts_with = "suffix")]
        offset: Option<u64>,

        /// The last N bytes
        #[arg(long)]
        suffix: Option<u64>,

        #[arg(long = "if-match")]
        if_match: Option<String>,

        #[arg(long = "if-none-match")]
        if_none_match: Option<String>,

        #[arg(long = "object-version")]
        object_version: Option<String>,

        /// Write here instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Fetch several ranges of one object with coalescing.
    Ranges {
        uri: String,

        /// START-END, repeatable
        #[arg(long = "range", required = true)]
        ranges: Vec<RangeArg>,
    },

    /// Stream an object and report chunk sizes.
    Stream {
        uri: String,

        /// Minimum chunk size (e.g. 65536, 512KiB, 16MiB)
        #[arg(long, value_parser = parse_size)]
        min_chunk_size: Option<usize>,
    },
}

/// Main CLI function
#[tokio::main]
async fn main() -> Result<()> {
    // .env values never override the real environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = FetchConfig::from_env()?;

    match cli.cmd {
        Command::Stat { uri, object_version } => {
            stat_cmd(&uri, object_version.as_deref(), config).await?;
        }
        Command::Get { uri, range, offset, suffix, if_match, if_none_match, object_version, out } => {
            let mut options = GetOptions::default();
            options.range = match (range, offset, suffix) {
                (Some(RangeArg(r)), _, _) => Some(GetRange::from(r)),
                (_, Some(o), _) => Some(GetRange::Offset(o)),
                (_, _, Some(n)) => Some(GetRange::Suffix(n)),
                _ => None,
            };
            options.if_match = if_match;
            options.if_none_match = if_none_match;
            options.version = object_version;
            get_cmd(&uri, options, out, config).await?;
        }
        Command::Ranges { uri, ranges } => {
            ranges_cmd(&uri, &ranges, config).await?;
        }
        Command::Stream { uri, min_chunk_size } => {
            stream_cmd(&uri, min_chunk_size, config).await?;
        }
    }

    Ok(())
}

fn fetcher_for(uri: &str, config: FetchConfig) -> Result<(Fetcher, String)> {
    let (store, path) = store_for_uri(uri)?;
    Ok((Fetcher::with_config(store, config), path))
}

async fn stat_cmd(uri: &str, version: Option<&str>, config: FetchConfig) -> Result<()> {
    let (fetcher, path) = fetcher_for(uri, config)?;
    let stat = fetcher.stat(&path, version).await?;

    safe_println!("URI             : {}", uri);
    safe_println!("Size            : {}", stat.meta.size);
    safe_println!("LastModified    : {}", stat.meta.last_modified);
    if let Some(ref et) = stat.meta.e_tag {
        safe_println!("ETag            : {}", et);
    }
    if let Some(ref vid) = stat.meta.version {
        safe_println!("Version         : {}", vid);
    }
    for (attribute, value) in &stat.attributes {
        safe_println!("{:<16}: {}", format!("{attribute:?}"), value);
    }
    Ok(())
}

async fn get_cmd(uri: &str, options: GetOptions, out: Option<PathBuf>, config: FetchConfig) -> Result<()> {
    let (fetcher, path) = fetcher_for(uri, config)?;
    let t0 = Instant::now();

    let result = fetcher.get(&path, options).await?;
    let range = result.range()?;
    let bytes = result.bytes().await?;
    info!("Fetched {} bytes ({}) in {:?}", bytes.len(), range, t0.elapsed());

    match out {
        Some(file) => {
            tokio::fs::write(&file, &bytes)
                .await
                .with_context(|| format!("writing {}", file.display()))?;
            eprintln!("wrote {} bytes to {}", bytes.len(), file.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            match stdout.write_all(&bytes).and_then(|_| stdout.flush()) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::BrokenPipe => return Ok(()),
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(())
}

async fn ranges_cmd(uri: &str, ranges: &[RangeArg], config: FetchConfig) -> Result<()> {
    let (fetcher, path) = fetcher_for(uri, config)?;
    let ranges: Vec<ByteRange> = ranges.iter().map(|r| r.0).collect();

    let (buffers, stats) = fetcher.get_ranges_with_stats(&path, &ranges, None).await?;
    for (range, buffer) in ranges.iter().zip(&buffers) {
        safe_println!("{:<24} {:>10} bytes  crc32={:08x}", range.to_string(), buffer.len(), crc32fast::hash(buffer));
    }
    safe_println!(
        "{} ranges, {} backend calls, {} bytes fetched in {:?} ({:.2} MB/s)",
        stats.ranges_requested, stats.fetches_issued, stats.bytes_fetched,
        stats.elapsed_time, stats.throughput_mbps()
    );
    Ok(())
}

async fn stream_cmd(uri: &str, min_chunk_size: Option<usize>, config: FetchConfig) -> Result<()> {
    let (fetcher, path) = fetcher_for(uri, config)?;
    let min_chunk_size = min_chunk_size.unwrap_or(fetcher.min_chunk_size());
    let t0 = Instant::now();

    let mut result = fetcher.get(&path, GetOptions::default()).await?;
    let size = result.meta()?.size;
    let mut chunks = result.stream(min_chunk_size)?;

    let mut total = 0u64;
    let mut count = 0usize;
    while let Some(chunk) = chunks.next().await {
        let chunk = chunk?;
        total += chunk.len() as u64;
        count += 1;
        safe_println!("chunk {:>5}: {:>12} bytes", count, chunk.len());
    }

    let elapsed = t0.elapsed();
    let mbps = total as f64 / (1024.0 * 1024.0) / elapsed.as_secs_f64().max(f64::EPSILON);
    safe_println!("{} of {} bytes in {} chunks, {:?} ({:.2} MB/s)", total, size, count, elapsed, mbps);
    Ok(())
}
