// src/main.rs
// =============================================================================
// This is the entry point of weep.
//
// What happens here:
// 1. Parse command-line arguments using clap
// 2. Build the validated settings (bad options exit with code 2)
// 3. Start the output aggregator and the crawler, wired by one channel
// 4. Exit with proper code (0 = something matched, 1 = nothing matched,
//    2 = error)
//
// Ctrl-c cancels the run; whatever was already found is still printed.
// =============================================================================

mod cli;
mod config;
mod crawl;
mod error;
mod matcher;
mod output;

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use futures::stream::{self, BoxStream, Stream, StreamExt};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, BufReader, BufWriter};
use tokio::sync::mpsc;
use tokio_stream::wrappers::SplitStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::Cli;
use crawl::Crawler;
use output::Aggregator;

/// Results channel capacity; workers wait when the aggregator falls behind
const EVENT_BUFFER: usize = 256;

/// Exit code for configuration, input and output errors
const EXIT_ERROR: i32 = 2;

#[tokio::main]
async fn main() {
    let exit_code = match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            EXIT_ERROR
        }
    };

    std::process::exit(exit_code);
}

// The main application logic
// Returns:
//   Ok(0) = at least one match
//   Ok(1) = no match
//   Err   = configuration or output error (exit code 2)
async fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let (patterns, urls) = cli.patterns_and_urls()?;

    let to_terminal = cli.output.is_none() && std::io::stdout().is_terminal();
    let color = cli.color.enabled(to_terminal);
    let settings = Arc::new(cli.settings(patterns, color)?);
    debug!(?settings, "settings built");

    let match_sink = open_sink(&cli).await?;
    let error_color = cli.color.enabled(std::io::stderr().is_terminal());

    let cancel = CancellationToken::new();
    let crawler = Crawler::new(Arc::clone(&settings), cancel.clone())?;

    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupted, stopping the crawl");
                cancel.cancel();
            }
        }
    });

    let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
    let aggregator = Aggregator::new(match_sink, tokio::io::stderr(), error_color);
    let printer = tokio::spawn(aggregator.drain(events_rx));

    let summary = crawler.run(seeds(urls), events_tx).await;
    let (printed, _, _) = printer
        .await
        .context("output task panicked")?
        .context("could not write results")?;

    info!(
        fetched = summary.fetched,
        failed = summary.failed,
        skipped = summary.skipped,
        printed = printed.matches,
        "done"
    );

    Ok(exit_code(summary.matches))
}

// grep convention: 0 when anything matched, 1 when nothing did
fn exit_code(matches: usize) -> i32 {
    if matches > 0 {
        0
    } else {
        1
    }
}

// Sets up tracing on stderr
//
// RUST_LOG wins when set; otherwise --verbose picks the level.
fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();
}

// Opens the match sink: -o FILE or stdout
async fn open_sink(cli: &Cli) -> Result<Box<dyn AsyncWrite + Unpin + Send>> {
    match &cli.output {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("could not create '{}'", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

// Seeds come from the command line, or from stdin when none were given
fn seeds(urls: Vec<String>) -> BoxStream<'static, String> {
    if urls.is_empty() {
        line_seeds(BufReader::new(tokio::io::stdin())).boxed()
    } else {
        stream::iter(urls).boxed()
    }
}

// Reads one seed per line from `reader`
//
// Lines are decoded lossily, so a line that is not valid UTF-8 still reaches
// the crawler and is reported there as an invalid URL. A read error ends the
// input with a warning naming it.
fn line_seeds<R>(reader: R) -> impl Stream<Item = String>
where
    R: AsyncBufRead + Unpin,
{
    SplitStream::new(reader.split(b'\n'))
        .take_while(|line| {
            if let Err(e) = line {
                warn!(error = %e, "could not read seed URLs, ignoring the rest of the input");
            }
            futures::future::ready(line.is_ok())
        })
        .filter_map(|line| futures::future::ready(line.ok()))
        .map(|bytes| {
            let line = String::from_utf8_lossy(&bytes);
            line.strip_suffix('\r').unwrap_or(&*line).to_string()
        })
}
