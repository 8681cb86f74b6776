//! Run command - stream rows through the writer
//!
//! Rows are read as newline-delimited JSON and written against the in-memory
//! storage backend. Dead letters go to a JSONL file, or to the log when no
//! file is given.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;
use tabwrite_config::Config;
use tabwrite_metrics::{WriterMetricsConfig, spawn_reporter};
use tabwrite_pipeline::{
    Boundedness, DEFAULT_DEAD_LETTER_CHANNEL_SIZE, DEFAULT_INPUT_CHANNEL_SIZE, FailedRow,
    StreamingWrite, WriteSummary,
};
use tabwrite_routing::Row;
use tabwrite_sinks::memory::MemoryTableStore;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader, BufWriter};
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::logging::init_logging;

/// Run command arguments
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: PathBuf,

    /// Newline-delimited JSON rows; "-" reads stdin until it closes
    #[arg(short, long)]
    pub input: PathBuf,

    /// Write dead-lettered rows to this file as newline-delimited JSON
    #[arg(short, long)]
    pub dead_letter: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Run the run command
pub async fn run(args: RunArgs, cli_level: Option<&str>) -> Result<()> {
    let config = Config::from_file(&args.config).context("failed to load configuration")?;
    init_logging(&config.log, cli_level)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        input = %args.input.display(),
        "tabwrite starting"
    );

    let stdin = args.input.as_os_str() == "-";
    let boundedness = if stdin {
        Boundedness::Unbounded
    } else {
        Boundedness::Bounded
    };

    let store = Arc::new(MemoryTableStore::new());
    let write = StreamingWrite::from_config(config.write.clone(), store.clone(), store.clone())
        .context("failed to build streaming write")?
        .with_boundedness(boundedness);
    write.validate().context("invalid configuration")?;

    let cancel = CancellationToken::new();
    let handle = write.metrics_handle(WriterMetricsConfig {
        enabled: config.metrics.enabled,
        interval: config.metrics.interval,
    });
    let reporter = spawn_reporter(Arc::new(handle), config.metrics.format, cancel.clone());

    let (row_tx, row_rx) = mpsc::channel::<Row>(DEFAULT_INPUT_CHANNEL_SIZE);
    let (dead_tx, dead_rx) = mpsc::channel::<FailedRow>(DEFAULT_DEAD_LETTER_CHANNEL_SIZE);

    let pipeline = tokio::spawn(write.run(row_rx, dead_tx));
    let dead_letters = tokio::spawn(write_dead_letters(dead_rx, args.dead_letter.clone()));

    let fed = if stdin {
        feed_until(BufReader::new(tokio::io::stdin()), row_tx, wait_for_shutdown()).await
    } else {
        let file = File::open(&args.input)
            .await
            .with_context(|| format!("failed to open input {}", args.input.display()))?;
        let mut sent = 0;
        feed_rows(BufReader::new(file), row_tx, &mut sent)
            .await
            .map(|()| sent)
    };

    let summary = pipeline.await.context("pipeline task failed")?;
    let dead_written = dead_letters.await.context("dead-letter task failed")?;
    cancel.cancel();
    if let Some(reporter) = reporter
        && let Err(e) = reporter.await
    {
        warn!(error = %e, "metrics reporter stopped abnormally");
    }

    let rows_fed = fed?;
    let summary = match summary {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "streaming write failed");
            return Err(e).context("streaming write failed");
        }
    };
    let dead_count = dead_written?;

    info!(rows = rows_fed, dead_letters = dead_count, "input drained");
    print_summary(&summary, args.json)?;
    Ok(())
}

/// Send every JSON line of `reader` to `rows`
///
/// `sent` counts the rows handed to the pipeline, including when the feed
/// is cut short. Stops early if the pipeline stops receiving.
async fn feed_rows<R>(reader: BufReader<R>, rows: mpsc::Sender<Row>, sent: &mut u64) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0u64;

    while let Some(line) = lines.next_line().await.context("failed to read input")? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }
        let row: Row = serde_json::from_str(&line)
            .with_context(|| format!("input line {} is not valid JSON", line_no))?;
        if rows.send(row).await.is_err() {
            warn!(line = line_no, "pipeline stopped receiving rows");
            break;
        }
        *sent += 1;
    }

    Ok(())
}

/// Feed rows until the reader closes or `shutdown` completes
///
/// Returns the number of rows sent either way.
async fn feed_until<R, S>(reader: BufReader<R>, rows: mpsc::Sender<Row>, shutdown: S) -> Result<u64>
where
    R: AsyncRead + Unpin,
    S: Future<Output = ()>,
{
    let mut sent = 0u64;
    let fed = {
        let feed = feed_rows(reader, rows, &mut sent);
        tokio::select! {
            fed = feed => fed,
            _ = shutdown => {
                info!("shutdown signal received, draining buffered rows");
                Ok(())
            }
        }
    };
    fed.map(|()| sent)
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Drain the dead-letter channel into `path`, or into the log
///
/// Returns the number of rows written.
async fn write_dead_letters(
    mut failed: mpsc::Receiver<FailedRow>,
    path: Option<PathBuf>,
) -> Result<u64> {
    let mut out = match &path {
        Some(path) => Some(open_dead_letter_file(path).await?),
        None => None,
    };

    let mut count = 0u64;
    while let Some(row) = failed.recv().await {
        count += 1;
        match out.as_mut() {
            Some(out) => {
                let mut line = serde_json::to_vec(&dead_letter_json(&row))
                    .context("failed to encode dead letter")?;
                line.push(b'\n');
                out.write_all(&line)
                    .await
                    .context("failed to write dead letter")?;
            }
            None => warn!(
                table = %row.destination,
                reason = %row.reason,
                row = %row.row,
                "row dead-lettered"
            ),
        }
    }

    if let Some(mut out) = out {
        out.flush().await.context("failed to flush dead letters")?;
    }
    Ok(count)
}

async fn open_dead_letter_file(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path)
        .await
        .with_context(|| format!("failed to create dead-letter file {}", path.display()))?;
    Ok(BufWriter::new(file))
}

fn dead_letter_json(row: &FailedRow) -> serde_json::Value {
    json!({
        "destination": row.destination.canonical(),
        "reason": row.reason,
        "row": row.row,
    })
}

fn print_summary(summary: &WriteSummary, as_json: bool) -> Result<()> {
    if as_json {
        let text = serde_json::to_string_pretty(summary).context("failed to encode summary")?;
        println!("{}", text);
        return Ok(());
    }

    println!("rows received:      {}", summary.rows_received);
    println!("rows committed:     {}", summary.rows_committed);
    println!("rows dead-lettered: {}", summary.rows_dead_lettered);
    println!("bundles:            {}", summary.bundles);
    for (table, rows) in &summary.committed_by_table {
        println!("  {:<40} {}", table, rows);
    }
    Ok(())
}
