use anyhow::Context;
use changes_feed::config::FeedConfig;
use changes_feed::error::{FeedError, PumpError};
use changes_feed::feed::{pump, ChangesStream, WriterHandler};
use clap::Parser;
use std::io::{BufWriter, ErrorKind};
use std::path::PathBuf;
use tokio::io::AsyncRead;
use tracing::{debug, error, trace, warn};

/// Split a CouchDB `_changes` response into one record per line
#[derive(Parser)]
#[command(name = "changes-feed")]
#[command(about = "Print each record of a _changes feed on its own line", long_about = None)]
struct Cli {
    /// Feed body to read (stdin when omitted or "-")
    input: Option<PathBuf>,

    /// Feed mode: long-poll or continuous
    #[arg(short, long)]
    mode: Option<String>,

    /// Path to configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Read size in bytes
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Print the end-of-feed summary as JSON on stderr
    #[arg(long)]
    summary: bool,

    /// Enable verbose output (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .with_target(cli.verbose >= 2)
        .with_line_number(cli.verbose >= 2)
        .init();

    debug!("changes-feed started with verbosity level: {}", cli.verbose);
    trace!("Full CLI args: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli).await {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(exit_code(&e));
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli).await?;
    let chunk_size = config.read_chunk_size;
    let handler = WriterHandler::new(BufWriter::new(std::io::stdout()));
    let mut stream = ChangesStream::try_new(config, handler)?;

    let reader = open_input(cli.input.as_ref()).await?;
    let pumped = pump(reader, &mut stream, chunk_size).await;
    let mut handler = stream.into_handler();

    if let Some(e) = handler.take_io_error() {
        if e.kind() == ErrorKind::BrokenPipe {
            debug!("Output closed early; stopping");
            return Ok(());
        }
        return Err(e).context("Failed to write records");
    }

    let stats = pumped?;
    debug!(
        bytes = stats.bytes,
        chunks = stats.chunks,
        "Processed feed in {:?}",
        stats.duration
    );

    if let Some(summary) = handler.summary() {
        if !summary.complete {
            warn!("Feed ended before the results array was closed");
        }
        if cli.summary {
            eprintln!("{}", serde_json::to_string(summary)?);
        }
    }
    Ok(())
}

async fn load_config(cli: &Cli) -> anyhow::Result<FeedConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            FeedConfig::from_toml_str(&content)?
        }
        None => FeedConfig::default(),
    };

    if let Some(mode) = &cli.mode {
        config = config.with_mode(mode.as_str());
    }
    if let Some(size) = cli.chunk_size {
        config = config.with_read_chunk_size(size);
    }
    Ok(config)
}

async fn open_input(input: Option<&PathBuf>) -> anyhow::Result<Box<dyn AsyncRead + Unpin>> {
    match input {
        Some(path) if path.as_os_str() != "-" => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(tokio::io::stdin())),
    }
}

fn exit_code(error: &anyhow::Error) -> i32 {
    if let Some(e) = error.downcast_ref::<PumpError>() {
        return e.exit_code();
    }
    if let Some(e) = error.downcast_ref::<FeedError>() {
        return e.exit_code();
    }
    if error.downcast_ref::<std::io::Error>().is_some() {
        return 5;
    }
    1
}
