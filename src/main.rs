//! cobtrace: rebuild SQL activity and the call tree from a COBOL runtime trace.

use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use cobtrace::{report, source, ProcessorConfig};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Parser)]
#[command(name = "cobtrace")]
#[command(about = "Analyze COBOL runtime SQL trace logs")]
#[command(version)]
struct Cli {
    /// Trace file to analyze
    trace_file: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Nest token of top-level programmatic calls
    #[arg(long, default_value = "00")]
    top_level_nest: String,

    /// Lines before a stack trace to search for its frame
    #[arg(long, default_value_t = 1)]
    stack_trace_slack: u64,

    /// Ignore Fetch and EXE lines
    #[arg(long)]
    no_cursor_activity: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if !cli.trace_file.is_file() {
        bail!("Trace file not found: {}", cli.trace_file.display());
    }

    let config = ProcessorConfig {
        top_level_nest: cli.top_level_nest,
        stack_trace_line_slack: cli.stack_trace_slack,
        cursor_activity: !cli.no_cursor_activity,
    };

    let run = source::process_file(&cli.trace_file, config)
        .with_context(|| format!("Failed to process {}", cli.trace_file.display()))?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    match cli.format {
        OutputFormat::Text => report::write_text(&run, &mut out)?,
        OutputFormat::Json => {
            report::write_json(&run, &mut out)?;
            writeln!(out)?;
        }
    }
    out.flush()?;

    Ok(())
}
