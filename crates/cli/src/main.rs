//! blockgen CLI: generate a plugin registration source from block headers and
//! their XML metadata.
//!
//! Logs go to stderr so the generated source can be written to stdout.

use clap::Parser;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use blockgen_core::{load_config, run, FatalError, RunOptions};

/// Output sentinels meaning "write to standard output".
const STDOUT_SENTINELS: &[&str] = &["stdout", "-"];

/// Generate a block registration source from C++ headers and XML metadata.
#[derive(Parser)]
#[command(name = "blockgen", version, about)]
struct Cli {
    /// Root directories to search (each is walked upward for include/ and grc/)
    #[arg(required = true)]
    roots: Vec<PathBuf>,

    /// Output file path, or "stdout"
    #[arg(long, default_value = "stdout")]
    out: String,

    /// Build target name; blacklisted targets produce an empty registration
    #[arg(long)]
    target: Option<String>,

    /// TOML configuration file (default: blockgen.toml in the first root)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the maximum number of factory/call parameters
    #[arg(long)]
    max_args: Option<usize>,

    /// Emit group members individually when meta-block synthesis fails
    #[arg(long)]
    meta_fallback: bool,

    /// Write the run report as JSON to this path
    #[arg(long)]
    report: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let directive = format!("blockgen={level}");
    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(d) = directive.parse() {
        filter = filter.add_directive(d);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn write_output(out: &str, source: &str) -> Result<(), FatalError> {
    if STDOUT_SENTINELS.contains(&out) {
        println!("{source}");
        return Ok(());
    }
    let path = Path::new(out);
    std::fs::write(path, source).map_err(|source| FatalError::Write { path: path.to_path_buf(), source })?;
    info!(out = %path.display(), bytes = source.len(), "Wrote registration");
    Ok(())
}

fn write_report(path: &Path, report: &blockgen_core::RunReport) -> Result<(), FatalError> {
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).map_err(|source| FatalError::Write { path: path.to_path_buf(), source })
}

fn execute(cli: &Cli) -> Result<(), FatalError> {
    let mut config = load_config(cli.config.as_deref(), cli.roots.first().map(PathBuf::as_path));
    if let Some(n) = cli.max_args {
        config.max_args = n;
    }
    if cli.meta_fallback {
        config.meta_fallback = true;
    }

    let options = RunOptions { roots: cli.roots.clone(), target: cli.target.clone() };
    let output = run(&options, &config)?;

    write_output(&cli.out, &output.source)?;
    if let Some(path) = &cli.report {
        write_report(path, &output.report)?;
    }
    eprintln!("{}", output.report.summary());
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    if let Err(e) = execute(&cli) {
        error!(error = %e, "Generation failed");
        std::process::exit(1);
    }
}
