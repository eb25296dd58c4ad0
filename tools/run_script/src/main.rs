//! Script runner for the backend manager.
//!
//! Builds a manager over the phrase-history backend, drives it with a
//! simulated event loop according to a script file, and reports whether the
//! script ran to completion.

mod runner;
mod script;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use libchinese_backend::BackendConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "run_script", about = "Run a backend script against a simulated event loop")]
struct Args {
    /// Script file to run
    #[arg(default_value = "test.script")]
    script: PathBuf,

    /// Backend configuration (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Root for per-user directories (overrides the configuration)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Print a JSON summary of the backend state before teardown
    #[arg(long)]
    summary: bool,
}

fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    println!("starting test...");

    let status = run(&args);
    eprintln!("{} done.", args.script.display());

    match status {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("run_script: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => BackendConfig::load_toml(path)?,
        None => BackendConfig::default(),
    };
    if let Some(dir) = &args.cache_dir {
        config.cache_dir = Some(dir.clone());
    }

    let source = std::fs::read_to_string(&args.script)
        .map_err(|e| anyhow::anyhow!("cannot read {}: {}", args.script.display(), e))?;
    let lines = script::parse(&source)?;
    tracing::info!(commands = lines.len(), "script parsed");

    let mut runner = runner::Runner::new(config);
    let outcome = runner.run(&lines);
    if args.summary {
        println!("{}", serde_json::to_string_pretty(&runner.summary())?);
    }
    runner.finish();
    outcome
}
