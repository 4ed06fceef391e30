//! COCIS - command-line entry point
//!
//! `cocis demo` runs the reference scenarios; `cocis stress` contends worker
//! threads on cached keys, guard tokens and a singleton name.

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use cocis_core::{run_demo, run_stress, telemetry, CocisConfig};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "cocis")]
#[command(author, version, about = "Controlled Object Construction and Identity Subsystem")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run the reference scenarios and print a report
    Demo {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run concurrent cache and guard contention
    Stress {
        /// Worker threads (default from config)
        #[arg(long)]
        threads: Option<usize>,

        /// Keys per worker (default from config)
        #[arg(long)]
        iterations: Option<usize>,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> anyhow::Result<bool> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => CocisConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => CocisConfig::default(),
    };
    telemetry::init(&config.telemetry, cli.verbose)?;
    tracing::debug!(?config, "configuration resolved");

    match cli.command {
        Commands::Demo { json } => {
            let report = run_demo(&config);
            if json {
                println!("{}", report.to_json()?);
            } else {
                println!("{}", report.generate_text());
            }
            Ok(report.passed())
        }
        Commands::Stress {
            threads,
            iterations,
        } => {
            let threads = threads.unwrap_or(config.stress.threads);
            let iterations = iterations.unwrap_or(config.stress.iterations);
            println!("Running stress test...");
            println!("Threads: {threads}");
            println!("Iterations: {iterations}");
            println!();

            let report = run_stress(&config.with_stress(threads, iterations))?;
            println!("{}", report.generate_text());
            Ok(report.success())
        }
    }
}
