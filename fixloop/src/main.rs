//! CLI driver for the debugging pipeline.
//!
//! Submits a single job described on the command line, streams progress
//! events to stdout, and exits with a stable code reflecting the outcome.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use fixloop::core::event::EventKind;
use fixloop::core::job::{Job, JobKind};
use fixloop::exit_codes;
use fixloop::io::config::load_config;
use fixloop::io::executor::CommandExecutor;
use fixloop::logging;
use fixloop::pipeline::Pipeline;

/// Cadence at which the observer drains pending events.
const DRAIN_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Parser)]
#[command(
    name = "fixloop",
    version,
    about = "Three-stage debugging pipeline driving an external coding agent"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit one job and stream its progress until it finishes.
    Run {
        /// Root of the project to debug.
        #[arg(long)]
        project_root: PathBuf,
        /// Free-text description of the bug or feature to verify.
        #[arg(long)]
        description: String,
        /// Kind of work.
        #[arg(long, value_enum, default_value_t = KindArg::Bug)]
        kind: KindArg,
        /// Path to the pipeline config file.
        #[arg(long, default_value = "fixloop.toml")]
        config: PathBuf,
        /// Override the configured maximum fix attempts.
        #[arg(long)]
        max_attempts: Option<u32>,
    },
    /// Print the effective configuration as TOML.
    Config {
        /// Path to the pipeline config file.
        #[arg(long, default_value = "fixloop.toml")]
        config: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum KindArg {
    Bug,
    FeatureTest,
}

impl From<KindArg> for JobKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Bug => JobKind::Bug,
            KindArg::FeatureTest => JobKind::FeatureTest,
        }
    }
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{err:#}");
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run {
            project_root,
            description,
            kind,
            config,
            max_attempts,
        } => cmd_run(project_root, description, kind.into(), &config, max_attempts),
        Command::Config { config } => cmd_config(&config),
    }
}

fn cmd_run(
    project_root: PathBuf,
    description: String,
    kind: JobKind,
    config_path: &std::path::Path,
    max_attempts: Option<u32>,
) -> Result<i32> {
    let mut config = load_config(config_path)?;
    if let Some(n) = max_attempts {
        config.max_attempts = n;
    }
    config.validate()?;

    let executor = CommandExecutor::new(config.executor.command.clone());
    let mut pipeline = Pipeline::new(executor, config);
    pipeline.start();

    let job = Job::new(project_root, kind, description);
    let job_id = job.id;
    pipeline.submit(job)?;

    // Poll-based drain: the observer owns its own cadence and never blocks
    // the worker.
    let code = 'watch: loop {
        for event in pipeline.drain_events() {
            println!("{}", event.payload);
            if event.job_id == job_id {
                match event.kind {
                    EventKind::Completed => break 'watch exit_codes::OK,
                    EventKind::Failed | EventKind::Error => break 'watch exit_codes::FAILED,
                    _ => {}
                }
            }
        }
        thread::sleep(DRAIN_INTERVAL);
    };

    pipeline.stop();
    Ok(code)
}

fn cmd_config(config_path: &std::path::Path) -> Result<i32> {
    let config = load_config(config_path)?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(exit_codes::OK)
}
