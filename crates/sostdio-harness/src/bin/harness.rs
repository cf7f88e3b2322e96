//! CLI entrypoint for the sostdio harness.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sostdio_harness::scenarios::run_and_log;
use sostdio_harness::structured_log::{LogEmitter, validate_log_file};

/// Verification tooling for sostdio.
#[derive(Debug, Parser)]
#[command(name = "sostdio-harness")]
#[command(about = "Scenario runner and log validator for sostdio streams")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run every scenario and write a JSONL result log.
    Run {
        /// Output JSONL log path.
        #[arg(long)]
        log: PathBuf,
        /// Directory for scratch files (defaults to the system temp dir).
        #[arg(long)]
        workdir: Option<PathBuf>,
        /// Run identifier used as the trace id prefix.
        #[arg(long, default_value = "run")]
        run_id: String,
    },
    /// Check a JSONL log against the structured-log schema.
    ValidateLog {
        /// JSONL log path.
        #[arg(long)]
        log: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            log,
            workdir,
            run_id,
        } => {
            let root = workdir.unwrap_or_else(std::env::temp_dir);
            std::fs::create_dir_all(&root)?;
            let mut emitter = LogEmitter::to_file(&log, &run_id)?;
            let results = run_and_log(&root, &mut emitter)?;

            let mut failed = 0;
            for r in &results {
                if r.passed {
                    eprintln!("PASS {} ({} us)", r.name, r.duration_us);
                } else {
                    failed += 1;
                    eprintln!(
                        "FAIL {}: {}",
                        r.name,
                        r.message.as_deref().unwrap_or("unknown failure")
                    );
                }
            }
            eprintln!(
                "{} scenarios, {failed} failed; log written to {}",
                results.len(),
                log.display()
            );
            if failed > 0 {
                std::process::exit(1);
            }
        }
        Command::ValidateLog { log } => {
            let (lines, errors) = validate_log_file(&log)?;
            for e in &errors {
                eprintln!("{e}");
            }
            if errors.is_empty() {
                eprintln!("{}: {lines} lines valid", log.display());
            } else {
                eprintln!("{}: {} errors in {lines} lines", log.display(), errors.len());
                std::process::exit(1);
            }
        }
    }
    Ok(())
}
