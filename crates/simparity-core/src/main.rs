//! SimParity CLI: compare real and simulated LLM inference runs.

use clap::{Parser, Subcommand};
use simparity_core::config::SimParityConfig;
use simparity_core::{report, MonotonicClock};
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Parser)]
#[command(
    name = "simparity",
    about = "Compare real and simulated LLM inference on an identical workload",
    version
)]
struct Cli {
    /// Path to TOML configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a workload directory from a prompt corpus.
    Workload {
        /// Prompt corpus (JSONL). Overrides `workload.prompts`.
        #[arg(short, long)]
        prompts: Option<PathBuf>,
        /// Output workload directory.
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Replay a workload against the configured real backend.
    Real {
        /// Workload directory.
        #[arg(short, long)]
        workload: PathBuf,
        /// Output run directory.
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Export a workload as a simulator input trace.
    SimTrace {
        /// Workload directory.
        #[arg(short, long)]
        workload: PathBuf,
        /// Output trace CSV.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Convert simulator request metrics into a run directory.
    SimIngest {
        /// Workload directory the simulator was driven with.
        #[arg(short, long)]
        workload: PathBuf,
        /// Simulator per-request metrics CSV.
        #[arg(short, long)]
        metrics: PathBuf,
        /// Output run directory.
        #[arg(short, long)]
        out: PathBuf,
    },
    /// Compare a real run with a simulated run.
    Compare {
        /// Real run directory.
        #[arg(long)]
        real: PathBuf,
        /// Simulated run directory.
        #[arg(long)]
        sim: PathBuf,
        /// Output report directory.
        #[arg(short, long)]
        out: PathBuf,
        /// Also write the report as JSON.
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// List available backends and tokenizers.
    ListBackends,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref());

    match cli.command {
        Commands::Workload { prompts, out } => {
            let prompts_path = prompts
                .or_else(|| config.workload.prompts.clone())
                .unwrap_or_else(|| {
                    eprintln!("No prompt corpus specified. Use --prompts or set workload.prompts in config.");
                    std::process::exit(1);
                });
            let generated = simparity_core::generate_workload_dir(&config, &prompts_path, &out)
                .unwrap_or_else(|e| exit_with("Error generating workload", e));
            println!(
                "Generated workload {} ({} requests) in {}",
                generated.meta.workload_id,
                generated.spec.len(),
                out.display()
            );
        }
        Commands::Real { workload, out } => {
            let clock = Rc::new(MonotonicClock::new());
            let run = simparity_core::run_real(&config, &workload, &out, clock)
                .unwrap_or_else(|e| exit_with("Error running real backend", e));
            println!(
                "Real run {}: {} requests ({} errors) written to {}",
                run.run_meta.run_id,
                run.request_metrics.len(),
                run.error_count(),
                out.display()
            );
        }
        Commands::SimTrace { workload, output } => {
            let spec = simparity_core::load_workload(&workload)
                .unwrap_or_else(|e| exit_with("Error loading workload", e));
            simparity_core::write_sim_trace(&output, &spec)
                .unwrap_or_else(|e| exit_with("Error writing trace", e));
            println!(
                "Wrote simulator trace for {} requests to {}",
                spec.len(),
                output.display()
            );
        }
        Commands::SimIngest {
            workload,
            metrics,
            out,
        } => {
            let run = simparity_core::ingest_sim(&config, &workload, &metrics, &out)
                .unwrap_or_else(|e| exit_with("Error ingesting simulator output", e));
            println!(
                "Sim run {}: {} requests written to {}",
                run.run_meta.run_id,
                run.request_metrics.len(),
                out.display()
            );
        }
        Commands::Compare {
            real,
            sim,
            out,
            json,
        } => {
            let result = simparity_core::compare_runs(&config, &real, &sim, &out)
                .unwrap_or_else(|e| exit_with("Error comparing runs", e));
            println!("{}", report::format_table(&result));

            if let Some(output_path) = json {
                let json = serde_json::to_string_pretty(&result)
                    .unwrap_or_else(|e| exit_with("Error serializing report", e));
                std::fs::write(&output_path, json)
                    .unwrap_or_else(|e| exit_with("Error writing output", e));
                println!("Report written to {}", output_path.display());
            }
        }
        Commands::ListBackends => {
            println!("Available backends:");
            for name in simparity_backends::available_backends() {
                println!("  - {}", name);
            }
            println!("Available tokenizers:");
            for name in simparity_backends::available_tokenizers() {
                println!("  - {}", name);
            }
        }
    }
}

fn load_config(path: Option<&Path>) -> SimParityConfig {
    match path {
        Some(p) => SimParityConfig::from_file(p).unwrap_or_else(|e| {
            eprintln!("Error loading config: {}", e);
            std::process::exit(1);
        }),
        None => SimParityConfig::default(),
    }
}

fn exit_with<T>(context: &str, err: impl std::fmt::Display) -> T {
    eprintln!("{}: {}", context, err);
    std::process::exit(1);
}
