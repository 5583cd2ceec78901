//! CLI for the redrive retry engine.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use commands::{run_delays, run_simulate};

/// Top-level CLI for the redrive retry engine.
#[derive(Debug, Parser)]
#[command(name = "redrive")]
#[command(about = "redrive: retry strategy engine driver", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Backoff algorithm selection for `redrive delays`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackoffKind {
    /// Exponential with full jitter.
    Exp,
    /// Exponential without jitter.
    ExpNoJitter,
    /// Uniform random up to the max delay.
    Fixed,
    /// Always zero.
    Immediate,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Print a backoff delay table for attempts 1..N.
    Delays {
        /// Backoff algorithm.
        #[arg(long, value_enum, default_value = "exp")]
        strategy: BackoffKind,

        /// Base delay in milliseconds (exponential strategies).
        #[arg(long, default_value = "100")]
        base_ms: u64,

        /// Maximum delay in milliseconds.
        #[arg(long, default_value = "20000")]
        max_ms: u64,

        /// Number of attempts to tabulate.
        #[arg(long, default_value = "10", value_name = "N")]
        attempts: u32,
    },

    /// Run simulated flaky operations through the configured strategy.
    Simulate {
        /// Number of simulated operations.
        #[arg(long, default_value = "100")]
        ops: u32,

        /// Probability that a single attempt fails (0.0..=1.0).
        #[arg(long, default_value = "0.5")]
        fail_rate: f64,

        /// Probability that a failure is a throttling fault (0.0..=1.0).
        #[arg(long, default_value = "0.2")]
        throttle_rate: f64,

        /// Seed for the simulation's random source (repeatable runs).
        #[arg(long)]
        seed: Option<u64>,
    },
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Delays {
                strategy,
                base_ms,
                max_ms,
                attempts,
            } => run_delays(strategy, base_ms, max_ms, attempts)?,
            CliCommand::Simulate {
                ops,
                fail_rate,
                throttle_rate,
                seed,
            } => run_simulate(ops, fail_rate, throttle_rate, seed)?,
        }

        Ok(())
    }
}
