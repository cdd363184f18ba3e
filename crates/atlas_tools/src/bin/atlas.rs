#![forbid(unsafe_code)]

use std::path::PathBuf;

use atlas_tools::atlas_cli::{
    execute_audit_command, execute_certificate_command, execute_guard_command, CommandOutput,
};
use clap::{ArgGroup, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "atlas", about = "Boundary lattice guard, audit and certificate tool")]
struct Cli {
    /// Log filter, e.g. `info` or `atlas_engines=debug`.
    #[arg(long, default_value = "info")]
    log: String,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build the (Z/2)^11 subgroup certificate.
    Certificate {
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Normalize a step context into a full lattice address.
    #[command(group(ArgGroup::new("coordinates").required(true).args(["coord", "anchor"])))]
    Guard {
        #[arg(long = "class")]
        class_id: u32,
        #[arg(long)]
        coord: Option<u32>,
        #[arg(long, requires = "v_bits")]
        anchor: Option<u32>,
        #[arg(long = "v-bits", requires = "anchor")]
        v_bits: Option<u32>,
    },
    /// Replay a JSON ledger and report fairness, closing-entry and checkpoint verdicts.
    Audit {
        #[arg(long)]
        ledger: PathBuf,
        #[arg(long)]
        schedule: Option<PathBuf>,
        #[arg(long)]
        bundle: Option<PathBuf>,
    },
}

fn main() {
    match run() {
        Ok(out) => {
            println!("{}", out.stdout);
            if !out.passed {
                std::process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(2);
        }
    }
}

fn run() -> Result<CommandOutput, String> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cli.log))
        .with_writer(std::io::stderr)
        .init();

    match cli.cmd {
        Command::Certificate { out } => execute_certificate_command(out.as_deref()),
        Command::Guard {
            class_id,
            coord,
            anchor,
            v_bits,
        } => execute_guard_command(class_id, coord, anchor, v_bits),
        Command::Audit {
            ledger,
            schedule,
            bundle,
        } => execute_audit_command(&ledger, schedule.as_deref(), bundle.as_deref()),
    }
}
