#![doc = include_str!("../README.md")]

mod cli;
mod commands;
mod types;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::check::{run_check_command, CheckArgs};
use commands::repair::{run_repair_command, RepairArgs};

/// Exit status for an unsound net or a failed repair.
const EXIT_NEGATIVE: i32 = 2;

fn main() -> miette::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let positive = match cli.command {
        Commands::Check {
            file,
            policy,
            soundness,
            heuristic_composer,
            no_silent,
            max_states,
            timeout,
            format,
        } => run_check_command(CheckArgs {
            file,
            policy,
            soundness,
            heuristic_composer,
            no_silent,
            max_states,
            timeout,
            format,
            solver_timeout: cli.solver_timeout,
        })?,
        Commands::Repair {
            file,
            max_iterations,
            heuristic_composer,
            max_states,
            timeout,
            out,
            format,
        } => run_repair_command(RepairArgs {
            file,
            max_iterations,
            heuristic_composer,
            max_states,
            timeout,
            out,
            format,
            solver_timeout: cli.solver_timeout,
        })?,
    };

    if !positive {
        std::process::exit(EXIT_NEGATIVE);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn check_defaults() {
        let cli = Cli::parse_from(["dpnsound", "check", "net.json"]);
        let Commands::Check {
            policy,
            soundness,
            heuristic_composer,
            max_states,
            format,
            ..
        } = cli.command
        else {
            panic!("expected check");
        };
        assert_eq!(policy, "exact");
        assert_eq!(soundness, "classical");
        assert!(!heuristic_composer);
        assert_eq!(max_states, 100_000);
        assert_eq!(format, "text");
    }

    #[test]
    fn repair_flags() {
        let cli = Cli::parse_from([
            "dpnsound",
            "--solver-timeout",
            "5",
            "repair",
            "net.json",
            "--max-iterations",
            "3",
            "--out",
            "fixed.json",
        ]);
        assert_eq!(cli.solver_timeout, 5);
        let Commands::Repair {
            max_iterations,
            out,
            ..
        } = cli.command
        else {
            panic!("expected repair");
        };
        assert_eq!(max_iterations, 3);
        assert_eq!(out.as_deref(), Some(std::path::Path::new("fixed.json")));
    }
}
