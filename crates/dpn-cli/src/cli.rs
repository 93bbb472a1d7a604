//! CLI argument definitions: top-level `Cli` struct and `Commands` enum.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub(crate) const CLI_LONG_ABOUT: &str =
    "Soundness checking and repair for data Petri nets.\n\n\
    Typical use:\n  \
    1. dpnsound check process.json\n  \
    2. dpnsound check process.json --policy omega --soundness lazy\n  \
    3. dpnsound repair process.json --out repaired.json\n\n\
    Nets are JSON documents; guards use the text syntax `x_r > 0 && y_w == x_r`.\n\
    Set RUST_LOG=debug to trace the exploration.";

#[derive(Parser)]
#[command(name = "dpnsound")]
#[command(about = "Soundness checking and repair for data Petri nets")]
#[command(long_about = CLI_LONG_ABOUT)]
#[command(version)]
pub(crate) struct Cli {
    /// Per-query solver timeout in seconds (0 disables)
    #[arg(long, global = true, default_value_t = 0)]
    pub(crate) solver_timeout: u64,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Explore a net and decide its soundness
    Check {
        /// Path to the JSON net document
        file: PathBuf,

        /// Covering policy: exact | omega | tree
        #[arg(long, default_value = "exact")]
        policy: String,

        /// Soundness notion: classical | lazy | relaxed-lazy
        #[arg(long, default_value = "classical")]
        soundness: String,

        /// Compose state formulas by bound substitution instead of exact
        /// projection
        #[arg(long, default_value_t = false)]
        heuristic_composer: bool,

        /// Do not add silent refinement steps
        #[arg(long, default_value_t = false)]
        no_silent: bool,

        /// Maximum number of explored states (0 = unlimited)
        #[arg(long, default_value_t = 100_000)]
        max_states: usize,

        /// Exploration wall-clock timeout in seconds (0 = unlimited)
        #[arg(long, default_value_t = 0)]
        timeout: u64,

        /// Output format: text | json
        #[arg(long, default_value = "text")]
        format: String,
    },

    /// Strengthen guards until every reachable state can complete
    Repair {
        /// Path to the JSON net document
        file: PathBuf,

        /// Upper bound on repair iterations
        #[arg(long, default_value_t = 16)]
        max_iterations: usize,

        /// Compose state formulas by bound substitution instead of exact
        /// projection
        #[arg(long, default_value_t = false)]
        heuristic_composer: bool,

        /// Maximum number of states per exploration (0 = unlimited)
        #[arg(long, default_value_t = 100_000)]
        max_states: usize,

        /// Per-exploration wall-clock timeout in seconds (0 = unlimited)
        #[arg(long, default_value_t = 0)]
        timeout: u64,

        /// Write the repaired net as JSON to this path
        #[arg(long)]
        out: Option<PathBuf>,

        /// Output format: text | json
        #[arg(long, default_value = "text")]
        format: String,
    },
}
