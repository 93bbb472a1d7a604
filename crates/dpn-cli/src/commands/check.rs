// Command handler for: Check

use std::path::PathBuf;

use miette::{IntoDiagnostic, WrapErr};
use serde_json::json;
use tracing::debug;

use dpn_engine::pipeline::{verify_file, PipelineOptions};

use super::helpers::{
    composer_choice, parse_output_format, parse_policy, parse_soundness, print_json,
};
use crate::types::OutputFormat;

pub(crate) struct CheckArgs {
    pub(crate) file: PathBuf,
    pub(crate) policy: String,
    pub(crate) soundness: String,
    pub(crate) heuristic_composer: bool,
    pub(crate) no_silent: bool,
    pub(crate) max_states: usize,
    pub(crate) timeout: u64,
    pub(crate) format: String,
    pub(crate) solver_timeout: u64,
}

/// Run the `check` CLI command. Returns whether the net is sound.
pub(crate) fn run_check_command(args: CheckArgs) -> miette::Result<bool> {
    let output_format = parse_output_format(&args.format)?;
    let options = PipelineOptions {
        policy: parse_policy(&args.policy)?,
        composer: composer_choice(args.heuristic_composer),
        soundness: parse_soundness(&args.soundness)?,
        silent_transitions: !args.no_silent,
        solver_timeout_secs: args.solver_timeout,
        max_states: args.max_states,
        timeout_secs: args.timeout,
    };
    let filename = args.file.display().to_string();
    debug!(file = %filename, ?options, "check");

    let outcome = verify_file(&args.file, &options)
        .into_diagnostic()
        .wrap_err_with(|| format!("checking {filename}"))?;

    match output_format {
        OutputFormat::Json => print_json(&json!({
            "schema_version": 1,
            "file": filename,
            "result": outcome.verdict_class(),
            "outcome": &outcome,
        }))?,
        OutputFormat::Text => println!("{outcome}"),
    }
    Ok(outcome.report.sound)
}
