// Command handler for: Repair

use std::path::PathBuf;

use miette::{IntoDiagnostic, WrapErr};
use serde_json::json;
use tracing::{debug, info};

use dpn_engine::pipeline::{repair_net, PipelineOptions};
use dpn_ir::loader::{load_net_file, save_net};

use super::helpers::{composer_choice, parse_output_format, print_json, write_text_artifact};
use crate::types::OutputFormat;

pub(crate) struct RepairArgs {
    pub(crate) file: PathBuf,
    pub(crate) max_iterations: usize,
    pub(crate) heuristic_composer: bool,
    pub(crate) max_states: usize,
    pub(crate) timeout: u64,
    pub(crate) out: Option<PathBuf>,
    pub(crate) format: String,
    pub(crate) solver_timeout: u64,
}

/// Run the `repair` CLI command. Returns whether the repair succeeded.
pub(crate) fn run_repair_command(args: RepairArgs) -> miette::Result<bool> {
    let output_format = parse_output_format(&args.format)?;
    let filename = args.file.display().to_string();
    let net = load_net_file(&args.file)
        .into_diagnostic()
        .wrap_err_with(|| format!("loading {filename}"))?;
    let options = PipelineOptions {
        composer: composer_choice(args.heuristic_composer),
        solver_timeout_secs: args.solver_timeout,
        max_states: args.max_states,
        timeout_secs: args.timeout,
        ..PipelineOptions::default()
    };
    debug!(file = %filename, ?options, max_iterations = args.max_iterations, "repair");

    let report = repair_net(&net, &options, args.max_iterations)
        .into_diagnostic()
        .wrap_err_with(|| format!("repairing {filename}"))?;

    let success = report.verdict.is_success();
    if let (true, Some(out)) = (success, &args.out) {
        let document = save_net(&report.net).into_diagnostic()?;
        write_text_artifact(out, &document)?;
        info!(path = %out.display(), "repaired net written");
    }

    match output_format {
        OutputFormat::Json => print_json(&json!({
            "schema_version": 1,
            "file": filename,
            "report": &report,
            "repaired_net": args
                .out
                .as_ref()
                .filter(|_| success)
                .map(|p| p.display().to_string()),
        }))?,
        OutputFormat::Text => {
            println!("{report}");
            if let (true, Some(out)) = (success, &args.out) {
                println!("Repaired net written to {}", out.display());
            }
        }
    }
    Ok(success)
}
