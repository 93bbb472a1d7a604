// Shared argument parsing and output helpers for the subcommands.

use std::fs;
use std::path::Path;

use miette::IntoDiagnostic;
use serde_json::Value;

use dpn_engine::composer::ComposerChoice;
use dpn_engine::explorer::CoveringPolicy;
use dpn_engine::soundness::SoundnessKind;

use crate::types::OutputFormat;

pub(crate) fn parse_policy(raw: &str) -> miette::Result<CoveringPolicy> {
    match raw {
        "exact" => Ok(CoveringPolicy::Exact),
        "omega" => Ok(CoveringPolicy::OmegaAbstraction),
        "tree" => Ok(CoveringPolicy::Tree),
        other => Err(miette::miette!(
            "Unknown covering policy: {other}. Use 'exact', 'omega' or 'tree'."
        )),
    }
}

pub(crate) fn parse_soundness(raw: &str) -> miette::Result<SoundnessKind> {
    match raw {
        "classical" => Ok(SoundnessKind::Classical),
        "lazy" => Ok(SoundnessKind::Lazy),
        "relaxed-lazy" => Ok(SoundnessKind::RelaxedLazy),
        other => Err(miette::miette!(
            "Unknown soundness notion: {other}. Use 'classical', 'lazy' or 'relaxed-lazy'."
        )),
    }
}

pub(crate) fn parse_output_format(raw: &str) -> miette::Result<OutputFormat> {
    match raw {
        "text" => Ok(OutputFormat::Text),
        "json" => Ok(OutputFormat::Json),
        other => Err(miette::miette!(
            "Unknown output format: {other}. Use 'text' or 'json'."
        )),
    }
}

pub(crate) fn composer_choice(heuristic: bool) -> ComposerChoice {
    if heuristic {
        ComposerChoice::Heuristic
    } else {
        ComposerChoice::Exact
    }
}

pub(crate) fn print_json(value: &Value) -> miette::Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

pub(crate) fn write_text_artifact(path: &Path, contents: &str) -> miette::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).into_diagnostic()?;
        }
    }
    fs::write(path, contents).into_diagnostic()
}
