//! End-to-end runs: load a net, explore it, classify it, repair it.

use std::path::Path;
use std::time::Instant;

use dpn_ir::loader::{load_net, load_net_file, LoadError};
use dpn_ir::net::{DataPetriNet, NetError};
use dpn_smt::constraints::{ConstraintError, ConstraintSolver};
use thiserror::Error;
use tracing::info;

use crate::composer::ComposerChoice;
use crate::explorer::{explore, CoveringPolicy, ExplorerOptions};
use crate::repair::{repair, RepairOptions, RepairReport};
use crate::result::VerificationOutcome;
use crate::soundness::{analyze, SoundnessKind};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),
    #[error("Net error: {0}")]
    Net(#[from] NetError),
    #[error("Solver error: {0}")]
    Solver(String),
    #[error("Inconclusive: {0}")]
    Inconclusive(String),
}

impl From<ConstraintError> for PipelineError {
    fn from(e: ConstraintError) -> Self {
        match e {
            ConstraintError::Backend(msg) => PipelineError::Solver(msg),
            ConstraintError::Inconclusive(msg) => PipelineError::Inconclusive(msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub policy: CoveringPolicy,
    pub composer: ComposerChoice,
    pub soundness: SoundnessKind,
    pub silent_transitions: bool,
    /// Per solver query; `0` leaves Z3's default.
    pub solver_timeout_secs: u64,
    pub max_states: usize,
    pub timeout_secs: u64,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            policy: CoveringPolicy::Exact,
            composer: ComposerChoice::Exact,
            soundness: SoundnessKind::Classical,
            silent_transitions: true,
            solver_timeout_secs: 0,
            max_states: 100_000,
            timeout_secs: 0,
        }
    }
}

impl PipelineOptions {
    pub fn explorer_options(&self) -> ExplorerOptions {
        ExplorerOptions {
            policy: self.policy,
            silent_transitions: self.silent_transitions,
            max_states: self.max_states,
            timeout_secs: self.timeout_secs,
        }
    }

    pub fn repair_options(&self, max_iterations: usize) -> RepairOptions {
        RepairOptions {
            max_iterations,
            max_states: self.max_states,
            timeout_secs: self.timeout_secs,
            composer: self.composer,
        }
    }
}

/// Explore `net` under `options.policy` and classify the result.
pub fn verify_net(
    net: &DataPetriNet,
    options: &PipelineOptions,
) -> Result<VerificationOutcome, PipelineError> {
    net.validate()?;
    let started = Instant::now();
    let mut solver = ConstraintSolver::z3(options.solver_timeout_secs);
    let space = explore(net, &mut solver, &options.composer, &options.explorer_options())?;
    let report = analyze(net, &space, options.soundness);
    info!(
        net = %net.name,
        sound = report.sound,
        states = space.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "verification finished"
    );
    Ok(VerificationOutcome::new(net, &space, report, solver.stats()))
}

/// [`verify_net`] on a JSON net document.
pub fn verify_source(
    json: &str,
    options: &PipelineOptions,
) -> Result<VerificationOutcome, PipelineError> {
    let net = load_net(json)?;
    verify_net(&net, options)
}

pub fn verify_file(
    path: impl AsRef<Path>,
    options: &PipelineOptions,
) -> Result<VerificationOutcome, PipelineError> {
    let net = load_net_file(path)?;
    verify_net(&net, options)
}

/// Strengthen guards of `net` until its coverability tree is all green.
pub fn repair_net(
    net: &DataPetriNet,
    options: &PipelineOptions,
    max_iterations: usize,
) -> Result<RepairReport, PipelineError> {
    net.validate()?;
    let started = Instant::now();
    let mut solver = ConstraintSolver::z3(options.solver_timeout_secs);
    let report = repair(net, &mut solver, &options.repair_options(max_iterations))?;
    info!(
        net = %net.name,
        verdict = ?report.verdict,
        iterations = report.iterations,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "repair finished"
    );
    Ok(report)
}
