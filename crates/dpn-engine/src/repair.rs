//! Guard strengthening until every node of the coverability tree can reach
//! the final marking.

use std::fmt;

use dpn_ir::formula::Formula;
use dpn_ir::formula_text::serialize;
use dpn_ir::net::{DataPetriNet, TransitionId};
use dpn_smt::constraints::{ConstraintError, ConstraintSolver};
use dpn_smt::solver::SmtSolver;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::composer::ComposerChoice;
use crate::explorer::coloring::{all_green, all_red};
use crate::explorer::{
    color_tree, explore, ArcId, Color, CoveringPolicy, ExplorerOptions, StateId, StateSpace,
};
use crate::refinement::refine;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairOptions {
    pub max_iterations: usize,
    /// Per exploration; `0` means unlimited.
    pub max_states: usize,
    /// Per exploration; `0` means unlimited.
    pub timeout_secs: u64,
    pub composer: ComposerChoice,
}

impl Default for RepairOptions {
    fn default() -> Self {
        Self {
            max_iterations: 16,
            max_states: 100_000,
            timeout_secs: 0,
            composer: ComposerChoice::Exact,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairFailure {
    /// No node of the tree reaches the final marking.
    AllRed,
    /// The coverability tree hit an exploration limit.
    PartialStateSpace,
    /// Red nodes remain but no guard could be strengthened.
    NoApplicableRepair,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "verdict")]
pub enum RepairVerdict {
    /// Sound as given; the net is returned unchanged.
    AlreadySound,
    Repaired,
    Failure { reason: RepairFailure },
    BudgetExceeded,
}

impl RepairVerdict {
    pub fn is_success(self) -> bool {
        matches!(self, RepairVerdict::AlreadySound | RepairVerdict::Repaired)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardChange {
    pub iteration: usize,
    pub transition: String,
    pub before: String,
    pub after: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    pub verdict: RepairVerdict,
    pub iterations: usize,
    pub changes: Vec<GuardChange>,
    /// The repaired net on success, the last working net otherwise.
    #[serde(skip)]
    pub net: DataPetriNet,
}

impl fmt::Display for RepairReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.verdict {
            RepairVerdict::AlreadySound => writeln!(f, "RESULT: ALREADY SOUND")?,
            RepairVerdict::Repaired => writeln!(f, "RESULT: REPAIRED")?,
            RepairVerdict::Failure { reason } => {
                let why = match reason {
                    RepairFailure::AllRed => "no state can reach the final marking",
                    RepairFailure::PartialStateSpace => "the coverability tree is incomplete",
                    RepairFailure::NoApplicableRepair => "no guard could be strengthened",
                };
                writeln!(f, "RESULT: REPAIR FAILED ({why})")?
            }
            RepairVerdict::BudgetExceeded => writeln!(f, "RESULT: REPAIR BUDGET EXCEEDED")?,
        }
        write!(f, "Iterations: {}", self.iterations)?;
        for change in &self.changes {
            write!(
                f,
                "\n  [{}] {}: {}  =>  {}",
                change.iteration, change.transition, change.before, change.after
            )?;
        }
        Ok(())
    }
}

pub fn repair<S: SmtSolver>(
    net: &DataPetriNet,
    solver: &mut ConstraintSolver<S>,
    options: &RepairOptions,
) -> Result<RepairReport, ConstraintError> {
    let composer = options.composer;
    let explorer_options = ExplorerOptions {
        policy: CoveringPolicy::Tree,
        silent_transitions: true,
        max_states: options.max_states,
        timeout_secs: options.timeout_secs,
    };
    let final_marking = net.final_marking();
    let mut working = net.clone();
    let mut changes = Vec::new();

    for iteration in 1..=options.max_iterations {
        info!(iteration, net = %working.name, "repair iteration");
        working = refine(&working, solver, &composer, &explorer_options)?.net;
        let mut tree = explore(&working, solver, &composer, &explorer_options)?;
        let finish = |verdict, working: DataPetriNet, changes| RepairReport {
            verdict,
            iterations: iteration,
            changes,
            net: working,
        };
        if !tree.is_full_graph() {
            warn!(iteration, "coverability tree is incomplete");
            return Ok(finish(
                RepairVerdict::Failure {
                    reason: RepairFailure::PartialStateSpace,
                },
                working,
                changes,
            ));
        }
        color_tree(&mut tree, &final_marking);

        if all_green(&tree) {
            return Ok(if changes.is_empty() {
                finish(RepairVerdict::AlreadySound, net.clone(), changes)
            } else {
                finish(RepairVerdict::Repaired, working, changes)
            });
        }
        if all_red(&tree) {
            return Ok(finish(
                RepairVerdict::Failure {
                    reason: RepairFailure::AllRed,
                },
                working,
                changes,
            ));
        }

        let before = changes.len();
        for (child, arc) in red_frontier(&tree) {
            let Some(t) = nearest_visible_transition(&working, &tree, arc) else {
                continue;
            };
            let guard = working.transitions[t].guard.clone();
            let strengthened =
                solver.simplify(&strengthened_guard(&working, t, &tree.state(child).formula))?;
            if solver.equivalent(&strengthened, &guard)? {
                continue;
            }
            debug!(
                transition = %working.transitions[t].label,
                child,
                %strengthened,
                "strengthening guard"
            );
            changes.push(GuardChange {
                iteration,
                transition: working.transitions[t].label.clone(),
                before: serialize(&guard),
                after: serialize(&strengthened),
            });
            working.set_guard(t, strengthened);
        }
        if changes.len() == before {
            warn!(iteration, "no applicable repair");
            return Ok(finish(
                RepairVerdict::Failure {
                    reason: RepairFailure::NoApplicableRepair,
                },
                working,
                changes,
            ));
        }
    }

    warn!(max = options.max_iterations, "repair budget exceeded");
    Ok(RepairReport {
        verdict: RepairVerdict::BudgetExceeded,
        iterations: options.max_iterations,
        changes,
        net: working,
    })
}

/// Red children of green parents, with the arc from the parent.
fn red_frontier(tree: &StateSpace) -> Vec<(StateId, ArcId)> {
    tree.states()
        .iter()
        .filter(|s| s.color == Some(Color::Red))
        .filter_map(|s| {
            let (parent, arc) = s.parent?;
            (tree.state(parent).color == Some(Color::Green)).then_some((s.id, arc))
        })
        .collect()
}

/// The transition of the nearest non-silent arc at or above `arc`.
fn nearest_visible_transition(
    net: &DataPetriNet,
    tree: &StateSpace,
    arc: ArcId,
) -> Option<TransitionId> {
    let mut current = tree.arc(arc);
    loop {
        if !current.silent && !net.transitions[current.transition].is_silent {
            return Some(current.transition);
        }
        let (_, up) = tree.state(current.source).parent?;
        current = tree.arc(up);
    }
}

/// `guard(t) && !state`, with the variables `t` writes read off its
/// write-tagged instances.
fn strengthened_guard(net: &DataPetriNet, t: TransitionId, state: &Formula) -> Formula {
    let phi = state.reads_to_writes(&net.written_variables(t));
    net.transitions[t].guard.conjoin(&phi.negate())
}
