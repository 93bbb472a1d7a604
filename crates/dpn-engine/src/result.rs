use std::fmt;

use dpn_ir::formula_text::serialize;
use dpn_ir::net::DataPetriNet;
use dpn_smt::constraints::SolverStats;
use serde::Serialize;

use crate::explorer::{AbortReason, CoveringPolicy, StateId, StateSpace};
use crate::soundness::{residual_places, SoundnessReport, StateCategory};

/// Shape of an explored state space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSpaceSummary {
    pub policy: CoveringPolicy,
    pub states: usize,
    pub arcs: usize,
    pub silent_arcs: usize,
    pub is_full_graph: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abort_reason: Option<AbortReason>,
    /// Labels of places that hold `ω` in some state.
    pub omega_places: Vec<String>,
}

impl StateSpaceSummary {
    pub fn of(net: &DataPetriNet, space: &StateSpace) -> Self {
        let mut omega = vec![false; net.places.len()];
        for state in space.states() {
            for p in state.marking.omega_places() {
                if let Some(flag) = omega.get_mut(p) {
                    *flag = true;
                }
            }
        }
        Self {
            policy: space.policy(),
            states: space.len(),
            arcs: space.arcs().len(),
            silent_arcs: space.arcs().iter().filter(|a| a.silent).count(),
            is_full_graph: space.is_full_graph(),
            abort_reason: space.abort_reason().cloned(),
            omega_places: net
                .places
                .iter()
                .filter(|p| omega[p.id])
                .map(|p| p.label.clone())
                .collect(),
        }
    }
}

impl fmt::Display for StateSpaceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} states, {} arcs ({} silent)",
            self.policy.graph_kind(),
            self.states,
            self.arcs,
            self.silent_arcs
        )?;
        match &self.abort_reason {
            None => {}
            Some(AbortReason::Unbounded { state }) => {
                write!(f, "; incomplete, unbounded at state {state}")?
            }
            Some(AbortReason::StateLimit { limit }) => {
                write!(f, "; incomplete, state limit {limit} reached")?
            }
            Some(AbortReason::Timeout { secs }) => {
                write!(f, "; incomplete, timed out after {secs}s")?
            }
        }
        if !self.omega_places.is_empty() {
            write!(f, "; unbounded places: {}", self.omega_places.join(", "))?;
        }
        Ok(())
    }
}

/// One explored state, as exported in JSON reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateRecord {
    pub id: StateId,
    pub marking: String,
    pub formula: String,
    pub category: StateCategory,
    /// Places holding more tokens than the final marking, for unclean
    /// final states.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub residual: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SolverSummary {
    pub checks: u64,
    pub equivalence_checks: u64,
}

impl From<SolverStats> for SolverSummary {
    fn from(stats: SolverStats) -> Self {
        Self {
            checks: stats.checks,
            equivalence_checks: stats.equivalence_checks,
        }
    }
}

/// Everything a `check` run produces.
#[derive(Debug, Clone, Serialize)]
pub struct VerificationOutcome {
    pub net: String,
    pub state_space: StateSpaceSummary,
    pub report: SoundnessReport,
    pub states: Vec<StateRecord>,
    pub solver: SolverSummary,
}

impl VerificationOutcome {
    pub fn new(
        net: &DataPetriNet,
        space: &StateSpace,
        report: SoundnessReport,
        stats: SolverStats,
    ) -> Self {
        let states = space
            .states()
            .iter()
            .map(|s| {
                let category = report
                    .categories
                    .get(&s.id)
                    .copied()
                    .unwrap_or(StateCategory::SoundIntermediate);
                StateRecord {
                    id: s.id,
                    marking: s.marking.to_string(),
                    formula: serialize(&s.formula),
                    category,
                    residual: if category == StateCategory::UncleanFinal {
                        residual_places(net, space, s.id)
                    } else {
                        Vec::new()
                    },
                }
            })
            .collect();
        Self {
            net: net.name.clone(),
            state_space: StateSpaceSummary::of(net, space),
            report,
            states,
            solver: stats.into(),
        }
    }

    /// `"sound"` or `"unsound"`.
    pub fn verdict_class(&self) -> &'static str {
        if self.report.sound {
            "sound"
        } else {
            "unsound"
        }
    }
}

impl fmt::Display for VerificationOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = if self.report.sound { "SOUND" } else { "UNSOUND" };
        writeln!(f, "RESULT: {verdict} ({} soundness)", self.report.kind)?;
        writeln!(f, "Net: {}", self.net)?;
        write!(f, "{}", self.state_space)?;
        for (category, n) in &self.report.counts {
            write!(f, "\n  {category}: {n}")?;
        }
        for state in self
            .states
            .iter()
            .filter(|s| s.category == StateCategory::UncleanFinal)
        {
            write!(
                f,
                "\n  state {} {} leaves tokens in {}",
                state.id,
                state.marking,
                state.residual.join(", ")
            )?;
        }
        if !self.report.dead_transitions.is_empty() {
            write!(
                f,
                "\nDead transitions: {}",
                self.report.dead_transitions.join(", ")
            )?;
        }
        for violation in &self.report.violations {
            write!(f, "\nViolation: {violation}")?;
        }
        Ok(())
    }
}
