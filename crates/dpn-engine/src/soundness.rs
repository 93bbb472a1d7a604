//! State classification and soundness verdicts.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use dpn_ir::marking::TokenCount;
use dpn_ir::net::{DataPetriNet, TransitionId};
use serde::Serialize;

use crate::explorer::{CoverKind, StateId, StateSpace};

/// Exactly one per state; earlier variants take priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateCategory {
    CleanFinal,
    UncleanFinal,
    Deadlock,
    NoWayToFinalMarking,
    Initial,
    SoundIntermediate,
}

impl fmt::Display for StateCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StateCategory::CleanFinal => "clean final",
            StateCategory::UncleanFinal => "unclean final",
            StateCategory::Deadlock => "deadlock",
            StateCategory::NoWayToFinalMarking => "no way to final marking",
            StateCategory::Initial => "initial",
            StateCategory::SoundIntermediate => "sound intermediate",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SoundnessKind {
    #[default]
    Classical,
    Lazy,
    RelaxedLazy,
}

impl fmt::Display for SoundnessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SoundnessKind::Classical => write!(f, "classical"),
            SoundnessKind::Lazy => write!(f, "lazy"),
            SoundnessKind::RelaxedLazy => write!(f, "relaxed lazy"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SoundnessReport {
    pub kind: SoundnessKind,
    pub sound: bool,
    pub is_full_graph: bool,
    /// No `ω` marking and no strictly covered leaf.
    pub bounded: bool,
    pub categories: BTreeMap<StateId, StateCategory>,
    pub counts: BTreeMap<StateCategory, usize>,
    /// Labels of transitions that never label a non-silent arc.
    pub dead_transitions: Vec<String>,
    /// Dead transitions plus those whose every occurrence leads to a state
    /// from which no clean final state is reachable. Only filled for relaxed lazy.
    pub unfeasible_transitions: Vec<String>,
    /// Why the net is unsound; empty when sound.
    pub violations: Vec<String>,
}

impl SoundnessReport {
    pub fn count(&self, category: StateCategory) -> usize {
        self.counts.get(&category).copied().unwrap_or(0)
    }
}

fn is_clean_final(net: &DataPetriNet, space: &StateSpace, id: StateId) -> bool {
    holds_required(net, space, id) && !has_residual(net, space, id)
}

fn holds_required(net: &DataPetriNet, space: &StateSpace, id: StateId) -> bool {
    let final_marking = net.final_marking();
    let marking = &space.state(id).marking;
    net.final_places()
        .iter()
        .any(|&p| marking.get(p) == final_marking.get(p))
}

fn has_residual(net: &DataPetriNet, space: &StateSpace, id: StateId) -> bool {
    let final_places = net.final_places();
    let marking = &space.state(id).marking;
    (0..marking.len()).any(|p| !final_places.contains(&p) && !marking.get(p).is_zero())
}

/// Per state, whether some clean final state is reachable from it. A
/// non-strictly covered leaf continues like its ancestor.
pub fn reaches_final(net: &DataPetriNet, space: &StateSpace) -> Vec<bool> {
    let n = space.len();
    let mut predecessors: Vec<Vec<StateId>> = vec![Vec::new(); n];
    for arc in space.arcs() {
        predecessors[arc.target].push(arc.source);
    }
    for state in space.states() {
        if let Some(cover) = state.covering {
            if cover.kind == CoverKind::Nonstrict {
                predecessors[cover.ancestor].push(state.id);
            }
        }
    }
    let mut reaches = vec![false; n];
    let mut stack: Vec<StateId> = (0..n)
        .filter(|&id| is_clean_final(net, space, id))
        .collect();
    for &id in &stack {
        reaches[id] = true;
    }
    while let Some(id) = stack.pop() {
        for &pred in &predecessors[id] {
            if !reaches[pred] {
                reaches[pred] = true;
                stack.push(pred);
            }
        }
    }
    reaches
}

/// Assigns a category to every state of `space`.
pub fn classify(net: &DataPetriNet, space: &StateSpace) -> BTreeMap<StateId, StateCategory> {
    let has_successor =
        |id: StateId| space.outgoing(id).next().is_some() || space.state(id).covering.is_some();
    let reaches = reaches_final(net, space);

    (0..space.len())
        .map(|id| {
            let category = if is_clean_final(net, space, id) {
                StateCategory::CleanFinal
            } else if holds_required(net, space, id) {
                StateCategory::UncleanFinal
            } else if !has_successor(id) && has_residual(net, space, id) {
                StateCategory::Deadlock
            } else if !reaches[id] {
                StateCategory::NoWayToFinalMarking
            } else if id == 0 {
                StateCategory::Initial
            } else {
                StateCategory::SoundIntermediate
            };
            (id, category)
        })
        .collect()
}

/// Transitions that label no non-silent arc.
pub fn dead_transitions(net: &DataPetriNet, space: &StateSpace) -> BTreeSet<TransitionId> {
    let fired: BTreeSet<TransitionId> = space
        .arcs()
        .iter()
        .filter(|a| !a.silent)
        .map(|a| a.transition)
        .collect();
    (0..net.transitions.len())
        .filter(|t| !fired.contains(t))
        .collect()
}

pub fn analyze(net: &DataPetriNet, space: &StateSpace, kind: SoundnessKind) -> SoundnessReport {
    let categories = classify(net, space);
    let mut counts = BTreeMap::new();
    for category in categories.values() {
        *counts.entry(*category).or_insert(0) += 1;
    }
    let bounded = !space.has_omega()
        && space
            .states()
            .iter()
            .all(|s| !matches!(s.covering, Some(c) if c.kind == CoverKind::Strict));
    let dead = dead_transitions(net, space);
    let label = |t: &TransitionId| net.transitions[*t].label.clone();

    let mut violations = Vec::new();
    if !space.is_full_graph() {
        violations.push("the state space is incomplete".to_string());
    }
    let mut unfeasible_transitions = Vec::new();
    match kind {
        SoundnessKind::Classical | SoundnessKind::Lazy => {
            if !bounded {
                violations.push("the net is unbounded".to_string());
            }
            for (category, what) in [
                (StateCategory::Deadlock, "deadlock"),
                (StateCategory::NoWayToFinalMarking, "no way to the final marking"),
                (StateCategory::UncleanFinal, "unclean final marking"),
            ] {
                let n = counts.get(&category).copied().unwrap_or(0);
                if n > 0 {
                    violations.push(format!("{n} state(s) with {what}"));
                }
            }
        }
        SoundnessKind::RelaxedLazy => {
            let mut occurrences: BTreeMap<TransitionId, Vec<StateId>> = BTreeMap::new();
            for arc in space.arcs().iter().filter(|a| !a.silent) {
                occurrences.entry(arc.transition).or_default().push(arc.target);
            }
            // Deadlocks and unclean finals count too: they are categorised
            // first but cannot reach a clean final state either.
            let reaches = reaches_final(net, space);
            let unfeasible: BTreeSet<TransitionId> = (0..net.transitions.len())
                .filter(|t| match occurrences.get(t) {
                    None => true,
                    Some(targets) => targets.iter().all(|&s| !reaches[s]),
                })
                .collect();
            for t in &unfeasible {
                violations.push(format!("transition '{}' is unfeasible", label(t)));
            }
            unfeasible_transitions = unfeasible.iter().map(label).collect();
        }
    }

    let dead_transitions = match kind {
        SoundnessKind::Classical => Vec::new(),
        _ => dead.iter().map(label).collect(),
    };
    SoundnessReport {
        kind,
        sound: violations.is_empty(),
        is_full_graph: space.is_full_graph(),
        bounded,
        categories,
        counts,
        dead_transitions,
        unfeasible_transitions,
        violations,
    }
}

/// Places holding more than the final marking allows; used for reporting.
pub fn residual_places(net: &DataPetriNet, space: &StateSpace, id: StateId) -> Vec<String> {
    let final_marking = net.final_marking();
    let marking = &space.state(id).marking;
    net.places
        .iter()
        .filter(|p| match (marking.get(p.id), final_marking.get(p.id)) {
            (TokenCount::Omega, _) => true,
            (have, want) => have > want,
        })
        .map(|p| p.label.clone())
        .collect()
}
