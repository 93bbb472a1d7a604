//! Net refinement: transitions leaving a cycle are split by the formula of
//! the state they leave from, so that the refined net can tell apart
//! firings that stay in the cycle's data region from those that do not.

use std::collections::BTreeSet;

use dpn_ir::net::{DataPetriNet, TransitionId};
use dpn_smt::constraints::{ConstraintError, ConstraintSolver};
use dpn_smt::solver::SmtSolver;
use tracing::{debug, info};

use crate::composer::ConstraintComposer;
use crate::cycles::find_cycles;
use crate::explorer::{explore, CoveringPolicy, ExplorerOptions};

#[derive(Debug, Clone)]
pub struct Refinement {
    pub net: DataPetriNet,
    /// Transitions that were split, by their id before splitting.
    pub split: Vec<TransitionId>,
}

/// Refines `net` once over its coverability graph. Each transition is split
/// at most once per call.
pub fn refine<S: SmtSolver, C: ConstraintComposer>(
    net: &DataPetriNet,
    solver: &mut ConstraintSolver<S>,
    composer: &C,
    options: &ExplorerOptions,
) -> Result<Refinement, ConstraintError> {
    let graph_options = ExplorerOptions {
        policy: CoveringPolicy::OmegaAbstraction,
        silent_transitions: true,
        ..options.clone()
    };
    let graph = explore(net, solver, composer, &graph_options)?;
    let cycles = find_cycles(&graph);

    let mut refined = net.clone();
    let mut split = Vec::new();
    let mut seen = BTreeSet::new();
    for cycle in &cycles {
        for &a in &cycle.output_arcs {
            let arc = graph.arc(a);
            if arc.silent || !seen.insert(arc.transition) {
                continue;
            }
            let t = arc.transition;
            let guard = refined.transitions[t].guard.clone();
            let phi = &graph.state(arc.source).formula;
            let inside = solver.simplify(&guard.conjoin(phi))?;
            let outside = solver.simplify(&guard.conjoin(&phi.negate()))?;
            if inside.is_false() || outside.is_false() {
                continue;
            }
            debug!(
                transition = %refined.transitions[t].label,
                %inside,
                %outside,
                "splitting transition"
            );
            refined.split_transition(t, vec![inside, outside]);
            split.push(t);
        }
    }
    info!(
        cycles = cycles.len(),
        split = split.len(),
        "refinement finished"
    );
    Ok(Refinement {
        net: refined,
        split,
    })
}

#[cfg(test)]
mod tests {
    use dpn_ir::formula::{Domain, Formula, Value};
    use dpn_ir::formula_text::{parse, serialize};
    use dpn_ir::net::Node;

    use super::*;
    use crate::composer::ComposerChoice;

    /// `p` loops through `flip` (`b_w != b_r`) and leaves through `done`.
    fn toggle() -> DataPetriNet {
        let mut net = DataPetriNet::new("toggle");
        net.add_variable("b", Domain::Bool, Value::Bool(false)).unwrap();
        let domains = net.variable_domains();
        let p = net.add_place("p", 1, false);
        let o = net.add_place("o", 0, true);
        let flip = net.add_transition("flip", parse("b_w != b_r", &domains).unwrap());
        let done = net.add_transition("done", Formula::True);
        net.add_arc(Node::Place(p), Node::Transition(flip), 1).unwrap();
        net.add_arc(Node::Transition(flip), Node::Place(p), 1).unwrap();
        net.add_arc(Node::Place(p), Node::Transition(done), 1).unwrap();
        net.add_arc(Node::Transition(done), Node::Place(o), 1).unwrap();
        net
    }

    #[test]
    fn acyclic_nets_are_left_alone() {
        let mut net = DataPetriNet::new("line");
        let i = net.add_place("i", 1, false);
        let o = net.add_place("o", 0, true);
        let t = net.add_transition("t", Formula::True);
        net.add_arc(Node::Place(i), Node::Transition(t), 1).unwrap();
        net.add_arc(Node::Transition(t), Node::Place(o), 1).unwrap();

        let mut solver = ConstraintSolver::z3(0);
        let out = refine(&net, &mut solver, &ComposerChoice::Exact, &ExplorerOptions::default())
            .unwrap();
        assert!(out.split.is_empty());
        assert_eq!(out.net, net);
    }

    #[test]
    fn exits_of_a_data_cycle_are_split() {
        let net = toggle();
        let mut solver = ConstraintSolver::z3(0);
        let out = refine(&net, &mut solver, &ComposerChoice::Exact, &ExplorerOptions::default())
            .unwrap();
        assert!(!out.split.is_empty());
        assert!(out.net.transitions.len() > net.transitions.len());
        for t in &out.net.transitions[net.transitions.len()..] {
            assert!(t.is_split);
            assert_eq!(net.transitions[t.base_id].base_id, t.base_id);
        }
        for &t in &out.split {
            assert!(out.net.transitions[t].is_split);
            assert_ne!(serialize(&out.net.transitions[t].guard), "false");
        }
    }
}
