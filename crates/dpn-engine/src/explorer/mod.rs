//! Worklist construction of the symbolic state space.
//!
//! One engine builds all three graph kinds; the [`CoveringPolicy`] decides
//! what happens when a firing reaches a marking/formula pair:
//!
//! - `Exact` merges it into an equivalent state and aborts once a marking
//!   strictly dominates an ancestor with an equivalent formula.
//! - `OmegaAbstraction` accelerates such markings to `ω` instead.
//! - `Tree` never merges and stops at covered leaves.
//!
//! Two states are the same iff their markings are equal and the solver
//! proves their formulas equivalent.

pub mod coloring;
mod limits;
pub mod policy;
pub mod state_space;

use dpn_ir::formula::Formula;
use dpn_ir::marking::{Marking, MarkingOrder};
use dpn_ir::net::{DataPetriNet, TransitionId};
use dpn_smt::constraints::{ConstraintError, ConstraintSolver};
use dpn_smt::solver::SmtSolver;
use tracing::{debug, info, warn};

use crate::composer::ConstraintComposer;
use limits::Limits;

pub use coloring::color_tree;
pub use policy::CoveringPolicy;
pub use state_space::{
    AbortReason, ArcId, Color, CoverKind, Covering, StateArc, StateId, StateNode, StateSpace,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExplorerOptions {
    pub policy: CoveringPolicy,
    /// Add a silent refinement arc for every transition a state only
    /// partially enables.
    pub silent_transitions: bool,
    /// `0` means unlimited.
    pub max_states: usize,
    /// Wall-clock limit in seconds; `0` means unlimited.
    pub timeout_secs: u64,
}

impl Default for ExplorerOptions {
    fn default() -> Self {
        Self {
            policy: CoveringPolicy::Exact,
            silent_transitions: true,
            max_states: 100_000,
            timeout_secs: 0,
        }
    }
}

impl ExplorerOptions {
    pub fn with_policy(policy: CoveringPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }
}

/// Builds the state space of `net` under `options.policy`.
pub fn explore<S: SmtSolver, C: ConstraintComposer>(
    net: &DataPetriNet,
    solver: &mut ConstraintSolver<S>,
    composer: &C,
    options: &ExplorerOptions,
) -> Result<StateSpace, ConstraintError> {
    Explorer::new(net, solver, composer, options)?.run()
}

struct Explorer<'a, S: SmtSolver, C: ConstraintComposer> {
    net: &'a DataPetriNet,
    solver: &'a mut ConstraintSolver<S>,
    composer: &'a C,
    options: &'a ExplorerOptions,
    space: StateSpace,
    frontier: Vec<StateId>,
    /// Guards with the write-tagged instances projected out.
    read_guards: Vec<Formula>,
    negated_read_guards: Vec<Formula>,
    limits: Limits,
}

impl<'a, S: SmtSolver, C: ConstraintComposer> Explorer<'a, S, C> {
    fn new(
        net: &'a DataPetriNet,
        solver: &'a mut ConstraintSolver<S>,
        composer: &'a C,
        options: &'a ExplorerOptions,
    ) -> Result<Self, ConstraintError> {
        let mut read_guards = Vec::with_capacity(net.transitions.len());
        for t in &net.transitions {
            let writes: Vec<_> = t
                .guard
                .variables()
                .into_iter()
                .filter(|v| v.is_write())
                .collect();
            read_guards.push(solver.eliminate_exists(&writes, &t.guard)?);
        }
        let negated_read_guards = read_guards.iter().map(Formula::negate).collect();
        Ok(Self {
            net,
            solver,
            composer,
            options,
            space: StateSpace::new(options.policy),
            frontier: Vec::new(),
            read_guards,
            negated_read_guards,
            limits: Limits::start(options.max_states, options.timeout_secs),
        })
    }

    fn run(mut self) -> Result<StateSpace, ConstraintError> {
        info!(
            net = %self.net.name,
            policy = %self.options.policy,
            "building {}",
            self.options.policy.graph_kind()
        );
        let root = self.space.add_state(
            self.net.initial_marking(),
            self.net.initial_formula(),
            None,
        );
        self.frontier.push(root);

        while let Some(s) = self.frontier.pop() {
            if let Some(reason) = self.limits.check(self.space.len()) {
                warn!(?reason, states = self.space.len(), "exploration limit reached");
                self.space.abort(reason);
                break;
            }
            self.expand(s)?;
            if self.space.abort_reason().is_some() {
                break;
            }
        }

        self.space.finish();
        info!(
            states = self.space.len(),
            arcs = self.space.arcs().len(),
            full = self.space.is_full_graph(),
            checks = self.solver.stats().checks,
            "exploration finished"
        );
        Ok(self.space)
    }

    fn expand(&mut self, s: StateId) -> Result<(), ConstraintError> {
        let marking = self.space.state(s).marking.clone();
        let formula = self.space.state(s).formula.clone();
        debug!(state = s, %marking, %formula, "expanding");

        for t in 0..self.net.transitions.len() {
            if self.space.abort_reason().is_some() {
                return Ok(());
            }
            let Some(next) = self.net.fire(t, &marking) else {
                continue;
            };
            if self
                .solver
                .satisfiable(&formula.conjoin(&self.read_guards[t]))?
            {
                let guard = &self.net.transitions[t].guard;
                let composed = self.composer.compose(self.solver, &formula, guard)?;
                if !composed.is_false() && self.solver.satisfiable(&composed)? {
                    debug!(
                        state = s,
                        transition = %self.net.transitions[t].label,
                        marking = %next,
                        "fire"
                    );
                    self.register(s, t, false, next, composed)?;
                }
            }
            if self.options.silent_transitions {
                self.refine_silently(s, t, &marking, &formula)?;
            }
        }
        Ok(())
    }

    /// Splits off the part of `formula` in which `t` is disabled.
    fn refine_silently(
        &mut self,
        s: StateId,
        t: TransitionId,
        marking: &Marking,
        formula: &Formula,
    ) -> Result<(), ConstraintError> {
        let negated = &self.negated_read_guards[t];
        if negated.is_true() || negated.is_false() {
            return Ok(());
        }
        let refined = formula.conjoin(negated);
        if !self.solver.satisfiable(&refined)? || self.solver.equivalent(&refined, formula)? {
            return Ok(());
        }
        debug!(state = s, transition = %self.net.transitions[t].label, "silent refinement");
        self.register(s, t, true, marking.clone(), refined)
    }

    fn register(
        &mut self,
        source: StateId,
        t: TransitionId,
        silent: bool,
        marking: Marking,
        formula: Formula,
    ) -> Result<(), ConstraintError> {
        let lineage: Vec<StateId> = self.space.lineage(source).collect();
        match self.options.policy {
            CoveringPolicy::Exact => {
                if let Some(dominated) = self.dominated_ancestor(&lineage, &marking, &formula)? {
                    warn!(
                        state = dominated,
                        %marking,
                        "marking strictly dominates an ancestor; net is unbounded"
                    );
                    self.space.abort(AbortReason::Unbounded { state: dominated });
                    return Ok(());
                }
                self.merge_or_create(source, t, silent, marking, formula)
            }
            CoveringPolicy::OmegaAbstraction => {
                let mut marking = marking;
                for &a in &lineage {
                    let ancestor = self.space.state(a);
                    if marking.compare(&ancestor.marking) == MarkingOrder::GreaterThan
                        && self.solver.equivalent(&formula, &ancestor.formula)?
                    {
                        marking = marking.accelerate(&ancestor.marking);
                        debug!(ancestor = a, %marking, "accelerated");
                    }
                }
                self.merge_or_create(source, t, silent, marking, formula)
            }
            CoveringPolicy::Tree => {
                let id = self.create(source, t, silent, marking, formula);
                for &a in &lineage {
                    let ancestor = self.space.state(a);
                    let kind = match self.space.state(id).marking.compare(&ancestor.marking) {
                        MarkingOrder::Equal => CoverKind::Nonstrict,
                        MarkingOrder::GreaterThan => CoverKind::Strict,
                        _ => continue,
                    };
                    if self
                        .solver
                        .equivalent(&self.space.state(id).formula, &ancestor.formula)?
                    {
                        debug!(state = id, ancestor = a, ?kind, "covered");
                        self.space.set_covering(id, Covering { kind, ancestor: a });
                        return Ok(());
                    }
                }
                self.frontier.push(id);
                Ok(())
            }
        }
    }

    fn dominated_ancestor(
        &mut self,
        lineage: &[StateId],
        marking: &Marking,
        formula: &Formula,
    ) -> Result<Option<StateId>, ConstraintError> {
        for &a in lineage {
            let ancestor = self.space.state(a);
            if marking.compare(&ancestor.marking) == MarkingOrder::GreaterThan
                && self.solver.equivalent(formula, &ancestor.formula)?
            {
                return Ok(Some(a));
            }
        }
        Ok(None)
    }

    fn merge_or_create(
        &mut self,
        source: StateId,
        t: TransitionId,
        silent: bool,
        marking: Marking,
        formula: Formula,
    ) -> Result<(), ConstraintError> {
        let candidates = self.space.with_marking(&marking).to_vec();
        for existing in candidates {
            if self
                .solver
                .equivalent(&formula, &self.space.state(existing).formula)?
            {
                self.space.add_arc(source, existing, t, silent);
                return Ok(());
            }
        }
        let id = self.create(source, t, silent, marking, formula);
        self.frontier.push(id);
        Ok(())
    }

    fn create(
        &mut self,
        source: StateId,
        t: TransitionId,
        silent: bool,
        marking: Marking,
        formula: Formula,
    ) -> StateId {
        let id = self.space.add_state(marking, formula, Some(source));
        self.space.add_arc(source, id, t, silent);
        id
    }
}

#[cfg(test)]
mod tests {
    use dpn_ir::formula::{Domain, Value};
    use dpn_ir::formula_text::parse;
    use dpn_ir::net::Node;

    use super::*;
    use crate::composer::ComposerChoice;

    /// `p0 -[x_w >= 0]-> p1 -[x_r < 3]-> p2`
    fn guarded_chain() -> DataPetriNet {
        let mut net = DataPetriNet::new("chain");
        net.add_variable("x", Domain::Int, Value::Int(0)).unwrap();
        let domains = net.variable_domains();
        let p: Vec<_> = (0..3)
            .map(|i| net.add_place(format!("p{i}"), u32::from(i == 0), i == 2))
            .collect();
        let t1 = net.add_transition("t1", parse("x_w >= 0", &domains).unwrap());
        let t2 = net.add_transition("t2", parse("x_r < 3", &domains).unwrap());
        for (t, from, to) in [(t1, p[0], p[1]), (t2, p[1], p[2])] {
            net.add_arc(Node::Place(from), Node::Transition(t), 1).unwrap();
            net.add_arc(Node::Transition(t), Node::Place(to), 1).unwrap();
        }
        net
    }

    fn self_loop() -> DataPetriNet {
        let mut net = DataPetriNet::new("loop");
        let p = net.add_place("p", 1, true);
        let t = net.add_transition("t", Formula::True);
        net.add_arc(Node::Place(p), Node::Transition(t), 1).unwrap();
        net.add_arc(Node::Transition(t), Node::Place(p), 1).unwrap();
        net
    }

    fn run(net: &DataPetriNet, options: &ExplorerOptions) -> StateSpace {
        let mut solver = ConstraintSolver::z3(0);
        explore(net, &mut solver, &ComposerChoice::Exact, options).unwrap()
    }

    #[test]
    fn exact_policy_merges_equivalent_states() {
        let space = run(&self_loop(), &ExplorerOptions::default());
        assert_eq!(space.len(), 1);
        assert_eq!(space.arcs().len(), 1);
        assert_eq!(space.arc(0).target, 0);
        assert!(space.is_full_graph());
    }

    #[test]
    fn tree_policy_stops_at_covered_leaf() {
        let space = run(&self_loop(), &ExplorerOptions::with_policy(CoveringPolicy::Tree));
        assert_eq!(space.len(), 2);
        assert_eq!(
            space.state(1).covering,
            Some(Covering {
                kind: CoverKind::Nonstrict,
                ancestor: 0
            })
        );
        assert!(space.is_full_graph());
    }

    #[test]
    fn silent_refinement_splits_partially_enabled_states() {
        let net = guarded_chain();
        let space = run(&net, &ExplorerOptions::default());
        assert_eq!(space.len(), 4);
        assert_eq!(space.arcs().len(), 3);
        let silent: Vec<_> = space.arcs().iter().filter(|a| a.silent).collect();
        assert_eq!(silent.len(), 1);
        assert_eq!(silent[0].transition, 1);
        let refined = space.state(silent[0].target);
        assert_eq!(refined.marking, space.state(silent[0].source).marking);

        let plain = run(
            &net,
            &ExplorerOptions {
                silent_transitions: false,
                ..ExplorerOptions::default()
            },
        );
        assert_eq!(plain.len(), 3);
        assert_eq!(plain.arcs().len(), 2);
    }

    #[test]
    fn state_limit_leaves_a_partial_graph() {
        let space = run(
            &guarded_chain(),
            &ExplorerOptions {
                max_states: 2,
                ..ExplorerOptions::default()
            },
        );
        assert!(!space.is_full_graph());
        assert_eq!(
            space.abort_reason(),
            Some(&AbortReason::StateLimit { limit: 2 })
        );
    }
}
