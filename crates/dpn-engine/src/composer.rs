//! Path formula composition: the constraint on the data after a transition
//! fires, given the constraint before it and the transition's guard.

use std::collections::BTreeSet;

use dpn_ir::formula::{Atom, CmpOp, Formula, Operand, Value, VarRef};
use dpn_smt::constraints::{ConstraintError, ConstraintSolver, Objective, Optimum};
use dpn_smt::qe;
use dpn_smt::solver::SmtSolver;
use num::rational::Rational64;
use serde::Serialize;
use tracing::trace;

/// Strategy for eliminating the overwritten values of a firing.
///
/// `source` only mentions read-tagged variables. The result does too: the
/// old values of every variable the guard writes are projected out and the
/// write-tagged instances become the new read-tagged ones.
pub trait ConstraintComposer {
    fn compose<S: SmtSolver>(
        &self,
        solver: &mut ConstraintSolver<S>,
        source: &Formula,
        guard: &Formula,
    ) -> Result<Formula, ConstraintError>;
}

/// Quantifier elimination per guard disjunct.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactComposer;

/// Bound substitution through directed optimization. Agrees with
/// [`ExactComposer`] when each overwritten variable occurs in at most one
/// relational atom.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicComposer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ComposerChoice {
    #[default]
    Exact,
    Heuristic,
}

impl ConstraintComposer for ComposerChoice {
    fn compose<S: SmtSolver>(
        &self,
        solver: &mut ConstraintSolver<S>,
        source: &Formula,
        guard: &Formula,
    ) -> Result<Formula, ConstraintError> {
        match self {
            ComposerChoice::Exact => ExactComposer.compose(solver, source, guard),
            ComposerChoice::Heuristic => HeuristicComposer.compose(solver, source, guard),
        }
    }
}

/// Read-tagged instances in `formula` of the variables in `written`.
fn old_instances(formula: &Formula, written: &BTreeSet<String>) -> Vec<VarRef> {
    formula
        .variables()
        .into_iter()
        .filter(|v| !v.is_write() && written.contains(&v.name))
        .collect()
}

impl ConstraintComposer for ExactComposer {
    fn compose<S: SmtSolver>(
        &self,
        solver: &mut ConstraintSolver<S>,
        source: &Formula,
        guard: &Formula,
    ) -> Result<Formula, ConstraintError> {
        let mut parts = Vec::new();
        for conj in guard.disjuncts() {
            let disjunct = Formula::conjunction(conj);
            let written = disjunct.written_variables();
            let combined = Formula::and([source.clone(), disjunct]);
            let olds = old_instances(&combined, &written);
            let projected = solver.eliminate_exists(&olds, &combined)?;
            parts.push(projected.promote_writes());
        }
        let composed = solver.prune(&Formula::or(parts))?;
        trace!(%source, %guard, %composed, "exact compose");
        Ok(composed)
    }
}

impl ConstraintComposer for HeuristicComposer {
    fn compose<S: SmtSolver>(
        &self,
        solver: &mut ConstraintSolver<S>,
        source: &Formula,
        guard: &Formula,
    ) -> Result<Formula, ConstraintError> {
        let sources = source.disjuncts();
        let mut parts = Vec::new();
        for guard_conj in guard.disjuncts() {
            let written = Formula::conjunction(guard_conj.clone()).written_variables();
            for source_conj in &sources {
                let mut conj = source_conj.clone();
                for atom in &guard_conj {
                    if !conj.contains(atom) {
                        conj.push(atom.clone());
                    }
                }
                let olds = old_instances(&Formula::conjunction(conj.clone()), &written);
                let mut current = vec![conj];
                for old in &olds {
                    let mut next = Vec::new();
                    for c in current {
                        next.extend(substitute_bounds(solver, old, c)?);
                    }
                    current = next;
                }
                parts.push(Formula::from_disjuncts(current).promote_writes());
            }
        }
        let composed = solver.prune(&Formula::or(parts))?;
        trace!(%source, %guard, %composed, "heuristic compose");
        Ok(composed)
    }
}

/// Removes `old` from one conjunction.
fn substitute_bounds<S: SmtSolver>(
    solver: &mut ConstraintSolver<S>,
    old: &VarRef,
    conj: Vec<Atom>,
) -> Result<Vec<Vec<Atom>>, ConstraintError> {
    let full = Formula::conjunction(conj.clone());
    if !solver.satisfiable(&full)? {
        return Ok(Vec::new());
    }
    // Equalities pin `old`; a disequality to another variable matters when
    // the rest pins it. Both go through exact projection.
    let needs_projection = conj.iter().any(|a| {
        a.mentions(old)
            && match relation(a, old) {
                Some((op, other, _)) => other != *old && matches!(op, CmpOp::Eq | CmpOp::Ne),
                None => a.op == CmpOp::Eq,
            }
    });
    if needs_projection || !old.domain.is_numeric() {
        return Ok(qe::eliminate(std::slice::from_ref(old), &full).disjuncts());
    }
    let mut out = Vec::with_capacity(conj.len());
    for atom in conj {
        if !atom.mentions(old) {
            out.push(atom);
            continue;
        }
        let Some((op, other, offset)) = relation(&atom, old) else {
            continue;
        };
        if other == *old {
            continue;
        }
        // old op other + offset  <=>  other flip(op) old - offset
        let objective = match op {
            CmpOp::Lt | CmpOp::Le => Objective::Minimize,
            _ => Objective::Maximize,
        };
        match solver.optimize(objective, old, &full)? {
            Optimum::Infeasible => return Ok(Vec::new()),
            Optimum::Unbounded => {}
            Optimum::Bounded { value, attained } => {
                let strict = op.is_strict() || !attained;
                let bound_op = match (op.flip(), strict) {
                    (CmpOp::Gt | CmpOp::Ge, true) => CmpOp::Gt,
                    (CmpOp::Lt | CmpOp::Le, true) => CmpOp::Lt,
                    (flipped, _) => flipped,
                };
                out.push(bound_atom(other, bound_op, value - offset));
            }
        }
    }
    Ok(vec![out])
}

/// Reads `atom` as `old op other + offset`; `None` for constant atoms.
fn relation(atom: &Atom, old: &VarRef) -> Option<(CmpOp, VarRef, Rational64)> {
    match &atom.rhs {
        Operand::Var { var, offset } if atom.lhs == *old => Some((atom.op, var.clone(), *offset)),
        Operand::Var { var, offset } if var == old => {
            Some((atom.op.flip(), atom.lhs.clone(), -*offset))
        }
        _ => None,
    }
}

/// `var op value`, rounded to an equivalent integer bound when needed.
fn bound_atom(var: VarRef, op: CmpOp, value: Rational64) -> Atom {
    if let Some(v) = Value::numeric(var.domain, value) {
        return Atom::with_const(var, op, v);
    }
    let (op, rounded) = match op {
        CmpOp::Gt | CmpOp::Ge => (CmpOp::Gt, value.floor()),
        _ => (CmpOp::Lt, value.ceil()),
    };
    Atom::with_const(var, op, Value::Int(rounded.to_integer()))
}
