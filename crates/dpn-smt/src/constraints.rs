//! Formula-level constraint queries on top of an [`SmtSolver`].

use std::collections::HashMap;

use dpn_ir::formula::{Atom, CmpOp, Domain, Formula, Operand, Value, VarRef};
use num::rational::Rational64;
use num::{One, Signed, Zero};
use thiserror::Error;
use tracing::{trace, warn};

use crate::backends::smtlib_printer::to_smtlib;
use crate::backends::z3_backend::Z3Solver;
use crate::encoder::FormulaEncoder;
use crate::qe;
use crate::solver::{SatResult, SmtSolver};
use crate::sorts::SmtSort;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintError {
    #[error("solver backend error: {0}")]
    Backend(String),
    #[error("solver could not decide a query: {0}")]
    Inconclusive(String),
}

/// Direction of [`ConstraintSolver::optimize`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Objective {
    Minimize,
    Maximize,
}

/// Tightest bound of a variable under a set of constraints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Optimum {
    /// Supremum (maximize) or infimum (minimize), and whether some solution
    /// reaches it.
    Bounded { value: Rational64, attained: bool },
    Unbounded,
    Infeasible,
}

/// Query counters, reported at debug level by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolverStats {
    pub checks: u64,
    pub equivalence_checks: u64,
}

pub struct ConstraintSolver<S: SmtSolver = Z3Solver> {
    backend: S,
    encoder: FormulaEncoder,
    declared: HashMap<String, SmtSort>,
    stats: SolverStats,
}

impl ConstraintSolver<Z3Solver> {
    /// A facade over a fresh Z3 solver; `timeout_secs == 0` disables the
    /// per-query timeout.
    pub fn z3(timeout_secs: u64) -> Self {
        Self::new(Z3Solver::with_timeout_secs(timeout_secs))
    }
}

impl<S: SmtSolver> ConstraintSolver<S> {
    pub fn new(backend: S) -> Self {
        Self {
            backend,
            encoder: FormulaEncoder::new(),
            declared: HashMap::new(),
            stats: SolverStats::default(),
        }
    }

    pub fn stats(&self) -> SolverStats {
        self.stats
    }

    fn backend_err(e: S::Error) -> ConstraintError {
        ConstraintError::Backend(e.to_string())
    }

    fn declare(&mut self, formula: &Formula) -> Result<(), ConstraintError> {
        for (name, sort) in FormulaEncoder::declarations(formula) {
            if self.declared.get(&name) == Some(&sort) {
                continue;
            }
            self.backend
                .declare_var(&name, &sort)
                .map_err(Self::backend_err)?;
            self.declared.insert(name, sort);
        }
        Ok(())
    }

    /// Raw three-valued check.
    pub fn check(&mut self, formula: &Formula) -> Result<SatResult, ConstraintError> {
        match formula {
            Formula::True => return Ok(SatResult::Sat),
            Formula::False => return Ok(SatResult::Unsat),
            _ => {}
        }
        self.declare(formula)?;
        let term = self.encoder.encode(formula);
        trace!(query = %to_smtlib(&term), "check-sat");
        self.stats.checks += 1;
        self.backend
            .check_scoped(&term)
            .map_err(Self::backend_err)
    }

    pub fn satisfiable(&mut self, formula: &Formula) -> Result<bool, ConstraintError> {
        match self.check(formula)? {
            SatResult::Sat => Ok(true),
            SatResult::Unsat => Ok(false),
            SatResult::Unknown(reason) => {
                warn!(formula = %formula, %reason, "solver returned unknown");
                Err(ConstraintError::Inconclusive(reason))
            }
        }
    }

    /// Whether every assignment satisfies `formula`.
    pub fn valid(&mut self, formula: &Formula) -> Result<bool, ConstraintError> {
        Ok(!self.satisfiable(&formula.negate())?)
    }

    /// Whether `lhs` entails `rhs`.
    pub fn implies(&mut self, lhs: &Formula, rhs: &Formula) -> Result<bool, ConstraintError> {
        Ok(!self.satisfiable(&Formula::and([lhs.clone(), rhs.negate()]))?)
    }

    /// Logical equivalence, decided by the solver.
    pub fn equivalent(&mut self, lhs: &Formula, rhs: &Formula) -> Result<bool, ConstraintError> {
        if lhs == rhs {
            return Ok(true);
        }
        self.stats.equivalence_checks += 1;
        let differ = Formula::or([
            Formula::and([lhs.clone(), rhs.negate()]),
            Formula::and([lhs.negate(), rhs.clone()]),
        ]);
        Ok(!self.satisfiable(&differ)?)
    }

    /// Drops unsatisfiable disjuncts and duplicate ones.
    pub fn prune(&mut self, formula: &Formula) -> Result<Formula, ConstraintError> {
        if matches!(formula, Formula::True | Formula::False) {
            return Ok(formula.clone());
        }
        let mut kept = Vec::new();
        for conj in formula.disjuncts() {
            if self.satisfiable(&Formula::conjunction(conj.clone()))? {
                kept.push(conj);
            }
        }
        Ok(Formula::from_disjuncts(kept))
    }

    /// Equivalent formula in DNF with unsatisfiable disjuncts, redundant
    /// atoms and subsumed disjuncts removed.
    pub fn simplify(&mut self, formula: &Formula) -> Result<Formula, ConstraintError> {
        let pruned = self.prune(formula)?;
        if matches!(pruned, Formula::True | Formula::False) {
            return Ok(pruned);
        }
        if self.valid(&pruned)? {
            return Ok(Formula::True);
        }
        let mut disjuncts = Vec::new();
        for conj in pruned.disjuncts() {
            disjuncts.push(self.drop_redundant_atoms(conj)?);
        }
        // Of two equivalent disjuncts the first one stays.
        let mut kept: Vec<Vec<Atom>> = Vec::new();
        'next: for conj in disjuncts {
            let this = Formula::conjunction(conj.clone());
            for other in &kept {
                if self.implies(&this, &Formula::conjunction(other.clone()))? {
                    continue 'next;
                }
            }
            let mut retained = Vec::with_capacity(kept.len());
            for other in kept {
                if !self.implies(&Formula::conjunction(other.clone()), &this)? {
                    retained.push(other);
                }
            }
            retained.push(conj);
            kept = retained;
        }
        Ok(Formula::from_disjuncts(kept))
    }

    fn drop_redundant_atoms(&mut self, conj: Vec<Atom>) -> Result<Vec<Atom>, ConstraintError> {
        let mut atoms = conj;
        let mut i = 0;
        while i < atoms.len() {
            let others: Vec<Atom> = atoms
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, a)| a.clone())
                .collect();
            let candidate = Formula::Atom(atoms[i].clone());
            if self.implies(&Formula::conjunction(others), &candidate)? {
                atoms.remove(i);
            } else {
                i += 1;
            }
        }
        Ok(atoms)
    }

    /// `∃ vars. formula` without quantifiers; unsatisfiable disjuncts of the
    /// projection are dropped.
    pub fn eliminate_exists(
        &mut self,
        vars: &[VarRef],
        formula: &Formula,
    ) -> Result<Formula, ConstraintError> {
        let projected = qe::eliminate(vars, formula);
        self.prune(&projected)
    }

    /// Tightest bound of the numeric variable `var` subject to
    /// `constraints`.
    pub fn optimize(
        &mut self,
        objective: Objective,
        var: &VarRef,
        constraints: &Formula,
    ) -> Result<Optimum, ConstraintError> {
        if !var.domain.is_numeric() {
            return Err(ConstraintError::Backend(format!(
                "cannot optimize {} variable '{var}'",
                var.domain
            )));
        }
        if !self.satisfiable(constraints)? {
            return Ok(Optimum::Infeasible);
        }
        let atoms = constraints.atoms();
        let mut magnitude = Rational64::one() + Rational64::from_integer(atoms.len() as i64);
        let mut candidates = Vec::new();
        for atom in &atoms {
            match &atom.rhs {
                Operand::Const(c) => {
                    if let Some(r) = c.as_rational() {
                        magnitude += r.abs();
                        candidates.push(r);
                    }
                }
                Operand::Var { offset, .. } => {
                    magnitude += offset.abs();
                }
            }
        }
        let offsets: Vec<Rational64> = atoms
            .iter()
            .filter_map(|a| match &a.rhs {
                Operand::Var { offset, .. } if !offset.is_zero() => Some(*offset),
                _ => None,
            })
            .collect();
        let bound = magnitude.ceil();
        let beyond = match objective {
            Objective::Maximize => CmpOp::Gt,
            Objective::Minimize => CmpOp::Lt,
        };
        let limit = match objective {
            Objective::Maximize => bound,
            Objective::Minimize => -bound,
        };
        if self.satisfiable(&bounded(constraints, var, beyond, limit))? {
            return Ok(Optimum::Unbounded);
        }
        match var.domain {
            Domain::Int => self.optimize_int(objective, var, constraints, bound.to_integer()),
            _ => {
                let mut all = candidates.clone();
                for c in &candidates {
                    for k in &offsets {
                        all.push(*c + *k);
                        all.push(*c - *k);
                    }
                }
                self.optimize_real(objective, var, constraints, all)
            }
        }
    }

    /// Binary search over `[-bound, bound]` for the extreme integer value.
    fn optimize_int(
        &mut self,
        objective: Objective,
        var: &VarRef,
        constraints: &Formula,
        bound: i64,
    ) -> Result<Optimum, ConstraintError> {
        // Maximize: largest m with `var >= m` satisfiable. Minimize: smallest
        // m with `var <= m` satisfiable.
        let (toward, mut feasible, mut infeasible) = match objective {
            Objective::Maximize => (CmpOp::Ge, -bound - 1, bound + 1),
            Objective::Minimize => (CmpOp::Le, bound + 1, -bound - 1),
        };
        let mut widen = 0;
        while !self.satisfiable(&bounded(constraints, var, toward, feasible.into()))? {
            widen += 1;
            if widen > 62 {
                return Err(ConstraintError::Inconclusive(format!(
                    "no finite bound found for '{var}'"
                )));
            }
            infeasible = feasible;
            feasible = feasible.saturating_mul(2);
        }
        while (infeasible - feasible).abs() > 1 {
            let mid = feasible + (infeasible - feasible) / 2;
            if self.satisfiable(&bounded(constraints, var, toward, mid.into()))? {
                feasible = mid;
            } else {
                infeasible = mid;
            }
        }
        Ok(Optimum::Bounded {
            value: feasible.into(),
            attained: true,
        })
    }

    /// The supremum of a real variable under difference constraints is
    /// one of the constants shifted by offsets.
    fn optimize_real(
        &mut self,
        objective: Objective,
        var: &VarRef,
        constraints: &Formula,
        mut candidates: Vec<Rational64>,
    ) -> Result<Optimum, ConstraintError> {
        candidates.sort();
        candidates.dedup();
        let beyond = match objective {
            Objective::Maximize => CmpOp::Gt,
            Objective::Minimize => {
                candidates.reverse();
                CmpOp::Lt
            }
        };
        for c in candidates {
            if !self.satisfiable(&bounded(constraints, var, beyond, c))? {
                let attained = self.satisfiable(&bounded(constraints, var, CmpOp::Eq, c))?;
                return Ok(Optimum::Bounded { value: c, attained });
            }
        }
        Err(ConstraintError::Inconclusive(format!(
            "no bound candidate for '{var}'"
        )))
    }
}

/// `constraints ∧ var op value`; integer bounds are truncated.
fn bounded(constraints: &Formula, var: &VarRef, op: CmpOp, value: Rational64) -> Formula {
    let value =
        Value::numeric(var.domain, value).unwrap_or_else(|| Value::Int(value.to_integer()));
    Formula::and([
        constraints.clone(),
        Formula::Atom(Atom::with_const(var.clone(), op, value)),
    ])
}
