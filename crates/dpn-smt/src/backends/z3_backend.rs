use std::collections::HashMap;

use thiserror::Error;
use z3::ast::{Bool, Int, Real};
use z3::SatResult as Z3SatResult;

use crate::solver::{SatResult, SmtSolver};
use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Error)]
pub enum Z3Error {
    #[error("Z3 error: {0}")]
    Internal(String),
    #[error("Unknown variable: {0}")]
    UnknownVariable(String),
    #[error("Sort mismatch: {0}")]
    SortMismatch(String),
}

pub struct Z3Solver {
    solver: z3::Solver,
    vars: HashMap<String, Z3Term>,
    params: Option<z3::Params>,
}

impl Z3Solver {
    pub fn new() -> Self {
        Self {
            solver: z3::Solver::new(),
            vars: HashMap::new(),
            params: None,
        }
    }

    /// A solver that answers `unknown` once a single check exceeds the
    /// timeout. Zero disables the timeout.
    pub fn with_timeout_secs(timeout_secs: u64) -> Self {
        if timeout_secs == 0 {
            return Self::new();
        }
        let solver = z3::Solver::new();
        let mut params = z3::Params::new();
        let timeout_ms = timeout_secs.saturating_mul(1000).min(u64::from(u32::MAX));
        params.set_u32("timeout", timeout_ms as u32);
        solver.set_params(&params);
        Self {
            solver,
            vars: HashMap::new(),
            params: Some(params),
        }
    }

    fn translate_term(&self, term: &SmtTerm) -> Result<Z3Term, Z3Error> {
        match term {
            SmtTerm::Var(name) => self
                .vars
                .get(name)
                .cloned()
                .ok_or_else(|| Z3Error::UnknownVariable(name.clone())),
            SmtTerm::IntLit(n) => Ok(Z3Term::Int(Int::from_i64(*n))),
            SmtTerm::BoolLit(b) => Ok(Z3Term::Bool(Bool::from_bool(*b))),
            SmtTerm::Add(lhs, rhs) => match self.numeric_pair(lhs, rhs, "+")? {
                NumPair::Int(l, r) => Ok(Z3Term::Int(&l + &r)),
                NumPair::Real(l, r) => Ok(Z3Term::Real(&l + &r)),
            },
            SmtTerm::Mul(lhs, rhs) => match self.numeric_pair(lhs, rhs, "*")? {
                NumPair::Int(l, r) => Ok(Z3Term::Int(&l * &r)),
                NumPair::Real(l, r) => Ok(Z3Term::Real(&l * &r)),
            },
            SmtTerm::Eq(lhs, rhs) => {
                let l = self.translate_term(lhs)?;
                let r = self.translate_term(rhs)?;
                match (l, r) {
                    (Z3Term::Bool(lb), Z3Term::Bool(rb)) => Ok(Z3Term::Bool(lb.eq(&rb))),
                    (l, r) => match promote(l, r, "=")? {
                        NumPair::Int(li, ri) => Ok(Z3Term::Bool(li.eq(&ri))),
                        NumPair::Real(lr, rr) => Ok(Z3Term::Bool(lr.eq(&rr))),
                    },
                }
            }
            SmtTerm::Lt(lhs, rhs) => match self.numeric_pair(lhs, rhs, "<")? {
                NumPair::Int(l, r) => Ok(Z3Term::Bool(l.lt(&r))),
                NumPair::Real(l, r) => Ok(Z3Term::Bool(l.lt(&r))),
            },
            SmtTerm::Le(lhs, rhs) => match self.numeric_pair(lhs, rhs, "<=")? {
                NumPair::Int(l, r) => Ok(Z3Term::Bool(l.le(&r))),
                NumPair::Real(l, r) => Ok(Z3Term::Bool(l.le(&r))),
            },
            SmtTerm::Gt(lhs, rhs) => match self.numeric_pair(lhs, rhs, ">")? {
                NumPair::Int(l, r) => Ok(Z3Term::Bool(l.gt(&r))),
                NumPair::Real(l, r) => Ok(Z3Term::Bool(l.gt(&r))),
            },
            SmtTerm::Ge(lhs, rhs) => match self.numeric_pair(lhs, rhs, ">=")? {
                NumPair::Int(l, r) => Ok(Z3Term::Bool(l.ge(&r))),
                NumPair::Real(l, r) => Ok(Z3Term::Bool(l.ge(&r))),
            },
            SmtTerm::And(terms) => {
                let bools = self.translate_bools(terms)?;
                let refs: Vec<&Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(Bool::and(&refs)))
            }
            SmtTerm::Or(terms) => {
                let bools = self.translate_bools(terms)?;
                let refs: Vec<&Bool> = bools.iter().collect();
                Ok(Z3Term::Bool(Bool::or(&refs)))
            }
            SmtTerm::Not(inner) => {
                let b = self.translate_term(inner)?.into_bool()?;
                Ok(Z3Term::Bool(b.not()))
            }
        }
    }

    fn translate_bools(&self, terms: &[SmtTerm]) -> Result<Vec<Bool>, Z3Error> {
        terms
            .iter()
            .map(|t| self.translate_term(t).and_then(Z3Term::into_bool))
            .collect()
    }

    fn numeric_pair(&self, lhs: &SmtTerm, rhs: &SmtTerm, op: &str) -> Result<NumPair, Z3Error> {
        let l = self.translate_term(lhs)?;
        let r = self.translate_term(rhs)?;
        promote(l, r, op)
    }
}

#[derive(Clone)]
enum Z3Term {
    Int(Int),
    Real(Real),
    Bool(Bool),
}

impl Z3Term {
    fn into_bool(self) -> Result<Bool, Z3Error> {
        match self {
            Z3Term::Bool(b) => Ok(b),
            _ => Err(Z3Error::SortMismatch("expected Bool, got a number".into())),
        }
    }
}

enum NumPair {
    Int(Int, Int),
    Real(Real, Real),
}

/// Brings two numeric operands to a common sort, converting integers to
/// reals when the other side is real.
fn promote(l: Z3Term, r: Z3Term, op: &str) -> Result<NumPair, Z3Error> {
    match (l, r) {
        (Z3Term::Int(l), Z3Term::Int(r)) => Ok(NumPair::Int(l, r)),
        (Z3Term::Real(l), Z3Term::Real(r)) => Ok(NumPair::Real(l, r)),
        (Z3Term::Int(l), Z3Term::Real(r)) => Ok(NumPair::Real(l.to_real(), r)),
        (Z3Term::Real(l), Z3Term::Int(r)) => Ok(NumPair::Real(l, r.to_real())),
        _ => Err(Z3Error::SortMismatch(format!(
            "operator '{op}' expects numeric operands"
        ))),
    }
}

impl Default for Z3Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl SmtSolver for Z3Solver {
    type Error = Z3Error;

    fn declare_var(&mut self, name: &str, sort: &SmtSort) -> Result<(), Z3Error> {
        let v = match sort {
            SmtSort::Int => Z3Term::Int(Int::new_const(name)),
            SmtSort::Real => Z3Term::Real(Real::new_const(name)),
            SmtSort::Bool => Z3Term::Bool(Bool::new_const(name)),
        };
        self.vars.insert(name.to_string(), v);
        Ok(())
    }

    fn assert(&mut self, term: &SmtTerm) -> Result<(), Z3Error> {
        let z3_term = self.translate_term(term)?.into_bool()?;
        self.solver.assert(&z3_term);
        Ok(())
    }

    fn push(&mut self) -> Result<(), Z3Error> {
        self.solver.push();
        Ok(())
    }

    fn pop(&mut self) -> Result<(), Z3Error> {
        self.solver.pop(1);
        Ok(())
    }

    fn check_sat(&mut self) -> Result<SatResult, Z3Error> {
        match self.solver.check() {
            Z3SatResult::Sat => Ok(SatResult::Sat),
            Z3SatResult::Unsat => Ok(SatResult::Unsat),
            Z3SatResult::Unknown => {
                let reason = self
                    .solver
                    .get_reason_unknown()
                    .unwrap_or_else(|| "Z3 returned unknown".into());
                Ok(SatResult::Unknown(reason))
            }
        }
    }

    fn reset(&mut self) -> Result<(), Z3Error> {
        self.solver.reset();
        // Z3 may drop per-solver parameters on reset; reapply timeout if configured.
        if let Some(params) = &self.params {
            self.solver.set_params(params);
        }
        self.vars.clear();
        Ok(())
    }
}
