//! Existential quantifier elimination over guard formulas.
//!
//! Works disjunct by disjunct on the DNF. Per conjunction and eliminated
//! variable `v`:
//!
//! * booleans are case-split on `true`/`false`;
//! * strings substitute an equality when one exists, otherwise their
//!   disequalities are dropped (the domain is infinite);
//! * numbers split `!=` into `<`/`>`, substitute an equality when one exists,
//!   and otherwise pair every lower bound with every upper bound
//!   (Fourier-Motzkin on difference constraints). Integer strict bounds are
//!   first tightened by one, which keeps the integer projection exact.
//!
//! The result stays inside the atom language: `x op c` and `x op y + k`.

use dpn_ir::formula::{Atom, CmpOp, Domain, Formula, Operand, Value, VarRef};
use num::rational::Rational64;
use num::{One, Zero};

/// `∃ vars. formula`, as a quantifier-free formula.
pub fn eliminate(vars: &[VarRef], formula: &Formula) -> Formula {
    let mut out: Vec<Vec<Atom>> = Vec::new();
    for conj in formula.disjuncts() {
        let mut work = vec![conj];
        for v in vars {
            work = work
                .into_iter()
                .flat_map(|c| eliminate_var(v, c))
                .collect();
        }
        for conj in work {
            if !out.contains(&conj) {
                out.push(conj);
            }
        }
    }
    Formula::from_disjuncts(out)
}

/// Projects the write-tagged instances out of a guard: the condition on
/// the pre-state under which some assignment satisfies the guard.
pub fn project_writes(guard: &Formula) -> Formula {
    let writes: Vec<VarRef> = guard
        .variables()
        .into_iter()
        .filter(VarRef::is_write)
        .collect();
    if writes.is_empty() {
        return guard.clone();
    }
    eliminate(&writes, guard)
}

/// One side of a normalised comparison.
#[derive(Debug, Clone, PartialEq)]
enum Term {
    Const(Value),
    Var(VarRef, Rational64),
}

impl Term {
    fn shift(&self, k: Rational64) -> Term {
        match self {
            Term::Var(v, off) => Term::Var(v.clone(), *off + k),
            Term::Const(c) => Term::Const(shift_value(c, k)),
        }
    }
}

fn shift_value(c: &Value, k: Rational64) -> Value {
    if k.is_zero() {
        return c.clone();
    }
    match c.as_rational() {
        Some(r) => Value::numeric(c.domain(), r + k).unwrap_or_else(|| c.clone()),
        None => c.clone(),
    }
}

enum Outcome {
    Keep(Atom),
    True,
    False,
}

/// Builds `lhs op rhs` back into an atom, or decides it when no variable
/// remains.
fn relate(lhs: &Term, op: CmpOp, rhs: &Term) -> Outcome {
    let decided = |b: bool| if b { Outcome::True } else { Outcome::False };
    match (lhs, rhs) {
        (Term::Const(a), Term::Const(b)) => decided(a.satisfies(op, b).unwrap_or(true)),
        (Term::Var(a, ka), Term::Const(c)) => {
            Outcome::Keep(Atom::with_const(a.clone(), op, shift_value(c, -*ka)))
        }
        (Term::Const(c), Term::Var(b, kb)) => {
            Outcome::Keep(Atom::with_const(b.clone(), op.flip(), shift_value(c, -*kb)))
        }
        (Term::Var(a, ka), Term::Var(b, kb)) if a == b => decided(op.holds(ka.cmp(kb))),
        (Term::Var(a, ka), Term::Var(b, kb)) => {
            Outcome::Keep(Atom::with_offset(a.clone(), op, b.clone(), *kb - *ka))
        }
    }
}

/// Rewrites `atom` as `v op term` when it mentions `v`.
fn orient(atom: &Atom, v: &VarRef) -> Option<(CmpOp, Term)> {
    if &atom.lhs == v {
        let term = match &atom.rhs {
            Operand::Const(c) => Term::Const(c.clone()),
            Operand::Var { var, offset } => Term::Var(var.clone(), *offset),
        };
        return Some((atom.op, term));
    }
    match &atom.rhs {
        Operand::Var { var, offset } if var == v => {
            Some((atom.op.flip(), Term::Var(atom.lhs.clone(), -*offset)))
        }
        _ => None,
    }
}

fn bound_atom(v: &VarRef, op: CmpOp, term: &Term) -> Atom {
    match term {
        Term::Const(c) => Atom::with_const(v.clone(), op, c.clone()),
        Term::Var(w, k) => Atom::with_offset(v.clone(), op, w.clone(), *k),
    }
}

/// `∃ v. conj` as a disjunction of conjunctions; empty when unsatisfiable.
fn eliminate_var(v: &VarRef, conj: Vec<Atom>) -> Vec<Vec<Atom>> {
    let mut rest = Vec::new();
    let mut bounds = Vec::new();
    for atom in conj {
        match orient(&atom, v) {
            None => rest.push(atom),
            Some((op, Term::Var(w, k))) if &w == v => {
                if !op.holds(Rational64::zero().cmp(&k)) {
                    return Vec::new();
                }
            }
            Some(bound) => bounds.push(bound),
        }
    }
    if bounds.is_empty() {
        return vec![rest];
    }

    match v.domain {
        Domain::Bool => [true, false]
            .into_iter()
            .filter_map(|b| substitute(&Term::Const(Value::Bool(b)), &bounds, &rest))
            .collect(),
        Domain::Str => match bounds.iter().position(|(op, _)| *op == CmpOp::Eq) {
            Some(i) => {
                let (_, witness) = bounds.remove(i);
                substitute(&witness, &bounds, &rest).into_iter().collect()
            }
            None => vec![dedup(rest)],
        },
        Domain::Int | Domain::Real => {
            if let Some(i) = bounds.iter().position(|(op, _)| *op == CmpOp::Ne) {
                let (_, term) = bounds.remove(i);
                let mut out = Vec::new();
                for op in [CmpOp::Lt, CmpOp::Gt] {
                    let mut split = rest.clone();
                    split.extend(bounds.iter().map(|(o, t)| bound_atom(v, *o, t)));
                    split.push(bound_atom(v, op, &term));
                    out.extend(eliminate_var(v, split));
                }
                return out;
            }
            if let Some(i) = bounds.iter().position(|(op, _)| *op == CmpOp::Eq) {
                let (_, witness) = bounds.remove(i);
                return substitute(&witness, &bounds, &rest).into_iter().collect();
            }
            fourier_motzkin(v.domain, &bounds, rest).into_iter().collect()
        }
    }
}

/// Replaces `v` by `witness` in every bound.
fn substitute(witness: &Term, bounds: &[(CmpOp, Term)], rest: &[Atom]) -> Option<Vec<Atom>> {
    let mut out = rest.to_vec();
    for (op, term) in bounds {
        match relate(witness, *op, term) {
            Outcome::False => return None,
            Outcome::True => {}
            Outcome::Keep(atom) => out.push(atom),
        }
    }
    Some(dedup(out))
}

fn fourier_motzkin(domain: Domain, bounds: &[(CmpOp, Term)], rest: Vec<Atom>) -> Option<Vec<Atom>> {
    let one = Rational64::one();
    let mut lowers = Vec::new();
    let mut uppers = Vec::new();
    for (op, term) in bounds {
        let (strict, is_lower) = match op {
            CmpOp::Gt => (true, true),
            CmpOp::Ge => (false, true),
            CmpOp::Lt => (true, false),
            CmpOp::Le => (false, false),
            CmpOp::Eq | CmpOp::Ne => continue,
        };
        let (term, strict) = match (domain, strict, is_lower) {
            (Domain::Int, true, true) => (term.shift(one), false),
            (Domain::Int, true, false) => (term.shift(-one), false),
            _ => (term.clone(), strict),
        };
        if is_lower {
            lowers.push((term, strict));
        } else {
            uppers.push((term, strict));
        }
    }
    let mut out = rest;
    for (lo, lo_strict) in &lowers {
        for (hi, hi_strict) in &uppers {
            let op = if *lo_strict || *hi_strict {
                CmpOp::Lt
            } else {
                CmpOp::Le
            };
            match relate(lo, op, hi) {
                Outcome::False => return None,
                Outcome::True => {}
                Outcome::Keep(atom) => out.push(atom),
            }
        }
    }
    Some(dedup(out))
}

fn dedup(atoms: Vec<Atom>) -> Vec<Atom> {
    let mut out: Vec<Atom> = Vec::with_capacity(atoms.len());
    for atom in atoms {
        if !out.contains(&atom) {
            out.push(atom);
        }
    }
    out
}
