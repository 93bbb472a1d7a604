//! Translation of guard formulas into solver terms.
//!
//! Read-tagged instances become the symbol `x`, write-tagged ones `x'`.
//! Strings are interned to integer codes; since string atoms only use `==`
//! and `!=` this preserves satisfiability. Real atoms are multiplied through
//! by the common denominator of their constants so every literal is integral.

use std::collections::BTreeMap;

use dpn_ir::formula::{Access, Atom, CmpOp, Domain, Formula, Operand, Value, VarRef};
use indexmap::IndexMap;
use num::rational::Rational64;
use num::Zero;

use crate::sorts::SmtSort;
use crate::terms::SmtTerm;

#[derive(Debug, Default)]
pub struct FormulaEncoder {
    strings: IndexMap<String, i64>,
}

impl FormulaEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn symbol(var: &VarRef) -> String {
        match var.access {
            Access::Read => var.name.clone(),
            Access::Write => format!("{}'", var.name),
        }
    }

    pub fn sort(domain: Domain) -> SmtSort {
        match domain {
            Domain::Bool => SmtSort::Bool,
            Domain::Int | Domain::Str => SmtSort::Int,
            Domain::Real => SmtSort::Real,
        }
    }

    /// Symbols and sorts of every variable instance in `formula`.
    pub fn declarations(formula: &Formula) -> Vec<(String, SmtSort)> {
        let mut out = BTreeMap::new();
        for var in formula.variables() {
            out.insert(Self::symbol(&var), Self::sort(var.domain));
        }
        out.into_iter().collect()
    }

    pub fn encode(&mut self, formula: &Formula) -> SmtTerm {
        match formula {
            Formula::True => SmtTerm::bool(true),
            Formula::False => SmtTerm::bool(false),
            Formula::Atom(atom) => self.encode_atom(atom),
            Formula::And(parts) => SmtTerm::and(parts.iter().map(|p| self.encode(p)).collect()),
            Formula::Or(parts) => SmtTerm::or(parts.iter().map(|p| self.encode(p)).collect()),
        }
    }

    fn string_code(&mut self, s: &str) -> i64 {
        let next = self.strings.len() as i64;
        *self.strings.entry(s.to_string()).or_insert(next)
    }

    fn encode_atom(&mut self, atom: &Atom) -> SmtTerm {
        let lhs = SmtTerm::var(Self::symbol(&atom.lhs));
        match atom.lhs.domain {
            Domain::Bool | Domain::Str => {
                let rhs = match &atom.rhs {
                    Operand::Const(Value::Bool(b)) => SmtTerm::bool(*b),
                    Operand::Const(Value::Str(s)) => SmtTerm::int(self.string_code(s)),
                    Operand::Const(other) => SmtTerm::int(other.as_rational().map_or(0, |r| r.to_integer())),
                    Operand::Var { var, .. } => SmtTerm::var(Self::symbol(var)),
                };
                compare(lhs, atom.op, rhs)
            }
            Domain::Int | Domain::Real => {
                let (constant, offset) = match &atom.rhs {
                    Operand::Const(c) => (c.as_rational().unwrap_or_else(Rational64::zero), None),
                    Operand::Var { var, offset } => (Rational64::zero(), Some((var, *offset))),
                };
                let scale = match offset {
                    Some((_, k)) => *k.denom(),
                    None => *constant.denom(),
                };
                let rhs = match offset {
                    Some((var, k)) => SmtTerm::var(Self::symbol(var))
                        .scale(scale)
                        .offset((k * scale).to_integer()),
                    None => SmtTerm::int((constant * scale).to_integer()),
                };
                compare(lhs.scale(scale), atom.op, rhs)
            }
        }
    }
}

fn compare(lhs: SmtTerm, op: CmpOp, rhs: SmtTerm) -> SmtTerm {
    match op {
        CmpOp::Eq => lhs.eq(rhs),
        CmpOp::Ne => lhs.eq(rhs).not(),
        CmpOp::Lt => lhs.lt(rhs),
        CmpOp::Le => lhs.le(rhs),
        CmpOp::Gt => lhs.gt(rhs),
        CmpOp::Ge => lhs.ge(rhs),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::smtlib_printer::to_smtlib;

    #[test]
    fn write_instances_are_primed() {
        let atom = Atom::with_var(
            VarRef::write("x", Domain::Int),
            CmpOp::Ge,
            VarRef::read("x", Domain::Int),
        );
        let mut enc = FormulaEncoder::new();
        assert_eq!(to_smtlib(&enc.encode(&atom.into())), "(>= |x'| x)");
    }

    #[test]
    fn strings_intern_to_stable_codes() {
        let s = VarRef::read("s", Domain::Str);
        let f = Formula::and([
            Formula::atom(Atom::with_const(s.clone(), CmpOp::Eq, Value::Str("a".into()))),
            Formula::atom(Atom::with_const(s.clone(), CmpOp::Ne, Value::Str("b".into()))),
            Formula::atom(Atom::with_const(s, CmpOp::Ne, Value::Str("a".into()))),
        ]);
        let mut enc = FormulaEncoder::new();
        assert_eq!(
            to_smtlib(&enc.encode(&f)),
            "(and (= s 0) (not (= s 1)) (not (= s 0)))"
        );
    }

    #[test]
    fn real_atoms_are_scaled_to_integers() {
        let r = VarRef::read("r", Domain::Real);
        let half = Atom::with_const(r.clone(), CmpOp::Lt, Value::Real(Rational64::new(1, 2)));
        let shifted = Atom::with_offset(
            r.clone(),
            CmpOp::Le,
            VarRef::read("q", Domain::Real),
            Rational64::new(-1, 3),
        );
        let mut enc = FormulaEncoder::new();
        assert_eq!(to_smtlib(&enc.encode(&half.into())), "(< (* 2 r) 1)");
        assert_eq!(
            to_smtlib(&enc.encode(&shifted.into())),
            "(<= (* 3 r) (+ (* 3 q) (- 1)))"
        );
    }

    #[test]
    fn declarations_cover_both_tags() {
        let f = Formula::atom(Atom::with_var(
            VarRef::write("x", Domain::Real),
            CmpOp::Gt,
            VarRef::read("x", Domain::Real),
        ));
        assert_eq!(
            FormulaEncoder::declarations(&f),
            vec![
                ("x".to_string(), SmtSort::Real),
                ("x'".to_string(), SmtSort::Real)
            ]
        );
    }
}
