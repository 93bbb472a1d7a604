use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use num::rational::Rational64;
use num::{Signed, Zero};
use serde::{Deserialize, Serialize};

/// Domain of a data variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Domain {
    Bool,
    Int,
    Real,
    #[serde(rename = "string")]
    Str,
}

impl Domain {
    /// Integer and real variables support order comparisons and offsets.
    pub fn is_numeric(self) -> bool {
        matches!(self, Domain::Int | Domain::Real)
    }

    /// Whether `op` may appear in an atom over this domain.
    pub fn supports(self, op: CmpOp) -> bool {
        self.is_numeric() || matches!(op, CmpOp::Eq | CmpOp::Ne)
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Domain::Bool => write!(f, "bool"),
            Domain::Int => write!(f, "int"),
            Domain::Real => write!(f, "real"),
            Domain::Str => write!(f, "string"),
        }
    }
}

/// Whether a variable instance denotes the value before (`Read`) or after
/// (`Write`) a transition fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Access {
    Read,
    Write,
}

/// A tagged variable instance, `x_r` or `x_w`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarRef {
    pub name: String,
    pub domain: Domain,
    pub access: Access,
}

impl VarRef {
    pub fn read(name: impl Into<String>, domain: Domain) -> Self {
        VarRef {
            name: name.into(),
            domain,
            access: Access::Read,
        }
    }

    pub fn write(name: impl Into<String>, domain: Domain) -> Self {
        VarRef {
            name: name.into(),
            domain,
            access: Access::Write,
        }
    }

    pub fn is_write(&self) -> bool {
        self.access == Access::Write
    }

    /// The same variable with the read tag.
    pub fn as_read(&self) -> VarRef {
        VarRef::read(self.name.clone(), self.domain)
    }

    /// The same variable with the write tag.
    pub fn as_write(&self) -> VarRef {
        VarRef::write(self.name.clone(), self.domain)
    }
}

impl fmt::Display for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.access {
            Access::Read => write!(f, "{}_r", self.name),
            Access::Write => write!(f, "{}_w", self.name),
        }
    }
}

/// A constant of one of the four data domains.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Real(Rational64),
    Str(String),
}

impl Value {
    pub fn domain(&self) -> Domain {
        match self {
            Value::Bool(_) => Domain::Bool,
            Value::Int(_) => Domain::Int,
            Value::Real(_) => Domain::Real,
            Value::Str(_) => Domain::Str,
        }
    }

    /// Numeric view of an integer or real constant.
    pub fn as_rational(&self) -> Option<Rational64> {
        match self {
            Value::Int(n) => Some(Rational64::from_integer(*n)),
            Value::Real(r) => Some(*r),
            _ => None,
        }
    }

    /// Builds a numeric constant of `domain` from a rational. Integer domains
    /// only accept integral values.
    pub fn numeric(domain: Domain, value: Rational64) -> Option<Value> {
        match domain {
            Domain::Int if value.is_integer() => Some(Value::Int(value.to_integer())),
            Domain::Real => Some(Value::Real(value)),
            _ => None,
        }
    }

    /// Compares two constants of the same domain. Booleans and strings are
    /// only comparable for (dis)equality.
    pub fn satisfies(&self, op: CmpOp, other: &Value) -> Option<bool> {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => eq_only(op, a == b),
            (Value::Str(a), Value::Str(b)) => eq_only(op, a == b),
            _ => {
                let a = self.as_rational()?;
                let b = other.as_rational()?;
                Some(op.holds(a.cmp(&b)))
            }
        }
    }
}

fn eq_only(op: CmpOp, equal: bool) -> Option<bool> {
    match op {
        CmpOp::Eq => Some(equal),
        CmpOp::Ne => Some(!equal),
        _ => None,
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Real(r) => write!(f, "{}", format_rational(r)),
            Value::Str(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    match c {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        c => write!(f, "{c}")?,
                    }
                }
                write!(f, "\"")
            }
        }
    }
}

/// Renders a rational as a terminating decimal when one exists, otherwise as
/// `numer/denom`.
pub fn format_rational(r: &Rational64) -> String {
    if r.is_integer() {
        return r.to_integer().to_string();
    }
    let mut denom = *r.denom();
    let mut twos = 0u32;
    let mut fives = 0u32;
    while denom % 2 == 0 {
        denom /= 2;
        twos += 1;
    }
    while denom % 5 == 0 {
        denom /= 5;
        fives += 1;
    }
    if denom != 1 {
        return format!("{}/{}", r.numer(), r.denom());
    }
    let digits = twos.max(fives);
    let scale = 10i64.checked_pow(digits);
    let scaled = scale.and_then(|s| r.numer().checked_mul(s / r.denom()));
    match scaled {
        Some(scaled) => {
            let sign = if scaled < 0 { "-" } else { "" };
            let abs = scaled.unsigned_abs();
            let base = 10u64.pow(digits);
            format!(
                "{sign}{}.{:0width$}",
                abs / base,
                abs % base,
                width = digits as usize
            )
        }
        None => format!("{}/{}", r.numer(), r.denom()),
    }
}

/// Comparison operators of guard atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// Logical negation: `¬(a < b)` is `a >= b`.
    pub fn negate(self) -> CmpOp {
        match self {
            CmpOp::Eq => CmpOp::Ne,
            CmpOp::Ne => CmpOp::Eq,
            CmpOp::Lt => CmpOp::Ge,
            CmpOp::Le => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Le,
            CmpOp::Ge => CmpOp::Lt,
        }
    }

    /// Operator obtained by swapping the operands: `a < b` is `b > a`.
    pub fn flip(self) -> CmpOp {
        match self {
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Ge => CmpOp::Le,
            other => other,
        }
    }

    pub fn is_strict(self) -> bool {
        matches!(self, CmpOp::Lt | CmpOp::Gt)
    }

    pub fn holds(self, ordering: Ordering) -> bool {
        match self {
            CmpOp::Eq => ordering == Ordering::Equal,
            CmpOp::Ne => ordering != Ordering::Equal,
            CmpOp::Lt => ordering == Ordering::Less,
            CmpOp::Le => ordering != Ordering::Greater,
            CmpOp::Gt => ordering == Ordering::Greater,
            CmpOp::Ge => ordering != Ordering::Less,
        }
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CmpOp::Eq => write!(f, "=="),
            CmpOp::Ne => write!(f, "!="),
            CmpOp::Lt => write!(f, "<"),
            CmpOp::Le => write!(f, "<="),
            CmpOp::Gt => write!(f, ">"),
            CmpOp::Ge => write!(f, ">="),
        }
    }
}

/// Right-hand side of an atom.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operand {
    Const(Value),
    /// `var + offset`; the offset is zero for non-numeric domains.
    Var { var: VarRef, offset: Rational64 },
}

impl Operand {
    pub fn var(var: VarRef) -> Self {
        Operand::Var {
            var,
            offset: Rational64::zero(),
        }
    }
}

/// `lhs op rhs`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Atom {
    pub lhs: VarRef,
    pub op: CmpOp,
    pub rhs: Operand,
}

impl Atom {
    pub fn with_const(lhs: VarRef, op: CmpOp, value: Value) -> Self {
        Atom {
            lhs,
            op,
            rhs: Operand::Const(value),
        }
    }

    pub fn with_var(lhs: VarRef, op: CmpOp, rhs: VarRef) -> Self {
        Atom {
            lhs,
            op,
            rhs: Operand::var(rhs),
        }
    }

    pub fn with_offset(lhs: VarRef, op: CmpOp, rhs: VarRef, offset: Rational64) -> Self {
        Atom {
            lhs,
            op,
            rhs: Operand::Var { var: rhs, offset },
        }
    }

    pub fn negate(&self) -> Atom {
        Atom {
            lhs: self.lhs.clone(),
            op: self.op.negate(),
            rhs: self.rhs.clone(),
        }
    }

    /// Variable instances mentioned by the atom, left first.
    pub fn vars(&self) -> impl Iterator<Item = &VarRef> {
        let rhs = match &self.rhs {
            Operand::Var { var, .. } => Some(var),
            Operand::Const(_) => None,
        };
        std::iter::once(&self.lhs).chain(rhs)
    }

    pub fn mentions(&self, var: &VarRef) -> bool {
        self.vars().any(|v| v == var)
    }

    pub fn rename(&self, f: &impl Fn(&VarRef) -> VarRef) -> Atom {
        let rhs = match &self.rhs {
            Operand::Const(c) => Operand::Const(c.clone()),
            Operand::Var { var, offset } => Operand::Var {
                var: f(var),
                offset: *offset,
            },
        };
        Atom {
            lhs: f(&self.lhs),
            op: self.op,
            rhs,
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} ", self.lhs, self.op)?;
        match &self.rhs {
            Operand::Const(c) => write!(f, "{c}"),
            Operand::Var { var, offset } if offset.is_zero() => write!(f, "{var}"),
            Operand::Var { var, offset } if offset.is_negative() => {
                write!(f, "{var} - {}", format_rational(&-offset))
            }
            Operand::Var { var, offset } => write!(f, "{var} + {}", format_rational(offset)),
        }
    }
}

/// Connective tag of the legacy flat guard encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalConnective {
    Empty,
    And,
    Or,
}

/// Guard or path formula in negation normal form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Formula {
    True,
    False,
    Atom(Atom),
    And(Vec<Formula>),
    Or(Vec<Formula>),
}

impl Formula {
    pub fn atom(atom: Atom) -> Self {
        Formula::Atom(atom)
    }

    /// Conjunction with flattening; `True` operands vanish, any `False`
    /// operand absorbs the whole conjunction.
    pub fn and(parts: impl IntoIterator<Item = Formula>) -> Self {
        let mut out = Vec::new();
        for part in parts {
            match part {
                Formula::True => {}
                Formula::False => return Formula::False,
                Formula::And(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Formula::True,
            1 => out.pop().unwrap_or(Formula::True),
            _ => Formula::And(out),
        }
    }

    /// Disjunction with flattening; dual of [`Formula::and`].
    pub fn or(parts: impl IntoIterator<Item = Formula>) -> Self {
        let mut out = Vec::new();
        for part in parts {
            match part {
                Formula::False => {}
                Formula::True => return Formula::True,
                Formula::Or(inner) => out.extend(inner),
                other => out.push(other),
            }
        }
        match out.len() {
            0 => Formula::False,
            1 => out.pop().unwrap_or(Formula::False),
            _ => Formula::Or(out),
        }
    }

    pub fn conjunction(atoms: impl IntoIterator<Item = Atom>) -> Self {
        Formula::and(atoms.into_iter().map(Formula::Atom))
    }

    /// Rebuilds a formula from its disjunctive normal form.
    pub fn from_disjuncts(disjuncts: impl IntoIterator<Item = Vec<Atom>>) -> Self {
        Formula::or(disjuncts.into_iter().map(Formula::conjunction))
    }

    /// Converts the legacy flat encoding: `Empty`/`Or` open a new disjunct,
    /// `And` conjoins to the current one.
    pub fn from_tagged_atoms(atoms: impl IntoIterator<Item = (LogicalConnective, Atom)>) -> Self {
        let mut disjuncts: Vec<Vec<Atom>> = Vec::new();
        for (connective, atom) in atoms {
            match (connective, disjuncts.last_mut()) {
                (LogicalConnective::And, Some(current)) => current.push(atom),
                _ => disjuncts.push(vec![atom]),
            }
        }
        if disjuncts.is_empty() {
            return Formula::True;
        }
        Formula::from_disjuncts(disjuncts)
    }

    pub fn conjoin(&self, other: &Formula) -> Formula {
        Formula::and([self.clone(), other.clone()])
    }

    /// Negation, pushed down to the atoms.
    pub fn negate(&self) -> Formula {
        match self {
            Formula::True => Formula::False,
            Formula::False => Formula::True,
            Formula::Atom(a) => Formula::Atom(a.negate()),
            Formula::And(parts) => Formula::or(parts.iter().map(Formula::negate)),
            Formula::Or(parts) => Formula::and(parts.iter().map(Formula::negate)),
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self, Formula::True)
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Formula::False)
    }

    /// Applies `f` to every variable instance.
    pub fn rename(&self, f: &impl Fn(&VarRef) -> VarRef) -> Formula {
        match self {
            Formula::True => Formula::True,
            Formula::False => Formula::False,
            Formula::Atom(a) => Formula::Atom(a.rename(f)),
            Formula::And(parts) => Formula::and(parts.iter().map(|p| p.rename(f))),
            Formula::Or(parts) => Formula::or(parts.iter().map(|p| p.rename(f))),
        }
    }

    /// Replaces write-tagged instances by their read-tagged counterparts.
    pub fn promote_writes(&self) -> Formula {
        self.rename(&|v: &VarRef| if v.is_write() { v.as_read() } else { v.clone() })
    }

    /// Replaces read-tagged instances of the named variables by write-tagged ones.
    pub fn reads_to_writes(&self, names: &BTreeSet<String>) -> Formula {
        self.rename(&|v: &VarRef| {
            if !v.is_write() && names.contains(&v.name) {
                v.as_write()
            } else {
                v.clone()
            }
        })
    }

    pub fn atoms(&self) -> Vec<&Atom> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms<'a>(&'a self, out: &mut Vec<&'a Atom>) {
        match self {
            Formula::True | Formula::False => {}
            Formula::Atom(a) => out.push(a),
            Formula::And(parts) | Formula::Or(parts) => {
                for p in parts {
                    p.collect_atoms(out);
                }
            }
        }
    }

    pub fn variables(&self) -> BTreeSet<VarRef> {
        self.atoms()
            .into_iter()
            .flat_map(|a| a.vars().cloned())
            .collect()
    }

    /// Names of the variables that occur write-tagged.
    pub fn written_variables(&self) -> BTreeSet<String> {
        self.variables()
            .into_iter()
            .filter(|v| v.is_write())
            .map(|v| v.name)
            .collect()
    }

    pub fn has_writes(&self) -> bool {
        self.atoms().iter().any(|a| a.vars().any(VarRef::is_write))
    }

    /// Disjunctive normal form as a list of atom conjunctions. `True` is one
    /// empty conjunction, `False` is no conjunction at all.
    pub fn disjuncts(&self) -> Vec<Vec<Atom>> {
        match self {
            Formula::True => vec![Vec::new()],
            Formula::False => Vec::new(),
            Formula::Atom(a) => vec![vec![a.clone()]],
            Formula::Or(parts) => {
                let mut out = Vec::new();
                for p in parts {
                    for d in p.disjuncts() {
                        if !out.contains(&d) {
                            out.push(d);
                        }
                    }
                }
                out
            }
            Formula::And(parts) => {
                let mut acc: Vec<Vec<Atom>> = vec![Vec::new()];
                for p in parts {
                    let rhs = p.disjuncts();
                    let mut next = Vec::with_capacity(acc.len() * rhs.len());
                    for left in &acc {
                        for right in &rhs {
                            let mut conj = left.clone();
                            for atom in right {
                                if !conj.contains(atom) {
                                    conj.push(atom.clone());
                                }
                            }
                            if !next.contains(&conj) {
                                next.push(conj);
                            }
                        }
                    }
                    acc = next;
                    if acc.is_empty() {
                        break;
                    }
                }
                acc
            }
        }
    }
}

impl From<Atom> for Formula {
    fn from(atom: Atom) -> Self {
        Formula::Atom(atom)
    }
}

impl fmt::Display for Formula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Formula::True => write!(f, "true"),
            Formula::False => write!(f, "false"),
            Formula::Atom(a) => write!(f, "{a}"),
            Formula::And(parts) => {
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " && ")?;
                    }
                    match p {
                        Formula::Or(_) => write!(f, "({p})")?,
                        _ => write!(f, "{p}")?,
                    }
                }
                Ok(())
            }
            Formula::Or(parts) => {
                for (i, p) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(f, " || ")?;
                    }
                    write!(f, "{p}")?;
                }
                Ok(())
            }
        }
    }
}
