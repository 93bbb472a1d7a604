//! Textual guard syntax.
//!
//! Atoms compare a tagged variable (`x_r` for the value before firing, `x_w`
//! for the value written by the transition) with a constant or with another
//! tagged variable plus an optional numeric offset. Atoms are joined with
//! `&&` and `||`, where `&&` binds tighter:
//!
//! ```text
//! amount_r >= 100 && status_w == "approved" || retry_w == false
//! ```
#![allow(unused_assignments)]

use std::collections::BTreeMap;

use miette::{Diagnostic, NamedSource, SourceSpan};
use num::rational::Rational64;
use num::Zero;
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use crate::formula::{Atom, CmpOp, Domain, Formula, Value, VarRef};

#[derive(Parser)]
#[grammar = "formula.pest"]
struct FormulaParser;

type Pair<'a> = pest::iterators::Pair<'a, Rule>;

#[derive(Debug, Error, Diagnostic)]
pub enum FormulaParseError {
    #[error("Syntax error in guard: {message}")]
    #[diagnostic(code(dpn::formula::syntax))]
    Syntax {
        message: String,
        #[label("here")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Unknown variable '{name}'")]
    #[diagnostic(code(dpn::formula::unknown_variable))]
    UnknownVariable {
        name: String,
        #[label("not declared")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Variable '{name}' needs a _r or _w suffix")]
    #[diagnostic(
        code(dpn::formula::missing_tag),
        help("use name_r for the value before firing and name_w for the written value")
    )]
    MissingAccessTag {
        name: String,
        #[label("untagged")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },

    #[error("Ill-typed atom: {message}")]
    #[diagnostic(code(dpn::formula::type_error))]
    Type {
        message: String,
        #[label("in this atom")]
        span: SourceSpan,
        #[source_code]
        src: NamedSource<String>,
    },
}

struct Ctx<'a> {
    text: &'a str,
    origin: &'a str,
    domains: &'a BTreeMap<String, Domain>,
}

impl Ctx<'_> {
    fn src(&self) -> NamedSource<String> {
        NamedSource::new(self.origin, self.text.to_string())
    }

    fn span(pair: &Pair<'_>) -> SourceSpan {
        let s = pair.as_span();
        (s.start(), s.end() - s.start()).into()
    }

    fn type_error(&self, pair: &Pair<'_>, message: impl Into<String>) -> FormulaParseError {
        FormulaParseError::Type {
            message: message.into(),
            span: Self::span(pair),
            src: self.src(),
        }
    }
}

/// Parses guard text. `domains` maps every declared variable to its domain.
pub fn parse(text: &str, domains: &BTreeMap<String, Domain>) -> Result<Formula, FormulaParseError> {
    parse_named(text, "guard", domains)
}

/// Like [`parse`], naming the source in diagnostics (e.g. the transition id).
pub fn parse_named(
    text: &str,
    origin: &str,
    domains: &BTreeMap<String, Domain>,
) -> Result<Formula, FormulaParseError> {
    let ctx = Ctx {
        text,
        origin,
        domains,
    };
    let mut pairs = FormulaParser::parse(Rule::formula, text).map_err(|e| {
        let (start, end) = match e.location {
            pest::error::InputLocation::Pos(p) => (p, p + 1),
            pest::error::InputLocation::Span((s, e)) => (s, e),
        };
        let start = start.min(text.len());
        let len = end.min(text.len()).saturating_sub(start);
        FormulaParseError::Syntax {
            message: e.variant.message().to_string(),
            span: (start, len).into(),
            src: ctx.src(),
        }
    })?;
    let root = pairs.next().and_then(|f| f.into_inner().next());
    match root {
        Some(disjunction) => build_disjunction(&ctx, disjunction),
        None => Ok(Formula::True),
    }
}

fn build_disjunction(ctx: &Ctx<'_>, pair: Pair<'_>) -> Result<Formula, FormulaParseError> {
    let parts = pair
        .into_inner()
        .map(|c| build_conjunction(ctx, c))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Formula::or(parts))
}

fn build_conjunction(ctx: &Ctx<'_>, pair: Pair<'_>) -> Result<Formula, FormulaParseError> {
    let mut parts = Vec::new();
    for literal in pair.into_inner() {
        let part = match literal.as_rule() {
            Rule::atom => Formula::Atom(build_atom(ctx, literal)?),
            Rule::bool_lit => bool_formula(literal.as_str()),
            Rule::disjunction => build_disjunction(ctx, literal)?,
            other => {
                return Err(ctx.type_error(&literal, format!("unexpected {other:?}")));
            }
        };
        parts.push(part);
    }
    Ok(Formula::and(parts))
}

fn bool_formula(text: &str) -> Formula {
    if text == "true" {
        Formula::True
    } else {
        Formula::False
    }
}

enum Side<'a> {
    Var(VarRef, Rational64),
    Const(Pair<'a>),
}

fn build_atom(ctx: &Ctx<'_>, pair: Pair<'_>) -> Result<Atom, FormulaParseError> {
    let atom_pair = pair.clone();
    let mut inner = pair.into_inner();
    let (Some(lhs), Some(op), Some(rhs)) = (inner.next(), inner.next(), inner.next()) else {
        return Err(ctx.type_error(&atom_pair, "incomplete atom"));
    };
    let op = parse_op(op.as_str());
    let lhs = build_side(ctx, lhs)?;
    let rhs = build_side(ctx, rhs)?;

    let atom = match (lhs, rhs) {
        (Side::Var(a, ka), Side::Var(b, kb)) => {
            if a.domain != b.domain {
                return Err(ctx.type_error(
                    &atom_pair,
                    format!("cannot compare {} '{a}' with {} '{b}'", a.domain, b.domain),
                ));
            }
            Atom::with_offset(a, op, b, kb - ka)
        }
        (Side::Var(a, ka), Side::Const(c)) => {
            let value = constant(ctx, &c, a.domain, -ka)?;
            Atom::with_const(a, op, value)
        }
        (Side::Const(c), Side::Var(b, kb)) => {
            let value = constant(ctx, &c, b.domain, -kb)?;
            Atom::with_const(b, op.flip(), value)
        }
        (Side::Const(_), Side::Const(_)) => {
            return Err(ctx.type_error(&atom_pair, "an atom must mention a variable"));
        }
    };
    if !atom.lhs.domain.supports(atom.op) {
        return Err(ctx.type_error(
            &atom_pair,
            format!("operator '{}' is not defined on {} values", atom.op, atom.lhs.domain),
        ));
    }
    Ok(atom)
}

fn parse_op(text: &str) -> CmpOp {
    match text {
        "!=" => CmpOp::Ne,
        "<" => CmpOp::Lt,
        "<=" => CmpOp::Le,
        ">" => CmpOp::Gt,
        ">=" => CmpOp::Ge,
        _ => CmpOp::Eq,
    }
}

fn build_side<'a>(ctx: &Ctx<'_>, operand: Pair<'a>) -> Result<Side<'a>, FormulaParseError> {
    let operand_pair = operand.clone();
    let Some(inner) = operand.into_inner().next() else {
        return Err(ctx.type_error(&operand_pair, "empty operand"));
    };
    if inner.as_rule() != Rule::var_term {
        return Ok(Side::Const(inner));
    }
    let mut parts = inner.into_inner();
    let Some(ident) = parts.next() else {
        return Err(ctx.type_error(&operand_pair, "empty operand"));
    };
    let var = resolve_var(ctx, &ident)?;
    let offset = match parts.next() {
        None => Rational64::zero(),
        Some(offset) => {
            if !var.domain.is_numeric() {
                return Err(ctx.type_error(
                    &offset,
                    format!("offsets are not defined on {} variable '{var}'", var.domain),
                ));
            }
            let mut pieces = offset.clone().into_inner();
            let negative = pieces.next().map(|s| s.as_str() == "-").unwrap_or(false);
            let magnitude = match pieces.next() {
                Some(n) => parse_number(ctx, &n)?,
                None => return Err(ctx.type_error(&offset, "missing offset")),
            };
            if var.domain == Domain::Int && !magnitude.is_integer() {
                return Err(ctx.type_error(&offset, "integer variables take integer offsets"));
            }
            if negative {
                -magnitude
            } else {
                magnitude
            }
        }
    };
    Ok(Side::Var(var, offset))
}

fn resolve_var(ctx: &Ctx<'_>, ident: &Pair<'_>) -> Result<VarRef, FormulaParseError> {
    let text = ident.as_str();
    let (name, write) = if let Some(name) = text.strip_suffix("_r") {
        (name, false)
    } else if let Some(name) = text.strip_suffix("_w") {
        (name, true)
    } else {
        return Err(FormulaParseError::MissingAccessTag {
            name: text.to_string(),
            span: Ctx::span(ident),
            src: ctx.src(),
        });
    };
    let Some(&domain) = ctx.domains.get(name) else {
        return Err(FormulaParseError::UnknownVariable {
            name: name.to_string(),
            span: Ctx::span(ident),
            src: ctx.src(),
        });
    };
    Ok(if write {
        VarRef::write(name, domain)
    } else {
        VarRef::read(name, domain)
    })
}

/// Converts a literal to a constant of `domain`, shifted by `shift` for
/// numeric domains.
fn constant(
    ctx: &Ctx<'_>,
    pair: &Pair<'_>,
    domain: Domain,
    shift: Rational64,
) -> Result<Value, FormulaParseError> {
    let mismatch = || {
        ctx.type_error(
            pair,
            format!("'{}' is not a {domain} constant", pair.as_str()),
        )
    };
    match (pair.as_rule(), domain) {
        (Rule::bool_lit, Domain::Bool) => Ok(Value::Bool(pair.as_str() == "true")),
        (Rule::string_lit, Domain::Str) => {
            let body = pair
                .clone()
                .into_inner()
                .next()
                .map(|b| unescape(b.as_str()))
                .unwrap_or_default();
            Ok(Value::Str(body))
        }
        (Rule::number, Domain::Int | Domain::Real) => {
            let n = parse_number(ctx, pair)? + shift;
            Value::numeric(domain, n).ok_or_else(mismatch)
        }
        _ => Err(mismatch()),
    }
}

fn parse_number(ctx: &Ctx<'_>, pair: &Pair<'_>) -> Result<Rational64, FormulaParseError> {
    let text = pair.as_str();
    let out_of_range = || ctx.type_error(pair, format!("number '{text}' is out of range"));
    let (decimal, denom) = match text.split_once('/') {
        Some((d, q)) => (d, q.parse::<i64>().map_err(|_| out_of_range())?),
        None => (text, 1),
    };
    if denom == 0 {
        return Err(ctx.type_error(pair, "division by zero"));
    }
    let negative = decimal.starts_with('-');
    let digits = decimal.trim_start_matches('-');
    let value = match digits.split_once('.') {
        Some((int, frac)) => {
            let scale = 10i64
                .checked_pow(frac.len() as u32)
                .ok_or_else(out_of_range)?;
            let joined = format!("{int}{frac}")
                .parse::<i64>()
                .map_err(|_| out_of_range())?;
            Rational64::new(joined, scale)
        }
        None => Rational64::from_integer(digits.parse::<i64>().map_err(|_| out_of_range())?),
    };
    let value = value / Rational64::from_integer(denom);
    Ok(if negative { -value } else { value })
}

fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Renders a formula in the guard syntax as a two-level `||` of `&&`
/// conjunctions.
pub fn serialize(formula: &Formula) -> String {
    let disjuncts = formula.disjuncts();
    if disjuncts.is_empty() {
        return "false".to_string();
    }
    disjuncts
        .iter()
        .map(|conj| {
            if conj.is_empty() {
                "true".to_string()
            } else {
                conj.iter()
                    .map(Atom::to_string)
                    .collect::<Vec<_>>()
                    .join(" && ")
            }
        })
        .collect::<Vec<_>>()
        .join(" || ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn domains() -> BTreeMap<String, Domain> {
        [
            ("x", Domain::Int),
            ("y", Domain::Int),
            ("r", Domain::Real),
            ("b", Domain::Bool),
            ("s", Domain::Str),
        ]
        .into_iter()
        .map(|(n, d)| (n.to_string(), d))
        .collect()
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let f = parse("x_r > 1 && y_r < 2 || b_w == true", &domains()).unwrap();
        let d = f.disjuncts();
        assert_eq!(d.len(), 2);
        assert_eq!(d[0].len(), 2);
        assert_eq!(d[1].len(), 1);
    }

    #[test]
    fn constant_on_the_left_is_flipped() {
        let f = parse("5 < x_w", &domains()).unwrap();
        assert_eq!(
            f,
            Formula::atom(Atom::with_const(
                VarRef::write("x", Domain::Int),
                CmpOp::Gt,
                Value::Int(5)
            ))
        );
    }

    #[test]
    fn offsets_are_normalised_onto_the_right() {
        let f = parse("x_w - 1 == y_r + 2", &domains()).unwrap();
        assert_eq!(serialize(&f), "x_w == y_r + 3");
        let g = parse("x_w + 2 >= 7", &domains()).unwrap();
        assert_eq!(serialize(&g), "x_w >= 5");
    }

    #[test]
    fn reals_and_strings() {
        let f = parse("r_r >= 2.5 && s_w != \"a \\\"b\\\"\"", &domains()).unwrap();
        let text = serialize(&f);
        assert_eq!(text, "r_r >= 2.5 && s_w != \"a \\\"b\\\"\"");
        assert_eq!(parse(&text, &domains()).unwrap(), f);
        let third = parse("r_r < 1/3", &domains()).unwrap();
        assert_eq!(serialize(&third), "r_r < 1/3");
    }

    #[test]
    fn serialize_roundtrips_dnf() {
        let text = "x_r > 1 && y_w == x_r || b_r != false";
        let f = parse(text, &domains()).unwrap();
        assert_eq!(serialize(&f), text);
    }

    #[test]
    fn parenthesised_groups_are_accepted() {
        let f = parse("(x_r > 1 || x_r < -1) && b_r == true", &domains()).unwrap();
        assert_eq!(f.disjuncts().len(), 2);
        assert_eq!(serialize(&Formula::True), "true");
        assert_eq!(serialize(&Formula::False), "false");
    }

    #[test]
    fn errors_carry_context() {
        assert!(matches!(
            parse("z_r > 1", &domains()),
            Err(FormulaParseError::UnknownVariable { .. })
        ));
        assert!(matches!(
            parse("x > 1", &domains()),
            Err(FormulaParseError::MissingAccessTag { .. })
        ));
        assert!(matches!(
            parse("s_r < \"b\"", &domains()),
            Err(FormulaParseError::Type { .. })
        ));
        assert!(matches!(
            parse("x_r > 1.5", &domains()),
            Err(FormulaParseError::Type { .. })
        ));
        assert!(matches!(
            parse("x_r >", &domains()),
            Err(FormulaParseError::Syntax { .. })
        ));
    }
}
