//! JSON net documents.
//!
//! ```json
//! {
//!   "name": "loan",
//!   "variables": [{ "name": "amount", "domain": "int", "initial": 0 }],
//!   "places": [{ "id": "i", "tokens": 1 }, { "id": "o", "final": true }],
//!   "transitions": [{ "id": "t", "guard": "amount_w > 0" }],
//!   "arcs": [{ "from": "i", "to": "t" }, { "from": "t", "to": "o" }]
//! }
//! ```
//!
//! A guard is either guard text (see [`crate::formula_text`]) or the legacy
//! flat list `[{ "connective": "empty", "atom": "x_r > 1" }, ...]`.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use num::rational::Rational64;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::formula::{format_rational, Domain, Formula, LogicalConnective, Operand, Value};
use crate::formula_text::{self, FormulaParseError};
use crate::marking::{Marking, TokenCount};
use crate::net::{DataPetriNet, NetError, Node};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed net document: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Net(#[from] NetError),
    #[error("guard of transition '{transition}': {source}")]
    Guard {
        transition: String,
        #[source]
        source: FormulaParseError,
    },
    #[error("invalid initial value for '{name}': {reason}")]
    InitialValue { name: String, reason: String },
    #[error("guard of transition '{transition}': tagged entry '{entry}' is not a single atom")]
    TaggedAtom { transition: String, entry: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetDocument {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub variables: Vec<VariableDoc>,
    pub places: Vec<PlaceDoc>,
    pub transitions: Vec<TransitionDoc>,
    pub arcs: Vec<ArcDoc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_marking: Option<BTreeMap<String, u32>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDoc {
    pub name: String,
    pub domain: Domain,
    pub initial: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceDoc {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub tokens: u32,
    #[serde(default, rename = "final")]
    pub is_final: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionDoc {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<GuardDoc>,
    #[serde(default)]
    pub silent: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GuardDoc {
    Text(String),
    Tagged(Vec<TaggedAtomDoc>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaggedAtomDoc {
    pub connective: LogicalConnective,
    pub atom: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArcDoc {
    pub from: String,
    pub to: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
}

fn default_weight() -> u32 {
    1
}

/// Parses and validates a JSON net document.
pub fn load_net(json: &str) -> Result<DataPetriNet, LoadError> {
    let doc: NetDocument = serde_json::from_str(json)?;
    build_net(&doc)
}

pub fn load_net_file(path: impl AsRef<Path>) -> Result<DataPetriNet, LoadError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    load_net(&json)
}

pub fn build_net(doc: &NetDocument) -> Result<DataPetriNet, LoadError> {
    let mut net = DataPetriNet::new(doc.name.clone());
    for v in &doc.variables {
        let initial = initial_value(v)?;
        net.add_variable(v.name.clone(), v.domain, initial)?;
    }
    let domains = net.variable_domains();

    let mut nodes: HashMap<&str, Node> = HashMap::new();
    for p in &doc.places {
        let label = p.label.clone().unwrap_or_else(|| p.id.clone());
        let id = net.add_place(label, p.tokens, p.is_final);
        if nodes.insert(p.id.as_str(), Node::Place(id)).is_some() {
            return Err(NetError::DuplicateId(p.id.clone()).into());
        }
    }
    for t in &doc.transitions {
        let guard = match &t.guard {
            None => Formula::True,
            Some(g) => parse_guard(&t.id, g, &domains)?,
        };
        let label = t.label.clone().unwrap_or_else(|| t.id.clone());
        let id = if t.silent {
            net.add_silent_transition(label, guard)
        } else {
            net.add_transition(label, guard)
        };
        if nodes.insert(t.id.as_str(), Node::Transition(id)).is_some() {
            return Err(NetError::DuplicateId(t.id.clone()).into());
        }
    }
    for a in &doc.arcs {
        let lookup = |id: &str| {
            nodes.get(id).copied().ok_or_else(|| NetError::DanglingArc {
                endpoint: id.to_string(),
            })
        };
        let (source, target) = (lookup(&a.from)?, lookup(&a.to)?);
        net.add_arc(source, target, a.weight)?;
    }
    if let Some(fm) = &doc.final_marking {
        let mut counts = vec![TokenCount::Finite(0); net.places.len()];
        for (place, &count) in fm {
            match nodes.get(place.as_str()) {
                Some(Node::Place(p)) => counts[*p] = TokenCount::Finite(count),
                _ => return Err(NetError::UnknownPlace(place.clone()).into()),
            }
        }
        net.final_marking = Some(Marking::new(counts));
    }
    net.validate()?;
    Ok(net)
}

fn parse_guard(
    transition: &str,
    guard: &GuardDoc,
    domains: &BTreeMap<String, Domain>,
) -> Result<Formula, LoadError> {
    let wrap = |source| LoadError::Guard {
        transition: transition.to_string(),
        source,
    };
    match guard {
        GuardDoc::Text(text) => formula_text::parse_named(text, transition, domains).map_err(wrap),
        GuardDoc::Tagged(atoms) => {
            let mut tagged = Vec::with_capacity(atoms.len());
            for entry in atoms {
                let parsed = formula_text::parse_named(&entry.atom, transition, domains).map_err(wrap)?;
                match parsed {
                    Formula::Atom(atom) => tagged.push((entry.connective, atom)),
                    other => {
                        return Err(LoadError::TaggedAtom {
                            transition: transition.to_string(),
                            entry: other.to_string(),
                        })
                    }
                }
            }
            Ok(Formula::from_tagged_atoms(tagged))
        }
    }
}

fn initial_value(v: &VariableDoc) -> Result<Value, LoadError> {
    let bad = |reason: &str| LoadError::InitialValue {
        name: v.name.clone(),
        reason: reason.to_string(),
    };
    match (v.domain, &v.initial) {
        (Domain::Bool, serde_json::Value::Bool(b)) => Ok(Value::Bool(*b)),
        (Domain::Str, serde_json::Value::String(s)) => Ok(Value::Str(s.clone())),
        (Domain::Int, serde_json::Value::Number(n)) => n
            .as_i64()
            .map(Value::Int)
            .ok_or_else(|| bad("expected an integer")),
        (Domain::Real, serde_json::Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                return Ok(Value::Real(Rational64::from_integer(i)));
            }
            n.as_f64()
                .and_then(Rational64::approximate_float)
                .map(Value::Real)
                .ok_or_else(|| bad("expected a finite number"))
        }
        (Domain::Real, serde_json::Value::String(s)) => {
            let domains = BTreeMap::from([(v.name.clone(), Domain::Real)]);
            let probe = format!("{}_r == {s}", v.name);
            match formula_text::parse(&probe, &domains) {
                Ok(Formula::Atom(atom)) => match atom.rhs {
                    Operand::Const(c) => Ok(c),
                    _ => Err(bad("expected a number")),
                },
                _ => Err(bad("expected a number")),
            }
        }
        (domain, _) => Err(bad(&format!("expected a {domain} value"))),
    }
}

/// Converts a net back into its JSON document form. Place and transition
/// labels become ids.
pub fn to_document(net: &DataPetriNet) -> NetDocument {
    let variables = net
        .variables
        .values()
        .map(|v| VariableDoc {
            name: v.name.clone(),
            domain: v.domain,
            initial: match &v.initial {
                Value::Bool(b) => serde_json::Value::Bool(*b),
                Value::Int(n) => serde_json::Value::from(*n),
                Value::Real(r) if r.is_integer() => serde_json::Value::from(r.to_integer()),
                Value::Real(r) => serde_json::Value::String(format_rational(r)),
                Value::Str(s) => serde_json::Value::String(s.clone()),
            },
        })
        .collect();
    let places = net
        .places
        .iter()
        .map(|p| PlaceDoc {
            id: p.label.clone(),
            label: None,
            tokens: p.initial_tokens,
            is_final: p.is_final,
        })
        .collect();
    let transitions = net
        .transitions
        .iter()
        .map(|t| TransitionDoc {
            id: t.label.clone(),
            label: None,
            guard: if t.guard.is_true() {
                None
            } else {
                Some(GuardDoc::Text(formula_text::serialize(&t.guard)))
            },
            silent: t.is_silent,
        })
        .collect();
    let name_of = |n: Node| match n {
        Node::Place(p) => net.places[p].label.clone(),
        Node::Transition(t) => net.transitions[t].label.clone(),
    };
    let arcs = net
        .arcs
        .iter()
        .map(|a| ArcDoc {
            from: name_of(a.source),
            to: name_of(a.target),
            weight: a.weight,
        })
        .collect();
    let final_marking = net.final_marking.as_ref().map(|fm| {
        net.places
            .iter()
            .filter_map(|p| match fm.get(p.id) {
                TokenCount::Finite(0) => None,
                TokenCount::Finite(n) => Some((p.label.clone(), n)),
                TokenCount::Omega => None,
            })
            .collect()
    });
    NetDocument {
        name: net.name.clone(),
        variables,
        places,
        transitions,
        arcs,
        final_marking,
    }
}

pub fn save_net(net: &DataPetriNet) -> Result<String, LoadError> {
    Ok(serde_json::to_string_pretty(&to_document(net))?)
}
