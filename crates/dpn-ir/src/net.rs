use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use indexmap::IndexMap;
use thiserror::Error;

use crate::formula::{Atom, CmpOp, Domain, Formula, Operand, Value, VarRef};
use crate::marking::{Marking, TokenCount};

/// A unique identifier for a place.
pub type PlaceId = usize;
/// A unique identifier for a transition.
pub type TransitionId = usize;

/// Structural errors of a data Petri net.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetError {
    #[error("arc endpoint '{endpoint}' does not exist")]
    DanglingArc { endpoint: String },
    #[error("arc from '{from}' to '{to}' must connect a place and a transition")]
    InvalidArc { from: String, to: String },
    #[error("arc from '{from}' to '{to}' has weight 0")]
    ZeroWeight { from: String, to: String },
    #[error("duplicate identifier '{0}'")]
    DuplicateId(String),
    #[error("transition '{transition}' refers to undeclared variable '{name}'")]
    UnknownVariable { transition: String, name: String },
    #[error("{context}: expected a {expected} value, found {found}")]
    DomainMismatch {
        context: String,
        expected: Domain,
        found: Domain,
    },
    #[error("operator '{op}' is not defined on {domain} variable '{name}'")]
    UnsupportedOperator {
        name: String,
        op: CmpOp,
        domain: Domain,
    },
    #[error("the final marking does not mark any place")]
    NoFinalPlace,
    #[error("final marking refers to unknown place '{0}'")]
    UnknownPlace(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub id: PlaceId,
    pub label: String,
    pub initial_tokens: u32,
    pub is_final: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub id: TransitionId,
    pub label: String,
    pub guard: Formula,
    /// Transition this one was split from; its own id otherwise.
    pub base_id: TransitionId,
    pub is_silent: bool,
    pub is_split: bool,
}

/// Endpoint of a net arc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Place(PlaceId),
    Transition(TransitionId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Arc {
    pub source: Node,
    pub target: Node,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub domain: Domain,
    pub initial: Value,
}

/// A data Petri net.
#[derive(Debug, Clone, PartialEq)]
pub struct DataPetriNet {
    pub name: String,
    pub places: Vec<Place>,
    pub transitions: Vec<Transition>,
    pub arcs: Vec<Arc>,
    pub variables: IndexMap<String, Variable>,
    /// Explicit final marking; one token on every final place when absent.
    pub final_marking: Option<Marking>,
}

impl DataPetriNet {
    pub fn new(name: impl Into<String>) -> Self {
        DataPetriNet {
            name: name.into(),
            places: Vec::new(),
            transitions: Vec::new(),
            arcs: Vec::new(),
            variables: IndexMap::new(),
            final_marking: None,
        }
    }

    pub fn add_place(&mut self, label: impl Into<String>, tokens: u32, is_final: bool) -> PlaceId {
        let id = self.places.len();
        self.places.push(Place {
            id,
            label: label.into(),
            initial_tokens: tokens,
            is_final,
        });
        id
    }

    pub fn add_transition(&mut self, label: impl Into<String>, guard: Formula) -> TransitionId {
        let id = self.transitions.len();
        self.transitions.push(Transition {
            id,
            label: label.into(),
            guard,
            base_id: id,
            is_silent: false,
            is_split: false,
        });
        id
    }

    /// Adds an invisible transition (a tau step of the model itself).
    pub fn add_silent_transition(&mut self, label: impl Into<String>, guard: Formula) -> TransitionId {
        let id = self.add_transition(label, guard);
        self.transitions[id].is_silent = true;
        id
    }

    pub fn add_variable(
        &mut self,
        name: impl Into<String>,
        domain: Domain,
        initial: Value,
    ) -> Result<(), NetError> {
        let name = name.into();
        if initial.domain() != domain {
            return Err(NetError::DomainMismatch {
                context: format!("initial value of '{name}'"),
                expected: domain,
                found: initial.domain(),
            });
        }
        if self.variables.contains_key(&name) {
            return Err(NetError::DuplicateId(name));
        }
        self.variables.insert(
            name.clone(),
            Variable {
                name,
                domain,
                initial,
            },
        );
        Ok(())
    }

    pub fn add_arc(&mut self, source: Node, target: Node, weight: u32) -> Result<(), NetError> {
        let (from, to) = (self.node_label(source)?, self.node_label(target)?);
        match (source, target) {
            (Node::Place(_), Node::Transition(_)) | (Node::Transition(_), Node::Place(_)) => {}
            _ => return Err(NetError::InvalidArc { from, to }),
        }
        if weight == 0 {
            return Err(NetError::ZeroWeight { from, to });
        }
        self.arcs.push(Arc {
            source,
            target,
            weight,
        });
        Ok(())
    }

    fn node_label(&self, node: Node) -> Result<String, NetError> {
        let label = match node {
            Node::Place(p) => self.places.get(p).map(|p| p.label.clone()),
            Node::Transition(t) => self.transitions.get(t).map(|t| t.label.clone()),
        };
        label.ok_or_else(|| NetError::DanglingArc {
            endpoint: format!("{node:?}"),
        })
    }

    pub fn find_place_by_label(&self, label: &str) -> Option<PlaceId> {
        self.places.iter().position(|p| p.label == label)
    }

    pub fn find_transition_by_label(&self, label: &str) -> Option<TransitionId> {
        self.transitions.iter().position(|t| t.label == label)
    }

    /// Input places of `t` with arc weights.
    pub fn preset(&self, t: TransitionId) -> Vec<(PlaceId, u32)> {
        self.arcs
            .iter()
            .filter_map(|a| match (a.source, a.target) {
                (Node::Place(p), Node::Transition(tt)) if tt == t => Some((p, a.weight)),
                _ => None,
            })
            .collect()
    }

    /// Output places of `t` with arc weights.
    pub fn postset(&self, t: TransitionId) -> Vec<(PlaceId, u32)> {
        self.arcs
            .iter()
            .filter_map(|a| match (a.source, a.target) {
                (Node::Transition(tt), Node::Place(p)) if tt == t => Some((p, a.weight)),
                _ => None,
            })
            .collect()
    }

    pub fn is_enabled(&self, t: TransitionId, marking: &Marking) -> bool {
        self.preset(t)
            .iter()
            .all(|&(p, w)| marking.get(p).at_least(w))
    }

    /// Token effect of firing `t`; `None` when `t` is not enabled.
    pub fn fire(&self, t: TransitionId, marking: &Marking) -> Option<Marking> {
        let mut next = marking.clone();
        for (p, w) in self.preset(t) {
            next = next.take(p, w)?;
        }
        for (p, w) in self.postset(t) {
            next = next.put(p, w);
        }
        Some(next)
    }

    pub fn initial_marking(&self) -> Marking {
        self.places
            .iter()
            .map(|p| TokenCount::Finite(p.initial_tokens))
            .collect()
    }

    pub fn final_marking(&self) -> Marking {
        match &self.final_marking {
            Some(m) => m.clone(),
            None => self
                .places
                .iter()
                .map(|p| TokenCount::Finite(u32::from(p.is_final)))
                .collect(),
        }
    }

    /// Places marked by the final marking.
    pub fn final_places(&self) -> BTreeSet<PlaceId> {
        let fm = self.final_marking();
        (0..self.places.len())
            .filter(|&p| !fm.get(p).is_zero())
            .collect()
    }

    /// `var_r == initial` for every declared variable.
    pub fn initial_formula(&self) -> Formula {
        Formula::conjunction(self.variables.values().map(|v| {
            Atom::with_const(VarRef::read(v.name.clone(), v.domain), CmpOp::Eq, v.initial.clone())
        }))
    }

    pub fn variable_domains(&self) -> BTreeMap<String, Domain> {
        self.variables
            .values()
            .map(|v| (v.name.clone(), v.domain))
            .collect()
    }

    /// Variables that `t` assigns.
    pub fn written_variables(&self, t: TransitionId) -> BTreeSet<String> {
        self.transitions
            .get(t)
            .map(|t| t.guard.written_variables())
            .unwrap_or_default()
    }

    pub fn set_guard(&mut self, t: TransitionId, guard: Formula) {
        if let Some(tr) = self.transitions.get_mut(t) {
            tr.guard = guard;
        }
    }

    /// Splits `t` into one transition per guard. The first guard stays on
    /// `t`; every further guard gets a fresh copy of `t` with the same arcs.
    /// Returns the ids of all parts.
    pub fn split_transition(&mut self, t: TransitionId, guards: Vec<Formula>) -> Vec<TransitionId> {
        let Some(original) = self.transitions.get(t).cloned() else {
            return Vec::new();
        };
        let arcs: Vec<Arc> = self
            .arcs
            .iter()
            .filter(|a| a.source == Node::Transition(t) || a.target == Node::Transition(t))
            .cloned()
            .collect();
        let mut ids = Vec::with_capacity(guards.len());
        for (i, guard) in guards.into_iter().enumerate() {
            if i == 0 {
                let tr = &mut self.transitions[t];
                tr.guard = guard;
                tr.is_split = true;
                ids.push(t);
                continue;
            }
            let id = self.transitions.len();
            self.transitions.push(Transition {
                id,
                label: format!("{}#{}", original.label, i),
                guard,
                base_id: original.base_id,
                is_silent: original.is_silent,
                is_split: true,
            });
            for arc in &arcs {
                let retarget = |n: Node| if n == Node::Transition(t) { Node::Transition(id) } else { n };
                self.arcs.push(Arc {
                    source: retarget(arc.source),
                    target: retarget(arc.target),
                    weight: arc.weight,
                });
            }
            ids.push(id);
        }
        ids
    }

    /// Checks arcs, guards, and the final marking against the declarations.
    pub fn validate(&self) -> Result<(), NetError> {
        for arc in &self.arcs {
            let (from, to) = (self.node_label(arc.source)?, self.node_label(arc.target)?);
            if matches!(
                (arc.source, arc.target),
                (Node::Place(_), Node::Place(_)) | (Node::Transition(_), Node::Transition(_))
            ) {
                return Err(NetError::InvalidArc { from, to });
            }
            if arc.weight == 0 {
                return Err(NetError::ZeroWeight { from, to });
            }
        }
        for t in &self.transitions {
            for atom in t.guard.atoms() {
                self.check_atom(&t.label, atom)?;
            }
        }
        if let Some(fm) = &self.final_marking {
            if fm.len() != self.places.len() {
                return Err(NetError::UnknownPlace(format!(
                    "final marking has {} entries for {} places",
                    fm.len(),
                    self.places.len()
                )));
            }
        }
        if self.final_places().is_empty() {
            return Err(NetError::NoFinalPlace);
        }
        Ok(())
    }

    fn check_atom(&self, transition: &str, atom: &Atom) -> Result<(), NetError> {
        for var in atom.vars() {
            match self.variables.get(&var.name) {
                None => {
                    return Err(NetError::UnknownVariable {
                        transition: transition.to_string(),
                        name: var.name.clone(),
                    })
                }
                Some(decl) if decl.domain != var.domain => {
                    return Err(NetError::DomainMismatch {
                        context: format!("guard of '{transition}', variable '{}'", var.name),
                        expected: decl.domain,
                        found: var.domain,
                    })
                }
                Some(_) => {}
            }
        }
        let domain = atom.lhs.domain;
        if !domain.supports(atom.op) {
            return Err(NetError::UnsupportedOperator {
                name: atom.lhs.name.clone(),
                op: atom.op,
                domain,
            });
        }
        let found = match &atom.rhs {
            Operand::Const(c) => c.domain(),
            Operand::Var { var, .. } => var.domain,
        };
        if found != domain {
            return Err(NetError::DomainMismatch {
                context: format!("guard of '{transition}', atom '{atom}'"),
                expected: domain,
                found,
            });
        }
        Ok(())
    }
}

impl fmt::Display for DataPetriNet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Data Petri net: {}", self.name)?;
        writeln!(f, "  Variables:")?;
        for v in self.variables.values() {
            writeln!(f, "    {}: {} = {}", v.name, v.domain, v.initial)?;
        }
        writeln!(f, "  Places:")?;
        for p in &self.places {
            let fin = if p.is_final { " (final)" } else { "" };
            writeln!(f, "    [{}] {} tokens={}{}", p.id, p.label, p.initial_tokens, fin)?;
        }
        writeln!(f, "  Transitions:")?;
        for t in &self.transitions {
            let pre: Vec<String> = self
                .preset(t.id)
                .iter()
                .map(|(p, w)| format!("{}x{}", w, self.places[*p].label))
                .collect();
            let post: Vec<String> = self
                .postset(t.id)
                .iter()
                .map(|(p, w)| format!("{}x{}", w, self.places[*p].label))
                .collect();
            writeln!(
                f,
                "    [{}] {}: {} -> {} when {}",
                t.id,
                t.label,
                pre.join(" + "),
                post.join(" + "),
                t.guard
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sequence_net() -> DataPetriNet {
        let mut net = DataPetriNet::new("seq");
        let i = net.add_place("i", 1, false);
        let o = net.add_place("o", 0, true);
        let t = net.add_transition("t", Formula::True);
        net.add_arc(Node::Place(i), Node::Transition(t), 1).unwrap();
        net.add_arc(Node::Transition(t), Node::Place(o), 1).unwrap();
        net
    }

    #[test]
    fn firing_moves_tokens() {
        let net = sequence_net();
        let m0 = net.initial_marking();
        assert!(net.is_enabled(0, &m0));
        let m1 = net.fire(0, &m0).unwrap();
        assert_eq!(m1, Marking::from_counts(&[0, 1]));
        assert_eq!(m1, net.final_marking());
        assert!(net.fire(0, &m1).is_none());
    }

    #[test]
    fn place_to_place_arc_is_rejected() {
        let mut net = sequence_net();
        let err = net.add_arc(Node::Place(0), Node::Place(1), 1).unwrap_err();
        assert!(matches!(err, NetError::InvalidArc { .. }));
        let err = net.add_arc(Node::Place(7), Node::Transition(0), 1).unwrap_err();
        assert!(matches!(err, NetError::DanglingArc { .. }));
    }

    #[test]
    fn validate_rejects_undeclared_guard_variable() {
        let mut net = sequence_net();
        net.set_guard(
            0,
            Formula::atom(Atom::with_const(
                VarRef::write("x", Domain::Int),
                CmpOp::Gt,
                Value::Int(5),
            )),
        );
        assert!(matches!(
            net.validate(),
            Err(NetError::UnknownVariable { .. })
        ));
        net.add_variable("x", Domain::Int, Value::Int(0)).unwrap();
        assert_eq!(net.validate(), Ok(()));
        assert_eq!(net.written_variables(0).len(), 1);
    }

    #[test]
    fn string_order_comparison_is_rejected() {
        let mut net = sequence_net();
        net.add_variable("s", Domain::Str, Value::Str("a".into())).unwrap();
        net.set_guard(
            0,
            Formula::atom(Atom::with_const(
                VarRef::read("s", Domain::Str),
                CmpOp::Lt,
                Value::Str("b".into()),
            )),
        );
        assert!(matches!(
            net.validate(),
            Err(NetError::UnsupportedOperator { .. })
        ));
    }

    #[test]
    fn split_copies_arcs_and_records_lineage() {
        let mut net = sequence_net();
        let ids = net.split_transition(0, vec![Formula::True, Formula::False]);
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(net.transitions[1].base_id, 0);
        assert!(net.transitions[1].is_split);
        assert_eq!(net.preset(1), vec![(0, 1)]);
        assert_eq!(net.postset(1), vec![(1, 1)]);
    }
}
