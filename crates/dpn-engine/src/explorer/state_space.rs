//! Arena storage for explored states and arcs.

use std::collections::HashMap;

use dpn_ir::formula::Formula;
use dpn_ir::marking::Marking;
use dpn_ir::net::TransitionId;
use serde::Serialize;

use super::policy::CoveringPolicy;

pub type StateId = usize;
pub type ArcId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverKind {
    /// The leaf repeats its ancestor's marking.
    Nonstrict,
    /// The leaf's marking strictly exceeds its ancestor's.
    Strict,
}

/// Tree leaf that is not expanded because an ancestor covers it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Covering {
    pub kind: CoverKind,
    pub ancestor: StateId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    Green,
    Red,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum AbortReason {
    /// A new marking strictly dominated an ancestor with an equivalent
    /// formula.
    Unbounded { state: StateId },
    StateLimit { limit: usize },
    Timeout { secs: u64 },
}

#[derive(Debug, Clone)]
pub struct StateNode {
    pub id: StateId,
    pub marking: Marking,
    pub formula: Formula,
    /// Discovery ancestors, ascending.
    pub ancestors: Vec<StateId>,
    /// Discovery parent and the arc it was reached through.
    pub parent: Option<(StateId, ArcId)>,
    pub covering: Option<Covering>,
    pub color: Option<Color>,
}

impl StateNode {
    pub fn has_ancestor(&self, id: StateId) -> bool {
        self.ancestors.binary_search(&id).is_ok()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateArc {
    pub id: ArcId,
    pub source: StateId,
    pub target: StateId,
    pub transition: TransitionId,
    /// Data refinement without token movement.
    pub silent: bool,
}

/// Explored state space. Ids are dense and issued in discovery order, so
/// the root is always state `0`.
#[derive(Debug, Clone)]
pub struct StateSpace {
    policy: CoveringPolicy,
    states: Vec<StateNode>,
    arcs: Vec<StateArc>,
    outgoing: Vec<Vec<ArcId>>,
    incoming: Vec<Vec<ArcId>>,
    by_marking: HashMap<Marking, Vec<StateId>>,
    is_full_graph: bool,
    abort: Option<AbortReason>,
}

impl StateSpace {
    pub(crate) fn new(policy: CoveringPolicy) -> Self {
        Self {
            policy,
            states: Vec::new(),
            arcs: Vec::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
            by_marking: HashMap::new(),
            is_full_graph: false,
            abort: None,
        }
    }

    pub fn policy(&self) -> CoveringPolicy {
        self.policy
    }

    pub fn initial_state(&self) -> Option<&StateNode> {
        self.states.first()
    }

    pub fn states(&self) -> &[StateNode] {
        &self.states
    }

    pub fn arcs(&self) -> &[StateArc] {
        &self.arcs
    }

    pub fn state(&self, id: StateId) -> &StateNode {
        &self.states[id]
    }

    pub fn arc(&self, id: ArcId) -> &StateArc {
        &self.arcs[id]
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// `true` iff exploration ran until the frontier was empty.
    pub fn is_full_graph(&self) -> bool {
        self.is_full_graph
    }

    pub fn abort_reason(&self) -> Option<&AbortReason> {
        self.abort.as_ref()
    }

    pub fn outgoing(&self, id: StateId) -> impl Iterator<Item = &StateArc> + '_ {
        self.outgoing[id].iter().map(move |&a| &self.arcs[a])
    }

    pub fn incoming(&self, id: StateId) -> impl Iterator<Item = &StateArc> + '_ {
        self.incoming[id].iter().map(move |&a| &self.arcs[a])
    }

    /// States with exactly this marking.
    pub fn with_marking(&self, marking: &Marking) -> &[StateId] {
        self.by_marking
            .get(marking)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// `id` and its discovery ancestors, nearest first.
    pub fn lineage(&self, id: StateId) -> impl Iterator<Item = StateId> + '_ {
        std::iter::once(id).chain(self.states[id].ancestors.iter().rev().copied())
    }

    pub fn has_omega(&self) -> bool {
        self.states.iter().any(|s| s.marking.has_omega())
    }

    pub(crate) fn add_state(
        &mut self,
        marking: Marking,
        formula: Formula,
        parent: Option<StateId>,
    ) -> StateId {
        let id = self.states.len();
        let ancestors = match parent {
            Some(p) => {
                let mut a = self.states[p].ancestors.clone();
                a.push(p);
                a
            }
            None => Vec::new(),
        };
        self.by_marking.entry(marking.clone()).or_default().push(id);
        self.states.push(StateNode {
            id,
            marking,
            formula,
            ancestors,
            parent: None,
            covering: None,
            color: None,
        });
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        id
    }

    pub(crate) fn add_arc(
        &mut self,
        source: StateId,
        target: StateId,
        transition: TransitionId,
        silent: bool,
    ) -> ArcId {
        let id = self.arcs.len();
        self.arcs.push(StateArc {
            id,
            source,
            target,
            transition,
            silent,
        });
        self.outgoing[source].push(id);
        self.incoming[target].push(id);
        if self.states[target].parent.is_none() && target != 0 && source != target {
            let discovered_here = self.states[target].ancestors.last() == Some(&source);
            if discovered_here {
                self.states[target].parent = Some((source, id));
            }
        }
        id
    }

    pub(crate) fn set_covering(&mut self, id: StateId, covering: Covering) {
        self.states[id].covering = Some(covering);
    }

    pub(crate) fn set_color(&mut self, id: StateId, color: Color) {
        self.states[id].color = Some(color);
    }

    pub(crate) fn finish(&mut self) {
        self.is_full_graph = self.abort.is_none();
    }

    pub(crate) fn abort(&mut self, reason: AbortReason) {
        if self.abort.is_none() {
            self.abort = Some(reason);
        }
        self.is_full_graph = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn marking(counts: &[u32]) -> Marking {
        Marking::from_counts(counts)
    }

    #[test]
    fn ancestors_follow_discovery() {
        let mut space = StateSpace::new(CoveringPolicy::Tree);
        let root = space.add_state(marking(&[1, 0]), Formula::True, None);
        let a = space.add_state(marking(&[0, 1]), Formula::True, Some(root));
        let arc = space.add_arc(root, a, 0, false);
        let b = space.add_state(marking(&[0, 1]), Formula::False, Some(a));
        space.add_arc(a, b, 1, true);

        assert_eq!(space.state(b).ancestors, vec![root, a]);
        assert_eq!(space.state(a).parent, Some((root, arc)));
        assert!(space.state(b).has_ancestor(root));
        assert_eq!(space.lineage(b).collect::<Vec<_>>(), vec![b, a, root]);
        assert_eq!(space.with_marking(&marking(&[0, 1])), &[a, b]);
        assert_eq!(space.outgoing(a).count(), 1);
        assert_eq!(space.incoming(a).count(), 1);
    }

    #[test]
    fn merged_arcs_do_not_change_parents() {
        let mut space = StateSpace::new(CoveringPolicy::Exact);
        let root = space.add_state(marking(&[1]), Formula::True, None);
        let a = space.add_state(marking(&[2]), Formula::True, Some(root));
        let first = space.add_arc(root, a, 0, false);
        space.add_arc(a, a, 1, false);
        space.add_arc(a, root, 2, false);
        assert_eq!(space.state(a).parent, Some((root, first)));
        assert_eq!(space.state(root).parent, None);
    }

    #[test]
    fn abort_clears_full_graph_flag() {
        let mut space = StateSpace::new(CoveringPolicy::Exact);
        space.add_state(marking(&[1]), Formula::True, None);
        space.abort(AbortReason::StateLimit { limit: 1 });
        space.finish();
        assert!(!space.is_full_graph());
        assert_eq!(
            space.abort_reason(),
            Some(&AbortReason::StateLimit { limit: 1 })
        );
    }
}
