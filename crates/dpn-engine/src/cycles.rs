//! Cycles of an explored state space.
//!
//! In a tree, a cycle closes at every non-strictly covered leaf; in a graph,
//! at every arc back to a discovery ancestor (self-loops included). Cycles
//! sharing a state are merged, so the result is pairwise state-disjoint.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::explorer::{ArcId, CoverKind, CoveringPolicy, StateId, StateSpace};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Cycle {
    pub states: BTreeSet<StateId>,
    pub arcs: BTreeSet<ArcId>,
    /// Arcs leaving a state of the cycle that are not part of it.
    pub output_arcs: BTreeSet<ArcId>,
}

impl Cycle {
    fn merge(&mut self, other: Cycle) {
        self.states.extend(other.states);
        self.arcs.extend(other.arcs);
        self.output_arcs.extend(other.output_arcs);
        let arcs = &self.arcs;
        self.output_arcs.retain(|a| !arcs.contains(a));
    }
}

pub fn find_cycles(space: &StateSpace) -> Vec<Cycle> {
    let mut cycles = Vec::new();
    if space.policy() == CoveringPolicy::Tree {
        for state in space.states() {
            if let Some(cover) = state.covering {
                if cover.kind == CoverKind::Nonstrict {
                    cycles.push(walk(space, state.id, cover.ancestor, None));
                }
            }
        }
    } else {
        for arc in space.arcs() {
            let back = arc.target == arc.source || space.state(arc.source).has_ancestor(arc.target);
            if back {
                cycles.push(walk(space, arc.source, arc.target, Some(arc.id)));
            }
        }
    }
    merge_overlapping(cycles)
}

/// Follows parent pointers from `from` up to `to`.
fn walk(space: &StateSpace, from: StateId, to: StateId, closing: Option<ArcId>) -> Cycle {
    let mut cycle = Cycle::default();
    cycle.arcs.extend(closing);
    let mut current = from;
    cycle.states.insert(current);
    while current != to {
        let Some((parent, arc)) = space.state(current).parent else {
            break;
        };
        cycle.arcs.insert(arc);
        cycle.states.insert(parent);
        current = parent;
    }
    for &s in &cycle.states {
        for arc in space.outgoing(s) {
            if !cycle.arcs.contains(&arc.id) {
                cycle.output_arcs.insert(arc.id);
            }
        }
    }
    cycle
}

fn merge_overlapping(mut cycles: Vec<Cycle>) -> Vec<Cycle> {
    let mut merged: Vec<Cycle> = Vec::new();
    while let Some(mut cycle) = cycles.pop() {
        loop {
            let Some(i) = merged
                .iter()
                .position(|m| !m.states.is_disjoint(&cycle.states))
            else {
                break;
            };
            cycle.merge(merged.swap_remove(i));
        }
        merged.push(cycle);
    }
    merged.sort_by_key(|c| c.states.iter().next().copied());
    merged
}

#[cfg(test)]
mod tests {
    use dpn_ir::formula::Formula;
    use dpn_ir::marking::Marking;

    use super::*;
    use crate::explorer::Covering;

    fn m(c: &[u32]) -> Marking {
        Marking::from_counts(c)
    }

    #[test]
    fn graph_back_arcs_and_self_loops() {
        // 0 -> 1 -> 2 -> 0, 1 -> 3, 3 -> 3
        let mut space = StateSpace::new(CoveringPolicy::Exact);
        let s0 = space.add_state(m(&[1, 0, 0, 0]), Formula::True, None);
        let s1 = space.add_state(m(&[0, 1, 0, 0]), Formula::True, Some(s0));
        let a01 = space.add_arc(s0, s1, 0, false);
        let s2 = space.add_state(m(&[0, 0, 1, 0]), Formula::True, Some(s1));
        let a12 = space.add_arc(s1, s2, 1, false);
        let a20 = space.add_arc(s2, s0, 2, false);
        let s3 = space.add_state(m(&[0, 0, 0, 1]), Formula::True, Some(s1));
        let a13 = space.add_arc(s1, s3, 3, false);
        let a33 = space.add_arc(s3, s3, 4, false);

        let cycles = find_cycles(&space);
        assert_eq!(cycles.len(), 2);
        assert_eq!(cycles[0].states, BTreeSet::from([s0, s1, s2]));
        assert_eq!(cycles[0].arcs, BTreeSet::from([a01, a12, a20]));
        assert_eq!(cycles[0].output_arcs, BTreeSet::from([a13]));
        assert_eq!(cycles[1].states, BTreeSet::from([s3]));
        assert_eq!(cycles[1].arcs, BTreeSet::from([a33]));
        assert!(cycles[1].output_arcs.is_empty());
    }

    #[test]
    fn tree_cycles_sharing_states_are_merged() {
        // 0 -> 1 -> 2 (covered by 0), 1 -> 3 (covered by 1), 0 -> 4
        let mut space = StateSpace::new(CoveringPolicy::Tree);
        let s0 = space.add_state(m(&[1, 0]), Formula::True, None);
        let s1 = space.add_state(m(&[0, 1]), Formula::True, Some(s0));
        let a01 = space.add_arc(s0, s1, 0, false);
        let s2 = space.add_state(m(&[1, 0]), Formula::True, Some(s1));
        let a12 = space.add_arc(s1, s2, 1, false);
        let s3 = space.add_state(m(&[0, 1]), Formula::True, Some(s1));
        let a13 = space.add_arc(s1, s3, 2, false);
        let s4 = space.add_state(m(&[0, 0]), Formula::True, Some(s0));
        let a04 = space.add_arc(s0, s4, 3, false);
        for (leaf, ancestor) in [(s2, s0), (s3, s1)] {
            space.set_covering(
                leaf,
                Covering {
                    kind: CoverKind::Nonstrict,
                    ancestor,
                },
            );
        }

        let cycles = find_cycles(&space);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].states, BTreeSet::from([s0, s1, s2, s3]));
        assert_eq!(cycles[0].arcs, BTreeSet::from([a01, a12, a13]));
        assert_eq!(cycles[0].output_arcs, BTreeSet::from([a04]));
    }
}
