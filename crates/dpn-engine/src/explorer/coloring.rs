//! Green/red coloring of a coverability tree.

use dpn_ir::marking::Marking;

use super::state_space::{Color, CoverKind, StateSpace};

/// Colors every node: green iff some path from the root through it reaches
/// `final_marking`, either directly or by repeating a green ancestor at a
/// non-strictly covered leaf.
pub fn color_tree(space: &mut StateSpace, final_marking: &Marking) {
    let mut green = vec![false; space.len()];
    let mark = |green: &mut Vec<bool>, space: &StateSpace, id| {
        for s in space.lineage(id) {
            if green[s] {
                break;
            }
            green[s] = true;
        }
    };

    for state in space.states() {
        if state.marking == *final_marking {
            mark(&mut green, space, state.id);
        }
    }
    loop {
        let mut changed = false;
        for state in space.states() {
            let Some(covering) = state.covering else {
                continue;
            };
            if covering.kind == CoverKind::Nonstrict && green[covering.ancestor] && !green[state.id]
            {
                mark(&mut green, space, state.id);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    for (id, is_green) in green.into_iter().enumerate() {
        space.set_color(id, if is_green { Color::Green } else { Color::Red });
    }
}

pub fn all_green(space: &StateSpace) -> bool {
    space.states().iter().all(|s| s.color == Some(Color::Green))
}

pub fn all_red(space: &StateSpace) -> bool {
    space.states().iter().all(|s| s.color == Some(Color::Red))
}
