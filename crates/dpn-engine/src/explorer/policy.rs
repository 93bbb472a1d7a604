use std::fmt;

use serde::Serialize;

/// How a newly reached state is matched against already explored ones.
/// The policy also determines which kind of graph is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CoveringPolicy {
    /// Labelled transition system / constraint graph: merge equal states,
    /// abort on unboundedness.
    #[default]
    Exact,
    /// Coverability graph: accelerate dominating markings to `ω`.
    OmegaAbstraction,
    /// Coverability tree: never merge, stop at covered leaves.
    Tree,
}

impl CoveringPolicy {
    pub fn graph_kind(self) -> &'static str {
        match self {
            CoveringPolicy::Exact => "constraint graph",
            CoveringPolicy::OmegaAbstraction => "coverability graph",
            CoveringPolicy::Tree => "coverability tree",
        }
    }
}

impl fmt::Display for CoveringPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoveringPolicy::Exact => write!(f, "exact"),
            CoveringPolicy::OmegaAbstraction => write!(f, "omega"),
            CoveringPolicy::Tree => write!(f, "tree"),
        }
    }
}
