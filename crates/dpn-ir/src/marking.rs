use std::cmp::Ordering;
use std::fmt;

use serde::{Serialize, Serializer};

/// Token count of a single place. `Omega` stands for "unboundedly many".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenCount {
    Finite(u32),
    Omega,
}

impl TokenCount {
    pub fn is_zero(self) -> bool {
        self == TokenCount::Finite(0)
    }

    pub fn is_omega(self) -> bool {
        self == TokenCount::Omega
    }

    /// `ω + k = ω`.
    pub fn add(self, k: u32) -> TokenCount {
        match self {
            TokenCount::Finite(n) => TokenCount::Finite(n.saturating_add(k)),
            TokenCount::Omega => TokenCount::Omega,
        }
    }

    /// `ω - k = ω`; `None` when a finite count holds fewer than `k` tokens.
    pub fn sub(self, k: u32) -> Option<TokenCount> {
        match self {
            TokenCount::Finite(n) => n.checked_sub(k).map(TokenCount::Finite),
            TokenCount::Omega => Some(TokenCount::Omega),
        }
    }

    pub fn at_least(self, k: u32) -> bool {
        match self {
            TokenCount::Finite(n) => n >= k,
            TokenCount::Omega => true,
        }
    }
}

impl PartialOrd for TokenCount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TokenCount {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (TokenCount::Finite(a), TokenCount::Finite(b)) => a.cmp(b),
            (TokenCount::Finite(_), TokenCount::Omega) => Ordering::Less,
            (TokenCount::Omega, TokenCount::Finite(_)) => Ordering::Greater,
            (TokenCount::Omega, TokenCount::Omega) => Ordering::Equal,
        }
    }
}

impl fmt::Display for TokenCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenCount::Finite(n) => write!(f, "{n}"),
            TokenCount::Omega => write!(f, "ω"),
        }
    }
}

impl Serialize for TokenCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TokenCount::Finite(n) => serializer.serialize_u32(*n),
            TokenCount::Omega => serializer.serialize_str("omega"),
        }
    }
}

/// Result of comparing two markings componentwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkingOrder {
    Equal,
    GreaterThan,
    LessThan,
    Incomparable,
}

/// Token distribution over the places of a net, indexed by place id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Marking {
    tokens: Vec<TokenCount>,
}

impl Marking {
    pub fn new(tokens: Vec<TokenCount>) -> Self {
        Marking { tokens }
    }

    pub fn from_counts(counts: &[u32]) -> Self {
        Marking {
            tokens: counts.iter().map(|&n| TokenCount::Finite(n)).collect(),
        }
    }

    pub fn zeros(places: usize) -> Self {
        Marking {
            tokens: vec![TokenCount::Finite(0); places],
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn get(&self, place: usize) -> TokenCount {
        self.tokens
            .get(place)
            .copied()
            .unwrap_or(TokenCount::Finite(0))
    }

    pub fn iter(&self) -> impl Iterator<Item = TokenCount> + '_ {
        self.tokens.iter().copied()
    }

    pub fn has_omega(&self) -> bool {
        self.tokens.iter().any(|t| t.is_omega())
    }

    /// Places holding `ω`.
    pub fn omega_places(&self) -> Vec<usize> {
        self.tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_omega())
            .map(|(i, _)| i)
            .collect()
    }

    /// Componentwise comparison. Markings of different length never compare.
    pub fn compare(&self, other: &Marking) -> MarkingOrder {
        if self.tokens.len() != other.tokens.len() {
            return MarkingOrder::Incomparable;
        }
        let mut greater = false;
        let mut less = false;
        for (a, b) in self.tokens.iter().zip(&other.tokens) {
            match a.cmp(b) {
                Ordering::Greater => greater = true,
                Ordering::Less => less = true,
                Ordering::Equal => {}
            }
            if greater && less {
                return MarkingOrder::Incomparable;
            }
        }
        match (greater, less) {
            (false, false) => MarkingOrder::Equal,
            (true, false) => MarkingOrder::GreaterThan,
            (false, true) => MarkingOrder::LessThan,
            (true, true) => MarkingOrder::Incomparable,
        }
    }

    /// `self >= other` componentwise.
    pub fn covers(&self, other: &Marking) -> bool {
        matches!(
            self.compare(other),
            MarkingOrder::Equal | MarkingOrder::GreaterThan
        )
    }

    /// Sets every place where `self` exceeds `smaller` to `ω`.
    pub fn accelerate(&self, smaller: &Marking) -> Marking {
        let tokens = self
            .tokens
            .iter()
            .zip(&smaller.tokens)
            .map(|(a, b)| if a > b { TokenCount::Omega } else { *a })
            .collect();
        Marking { tokens }
    }

    /// Removes `weight` tokens from `place`; `None` if not enough are present.
    pub fn take(&self, place: usize, weight: u32) -> Option<Marking> {
        let mut tokens = self.tokens.clone();
        let slot = tokens.get_mut(place)?;
        *slot = slot.sub(weight)?;
        Some(Marking { tokens })
    }

    /// Adds `weight` tokens to `place`.
    pub fn put(&self, place: usize, weight: u32) -> Marking {
        let mut tokens = self.tokens.clone();
        if let Some(slot) = tokens.get_mut(place) {
            *slot = slot.add(weight);
        }
        Marking { tokens }
    }
}

impl FromIterator<TokenCount> for Marking {
    fn from_iter<I: IntoIterator<Item = TokenCount>>(iter: I) -> Self {
        Marking {
            tokens: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Marking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, t) in self.tokens.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{t}")?;
        }
        write!(f, "]")
    }
}
