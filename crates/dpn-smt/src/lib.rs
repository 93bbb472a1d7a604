#![doc = include_str!("../README.md")]

//! Constraint solving for data Petri net guards.
//!
//! Formulas from `dpn-ir` are encoded into backend-independent SMT terms,
//! checked with Z3, and projected with a native quantifier elimination for
//! difference constraints. [`constraints::ConstraintSolver`] is the entry
//! point used by the exploration engine.

pub mod backends;
pub mod constraints;
pub mod encoder;
pub mod qe;
pub mod solver;
pub mod sorts;
pub mod terms;
