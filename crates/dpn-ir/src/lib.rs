#![doc = include_str!("../README.md")]

//! Data Petri net model.
//!
//! This crate defines places, transitions and arcs, typed data variables,
//! markings with `ω`, guard formulas over read/write-tagged variable
//! instances, the textual guard syntax and the JSON net loader.

pub mod formula;
pub mod formula_text;
pub mod loader;
pub mod marking;
pub mod net;
#[cfg(any(test, feature = "proptest"))]
pub mod proptest_generators;
