#![doc = include_str!("../README.md")]

//! Data Petri net verification engine.
//!
//! This crate builds symbolic state spaces of data Petri nets, classifies
//! their states, decides classical, lazy and relaxed lazy soundness, and
//! repairs unsound nets by strengthening guards.

pub mod composer;
pub mod cycles;
pub mod explorer;
pub mod pipeline;
pub mod refinement;
pub mod repair;
pub mod result;
pub mod soundness;
