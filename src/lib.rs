//! Block-diagram signal-flow graph engine.
//!
//! This crate is the model core of a diagram editor: typed blocks connected
//! by directional wires, with invariant-preserving mutations, undo/redo,
//! JSON and binary persistence, and a compilation bridge to an external
//! numerical simulation engine.
//!
//! The binary `signalflow` loads a diagram file, prints it as JSON, and can
//! compile-check it for simulation.

pub mod block;
pub mod diagram;
pub mod document;
pub mod editor;
pub mod error;
pub mod history;
pub mod naming;
pub mod sim;
pub mod validate;
