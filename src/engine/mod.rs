// src/engine/mod.rs
//
// Pure quiz domain logic, free of any I/O: fuzzy transcript matching and the
// per-playthrough session state machine.

pub mod matcher;
pub mod session;
