// src/core/mod.rs — Session loop and domain types

pub mod orchestrator;
pub mod types;
