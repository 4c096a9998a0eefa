// src/lib.rs — Library root for patentscout

pub mod cli;
pub mod core;
pub mod evaluator;
pub mod infra;
pub mod optimizer;
pub mod provider;
pub mod search;
pub mod storage;
pub mod util;
