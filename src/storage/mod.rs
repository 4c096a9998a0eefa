// src/storage/mod.rs — On-disk cache and session history

pub mod cache;
pub mod history;
