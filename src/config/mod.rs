// src/config/mod.rs
pub mod sources;
pub mod tracker;

pub use sources::{default_sources, load_sources_default, load_sources_from};
pub use tracker::{FetchSettings, TrackerConfig};
