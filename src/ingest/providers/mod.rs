// src/ingest/providers/mod.rs
pub mod arcagi2;
pub mod gdpval;
pub mod metr;

use std::collections::HashMap;

use crate::ingest::types::Extractor;

/// Maps a source's `extractor` tag to its implementation.
#[derive(Default)]
pub struct ExtractorRegistry {
    extractors: HashMap<String, Box<dyn Extractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every extractor shipped in this crate.
    pub fn builtin() -> Self {
        Self::new()
            .with("metr", metr::MetrExtractor)
            .with("gdpval", gdpval::GdpvalExtractor)
            .with("arcagi2", arcagi2::ArcAgi2Extractor)
    }

    pub fn with<E: Extractor + 'static>(mut self, tag: &str, extractor: E) -> Self {
        self.register(tag, Box::new(extractor));
        self
    }

    /// Later registrations under the same tag replace earlier ones.
    pub fn register(&mut self, tag: &str, extractor: Box<dyn Extractor>) {
        self.extractors.insert(tag.to_ascii_lowercase(), extractor);
    }

    pub fn get(&self, tag: &str) -> Option<&dyn Extractor> {
        self.extractors
            .get(&tag.to_ascii_lowercase())
            .map(|b| b.as_ref())
    }

    pub fn tags(&self) -> Vec<&str> {
        let mut v: Vec<&str> = self.extractors.keys().map(String::as_str).collect();
        v.sort_unstable();
        v
    }
}
