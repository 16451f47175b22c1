// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fragment lookup by name.

use crate::error::{Result, ShaderGraphError};
use indexmap::IndexMap;

/// Source of named fragments and graph descriptions
///
/// Implementations decide where text comes from (memory, disk, an asset
/// database). Lookups must be safe to perform from several threads.
pub trait FragmentResolver: Send + Sync {
    /// Text of the fragment called `name`
    fn load_fragment_source(&self, name: &str) -> Result<String>;

    /// Graph description JSON registered as `name`, if `name` names a graph
    fn load_graph_description(&self, _name: &str) -> Result<Option<String>> {
        Ok(None)
    }
}

/// In-memory resolver
#[derive(Debug, Clone, Default)]
pub struct FragmentLibrary {
    fragments: IndexMap<String, String>,
    graphs: IndexMap<String, String>,
}

impl FragmentLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Register fragment text under `name`, replacing any previous entry
    pub fn add_source_code(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.fragments.insert(name.into(), source.into());
    }

    /// Register a graph description under `name`, replacing any previous entry
    pub fn add_graph_description(&mut self, name: impl Into<String>, json: impl Into<String>) {
        self.graphs.insert(name.into(), json.into());
    }

    /// Names of registered fragments and graphs, in registration order
    pub fn fragment_names(&self) -> impl Iterator<Item = &str> {
        self.fragments.keys().chain(self.graphs.keys()).map(String::as_str)
    }
}

impl FragmentResolver for FragmentLibrary {
    fn load_fragment_source(&self, name: &str) -> Result<String> {
        self.fragments
            .get(name)
            .cloned()
            .ok_or_else(|| ShaderGraphError::FragmentNotFound(name.to_string()))
    }

    fn load_graph_description(&self, name: &str) -> Result<Option<String>> {
        Ok(self.graphs.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_lookup() {
        let mut library = FragmentLibrary::new();
        library.add_source_code("adder", "float main(float a, float b) { return a+b; }");
        library.add_graph_description("combo", "{}");

        assert!(library.load_fragment_source("adder").unwrap().contains("a+b"));
        assert_eq!(library.load_graph_description("combo").unwrap().as_deref(), Some("{}"));
        assert_eq!(library.load_graph_description("adder").unwrap(), None);
        assert_eq!(library.fragment_names().collect::<Vec<_>>(), ["adder", "combo"]);
    }

    #[test]
    fn test_unknown_name() {
        let library = FragmentLibrary::new();
        let err = library.load_fragment_source("missing").unwrap_err();
        assert_eq!(err, ShaderGraphError::FragmentNotFound("missing".to_string()));
        assert_eq!(err.kind(), ErrorKind::FileNotFound);
    }
}
