// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared state for building nodes and graphs.

use crate::config::CompilerOptions;
use crate::identity::IdentityCache;
use crate::resolver::FragmentResolver;
use std::fmt;
use std::sync::Arc;

/// Options, identity table and fragment resolver used by node constructors
///
/// Cloning is cheap and clones share the identity table, so nodes built from
/// any clone compare ids consistently.
#[derive(Clone)]
pub struct ShaderContext {
    options: CompilerOptions,
    identity: Arc<IdentityCache>,
    resolver: Arc<dyn FragmentResolver>,
}

impl ShaderContext {
    /// Create a context with default options and a fresh identity table
    pub fn new(resolver: impl FragmentResolver + 'static) -> Self {
        Self {
            options: CompilerOptions::default(),
            identity: Arc::new(IdentityCache::new()),
            resolver: Arc::new(resolver),
        }
    }

    /// Replace the compiler options
    pub fn with_options(mut self, options: CompilerOptions) -> Self {
        self.options = options;
        self
    }

    /// Share an existing identity table
    pub fn with_identity_cache(mut self, identity: Arc<IdentityCache>) -> Self {
        self.identity = identity;
        self
    }

    /// Compiler options
    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    /// Identity table
    pub fn identity(&self) -> &IdentityCache {
        &self.identity
    }

    /// Fragment resolver
    pub fn resolver(&self) -> &dyn FragmentResolver {
        self.resolver.as_ref()
    }
}

impl fmt::Debug for ShaderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShaderContext")
            .field("options", &self.options)
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ShaderNode;
    use crate::resolver::FragmentLibrary;

    const ADDER: &str = "float main(float a, float b) { return a+b; }";

    #[test]
    fn test_shared_identity() {
        let identity = Arc::new(IdentityCache::new());
        let a = ShaderContext::new(FragmentLibrary::new()).with_identity_cache(identity.clone());
        let b = ShaderContext::new(FragmentLibrary::new()).with_identity_cache(identity.clone());

        let first = ShaderNode::from_source(ADDER, &a).unwrap();
        let second = ShaderNode::from_source(ADDER, &b).unwrap();
        assert_eq!(first.id(), second.id());
        assert_eq!(identity.len(), 1);
    }

    #[test]
    fn test_custom_entry_point() {
        let options = CompilerOptions {
            entry_point: "mtl_main".to_string(),
            ..CompilerOptions::default()
        };
        let ctx = ShaderContext::new(FragmentLibrary::new()).with_options(options);
        let node = ShaderNode::from_source("float mtl_main(float x) { return x; }", &ctx).unwrap();
        assert_eq!(node.inputs().len(), 1);
        assert!(ShaderNode::from_source(ADDER, &ctx).is_err());
    }
}
