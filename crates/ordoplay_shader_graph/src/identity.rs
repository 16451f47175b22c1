// SPDX-License-Identifier: MIT OR Apache-2.0
//! Content derived node identity.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identity of a piece of shader code
///
/// Two nodes share an id exactly when their shader code is textually equal
/// and both were identified through the same [`IdentityCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceId(pub u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src{}", self.0)
    }
}

/// Table assigning sequential ids to distinct shader code
#[derive(Debug, Default)]
pub struct IdentityCache {
    ids: Mutex<HashMap<String, SourceId>>,
}

impl IdentityCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of `code`, assigning the next free one on first sight
    pub fn id_for(&self, code: &str) -> SourceId {
        let mut ids = self.ids.lock();
        if let Some(id) = ids.get(code) {
            return *id;
        }
        let id = SourceId(ids.len() as u64 + 1);
        ids.insert(code.to_string(), id);
        tracing::trace!("Assigned {} to {} bytes of shader code", id, code.len());
        id
    }

    /// Number of distinct codes seen
    pub fn len(&self) -> usize {
        self.ids.lock().len()
    }

    /// Whether no code has been identified yet
    pub fn is_empty(&self) -> bool {
        self.ids.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_code_equal_id() {
        let cache = IdentityCache::new();
        let a = cache.id_for("float main() { return 1; }");
        let b = cache.id_for("float main() { return 1; }");
        let c = cache.id_for("float main() { return 2; }");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(cache.len(), 2);
        assert_ne!(a, SourceId::default());
    }

    #[test]
    fn test_concurrent_use() {
        let cache = IdentityCache::new();
        let codes: Vec<String> = (0..8).map(|i| format!("float main() {{ return {i}; }}")).collect();

        let ids: Vec<Vec<SourceId>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| scope.spawn(|| codes.iter().map(|code| cache.id_for(code)).collect::<Vec<_>>()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(cache.len(), codes.len());
        assert!(ids.windows(2).all(|w| w[0] == w[1]));
    }
}
