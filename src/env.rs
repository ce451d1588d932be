//! Environment-mapping state for a [`crate::template::CommandTemplate`].
//!
//! The OS environment is only snapshotted the first time a bake actually
//! touches it; an untouched template carries the `Inherited` marker straight
//! through to spawn, where it becomes a no-op (the child simply inherits the
//! parent's environment).

use std::collections::HashMap;

/// A template's environment: either "whatever the OS gives us" or a
/// materialized, explicitly-baked mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvState {
    Inherited,
    Explicit(HashMap<String, String>),
}

impl Default for EnvState {
    fn default() -> Self {
        EnvState::Inherited
    }
}

impl EnvState {
    /// Fold `incoming` onto the current state, left-to-right, with
    /// empty-value-deletes: an empty string removes the key, anything else
    /// assigns it.
    pub fn merge(&self, incoming: &HashMap<String, String>) -> EnvState {
        let mut base = self.materialize();
        for (key, value) in incoming {
            if value.is_empty() {
                base.remove(key);
            } else {
                base.insert(key.clone(), value.clone());
            }
        }
        EnvState::Explicit(base)
    }

    /// Reset to an empty, explicit mapping — distinct from merging an empty
    /// mapping, which is a no-op against whatever state already holds.
    pub fn cleared() -> EnvState {
        EnvState::Explicit(HashMap::new())
    }

    fn materialize(&self) -> HashMap<String, String> {
        match self {
            EnvState::Inherited => std::env::vars().collect(),
            EnvState::Explicit(map) => map.clone(),
        }
    }

    /// Whether this state should be applied at spawn time, or left alone so
    /// the child simply inherits the parent's environment.
    pub fn as_explicit(&self) -> Option<&HashMap<String, String>> {
        match self {
            EnvState::Inherited => None,
            EnvState::Explicit(map) => Some(map),
        }
    }
}
