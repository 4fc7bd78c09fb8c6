//! Session configuration.

use crate::hir::{codes, DiagnosticKind};

/// Which siblings of a nested target are resolved along with it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SiblingPolicy {
    /// Only the containers on the designation path and the declarations the
    /// target references.
    #[default]
    MinimalChain,
    /// Additionally resolve every preceding sibling to the same phase before
    /// the target itself.
    PrecedingSiblings,
}

/// Options of a [`ResolutionSession`](super::ResolutionSession).
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Error kinds that are reported but do not block code generation.
    pub ignored_diagnostics: Vec<DiagnosticKind>,
    /// Record the tower of every transformed declaration in the collector.
    pub collect_tower_contexts: bool,
    /// Resolve dependency files on the rayon pool in the compilation gate.
    pub parallel_files: bool,
    pub sibling_policy: SiblingPolicy,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ignored_diagnostics: codes::IGNORED_FOR_CODEGEN.to_vec(),
            collect_tower_contexts: true,
            parallel_files: false,
            sibling_policy: SiblingPolicy::MinimalChain,
        }
    }
}

impl SessionConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ignored_diagnostics(mut self, kinds: impl IntoIterator<Item = DiagnosticKind>) -> Self {
        self.ignored_diagnostics = kinds.into_iter().collect();
        self
    }

    pub fn with_tower_contexts(mut self, collect: bool) -> Self {
        self.collect_tower_contexts = collect;
        self
    }

    pub fn with_parallel_files(mut self, parallel: bool) -> Self {
        self.parallel_files = parallel;
        self
    }

    pub fn with_sibling_policy(mut self, policy: SiblingPolicy) -> Self {
        self.sibling_policy = policy;
        self
    }

    /// Load a config from JSON; missing fields take their defaults.
    #[cfg(feature = "serde")]
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
