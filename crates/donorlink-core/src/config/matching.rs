//! Match confirmation input rules.

use serde::{Deserialize, Serialize};

/// Input-shape limits enforced by the confirmation gate.
///
/// The lifecycle engine only requires a non-empty reason; these practical
/// minimums apply to user-entered text before anything is sent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Minimum length of a reject/withdraw reason, in characters.
    #[serde(default = "default_min_reason")]
    pub min_reason_length: usize,
    /// Minimum length of completion notes, in characters.
    #[serde(default = "default_min_notes")]
    pub min_notes_length: usize,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            min_reason_length: default_min_reason(),
            min_notes_length: default_min_notes(),
        }
    }
}

fn default_min_reason() -> usize {
    10
}

fn default_min_notes() -> usize {
    10
}
