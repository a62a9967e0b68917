//! Ordered conversation log.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    /// Serialized as `ai`, the name the answering service expects.
    #[serde(rename = "ai")]
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        f.write_str(name)
    }
}

/// One immutable transcript record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub sequence: u64,
}

/// A turn as sent to the answering service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub text: String,
}

/// Append-only log of turns. Sequence numbers start at 0 and are contiguous.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn and return it.
    pub fn append(&mut self, role: Role, text: &str) -> &Turn {
        let sequence = self.turns.len() as u64;
        self.turns.push(Turn {
            role,
            text: text.to_string(),
            sequence,
        });
        &self.turns[self.turns.len() - 1]
    }

    /// Ordered `{role, text}` pairs for a service request.
    pub fn to_request_history(&self) -> Vec<HistoryEntry> {
        self.turns
            .iter()
            .map(|turn| HistoryEntry {
                role: turn.role,
                text: turn.text.clone(),
            })
            .collect()
    }

    /// Drop every turn; the next append gets sequence 0 again.
    pub fn reset(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
