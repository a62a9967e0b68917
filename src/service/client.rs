//! Service boundaries used by the dialogues.

use crate::dialogue::transcript::HistoryEntry;
use crate::error::Result;
use crate::service::protocol::{ImagePayload, SceneDescription};
use async_trait::async_trait;

/// Answers a follow-up question given the conversation so far.
#[async_trait]
pub trait AnsweringService: Send + Sync {
    /// `history` is the transcript before `query` was asked.
    async fn ask(&self, history: Vec<HistoryEntry>, query: String) -> Result<String>;
}

/// Describes a still image for narration.
#[async_trait]
pub trait SceneDescriber: Send + Sync {
    async fn describe_scene(&self, image: ImagePayload) -> Result<SceneDescription>;
}

/// Looks up background information on a subject.
#[async_trait]
pub trait SubjectDescriber: Send + Sync {
    async fn describe_subject(&self, subject: &str) -> Result<String>;
}
