//! In-memory services for tests and offline runs.

use crate::dialogue::transcript::HistoryEntry;
use crate::error::{ParleyError, Result};
use crate::service::client::{AnsweringService, SceneDescriber, SubjectDescriber};
use crate::service::protocol::{ImagePayload, SceneDescription};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One recorded `ask` call.
#[derive(Debug, Clone, PartialEq)]
pub struct AskCall {
    pub history: Vec<HistoryEntry>,
    pub query: String,
}

/// Mock answering service
///
/// Replies with queued responses in order, then repeats the default reply.
#[derive(Debug, Clone)]
pub struct MockAnsweringService {
    replies: Arc<Mutex<Vec<Result<String>>>>,
    default_reply: String,
    delay: Option<Duration>,
    calls: Arc<Mutex<Vec<AskCall>>>,
}

impl Default for MockAnsweringService {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAnsweringService {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(Vec::new())),
            default_reply: "mock answer".to_string(),
            delay: None,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a successful reply
    pub fn with_response(self, reply: &str) -> Self {
        self.push(Ok(reply.to_string()));
        self
    }

    /// Queue a failing reply
    pub fn with_failure(self, message: &str) -> Self {
        self.push(Err(ParleyError::ServiceRequest {
            message: message.to_string(),
        }));
        self
    }

    /// Delay every reply by `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    fn push(&self, reply: Result<String>) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push(reply);
        }
    }

    /// Calls received so far, including ones whose reply is still delayed.
    pub fn calls(&self) -> Vec<AskCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AnsweringService for MockAnsweringService {
    async fn ask(&self, history: Vec<HistoryEntry>, query: String) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(AskCall { history, query });
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self
            .replies
            .lock()
            .ok()
            .and_then(|mut replies| (!replies.is_empty()).then(|| replies.remove(0)));
        queued.unwrap_or_else(|| Ok(self.default_reply.clone()))
    }
}

/// Mock scene description service
#[derive(Debug, Clone, Default)]
pub struct MockSceneDescriber {
    scene: SceneDescription,
    should_fail: bool,
    uploads: Arc<Mutex<Vec<String>>>,
}

impl MockSceneDescriber {
    pub fn new(description: &str) -> Self {
        Self {
            scene: SceneDescription {
                scene_description: description.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Offer a learning follow-up
    pub fn with_learning(mut self, learning: &str) -> Self {
        self.scene.has_learning = true;
        self.scene.learning = learning.to_string();
        self
    }

    pub fn with_failure(mut self) -> Self {
        self.should_fail = true;
        self
    }

    /// File names of uploaded images.
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SceneDescriber for MockSceneDescriber {
    async fn describe_scene(&self, image: ImagePayload) -> Result<SceneDescription> {
        if let Ok(mut uploads) = self.uploads.lock() {
            uploads.push(image.filename);
        }
        if self.should_fail {
            return Err(ParleyError::ServiceStatus { status: 503 });
        }
        Ok(self.scene.clone())
    }
}

/// Mock subject description service
#[derive(Debug, Clone, Default)]
pub struct MockSubjectDescriber {
    description: Option<String>,
    subjects: Arc<Mutex<Vec<String>>>,
}

impl MockSubjectDescriber {
    pub fn new(description: &str) -> Self {
        Self {
            description: Some(description.to_string()),
            ..Default::default()
        }
    }

    /// A describer that reports every subject as unknown
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn subjects(&self) -> Vec<String> {
        self.subjects.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl SubjectDescriber for MockSubjectDescriber {
    async fn describe_subject(&self, subject: &str) -> Result<String> {
        if let Ok(mut subjects) = self.subjects.lock() {
            subjects.push(subject.to_string());
        }
        self.description
            .clone()
            .ok_or_else(|| ParleyError::ServiceResponse {
                message: format!("no information about {subject}"),
            })
    }
}
