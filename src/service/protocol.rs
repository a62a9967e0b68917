//! Request and response bodies of the assistant backend.

use crate::dialogue::transcript::HistoryEntry;
use crate::error::{ParleyError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const ASK_MORE_PATH: &str = "/api/ask_more";
pub const SCENE_DESCRIPTION_PATH: &str = "/api/scene-description";
pub const SUBJECT_PATH: &str = "/api/scrap_subject";

/// Body of `POST /api/ask_more`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AskMoreRequest {
    pub conversation_history: Vec<HistoryEntry>,
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AskMoreResponse {
    #[serde(default)]
    pub info: Option<String>,
}

impl AskMoreResponse {
    /// The reply text. A missing or blank `info` is a malformed response.
    pub fn into_reply(self) -> Result<String> {
        match self.info {
            Some(info) if !info.trim().is_empty() => Ok(info),
            Some(_) => Err(ParleyError::ServiceResponse {
                message: "empty answer".to_string(),
            }),
            None => Err(ParleyError::ServiceResponse {
                message: "missing field `info`".to_string(),
            }),
        }
    }
}

/// Response of `POST /api/scene-description`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    #[serde(default)]
    pub scene_description: String,
    #[serde(default)]
    pub has_learning: bool,
    #[serde(default)]
    pub learning: String,
}

impl SceneDescription {
    /// The learning follow-up, when the service offered a usable one.
    pub fn learning(&self) -> Option<&str> {
        let learning = self.learning.trim();
        (self.has_learning && !learning.is_empty()).then_some(learning)
    }
}

/// Body of `POST /api/scrap_subject`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubjectRequest {
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SubjectResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl SubjectResponse {
    pub fn into_description(self) -> Result<String> {
        if !self.success {
            return Err(ParleyError::ServiceResponse {
                message: self
                    .error
                    .unwrap_or_else(|| "subject lookup failed".to_string()),
            });
        }
        match self.description {
            Some(description) if !description.trim().is_empty() => Ok(description),
            _ => Err(ParleyError::ServiceResponse {
                message: "empty description".to_string(),
            }),
        }
    }
}

/// An image to upload for scene description.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub mime: String,
}

impl ImagePayload {
    /// Read an image file, guessing its MIME type from the extension.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("image")
            .to_string();
        let mime = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self {
            bytes,
            filename,
            mime,
        })
    }
}

/// Parse a JSON response body.
pub fn parse<T: DeserializeOwned>(body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| ParleyError::ServiceResponse {
        message: e.to_string(),
    })
}

/// Serialize a JSON request body.
pub fn encode<T: Serialize>(body: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(body).map_err(|e| ParleyError::ServiceRequest {
        message: format!("Failed to encode request: {e}"),
    })
}
