//! HTTP client for the assistant backend.

use crate::config::ServiceConfig;
use crate::dialogue::transcript::HistoryEntry;
use crate::error::{ParleyError, Result};
use crate::service::client::{AnsweringService, SceneDescriber, SubjectDescriber};
use crate::service::protocol::{
    self, ASK_MORE_PATH, AskMoreRequest, AskMoreResponse, ImagePayload, SCENE_DESCRIPTION_PATH,
    SUBJECT_PATH, SceneDescription, SubjectRequest, SubjectResponse,
};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::{Form, Part};
use std::time::Duration;

/// Talks to all three backend endpoints over one connection pool.
#[derive(Debug, Clone)]
pub struct HttpServiceClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpServiceClient {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ParleyError::ServiceRequest {
                message: format!("Failed to build HTTP client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json(&self, path: &str, body: Vec<u8>) -> Result<String> {
        let response = self
            .client
            .post(self.url(path))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(request_error)?;
        read_body(response).await
    }
}

fn request_error(e: reqwest::Error) -> ParleyError {
    ParleyError::ServiceRequest {
        message: e.to_string(),
    }
}

async fn read_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    if !status.is_success() {
        return Err(ParleyError::ServiceStatus {
            status: status.as_u16(),
        });
    }
    response.text().await.map_err(|e| ParleyError::ServiceResponse {
        message: format!("Failed to read response: {e}"),
    })
}

#[async_trait]
impl AnsweringService for HttpServiceClient {
    async fn ask(&self, history: Vec<HistoryEntry>, query: String) -> Result<String> {
        let body = protocol::encode(&AskMoreRequest {
            conversation_history: history,
            query,
        })?;
        let text = self.post_json(ASK_MORE_PATH, body).await?;
        protocol::parse::<AskMoreResponse>(&text)?.into_reply()
    }
}

#[async_trait]
impl SubjectDescriber for HttpServiceClient {
    async fn describe_subject(&self, subject: &str) -> Result<String> {
        let body = protocol::encode(&SubjectRequest {
            subject: subject.to_string(),
        })?;
        let text = self.post_json(SUBJECT_PATH, body).await?;
        protocol::parse::<SubjectResponse>(&text)?.into_description()
    }
}

#[async_trait]
impl SceneDescriber for HttpServiceClient {
    async fn describe_scene(&self, image: ImagePayload) -> Result<SceneDescription> {
        let part = Part::bytes(image.bytes)
            .file_name(image.filename)
            .mime_str(&image.mime)
            .map_err(request_error)?;
        let form = Form::new().part("image", part);

        let response = self
            .client
            .post(self.url(SCENE_DESCRIPTION_PATH))
            .multipart(form)
            .send()
            .await
            .map_err(request_error)?;
        let text = read_body(response).await?;
        protocol::parse(&text)
    }
}
