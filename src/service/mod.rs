//! Assistant backend: answering, scene description and subject lookup.

pub mod client;
#[cfg(feature = "http")]
pub mod http;
pub mod mock;
pub mod protocol;

pub use client::{AnsweringService, SceneDescriber, SubjectDescriber};
#[cfg(feature = "http")]
pub use http::HttpServiceClient;
pub use protocol::{ImagePayload, SceneDescription};
