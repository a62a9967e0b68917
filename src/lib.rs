//! parley - Voice dialogue assistant for blind and low-vision users
//!
//! Turn-taking over pluggable speech engines: recognized speech is debounced
//! into utterances, sent to an answering service, and the reply is spoken
//! back while the microphone stays closed.

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod defaults;
pub mod dialogue;
pub mod error;
pub mod host;
pub mod service;

// Composition root - needs the console engines and the HTTP client
#[cfg(all(feature = "cli", feature = "http"))]
pub mod app;

// Engine seams (host speech in, host speech out, remote answers)
pub use host::{SpeechEngines, SpeechInput, SpeechSynthesizer};
pub use service::client::{AnsweringService, SceneDescriber, SubjectDescriber};

// Dialogues
pub use dialogue::{
    Coordinator, Dialogue, DialogueState, NarrationFlow, NoteTaker, TopicDictation, run,
};

// Error handling
pub use error::{ParleyError, Result};

// Config
pub use config::Config;

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
