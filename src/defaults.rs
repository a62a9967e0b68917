//! Default configuration constants for parley.
//!
//! This module provides shared constants used across different configuration types
//! to ensure consistency and eliminate duplication.

/// Default quiet period in milliseconds before an utterance is considered finished.
pub const SILENCE_MS: u64 = 5000;

/// Default BCP 47 language tag for recognition and synthesis.
pub const LANGUAGE: &str = "en-US";

/// Default speech synthesis rate (1.0 = engine default).
pub const SPEECH_RATE: f32 = 1.0;

/// Default speech synthesis pitch (1.0 = engine default).
pub const SPEECH_PITCH: f32 = 1.0;

/// Spoken when the user quits a conversation.
pub const GOODBYE: &str = "Goodbye! Thank you for chatting.";

/// Base URL of the assistant backend.
pub const SERVICE_URL: &str = "http://127.0.0.1:5000";

/// Request timeout for the assistant backend, in seconds.
pub const SERVICE_TIMEOUT_SECS: u64 = 30;

/// Consecutive automatic restarts of the speech input engine before giving up.
///
/// Reset whenever a non-empty fragment arrives.
pub const MAX_INPUT_RESTARTS: u32 = 5;

/// Delay before the first automatic restart, doubled on each further attempt.
pub const RESTART_BACKOFF_MS: u64 = 250;

/// Upper bound for the restart backoff.
pub const MAX_RESTART_BACKOFF_MS: u64 = 4000;

/// Spoken when the scene description service returned nothing usable.
pub const NO_SCENE: &str = "I could not describe this scene.";

/// Spoken when the user declines the learning follow-up.
pub const DECLINED: &str = "Okay.";

/// Spoken when a yes/no answer could not be understood.
pub const REPROMPT: &str = "Please say yes or no.";

/// Console speech output reading speed at rate 1.0.
pub const CONSOLE_WORDS_PER_SECOND: f32 = 2.5;
