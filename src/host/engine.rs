//! Host speech capabilities consumed by the dialogue engine.
//!
//! Recognition and synthesis run outside this crate (a browser, an OS
//! speech service, a terminal). The dialogue only issues commands through
//! these traits and receives the engine's notifications as events.

use crate::config::SpeechConfig;
use crate::error::Result;
use std::fmt;

/// Identifies one synthesized utterance across speak/started/ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtteranceId(pub u64);

impl fmt::Display for UtteranceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Settings passed to the speech input engine on every start.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognitionConfig {
    pub continuous: bool,
    pub interim_results: bool,
    pub language: String,
}

impl RecognitionConfig {
    /// Continuous recognition with interim results, as the conversation needs.
    pub fn conversational(language: &str) -> Self {
        Self {
            continuous: true,
            interim_results: true,
            language: language.to_string(),
        }
    }

    /// Continuous recognition reporting final results only.
    pub fn finals_only(language: &str) -> Self {
        Self {
            continuous: true,
            interim_results: false,
            language: language.to_string(),
        }
    }
}

/// Voice parameters applied to every synthesized utterance.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceSettings {
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
}

impl From<&SpeechConfig> for VoiceSettings {
    fn from(config: &SpeechConfig) -> Self {
        Self {
            language: config.language.clone(),
            rate: config.rate,
            pitch: config.pitch,
        }
    }
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self::from(&SpeechConfig::default())
    }
}

/// A single request to the synthesis engine.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechRequest {
    pub text: String,
    pub language: String,
    pub rate: f32,
    pub pitch: f32,
}

impl SpeechRequest {
    pub fn new(text: &str, voice: &VoiceSettings) -> Self {
        Self {
            text: text.to_string(),
            language: voice.language.clone(),
            rate: voice.rate,
            pitch: voice.pitch,
        }
    }
}

/// A recognition result as reported by the input engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    /// Index of the recognition result this text belongs to.
    pub result_index: usize,
    /// Whether the engine will revise this result further.
    pub is_final: bool,
    pub text: String,
}

impl Fragment {
    pub fn interim(result_index: usize, text: &str) -> Self {
        Self {
            result_index,
            is_final: false,
            text: text.to_string(),
        }
    }

    pub fn final_result(result_index: usize, text: &str) -> Self {
        Self {
            result_index,
            is_final: true,
            text: text.to_string(),
        }
    }

    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Notifications from the speech input engine.
#[derive(Debug, Clone, PartialEq)]
pub enum RecognitionEvent {
    Fragment(Fragment),
    /// The engine failed (microphone denied, network fault, ...).
    Error { message: String },
    /// The engine stopped. Expected after `stop()`, spontaneous otherwise.
    Ended,
}

/// Notifications from the speech output engine.
#[derive(Debug, Clone, PartialEq)]
pub enum SynthesisEvent {
    Started { id: UtteranceId },
    Ended { id: UtteranceId },
    Failed { id: UtteranceId, message: String },
}

impl SynthesisEvent {
    pub fn id(&self) -> UtteranceId {
        match self {
            SynthesisEvent::Started { id }
            | SynthesisEvent::Ended { id }
            | SynthesisEvent::Failed { id, .. } => *id,
        }
    }
}

/// Speech input engine (microphone + recognizer).
///
/// Results arrive asynchronously as [`RecognitionEvent`]s.
pub trait SpeechInput: Send {
    /// Begin capturing. Calling while already started restarts the engine.
    fn start(&mut self, config: &RecognitionConfig) -> Result<()>;

    /// Stop capturing. Must be a no-op when not started.
    fn stop(&mut self);
}

/// Speech output engine.
///
/// Each accepted request reports `Started` and then `Ended` or `Failed`,
/// unless it is cancelled first.
pub trait SpeechSynthesizer: Send {
    /// Start speaking. An error means the request was not accepted.
    fn speak(&mut self, id: UtteranceId, request: &SpeechRequest) -> Result<()>;

    /// Cancel whatever is playing. Must be a no-op when silent.
    fn cancel(&mut self);
}

impl<T: SpeechInput + ?Sized> SpeechInput for Box<T> {
    fn start(&mut self, config: &RecognitionConfig) -> Result<()> {
        (**self).start(config)
    }

    fn stop(&mut self) {
        (**self).stop()
    }
}

impl<T: SpeechSynthesizer + ?Sized> SpeechSynthesizer for Box<T> {
    fn speak(&mut self, id: UtteranceId, request: &SpeechRequest) -> Result<()> {
        (**self).speak(id, request)
    }

    fn cancel(&mut self) {
        (**self).cancel()
    }
}
