//! Speech engines provided by the host platform.

#[cfg(feature = "cli")]
pub mod console;
pub mod engine;
pub mod mock;

pub use engine::{
    Fragment, RecognitionConfig, RecognitionEvent, SpeechInput, SpeechRequest, SpeechSynthesizer,
    SynthesisEvent, UtteranceId, VoiceSettings,
};

/// The pair of engines a dialogue drives.
pub struct SpeechEngines {
    pub input: Box<dyn SpeechInput>,
    pub output: Box<dyn SpeechSynthesizer>,
}

impl SpeechEngines {
    pub fn new(input: impl SpeechInput + 'static, output: impl SpeechSynthesizer + 'static) -> Self {
        Self {
            input: Box::new(input),
            output: Box::new(output),
        }
    }
}
