//! In-memory speech engines for tests and dry runs.
//!
//! Both mocks record every call into a shared log that stays readable after
//! the engine has been boxed and moved into a dialogue.

use crate::dialogue::event::SessionHandle;
use crate::error::{ParleyError, Result};
use crate::host::engine::{
    RecognitionConfig, SpeechInput, SpeechRequest, SpeechSynthesizer, UtteranceId,
};
use std::sync::{Arc, Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Default)]
struct InputState {
    starts: Vec<RecognitionConfig>,
    stops: usize,
    active: bool,
}

/// Shared view of what a [`MockSpeechInput`] was asked to do.
#[derive(Debug, Clone, Default)]
pub struct InputLog {
    state: Arc<Mutex<InputState>>,
}

impl InputLog {
    /// Number of successful `start` calls.
    pub fn starts(&self) -> usize {
        lock(&self.state).starts.len()
    }

    pub fn stops(&self) -> usize {
        lock(&self.state).stops
    }

    /// Whether the engine is currently capturing.
    pub fn is_active(&self) -> bool {
        lock(&self.state).active
    }

    pub fn last_config(&self) -> Option<RecognitionConfig> {
        lock(&self.state).starts.last().cloned()
    }
}

/// Mock speech input engine
#[derive(Debug, Clone, Default)]
pub struct MockSpeechInput {
    log: InputLog,
    failure: Option<String>,
}

impl MockSpeechInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to refuse every `start`
    pub fn with_failure(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    pub fn log(&self) -> InputLog {
        self.log.clone()
    }
}

impl SpeechInput for MockSpeechInput {
    fn start(&mut self, config: &RecognitionConfig) -> Result<()> {
        if let Some(message) = &self.failure {
            return Err(ParleyError::Recognition {
                message: message.clone(),
            });
        }
        let mut state = lock(&self.log.state);
        state.starts.push(config.clone());
        state.active = true;
        Ok(())
    }

    fn stop(&mut self) {
        let mut state = lock(&self.log.state);
        if state.active {
            state.stops += 1;
            state.active = false;
        }
    }
}

#[derive(Debug, Default)]
struct SynthesisState {
    spoken: Vec<(UtteranceId, SpeechRequest)>,
    cancels: usize,
}

/// Shared view of what a [`MockSynthesizer`] was asked to say.
#[derive(Debug, Clone, Default)]
pub struct SynthesisLog {
    state: Arc<Mutex<SynthesisState>>,
}

impl SynthesisLog {
    /// Accepted utterances in order.
    pub fn spoken(&self) -> Vec<(UtteranceId, String)> {
        lock(&self.state)
            .spoken
            .iter()
            .map(|(id, request)| (*id, request.text.clone()))
            .collect()
    }

    /// Text of accepted utterances in order.
    pub fn texts(&self) -> Vec<String> {
        lock(&self.state)
            .spoken
            .iter()
            .map(|(_, request)| request.text.clone())
            .collect()
    }

    pub fn last_request(&self) -> Option<SpeechRequest> {
        lock(&self.state).spoken.last().map(|(_, r)| r.clone())
    }

    pub fn last_id(&self) -> Option<UtteranceId> {
        lock(&self.state).spoken.last().map(|(id, _)| *id)
    }

    /// Number of `cancel` calls.
    pub fn cancels(&self) -> usize {
        lock(&self.state).cancels
    }
}

/// Mock speech output engine
///
/// By default it only records requests; the test drives `started`/`ended`
/// through the session handle. With [`MockSynthesizer::auto_complete`] every
/// accepted utterance immediately reports started and ended.
#[derive(Debug, Clone, Default)]
pub struct MockSynthesizer {
    log: SynthesisLog,
    failure: Option<String>,
    auto_complete: Option<SessionHandle>,
}

impl MockSynthesizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configure the mock to refuse every `speak`
    pub fn with_failure(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Report started/ended for every utterance through `handle`
    pub fn auto_complete(mut self, handle: &SessionHandle) -> Self {
        self.auto_complete = Some(handle.clone());
        self
    }

    pub fn log(&self) -> SynthesisLog {
        self.log.clone()
    }
}

impl SpeechSynthesizer for MockSynthesizer {
    fn speak(&mut self, id: UtteranceId, request: &SpeechRequest) -> Result<()> {
        if let Some(message) = &self.failure {
            return Err(ParleyError::Synthesis {
                message: message.clone(),
            });
        }
        lock(&self.log.state).spoken.push((id, request.clone()));

        if let Some(handle) = &self.auto_complete {
            handle.synthesis_started(id);
            handle.synthesis_ended(id);
        }
        Ok(())
    }

    fn cancel(&mut self) {
        lock(&self.log.state).cancels += 1;
    }
}
