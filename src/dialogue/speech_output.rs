//! Speech output controller.
//!
//! Wraps a [`SpeechSynthesizer`] so that at most one utterance is active and
//! every utterance handed to [`SpeechOutputController::speak`] resolves
//! exactly once, as an [`Event::Playback`] posted to the session inbox.

use crate::dialogue::event::{Event, SessionHandle};
use crate::host::engine::{
    SpeechRequest, SpeechSynthesizer, SynthesisEvent, UtteranceId, VoiceSettings,
};

/// How an utterance ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Played to the end.
    Completed,
    /// Cut short by `interrupt()` or by a newer `speak()`.
    Interrupted,
    /// The engine refused or aborted the utterance.
    Failed(String),
}

/// Completion signal for one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackFinished {
    pub id: UtteranceId,
    pub outcome: PlaybackOutcome,
}

impl PlaybackFinished {
    /// Interrupted or failed playback counts as ended for turn-taking purposes;
    /// only an interruption means the caller already moved on.
    pub fn is_interrupted(&self) -> bool {
        self.outcome == PlaybackOutcome::Interrupted
    }
}

#[derive(Debug, Clone, Copy)]
struct Active {
    id: UtteranceId,
    started: bool,
}

pub struct SpeechOutputController {
    engine: Box<dyn SpeechSynthesizer>,
    voice: VoiceSettings,
    handle: SessionHandle,
    active: Option<Active>,
    next_id: u64,
}

impl SpeechOutputController {
    pub fn new(
        engine: Box<dyn SpeechSynthesizer>,
        voice: VoiceSettings,
        handle: SessionHandle,
    ) -> Self {
        Self {
            engine,
            voice,
            handle,
            active: None,
            next_id: 1,
        }
    }

    /// Speak `text`, replacing whatever is playing.
    ///
    /// The preempted utterance resolves as interrupted. If the engine refuses
    /// the request the new utterance resolves as failed right away.
    pub fn speak(&mut self, text: &str) -> UtteranceId {
        self.interrupt();

        let id = UtteranceId(self.next_id);
        self.next_id += 1;

        match self.engine.speak(id, &SpeechRequest::new(text, &self.voice)) {
            Ok(()) => self.active = Some(Active { id, started: false }),
            Err(e) => self.resolve(id, PlaybackOutcome::Failed(e.to_string())),
        }
        id
    }

    /// Cancel active playback. Returns the interrupted utterance, if any.
    pub fn interrupt(&mut self) -> Option<UtteranceId> {
        let active = self.active.take()?;
        self.engine.cancel();
        self.resolve(active.id, PlaybackOutcome::Interrupted);
        Some(active.id)
    }

    /// Feed a notification from the synthesis engine.
    ///
    /// Notifications for anything but the active utterance are ignored.
    /// Returns true when the notification was accepted.
    pub fn on_engine_event(&mut self, event: SynthesisEvent) -> bool {
        let Some(active) = self.active.as_mut() else {
            return false;
        };
        if event.id() != active.id {
            return false;
        }

        match event {
            SynthesisEvent::Started { .. } => {
                active.started = true;
            }
            SynthesisEvent::Ended { id } => {
                self.active = None;
                self.resolve(id, PlaybackOutcome::Completed);
            }
            SynthesisEvent::Failed { id, message } => {
                self.active = None;
                self.resolve(id, PlaybackOutcome::Failed(message));
            }
        }
        true
    }

    pub fn is_playing(&self) -> bool {
        self.active.is_some()
    }

    /// True once the engine confirmed the active utterance is audible.
    pub fn has_started(&self) -> bool {
        self.active.is_some_and(|a| a.started)
    }

    pub fn current(&self) -> Option<UtteranceId> {
        self.active.map(|a| a.id)
    }

    fn resolve(&self, id: UtteranceId, outcome: PlaybackOutcome) {
        self.handle
            .post(Event::Playback(PlaybackFinished { id, outcome }));
    }
}

impl std::fmt::Debug for SpeechOutputController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechOutputController")
            .field("voice", &self.voice)
            .field("active", &self.current())
            .field("next_id", &self.next_id)
            .finish()
    }
}
