//! Scene narration with an optional spoken learning follow-up.
//!
//! Narrates a scene description once. When the description came with
//! learning content, the user is asked for a spoken yes or no and the
//! learning content is read on request.

use crate::config::Config;
use crate::defaults;
use crate::dialogue::event::{Event, SessionHandle, UserCommand};
use crate::dialogue::microphone::{EndOutcome, Microphone};
use crate::dialogue::observer::{ErrorSource, Notice, SessionObserver, SilentObserver};
use crate::dialogue::recovery::InputRecovery;
use crate::dialogue::session::Dialogue;
use crate::dialogue::speech_output::{PlaybackFinished, PlaybackOutcome, SpeechOutputController};
use crate::dialogue::state::DialogueState;
use crate::host::SpeechEngines;
use crate::host::engine::{Fragment, RecognitionConfig, RecognitionEvent, UtteranceId, VoiceSettings};
use crate::service::protocol::SceneDescription;
use std::sync::Arc;

const YES_WORDS: &[&str] = &["yes", "yeah", "yep", "sure", "ok", "okay", "please", "learn"];
const NO_WORDS: &[&str] = &["no", "not", "nope", "nah", "skip", "stop"];

/// A spoken answer to the learning offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Yes,
    No,
    Unclear,
}

impl Choice {
    /// Classify an utterance by its words. A no-word anywhere declines, even
    /// next to a yes-word.
    pub fn classify(text: &str) -> Self {
        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(str::to_lowercase)
            .collect();
        let any_of = |list: &[&str]| words.iter().any(|w| list.contains(&w.as_str()));

        if any_of(NO_WORDS) {
            Choice::No
        } else if any_of(YES_WORDS) {
            Choice::Yes
        } else {
            Choice::Unclear
        }
    }
}

/// What happens once the current utterance has played.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Then {
    AwaitChoice,
    Finish,
}

pub struct NarrationFlow {
    state: DialogueState,
    scene: SceneDescription,
    microphone: Microphone,
    speech: SpeechOutputController,
    awaiting_playback: Option<(UtteranceId, Then)>,
    learned: bool,
    handle: SessionHandle,
    observer: Arc<dyn SessionObserver>,
    finished: bool,
}

impl NarrationFlow {
    pub fn new(
        config: &Config,
        scene: SceneDescription,
        engines: SpeechEngines,
        handle: SessionHandle,
    ) -> Self {
        Self {
            state: DialogueState::Idle,
            scene,
            microphone: Microphone::new(
                engines.input,
                RecognitionConfig::conversational(&config.speech.language),
                InputRecovery::from_config(&config.dialogue),
            ),
            speech: SpeechOutputController::new(
                engines.output,
                VoiceSettings::from(&config.speech),
                handle.clone(),
            ),
            awaiting_playback: None,
            learned: false,
            handle,
            observer: Arc::new(SilentObserver),
            finished: false,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Whether the learning content was read out.
    pub fn learned(&self) -> bool {
        self.learned
    }

    fn set_state(&mut self, to: DialogueState) {
        let from = self.state;
        if from != to {
            self.state = to;
            self.observer.notice(&Notice::State { from, to });
        }
    }

    fn speak(&mut self, text: &str, then: Then) {
        self.microphone.stop();
        let id = self.speech.speak(text);
        self.awaiting_playback = Some((id, then));
        self.observer.notice(&Notice::Speaking {
            text: text.to_string(),
        });
        self.set_state(DialogueState::Speaking);
    }

    fn after_playback(&mut self, then: Then) {
        match then {
            Then::Finish => self.finish(),
            Then::AwaitChoice => self.start_listening(),
        }
    }

    fn start_listening(&mut self) {
        match self.microphone.start() {
            Ok(()) => self.set_state(DialogueState::Listening),
            Err(e) => self.input_failed(e.to_string()),
        }
    }

    fn input_failed(&mut self, message: String) {
        self.microphone.stop();
        self.observer.notice(&Notice::Error {
            source: ErrorSource::Recognition,
            message,
        });
        self.set_state(DialogueState::Idle);
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.microphone.stop();
        self.set_state(DialogueState::Idle);
        self.finished = true;
        self.observer.notice(&Notice::Closed);
    }

    fn on_fragment(&mut self, fragment: Fragment) {
        if self.state != DialogueState::Listening || fragment.is_blank() {
            return;
        }
        self.microphone.heard_speech();
        if !fragment.is_final {
            self.observer.notice(&Notice::Transcript {
                text: fragment.text,
            });
            return;
        }

        match Choice::classify(&fragment.text) {
            Choice::Yes => {
                let learning = self.scene.learning().unwrap_or_default().to_string();
                self.learned = true;
                self.speak(&learning, Then::Finish);
            }
            Choice::No => self.speak(defaults::DECLINED, Then::Finish),
            Choice::Unclear => self.speak(defaults::REPROMPT, Then::AwaitChoice),
        }
    }

    fn on_playback(&mut self, finished: PlaybackFinished) {
        let Some((id, then)) = self.awaiting_playback else {
            return;
        };
        if id != finished.id {
            return;
        }
        self.awaiting_playback = None;
        if let PlaybackOutcome::Failed(message) = finished.outcome {
            self.observer.notice(&Notice::Error {
                source: ErrorSource::Synthesis,
                message,
            });
        }
        self.after_playback(then);
    }

    fn on_command(&mut self, command: UserCommand) {
        match command {
            UserCommand::Quit => {
                self.awaiting_playback = None;
                self.speech.interrupt();
                self.finish();
            }
            UserCommand::StopAudio => {
                if let Some((_, then)) = self.awaiting_playback.take() {
                    self.speech.interrupt();
                    self.after_playback(then);
                }
            }
            UserCommand::ToggleMic => match self.state {
                DialogueState::Idle => {
                    self.microphone.reset_recovery();
                    self.start_listening();
                }
                DialogueState::Listening => {
                    self.microphone.stop();
                    self.set_state(DialogueState::Idle);
                }
                _ => {}
            },
            UserCommand::Submit | UserCommand::Reset => {}
        }
    }
}

impl Dialogue for NarrationFlow {
    fn begin(&mut self) {
        if self.finished || self.state != DialogueState::Idle {
            return;
        }
        let description = self.scene.scene_description.trim().to_string();
        if description.is_empty() {
            self.speak(defaults::NO_SCENE, Then::Finish);
        } else if self.scene.learning().is_some() {
            self.speak(&description, Then::AwaitChoice);
        } else {
            self.speak(&description, Then::Finish);
        }
    }

    fn handle(&mut self, event: Event) {
        if self.finished {
            return;
        }
        match event {
            Event::Recognition(RecognitionEvent::Fragment(fragment)) => self.on_fragment(fragment),
            Event::Recognition(RecognitionEvent::Error { message }) => {
                if self.state == DialogueState::Listening {
                    self.input_failed(message);
                }
            }
            Event::Recognition(RecognitionEvent::Ended) => {
                if self.state != DialogueState::Listening {
                    return;
                }
                match self.microphone.on_ended(&self.handle) {
                    EndOutcome::Ignored => {}
                    EndOutcome::Restarting { attempt, delay } => self
                        .observer
                        .notice(&Notice::Restarting { attempt, delay }),
                    EndOutcome::GaveUp(error) => self.input_failed(error.to_string()),
                }
            }
            Event::RestartInput { generation } => {
                if let Some(Err(e)) = self.microphone.on_restart(generation) {
                    self.input_failed(e.to_string());
                }
            }
            Event::Synthesis(event) => {
                self.speech.on_engine_event(event);
            }
            Event::Playback(finished) => self.on_playback(finished),
            Event::User(command) => self.on_command(command),
            Event::SilenceElapsed { .. } | Event::Answer { .. } => {}
        }
    }

    fn state(&self) -> DialogueState {
        self.state
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
