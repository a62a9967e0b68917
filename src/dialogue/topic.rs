//! Spoken capture of the subject the user wants to learn about.

use crate::config::Config;
use crate::dialogue::event::{Event, SessionHandle, UserCommand};
use crate::dialogue::microphone::{EndOutcome, Microphone};
use crate::dialogue::observer::{ErrorSource, Notice, SessionObserver, SilentObserver};
use crate::dialogue::recovery::InputRecovery;
use crate::dialogue::session::Dialogue;
use crate::dialogue::state::DialogueState;
use crate::host::engine::{Fragment, RecognitionConfig, RecognitionEvent, SpeechInput};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Listens for final results until the user submits or quits.
pub struct TopicDictation {
    state: DialogueState,
    microphone: Microphone,
    results: BTreeMap<usize, String>,
    submitted: Option<String>,
    handle: SessionHandle,
    observer: Arc<dyn SessionObserver>,
    finished: bool,
}

impl TopicDictation {
    pub fn new(config: &Config, input: Box<dyn SpeechInput>, handle: SessionHandle) -> Self {
        Self {
            state: DialogueState::Idle,
            microphone: Microphone::new(
                input,
                RecognitionConfig::finals_only(&config.speech.language),
                InputRecovery::from_config(&config.dialogue),
            ),
            results: BTreeMap::new(),
            submitted: None,
            handle,
            observer: Arc::new(SilentObserver),
            finished: false,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Everything captured so far, in result order.
    pub fn subject(&self) -> String {
        self.results
            .values()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The submitted subject; `None` when the user quit.
    pub fn into_subject(self) -> Option<String> {
        self.submitted
    }

    fn set_state(&mut self, to: DialogueState) {
        let from = self.state;
        if from != to {
            self.state = to;
            self.observer.notice(&Notice::State { from, to });
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

    fn finish(&mut self, subject: Option<String>) {
        self.microphone.stop();
        self.submitted = subject;
        self.set_state(DialogueState::Idle);
        self.finished = true;
        self.observer.notice(&Notice::Closed);
    }

    fn on_fragment(&mut self, fragment: Fragment) {
        if self.state != DialogueState::Listening || !fragment.is_final || fragment.is_blank() {
            return;
        }
        self.microphone.heard_speech();
        self.results
            .insert(fragment.result_index, fragment.text.trim().to_string());
        self.observer.notice(&Notice::Transcript {
            text: self.subject(),
        });
    }

    fn on_command(&mut self, command: UserCommand) {
        match command {
            UserCommand::Submit => {
                let subject = self.subject();
                if !subject.is_empty() {
                    self.finish(Some(subject));
                }
            }
            UserCommand::Quit => self.finish(None),
            UserCommand::ToggleMic => match self.state {
                DialogueState::Idle => {
                    self.microphone.reset_recovery();
                    self.start_listening();
                }
                _ => {
                    self.microphone.stop();
                    self.set_state(DialogueState::Idle);
                }
            },
            UserCommand::StopAudio | UserCommand::Reset => {}
        }
    }
}

impl Dialogue for TopicDictation {
    fn begin(&mut self) {
        if !self.finished && self.state == DialogueState::Idle {
            self.start_listening();
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
            Event::User(command) => self.on_command(command),
            Event::Synthesis(_)
            | Event::Playback(_)
            | Event::SilenceElapsed { .. }
            | Event::Answer { .. } => {}
        }
    }

    fn state(&self) -> DialogueState {
        self.state
    }

    fn is_finished(&self) -> bool {
        self.finished
    }
}
