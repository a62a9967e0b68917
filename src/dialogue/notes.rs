//! Free-form note dictation with a recording stopwatch.

use crate::config::Config;
use crate::dialogue::event::{Event, SessionHandle, UserCommand};
use crate::dialogue::microphone::{EndOutcome, Microphone};
use crate::dialogue::observer::{ErrorSource, Notice, SessionObserver, SilentObserver};
use crate::dialogue::recovery::InputRecovery;
use crate::dialogue::session::Dialogue;
use crate::dialogue::state::DialogueState;
use crate::host::engine::{Fragment, RecognitionConfig, RecognitionEvent, SpeechInput};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Accumulates time only while running.
#[derive(Debug, Clone, Default)]
pub struct Stopwatch {
    accumulated: Duration,
    running_since: Option<Instant>,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    pub fn pause(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += since.elapsed();
        }
    }

    /// Stop and zero.
    pub fn reset(&mut self) {
        self.running_since = None;
        self.accumulated = Duration::ZERO;
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    pub fn elapsed(&self) -> Duration {
        self.accumulated
            + self
                .running_since
                .map(|since| since.elapsed())
                .unwrap_or_default()
    }
}

/// Format a duration as `MM:SS`, or `H:MM:SS` past the hour.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

/// Records final fragments into a note while the microphone is on.
pub struct NoteTaker {
    state: DialogueState,
    microphone: Microphone,
    stopwatch: Stopwatch,
    note: String,
    handle: SessionHandle,
    observer: Arc<dyn SessionObserver>,
    finished: bool,
}

impl NoteTaker {
    pub fn new(config: &Config, input: Box<dyn SpeechInput>, handle: SessionHandle) -> Self {
        Self {
            state: DialogueState::Idle,
            microphone: Microphone::new(
                input,
                RecognitionConfig::conversational(&config.speech.language),
                InputRecovery::from_config(&config.dialogue),
            ),
            stopwatch: Stopwatch::new(),
            note: String::new(),
            handle,
            observer: Arc::new(SilentObserver),
            finished: false,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn note(&self) -> &str {
        &self.note
    }

    pub fn into_note(self) -> String {
        self.note
    }

    /// Recording time so far.
    pub fn elapsed(&self) -> Duration {
        self.stopwatch.elapsed()
    }

    pub fn is_recording(&self) -> bool {
        self.state == DialogueState::Listening
    }

    fn set_state(&mut self, to: DialogueState) {
        let from = self.state;
        if from != to {
            self.state = to;
            self.observer.notice(&Notice::State { from, to });
        }
    }

    fn record(&mut self) {
        match self.microphone.start() {
            Ok(()) => {
                self.stopwatch.start();
                self.set_state(DialogueState::Listening);
            }
            Err(e) => self.input_failed(e.to_string()),
        }
    }

    fn pause(&mut self) {
        self.microphone.stop();
        self.stopwatch.pause();
        self.set_state(DialogueState::Idle);
    }

    fn input_failed(&mut self, message: String) {
        self.pause();
        self.observer.notice(&Notice::Error {
            source: ErrorSource::Recognition,
            message,
        });
    }

    fn on_fragment(&mut self, fragment: Fragment) {
        if self.state != DialogueState::Listening || fragment.is_blank() {
            return;
        }
        self.microphone.heard_speech();

        let text = fragment.text.trim();
        if fragment.is_final {
            if !self.note.is_empty() {
                self.note.push(' ');
            }
            self.note.push_str(text);
        } else {
            self.observer.notice(&Notice::Transcript {
                text: text.to_string(),
            });
        }
    }

    fn on_command(&mut self, command: UserCommand) {
        match command {
            UserCommand::ToggleMic => {
                if self.state == DialogueState::Listening {
                    self.pause();
                } else {
                    self.microphone.reset_recovery();
                    self.record();
                }
            }
            UserCommand::Reset => {
                self.pause();
                self.stopwatch.reset();
            }
            UserCommand::Quit => {
                self.pause();
                self.finished = true;
                self.observer.notice(&Notice::Closed);
            }
            UserCommand::StopAudio | UserCommand::Submit => {}
        }
    }
}

impl Dialogue for NoteTaker {
    /// Recording starts on the first microphone toggle.
    fn begin(&mut self) {}

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
