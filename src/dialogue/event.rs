//! Message-passing inbox shared by every dialogue.
//!
//! Host callbacks, timers, background requests and user commands all post
//! an [`Event`] through a [`SessionHandle`]; the session loop drains the
//! [`Inbox`] in arrival order.

use crate::dialogue::speech_output::PlaybackFinished;
use crate::error::Result;
use crate::host::engine::{Fragment, RecognitionEvent, SynthesisEvent, UtteranceId};
use tokio::sync::mpsc;

/// Buttons the user can press, whatever the interaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    /// Start or stop the microphone.
    ToggleMic,
    /// Cut the current speech output short.
    StopAudio,
    /// Hand in what was dictated so far.
    Submit,
    /// Stop recording and clear the elapsed time.
    Reset,
    /// Leave the session.
    Quit,
}

impl UserCommand {
    /// Parse a console command such as `/quit`.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().trim_start_matches('/').to_lowercase().as_str() {
            "mic" | "listen" => Some(UserCommand::ToggleMic),
            "stop" | "stop-audio" => Some(UserCommand::StopAudio),
            "submit" | "done" => Some(UserCommand::Submit),
            "reset" => Some(UserCommand::Reset),
            "quit" | "exit" | "q" => Some(UserCommand::Quit),
            _ => None,
        }
    }
}

/// Everything a dialogue reacts to.
#[derive(Debug)]
pub enum Event {
    Recognition(RecognitionEvent),
    Synthesis(SynthesisEvent),
    /// Resolution of an utterance handed to the speech output controller.
    Playback(PlaybackFinished),
    User(UserCommand),
    /// The silence timer armed under `generation` fired.
    SilenceElapsed { generation: u64 },
    /// Backoff before restarting the input engine elapsed.
    RestartInput { generation: u64 },
    /// The answering service replied to request `ticket`.
    Answer { ticket: u64, result: Result<String> },
}

/// Cloneable sender side of a session inbox.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: mpsc::UnboundedSender<Event>,
}

/// Receiver side of a session inbox.
#[derive(Debug)]
pub struct Inbox {
    rx: mpsc::UnboundedReceiver<Event>,
}

/// Create a connected handle/inbox pair.
pub fn channel() -> (SessionHandle, Inbox) {
    let (tx, rx) = mpsc::unbounded_channel();
    (SessionHandle { tx }, Inbox { rx })
}

impl SessionHandle {
    /// Post an event. Returns false once the session is gone.
    pub fn post(&self, event: Event) -> bool {
        self.tx.send(event).is_ok()
    }

    pub fn fragment(&self, fragment: Fragment) -> bool {
        self.post(Event::Recognition(RecognitionEvent::Fragment(fragment)))
    }

    pub fn recognition_error(&self, message: &str) -> bool {
        self.post(Event::Recognition(RecognitionEvent::Error {
            message: message.to_string(),
        }))
    }

    pub fn recognition_ended(&self) -> bool {
        self.post(Event::Recognition(RecognitionEvent::Ended))
    }

    pub fn synthesis_started(&self, id: UtteranceId) -> bool {
        self.post(Event::Synthesis(SynthesisEvent::Started { id }))
    }

    pub fn synthesis_ended(&self, id: UtteranceId) -> bool {
        self.post(Event::Synthesis(SynthesisEvent::Ended { id }))
    }

    pub fn synthesis_failed(&self, id: UtteranceId, message: &str) -> bool {
        self.post(Event::Synthesis(SynthesisEvent::Failed {
            id,
            message: message.to_string(),
        }))
    }

    pub fn command(&self, command: UserCommand) -> bool {
        self.post(Event::User(command))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Inbox {
    /// Wait for the next event. `None` once every handle is dropped.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Take the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }
}
