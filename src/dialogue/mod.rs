//! Turn-taking dialogues.
//!
//! Every interaction mode is a [`Dialogue`] driven by one [`Inbox`]: host
//! callbacks, timers and background requests post events, and the dialogue
//! applies them one at a time.

pub mod coordinator;
pub mod debouncer;
pub mod event;
pub mod microphone;
pub mod narration;
pub mod notes;
pub mod observer;
pub mod recovery;
pub mod session;
pub mod speech_output;
pub mod state;
pub mod timer;
pub mod topic;
pub mod transcript;

pub use coordinator::Coordinator;
pub use event::{Event, Inbox, SessionHandle, UserCommand, channel};
pub use narration::NarrationFlow;
pub use notes::NoteTaker;
pub use observer::{CollectorObserver, Notice, SessionObserver};
pub use session::{Dialogue, run};
pub use state::DialogueState;
pub use topic::TopicDictation;
pub use transcript::{Role, Transcript, Turn};
