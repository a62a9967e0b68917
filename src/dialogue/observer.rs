//! Reporting of dialogue progress and errors.
//!
//! Dialogues never print. They hand [`Notice`]s to a [`SessionObserver`],
//! which the binary renders on stderr and tests collect.

use crate::dialogue::state::DialogueState;
use crate::dialogue::transcript::Turn;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Where an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSource {
    Recognition,
    Synthesis,
    Service,
}

impl std::fmt::Display for ErrorSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorSource::Recognition => "recognition",
            ErrorSource::Synthesis => "speech",
            ErrorSource::Service => "service",
        };
        f.write_str(name)
    }
}

/// Something the user should be able to see.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    State {
        from: DialogueState,
        to: DialogueState,
    },
    /// Live (not yet finalized) transcript text.
    Transcript { text: String },
    /// A turn was appended to the conversation.
    Turn(Turn),
    /// Speech output started for `text`.
    Speaking { text: String },
    /// The input engine ended unexpectedly and is restarted after `delay`.
    Restarting { attempt: u32, delay: Duration },
    Error {
        source: ErrorSource,
        message: String,
    },
    /// The session is over.
    Closed,
}

/// Receives notices from a running dialogue.
pub trait SessionObserver: Send + Sync {
    fn notice(&self, notice: &Notice);
}

/// Observer that drops everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl SessionObserver for SilentObserver {
    fn notice(&self, _notice: &Notice) {}
}

/// Observer that records notices for later inspection.
#[derive(Debug, Clone, Default)]
pub struct CollectorObserver {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl CollectorObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .map(|n| n.clone())
            .unwrap_or_default()
    }

    /// Every state the dialogue entered, in order.
    pub fn states(&self) -> Vec<DialogueState> {
        self.notices()
            .into_iter()
            .filter_map(|n| match n {
                Notice::State { to, .. } => Some(to),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<(ErrorSource, String)> {
        self.notices()
            .into_iter()
            .filter_map(|n| match n {
                Notice::Error { source, message } => Some((source, message)),
                _ => None,
            })
            .collect()
    }
}

impl SessionObserver for CollectorObserver {
    fn notice(&self, notice: &Notice) {
        if let Ok(mut notices) = self.notices.lock() {
            notices.push(notice.clone());
        }
    }
}

/// Observer that prints to stderr.
///
/// Errors are always shown. Live transcripts are shown unless quiet; state
/// changes, turns and restarts need `-v`.
#[cfg(feature = "cli")]
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleObserver {
    quiet: bool,
    verbosity: u8,
}

#[cfg(feature = "cli")]
impl ConsoleObserver {
    pub fn new(quiet: bool, verbosity: u8) -> Self {
        Self { quiet, verbosity }
    }

    /// Render a notice, or `None` when it is filtered out.
    pub fn render(&self, notice: &Notice) -> Option<String> {
        use owo_colors::OwoColorize;

        match notice {
            Notice::Error { source, message } => {
                Some(format!("Error ({}): {}", source, message).red().to_string())
            }
            _ if self.quiet => None,
            Notice::Transcript { text } => Some(format!("  … {}", text).dimmed().to_string()),
            _ if self.verbosity == 0 => None,
            Notice::State { from, to } => {
                Some(format!("[{} -> {}]", from, to).dimmed().to_string())
            }
            Notice::Turn(turn) => Some(format!(
                "{} {}",
                format!("#{} {}:", turn.sequence, turn.role).cyan(),
                turn.text
            )),
            Notice::Speaking { text } => {
                Some(format!("[speaking {} chars]", text.chars().count()).dimmed().to_string())
            }
            Notice::Restarting { attempt, delay } => Some(
                format!(
                    "Speech input ended, restart {} in {}ms",
                    attempt,
                    delay.as_millis()
                )
                .yellow()
                .to_string(),
            ),
            Notice::Closed => Some("[session closed]".dimmed().to_string()),
        }
    }
}

#[cfg(feature = "cli")]
impl SessionObserver for ConsoleObserver {
    fn notice(&self, notice: &Notice) {
        if let Some(line) = self.render(notice) {
            eprintln!("{}", line);
        }
    }
}
