//! Sequential event loop shared by every interaction mode.

use crate::dialogue::event::{Event, Inbox};
use crate::dialogue::state::DialogueState;

/// A turn-taking state machine driven by inbox events.
pub trait Dialogue {
    /// Kick the dialogue off (speak a greeting, start listening, ...).
    fn begin(&mut self);

    /// Apply one event. Every event is accepted in every state.
    fn handle(&mut self, event: Event);

    fn state(&self) -> DialogueState;

    /// True once nothing further will happen.
    fn is_finished(&self) -> bool;
}

/// Drive `dialogue` until it finishes or every sender is gone.
///
/// Returns the dialogue so callers can inspect what it produced.
pub async fn run<D: Dialogue>(mut dialogue: D, mut inbox: Inbox) -> D {
    dialogue.begin();
    while !dialogue.is_finished() {
        let Some(event) = inbox.recv().await else {
            break;
        };
        dialogue.handle(event);
    }
    dialogue
}
