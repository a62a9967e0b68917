use std::fmt;

/// Turn-taking phase of a dialogue. Exactly one per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DialogueState {
    #[default]
    Idle,
    Listening,
    Debouncing,
    Processing,
    Speaking,
}

impl DialogueState {
    /// Whether the speech input engine should be capturing in this state.
    pub fn is_listening(self) -> bool {
        matches!(self, DialogueState::Listening | DialogueState::Debouncing)
    }
}

impl fmt::Display for DialogueState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DialogueState::Idle => "idle",
            DialogueState::Listening => "listening",
            DialogueState::Debouncing => "debouncing",
            DialogueState::Processing => "processing",
            DialogueState::Speaking => "speaking",
        };
        f.write_str(name)
    }
}
