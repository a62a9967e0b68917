//! Silence-based end-of-utterance detection.
//!
//! Recognition engines report a stream of revisable fragments. The
//! debouncer keeps the latest text as the candidate utterance and re-arms
//! a silence timer on every non-empty fragment; when the timer finally
//! fires the candidate is emitted as finalized.

use crate::dialogue::event::{Event, SessionHandle};
use crate::dialogue::timer::OneShotTimer;
use crate::error::{ParleyError, Result};
use crate::host::engine::Fragment;
use std::time::{Duration, Instant};

/// The latest recognition fragment, held as the transcript candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub is_final: bool,
    /// When the fragment arrived.
    pub timestamp: Instant,
}

/// Result of a silence timer firing.
#[derive(Debug, Clone, PartialEq)]
pub enum Finalize {
    /// Not the currently armed timer (re-armed or cancelled since).
    Stale,
    /// A request is in flight; nothing is emitted.
    Swallowed,
    Finalized(Utterance),
}

/// Turns recognition fragments into finalized utterances.
#[derive(Debug)]
pub struct UtteranceDebouncer {
    quiet_period: Duration,
    candidate: Option<Utterance>,
    timer: OneShotTimer,
    failure: Option<String>,
}

impl UtteranceDebouncer {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            quiet_period,
            candidate: None,
            timer: OneShotTimer::new(),
            failure: None,
        }
    }

    /// Feed one fragment.
    ///
    /// Blank fragments are ignored. A non-empty fragment becomes the candidate,
    /// whatever its result index, and re-arms the silence timer.
    /// After [`fail`](Self::fail) every fragment is rejected until
    /// [`reset`](Self::reset).
    pub fn accept(
        &mut self,
        fragment: &Fragment,
        handle: &SessionHandle,
    ) -> Result<Option<&Utterance>> {
        if let Some(message) = &self.failure {
            return Err(ParleyError::Recognition {
                message: message.clone(),
            });
        }
        if fragment.is_blank() {
            return Ok(None);
        }

        self.candidate = Some(Utterance {
            text: fragment.text.trim().to_string(),
            is_final: fragment.is_final,
            timestamp: Instant::now(),
        });
        self.timer.arm(self.quiet_period, handle, |generation| {
            Event::SilenceElapsed { generation }
        });

        Ok(self.candidate.as_ref())
    }

    /// Handle a silence timer firing.
    ///
    /// `request_in_flight` is the caller's processing guard; while it is set
    /// the firing is swallowed and the candidate stays put.
    pub fn on_timer(&mut self, generation: u64, request_in_flight: bool) -> Finalize {
        if !self.timer.fire(generation) {
            return Finalize::Stale;
        }
        if request_in_flight {
            return Finalize::Swallowed;
        }
        match self.candidate.take() {
            Some(utterance) => Finalize::Finalized(utterance),
            None => Finalize::Stale,
        }
    }

    /// The engine reported an error: drop everything and reject further input.
    pub fn fail(&mut self, message: &str) {
        self.discard();
        self.failure = Some(message.to_string());
    }

    /// Drop the candidate and disarm the timer.
    pub fn discard(&mut self) {
        self.timer.cancel();
        self.candidate = None;
    }

    /// Back to a clean slate, accepting fragments again.
    pub fn reset(&mut self) {
        self.discard();
        self.failure = None;
    }

    pub fn candidate(&self) -> Option<&Utterance> {
        self.candidate.as_ref()
    }

    /// True while a silence timer is armed.
    pub fn is_pending(&self) -> bool {
        self.timer.is_armed()
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}
