//! Speech input engine wrapper with automatic restarts.

use crate::dialogue::event::{Event, SessionHandle};
use crate::dialogue::recovery::InputRecovery;
use crate::dialogue::timer::OneShotTimer;
use crate::error::{ParleyError, Result};
use crate::host::engine::{RecognitionConfig, SpeechInput};
use std::time::Duration;

/// What to do after the engine ended.
#[derive(Debug)]
pub enum EndOutcome {
    /// The engine was not supposed to be running.
    Ignored,
    /// A restart is scheduled.
    Restarting { attempt: u32, delay: Duration },
    /// Too many consecutive restarts.
    GaveUp(ParleyError),
}

pub struct Microphone {
    input: Box<dyn SpeechInput>,
    config: RecognitionConfig,
    active: bool,
    recovery: InputRecovery,
    restart_timer: OneShotTimer,
}

impl Microphone {
    pub fn new(input: Box<dyn SpeechInput>, config: RecognitionConfig, recovery: InputRecovery) -> Self {
        Self {
            input,
            config,
            active: false,
            recovery,
            restart_timer: OneShotTimer::new(),
        }
    }

    /// Start capturing. A pending automatic restart is dropped.
    pub fn start(&mut self) -> Result<()> {
        self.restart_timer.cancel();
        self.input.start(&self.config)?;
        self.active = true;
        Ok(())
    }

    /// Stop capturing. Harmless when already stopped.
    pub fn stop(&mut self) {
        self.restart_timer.cancel();
        self.input.stop();
        self.active = false;
    }

    /// True while the engine is expected to deliver fragments.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Speech arrived; the engine is healthy again.
    pub fn heard_speech(&mut self) {
        self.recovery.reset();
    }

    /// The user restarted the microphone by hand.
    pub fn reset_recovery(&mut self) {
        self.recovery.reset();
    }

    /// The engine reported that it stopped.
    ///
    /// An end after [`stop`](Self::stop) is expected and ignored. Otherwise a
    /// restart is scheduled as [`Event::RestartInput`] with exponential
    /// backoff, until the cap is exceeded.
    pub fn on_ended(&mut self, handle: &SessionHandle) -> EndOutcome {
        if !self.active {
            return EndOutcome::Ignored;
        }
        self.active = false;

        match self.recovery.on_unexpected_end() {
            Some(delay) => {
                self.restart_timer.arm(delay, handle, |generation| {
                    Event::RestartInput { generation }
                });
                EndOutcome::Restarting {
                    attempt: self.recovery.attempts(),
                    delay,
                }
            }
            None => EndOutcome::GaveUp(ParleyError::RecognitionUnstable {
                attempts: self.recovery.max_attempts(),
            }),
        }
    }

    /// The restart backoff elapsed. `None` for a stale or cancelled restart.
    pub fn on_restart(&mut self, generation: u64) -> Option<Result<()>> {
        if !self.restart_timer.fire(generation) {
            return None;
        }
        Some(self.start())
    }
}

impl std::fmt::Debug for Microphone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Microphone")
            .field("config", &self.config)
            .field("active", &self.active)
            .field("recovery", &self.recovery)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::event::channel;
    use crate::host::mock::MockSpeechInput;

    fn microphone(input: MockSpeechInput) -> Microphone {
        Microphone::new(
            Box::new(input),
            RecognitionConfig::conversational("en-US"),
            InputRecovery::new(2, Duration::from_millis(100), Duration::from_secs(1)),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_after_stop_is_ignored() {
        let (handle, mut inbox) = channel();
        let mut mic = microphone(MockSpeechInput::new());

        mic.start().unwrap();
        mic.stop();
        assert!(matches!(mic.on_ended(&handle), EndOutcome::Ignored));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(inbox.try_recv().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_end_schedules_restart() {
        let (handle, mut inbox) = channel();
        let input = MockSpeechInput::new();
        let log = input.log();
        let mut mic = microphone(input);

        mic.start().unwrap();
        match mic.on_ended(&handle) {
            EndOutcome::Restarting { attempt, delay } => {
                assert_eq!(attempt, 1);
                assert_eq!(delay, Duration::from_millis(100));
            }
            other => panic!("Expected Restarting, got {:?}", other),
        }
        assert!(!mic.is_active());

        let generation = match inbox.recv().await {
            Some(Event::RestartInput { generation }) => generation,
            other => panic!("Expected RestartInput, got {:?}", other),
        };
        assert!(mic.on_restart(generation).unwrap().is_ok());
        assert!(mic.is_active());
        assert_eq!(log.starts(), 2);
        assert!(mic.on_restart(generation).is_none(), "a restart fires once");
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_cap() {
        let (handle, _inbox) = channel();
        let mut mic = microphone(MockSpeechInput::new());

        for _ in 0..2 {
            mic.start().unwrap();
            assert!(matches!(
                mic.on_ended(&handle),
                EndOutcome::Restarting { .. }
            ));
        }
        mic.start().unwrap();
        match mic.on_ended(&handle) {
            EndOutcome::GaveUp(ParleyError::RecognitionUnstable { attempts }) => {
                assert_eq!(attempts, 2)
            }
            other => panic!("Expected GaveUp, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_pending_restart() {
        let (handle, mut inbox) = channel();
        let mut mic = microphone(MockSpeechInput::new());

        mic.start().unwrap();
        mic.on_ended(&handle);
        mic.stop();

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(inbox.try_recv().is_none());
    }

    #[test]
    fn test_refused_start_leaves_inactive() {
        let mut mic = microphone(MockSpeechInput::new().with_failure("not-allowed"));
        assert!(mic.start().is_err());
        assert!(!mic.is_active());
    }
}
