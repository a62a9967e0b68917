//! Terminal-backed speech engines.
//!
//! Typed lines stand in for recognized speech and printed text stands in
//! for synthesized speech, so every dialogue can run in a plain terminal.

use crate::defaults;
use crate::dialogue::event::{SessionHandle, UserCommand};
use crate::error::Result;
use crate::host::SpeechEngines;
use crate::host::engine::{Fragment, RecognitionConfig, SpeechInput, SpeechRequest, SpeechSynthesizer, UtteranceId};
use owo_colors::OwoColorize;
use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

type Target = Arc<Mutex<Option<SessionHandle>>>;

fn current(target: &Target) -> Option<SessionHandle> {
    target.lock().ok().and_then(|t| t.clone())
}

/// Reads stdin on a background thread and routes lines to the attached session.
#[derive(Debug, Clone)]
pub struct ConsoleHost {
    mic: Arc<AtomicBool>,
    target: Target,
}

impl ConsoleHost {
    /// Start the stdin reader thread.
    ///
    /// Lines starting with `/` are commands. Other lines become final
    /// fragments, but only while the microphone is on. End of input quits.
    pub fn spawn() -> Self {
        let host = Self {
            mic: Arc::new(AtomicBool::new(false)),
            target: Arc::new(Mutex::new(None)),
        };

        let mic = Arc::clone(&host.mic);
        let target = Arc::clone(&host.target);
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            let mut result_index = 0usize;
            for line in stdin.lock().lines() {
                let Ok(line) = line else {
                    break;
                };
                let Some(handle) = current(&target) else {
                    continue;
                };
                let line = line.trim();

                if line.starts_with('/') {
                    match UserCommand::parse(line) {
                        Some(command) => {
                            handle.command(command);
                        }
                        None => eprintln!(
                            "{}",
                            format!("Unknown command: {} (try /mic /stop /submit /reset /quit)", line)
                                .yellow()
                        ),
                    }
                } else if !line.is_empty() && mic.load(Ordering::SeqCst) {
                    handle.fragment(Fragment::final_result(result_index, line));
                    result_index += 1;
                }
            }
            if let Some(handle) = current(&target) {
                handle.command(UserCommand::Quit);
            }
        });

        host
    }

    /// Route input to `handle` from now on.
    pub fn attach(&self, handle: &SessionHandle) {
        if let Ok(mut target) = self.target.lock() {
            *target = Some(handle.clone());
        }
        self.mic.store(false, Ordering::SeqCst);
    }

    /// Speech engines bound to this terminal.
    pub fn engines(&self) -> SpeechEngines {
        SpeechEngines::new(
            ConsoleInput {
                mic: Arc::clone(&self.mic),
            },
            ConsoleSynthesizer {
                target: Arc::clone(&self.target),
                playing: None,
            },
        )
    }
}

/// Microphone switch for the stdin reader.
#[derive(Debug)]
pub struct ConsoleInput {
    mic: Arc<AtomicBool>,
}

impl SpeechInput for ConsoleInput {
    fn start(&mut self, _config: &RecognitionConfig) -> Result<()> {
        self.mic.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.mic.store(false, Ordering::SeqCst);
    }
}

/// Prints utterances and reports them ended after a reading delay.
#[derive(Debug)]
pub struct ConsoleSynthesizer {
    target: Target,
    playing: Option<JoinHandle<()>>,
}

/// How long `text` takes to read aloud at `rate`.
pub fn reading_time(text: &str, rate: f32) -> Duration {
    let words = text.split_whitespace().count() as f32;
    let rate = if rate > 0.0 { rate } else { 1.0 };
    Duration::from_secs_f32(words / (defaults::CONSOLE_WORDS_PER_SECOND * rate))
}

impl SpeechSynthesizer for ConsoleSynthesizer {
    fn speak(&mut self, id: UtteranceId, request: &SpeechRequest) -> Result<()> {
        self.cancel();
        println!("{} {}", ">".cyan().bold(), request.text);

        let Some(handle) = current(&self.target) else {
            return Ok(());
        };
        let delay = reading_time(&request.text, request.rate);
        self.playing = Some(tokio::spawn(async move {
            handle.synthesis_started(id);
            tokio::time::sleep(delay).await;
            handle.synthesis_ended(id);
        }));
        Ok(())
    }

    fn cancel(&mut self) {
        if let Some(task) = self.playing.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::event::{Event, channel};
    use crate::host::engine::{SynthesisEvent, VoiceSettings};

    #[test]
    fn test_reading_time_scales_with_rate() {
        assert_eq!(reading_time("one two three four five", 1.0), Duration::from_secs(2));
        assert_eq!(reading_time("one two three four five", 2.0), Duration::from_secs(1));
        assert_eq!(reading_time("", 1.0), Duration::ZERO);
        assert_eq!(reading_time("a b c d e", 0.0), Duration::from_secs(2));
    }

    #[test]
    fn test_console_input_toggles_mic_flag() {
        let mic = Arc::new(AtomicBool::new(false));
        let mut input = ConsoleInput {
            mic: Arc::clone(&mic),
        };

        input
            .start(&RecognitionConfig::conversational("en-US"))
            .unwrap();
        assert!(mic.load(Ordering::SeqCst));
        input.stop();
        assert!(!mic.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthesizer_reports_end_after_reading_time() {
        let (handle, mut inbox) = channel();
        let mut synth = ConsoleSynthesizer {
            target: Arc::new(Mutex::new(Some(handle))),
            playing: None,
        };
        let request = SpeechRequest::new("five words to read aloud", &VoiceSettings::default());

        synth.speak(UtteranceId(1), &request).unwrap();
        assert!(matches!(
            inbox.recv().await,
            Some(Event::Synthesis(SynthesisEvent::Started { .. }))
        ));

        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert!(inbox.try_recv().is_none());
        assert!(matches!(
            inbox.recv().await,
            Some(Event::Synthesis(SynthesisEvent::Ended { id })) if id == UtteranceId(1)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_suppresses_end() {
        let (handle, mut inbox) = channel();
        let mut synth = ConsoleSynthesizer {
            target: Arc::new(Mutex::new(Some(handle))),
            playing: None,
        };
        let request = SpeechRequest::new("a few words", &VoiceSettings::default());

        synth.speak(UtteranceId(1), &request).unwrap();
        tokio::task::yield_now().await;
        synth.cancel();

        tokio::time::sleep(Duration::from_secs(5)).await;
        let events: Vec<Event> = std::iter::from_fn(|| inbox.try_recv()).collect();
        assert!(
            !events
                .iter()
                .any(|e| matches!(e, Event::Synthesis(SynthesisEvent::Ended { .. })))
        );
    }
}
