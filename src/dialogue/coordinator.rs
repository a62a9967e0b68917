//! Turn coordinator for the spoken Q&A conversation.
//!
//! Owns the dialogue state and mediates between the debouncer, the speech
//! output controller and the answering service. All inputs arrive as
//! [`Event`]s; the coordinator enforces that the microphone is never open
//! while speech is playing and that at most one question is in flight.

use crate::config::Config;
use crate::dialogue::debouncer::{Finalize, UtteranceDebouncer};
use crate::dialogue::event::{Event, SessionHandle, UserCommand};
use crate::dialogue::microphone::{EndOutcome, Microphone};
use crate::dialogue::observer::{ErrorSource, Notice, SessionObserver, SilentObserver};
use crate::dialogue::recovery::InputRecovery;
use crate::dialogue::session::Dialogue;
use crate::dialogue::speech_output::{PlaybackFinished, PlaybackOutcome, SpeechOutputController};
use crate::dialogue::state::DialogueState;
use crate::dialogue::transcript::{Role, Transcript};
use crate::error::Result;
use crate::host::SpeechEngines;
use crate::host::engine::{Fragment, RecognitionConfig, RecognitionEvent, UtteranceId, VoiceSettings};
use crate::service::AnsweringService;
use std::sync::Arc;
use tokio::task::JoinHandle;

struct InFlight {
    ticket: u64,
    task: JoinHandle<()>,
}

pub struct Coordinator {
    state: DialogueState,
    description: String,
    goodbye: String,

    microphone: Microphone,
    speech: SpeechOutputController,
    /// Utterance whose completion hands the turn back to the user.
    awaiting_playback: Option<UtteranceId>,

    debouncer: UtteranceDebouncer,
    transcript: Transcript,

    service: Arc<dyn AnsweringService>,
    /// Processing guard: set while a question is with the service.
    in_flight: Option<InFlight>,
    next_ticket: u64,

    handle: SessionHandle,
    observer: Arc<dyn SessionObserver>,
    closed: bool,
}

impl Coordinator {
    /// Create a conversation that opens by speaking `description`.
    pub fn new(
        config: &Config,
        description: &str,
        engines: SpeechEngines,
        service: Arc<dyn AnsweringService>,
        handle: SessionHandle,
    ) -> Self {
        let voice = VoiceSettings::from(&config.speech);
        Self {
            state: DialogueState::Idle,
            description: description.trim().to_string(),
            goodbye: config.dialogue.goodbye.clone(),
            microphone: Microphone::new(
                engines.input,
                RecognitionConfig::conversational(&config.speech.language),
                InputRecovery::from_config(&config.dialogue),
            ),
            speech: SpeechOutputController::new(engines.output, voice, handle.clone()),
            awaiting_playback: None,
            debouncer: UtteranceDebouncer::new(config.dialogue.silence()),
            transcript: Transcript::new(),
            service,
            in_flight: None,
            next_ticket: 1,
            handle,
            observer: Arc::new(SilentObserver),
            closed: false,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn SessionObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Text heard so far in the current utterance.
    pub fn live_transcript(&self) -> Option<&str> {
        self.debouncer.candidate().map(|u| u.text.as_str())
    }

    /// Whether the speech input engine is capturing.
    pub fn is_input_active(&self) -> bool {
        self.microphone.is_active()
    }

    pub fn is_speaking(&self) -> bool {
        self.speech.is_playing()
    }

    /// Ticket of the question currently with the service.
    pub fn in_flight_ticket(&self) -> Option<u64> {
        self.in_flight.as_ref().map(|f| f.ticket)
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn set_state(&mut self, to: DialogueState) {
        let from = self.state;
        if from != to {
            self.state = to;
            self.notify(Notice::State { from, to });
        }
    }

    fn notify(&self, notice: Notice) {
        self.observer.notice(&notice);
    }

    fn report(&self, source: ErrorSource, message: String) {
        self.notify(Notice::Error { source, message });
    }

    // Input engine

    /// Open the microphone and enter Listening. Leaves the dialogue Idle if
    /// the engine refuses to start.
    fn start_listening(&mut self) {
        self.debouncer.reset();
        match self.microphone.start() {
            Ok(()) => self.set_state(DialogueState::Listening),
            Err(e) => self.input_failed(e.to_string()),
        }
    }

    fn stop_listening(&mut self) {
        self.microphone.stop();
        self.debouncer.discard();
    }

    /// The input engine is unusable until the user restarts it.
    fn input_failed(&mut self, message: String) {
        self.stop_listening();
        self.debouncer.fail(&message);
        self.report(ErrorSource::Recognition, message);
        self.set_state(DialogueState::Idle);
    }

    fn on_fragment(&mut self, fragment: Fragment) {
        if !self.state.is_listening() {
            return;
        }
        match self.debouncer.accept(&fragment, &self.handle) {
            Ok(Some(candidate)) => {
                let text = candidate.text.clone();
                self.microphone.heard_speech();
                self.notify(Notice::Transcript { text });
                self.set_state(DialogueState::Debouncing);
            }
            Ok(None) | Err(_) => {}
        }
    }

    fn on_recognition_error(&mut self, message: String) {
        if !self.state.is_listening() {
            return;
        }
        self.input_failed(message);
    }

    fn on_recognition_ended(&mut self) {
        if !self.state.is_listening() {
            return;
        }
        match self.microphone.on_ended(&self.handle) {
            EndOutcome::Ignored => {}
            EndOutcome::Restarting { attempt, delay } => {
                self.notify(Notice::Restarting { attempt, delay });
            }
            EndOutcome::GaveUp(error) => self.input_failed(error.to_string()),
        }
    }

    fn on_restart(&mut self, generation: u64) {
        if let Some(Err(e)) = self.microphone.on_restart(generation) {
            self.input_failed(e.to_string());
        }
    }

    // Turn taking

    fn on_silence(&mut self, generation: u64) {
        let guard = self.in_flight.is_some();
        match self.debouncer.on_timer(generation, guard) {
            Finalize::Finalized(utterance) if self.state == DialogueState::Debouncing => {
                self.ask(utterance.text);
            }
            Finalize::Finalized(_) | Finalize::Swallowed | Finalize::Stale => {}
        }
    }

    /// Hand a finalized question to the answering service.
    fn ask(&mut self, query: String) {
        self.stop_listening();

        let history = self.transcript.to_request_history();
        let turn = self.transcript.append(Role::User, &query).clone();
        self.notify(Notice::Turn(turn));

        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let service = Arc::clone(&self.service);
        let handle = self.handle.clone();
        let task = tokio::spawn(async move {
            let result = service.ask(history, query).await;
            handle.post(Event::Answer { ticket, result });
        });
        self.in_flight = Some(InFlight { ticket, task });
        self.set_state(DialogueState::Processing);
    }

    fn on_answer(&mut self, ticket: u64, result: Result<String>) {
        if self.in_flight_ticket() != Some(ticket) {
            return;
        }
        self.in_flight = None;

        match result {
            Ok(reply) => {
                let turn = self.transcript.append(Role::Assistant, &reply).clone();
                self.notify(Notice::Turn(turn));
                self.speak(&reply);
            }
            Err(e) => {
                self.report(ErrorSource::Service, e.to_string());
                self.start_listening();
            }
        }
    }

    /// Speak with the microphone closed; listening resumes when playback ends.
    fn speak(&mut self, text: &str) {
        self.stop_listening();
        self.awaiting_playback = Some(self.speech.speak(text));
        self.notify(Notice::Speaking {
            text: text.to_string(),
        });
        self.set_state(DialogueState::Speaking);
    }

    fn on_playback(&mut self, finished: PlaybackFinished) {
        if self.awaiting_playback != Some(finished.id) {
            return;
        }
        self.awaiting_playback = None;

        if let PlaybackOutcome::Failed(message) = finished.outcome {
            self.report(ErrorSource::Synthesis, message);
        }
        if self.state == DialogueState::Speaking {
            self.start_listening();
        }
    }

    fn on_command(&mut self, command: UserCommand) {
        match command {
            UserCommand::Quit => self.quit(),
            UserCommand::StopAudio => {
                if self.state == DialogueState::Speaking {
                    self.awaiting_playback = None;
                    self.speech.interrupt();
                    self.start_listening();
                }
            }
            UserCommand::ToggleMic => match self.state {
                DialogueState::Idle => {
                    self.microphone.reset_recovery();
                    self.start_listening();
                }
                DialogueState::Listening | DialogueState::Debouncing => {
                    self.stop_listening();
                    self.set_state(DialogueState::Idle);
                }
                DialogueState::Processing | DialogueState::Speaking => {}
            },
            UserCommand::Submit | UserCommand::Reset => {}
        }
    }

    /// End the conversation. Safe to call repeatedly.
    pub fn quit(&mut self) {
        if self.closed {
            return;
        }
        self.awaiting_playback = None;
        self.speech.interrupt();
        self.stop_listening();
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
        }
        self.transcript.reset();

        self.speech.speak(&self.goodbye);
        self.set_state(DialogueState::Idle);
        self.closed = true;
        self.notify(Notice::Closed);
    }
}

impl Dialogue for Coordinator {
    fn begin(&mut self) {
        if self.closed || self.state != DialogueState::Idle {
            return;
        }
        if self.description.is_empty() {
            self.start_listening();
            return;
        }

        let description = self.description.clone();
        let turn = self.transcript.append(Role::System, &description).clone();
        self.notify(Notice::Turn(turn));
        self.speak(&description);
    }

    fn handle(&mut self, event: Event) {
        if self.closed {
            // Only the goodbye is still playing; everything else is late.
            if let Event::Synthesis(event) = event {
                self.speech.on_engine_event(event);
            }
            return;
        }

        match event {
            Event::Recognition(RecognitionEvent::Fragment(fragment)) => self.on_fragment(fragment),
            Event::Recognition(RecognitionEvent::Error { message }) => {
                self.on_recognition_error(message)
            }
            Event::Recognition(RecognitionEvent::Ended) => self.on_recognition_ended(),
            Event::Synthesis(event) => {
                self.speech.on_engine_event(event);
            }
            Event::Playback(finished) => self.on_playback(finished),
            Event::User(command) => self.on_command(command),
            Event::SilenceElapsed { generation } => self.on_silence(generation),
            Event::RestartInput { generation } => self.on_restart(generation),
            Event::Answer { ticket, result } => self.on_answer(ticket, result),
        }
    }

    fn state(&self) -> DialogueState {
        self.state
    }

    fn is_finished(&self) -> bool {
        self.closed
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialogue::event::{Inbox, channel};
    use crate::host::mock::{InputLog, MockSpeechInput, MockSynthesizer, SynthesisLog};
    use crate::service::mock::MockAnsweringService;
    use std::time::Duration;

    struct Harness {
        coordinator: Coordinator,
        inbox: Inbox,
        handle: SessionHandle,
        input: InputLog,
        output: SynthesisLog,
    }

    impl Harness {
        fn new(description: &str, service: MockAnsweringService) -> Self {
            Self::with_input(description, service, MockSpeechInput::new())
        }

        fn with_input(
            description: &str,
            service: MockAnsweringService,
            input: MockSpeechInput,
        ) -> Self {
            let (handle, inbox) = channel();
            let output = MockSynthesizer::new();
            let (input_log, output_log) = (input.log(), output.log());
            let coordinator = Coordinator::new(
                &Config::default(),
                description,
                SpeechEngines::new(input, output),
                Arc::new(service),
                handle.clone(),
            );
            Self {
                coordinator,
                inbox,
                handle,
                input: input_log,
                output: output_log,
            }
        }

        /// Apply what is already queued, let time pass, then apply what the
        /// elapsed time produced.
        async fn advance(&mut self, duration: Duration) {
            self.drain().await;
            tokio::time::sleep(duration).await;
            self.drain().await;
        }

        /// Apply queued events until the inbox stays empty.
        async fn drain(&mut self) {
            loop {
                tokio::task::yield_now().await;
                let Some(event) = self.inbox.try_recv() else {
                    break;
                };
                self.coordinator.handle(event);
                assert!(
                    !(self.input.is_active() && self.coordinator.is_speaking()),
                    "microphone open while speaking"
                );
            }
        }

        /// Finish whatever utterance is playing.
        async fn finish_playback(&mut self) {
            let id = self.output.last_id().unwrap();
            self.handle.synthesis_started(id);
            self.handle.synthesis_ended(id);
            self.advance(Duration::from_millis(1)).await;
        }

        fn state(&self) -> DialogueState {
            self.coordinator.state()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_begin_speaks_description_then_listens() {
        let mut h = Harness::new("The Moon is Earth's satellite.", MockAnsweringService::new());
        h.coordinator.begin();

        assert_eq!(h.state(), DialogueState::Speaking);
        assert!(!h.input.is_active());
        assert_eq!(h.output.texts(), vec!["The Moon is Earth's satellite."]);
        assert_eq!(h.coordinator.transcript().turns()[0].role, Role::System);

        h.finish_playback().await;
        assert_eq!(h.state(), DialogueState::Listening);
        assert!(h.input.is_active());
        assert!(h.input.last_config().unwrap().interim_results);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_description_starts_listening() {
        let mut h = Harness::new("   ", MockAnsweringService::new());
        h.coordinator.begin();

        assert_eq!(h.state(), DialogueState::Listening);
        assert!(h.output.texts().is_empty());
        assert!(h.coordinator.transcript().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_question_answer_round_trip() {
        let service = MockAnsweringService::new().with_response("Gravity is...");
        let mut h = Harness::new("Gravity", service);
        h.coordinator.begin();
        h.finish_playback().await;

        h.handle.fragment(Fragment::interim(0, "what is gravity"));
        h.advance(Duration::from_millis(1)).await;
        assert_eq!(h.state(), DialogueState::Debouncing);
        assert_eq!(h.coordinator.live_transcript(), Some("what is gravity"));

        h.advance(Duration::from_secs(6)).await;
        assert_eq!(h.state(), DialogueState::Speaking);
        assert!(!h.input.is_active());
        assert_eq!(h.output.texts().last().unwrap(), "Gravity is...");

        let roles: Vec<Role> = h
            .coordinator
            .transcript()
            .turns()
            .iter()
            .map(|t| t.role)
            .collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);

        h.finish_playback().await;
        assert_eq!(h.state(), DialogueState::Listening);
    }

    #[tokio::test(start_paused = true)]
    async fn test_service_failure_resumes_listening() {
        let service = MockAnsweringService::new().with_failure("connection refused");
        let observer = crate::dialogue::observer::CollectorObserver::new();
        let mut h = Harness::new("", service);
        h.coordinator = h.coordinator.with_observer(Arc::new(observer.clone()));
        h.coordinator.begin();

        h.handle.fragment(Fragment::final_result(0, "hello"));
        h.advance(Duration::from_secs(6)).await;

        assert_eq!(h.state(), DialogueState::Listening);
        assert!(h.input.is_active());
        assert_eq!(h.coordinator.in_flight_ticket(), None);
        assert_eq!(h.coordinator.transcript().len(), 1, "user turn stays");
        let errors = observer.errors();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, ErrorSource::Service);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_audio_listens_immediately() {
        let mut h = Harness::new("A long description", MockAnsweringService::new());
        h.coordinator.begin();

        h.handle.command(UserCommand::StopAudio);
        h.advance(Duration::from_millis(1)).await;

        assert_eq!(h.state(), DialogueState::Listening);
        assert!(h.input.is_active());
        assert_eq!(h.output.cancels(), 1);

        // Interrupted playback resolution must not restart anything.
        assert_eq!(h.input.starts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_audio_ignored_when_not_speaking() {
        let mut h = Harness::new("", MockAnsweringService::new());
        h.coordinator.begin();
        h.handle.command(UserCommand::StopAudio);
        h.advance(Duration::from_millis(1)).await;

        assert_eq!(h.state(), DialogueState::Listening);
        assert_eq!(h.input.starts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_mic() {
        let mut h = Harness::new("", MockAnsweringService::new());
        h.coordinator.begin();

        h.handle.fragment(Fragment::interim(0, "never mind"));
        h.handle.command(UserCommand::ToggleMic);
        h.advance(Duration::from_millis(1)).await;
        assert_eq!(h.state(), DialogueState::Idle);
        assert!(!h.input.is_active());
        assert_eq!(h.coordinator.live_transcript(), None);

        h.advance(Duration::from_secs(10)).await;
        assert_eq!(h.state(), DialogueState::Idle, "dropped candidate never fires");

        h.handle.command(UserCommand::ToggleMic);
        h.advance(Duration::from_millis(1)).await;
        assert_eq!(h.state(), DialogueState::Listening);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_mic_ignored_while_speaking() {
        let mut h = Harness::new("Hello", MockAnsweringService::new());
        h.coordinator.begin();
        h.handle.command(UserCommand::ToggleMic);
        h.advance(Duration::from_millis(1)).await;

        assert_eq!(h.state(), DialogueState::Speaking);
        assert!(!h.input.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_recognition_error_goes_idle_until_restart() {
        let observer = crate::dialogue::observer::CollectorObserver::new();
        let mut h = Harness::new("", MockAnsweringService::new());
        h.coordinator = h.coordinator.with_observer(Arc::new(observer.clone()));
        h.coordinator.begin();

        h.handle.fragment(Fragment::interim(0, "half a"));
        h.handle.recognition_error("network");
        h.handle.fragment(Fragment::interim(0, "half a question"));
        h.advance(Duration::from_secs(10)).await;

        assert_eq!(h.state(), DialogueState::Idle);
        assert!(!h.input.is_active());
        assert!(h.coordinator.transcript().is_empty());
        assert_eq!(
            observer.errors(),
            vec![(ErrorSource::Recognition, "network".to_string())]
        );

        h.handle.command(UserCommand::ToggleMic);
        h.advance(Duration::from_millis(1)).await;
        assert_eq!(h.state(), DialogueState::Listening);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refused_microphone_stays_idle() {
        let mut h = Harness::with_input(
            "",
            MockAnsweringService::new(),
            MockSpeechInput::new().with_failure("not-allowed"),
        );
        h.coordinator.begin();
        assert_eq!(h.state(), DialogueState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_end_restarts_with_backoff() {
        let mut h = Harness::new("", MockAnsweringService::new());
        h.coordinator.begin();
        assert_eq!(h.input.starts(), 1);

        // The real engine has stopped on its own; mirror that in the mock.
        h.handle.recognition_ended();
        h.advance(Duration::from_millis(1)).await;
        assert!(!h.coordinator.is_input_active());
        assert_eq!(h.state(), DialogueState::Listening);

        h.advance(Duration::from_millis(300)).await;
        assert!(h.coordinator.is_input_active());
        assert_eq!(h.input.starts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_cap_surfaces_error() {
        let observer = crate::dialogue::observer::CollectorObserver::new();
        let mut h = Harness::new("", MockAnsweringService::new());
        h.coordinator = h.coordinator.with_observer(Arc::new(observer.clone()));
        h.coordinator.begin();

        for _ in 0..5 {
            h.handle.recognition_ended();
            h.advance(Duration::from_secs(5)).await;
            assert_eq!(h.state(), DialogueState::Listening);
        }
        h.handle.recognition_ended();
        h.advance(Duration::from_secs(5)).await;

        assert_eq!(h.state(), DialogueState::Idle);
        assert_eq!(h.input.starts(), 6);
        let errors = observer.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].1.contains("after 5 restarts"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fragment_resets_restart_counter() {
        let observer = crate::dialogue::observer::CollectorObserver::new();
        let mut h = Harness::new("", MockAnsweringService::new());
        h.coordinator = h.coordinator.with_observer(Arc::new(observer.clone()));
        h.coordinator.begin();

        for _ in 0..4 {
            h.handle.recognition_ended();
            h.advance(Duration::from_secs(5)).await;
        }
        h.handle.fragment(Fragment::interim(0, "still here"));
        h.handle.recognition_ended();
        h.advance(Duration::from_millis(1)).await;

        let attempts: Vec<u32> = observer
            .notices()
            .into_iter()
            .filter_map(|n| match n {
                Notice::Restarting { attempt, .. } => Some(attempt),
                _ => None,
            })
            .collect();
        assert_eq!(attempts, vec![1, 2, 3, 4, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_quit_is_idempotent() {
        let mut h = Harness::new("Hello there", MockAnsweringService::new());
        h.coordinator.begin();

        h.handle.command(UserCommand::Quit);
        h.handle.command(UserCommand::Quit);
        h.advance(Duration::from_millis(1)).await;
        h.coordinator.quit();

        assert!(h.coordinator.is_finished());
        assert_eq!(h.state(), DialogueState::Idle);
        assert!(h.coordinator.transcript().is_empty());
        assert!(!h.input.is_active());
        let goodbyes = h
            .output
            .texts()
            .iter()
            .filter(|t| t.as_str() == crate::defaults::GOODBYE)
            .count();
        assert_eq!(goodbyes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_answer_after_quit_is_dropped() {
        let service = MockAnsweringService::new()
            .with_response("too late")
            .with_delay(Duration::from_secs(3));
        let mut h = Harness::new("", service);
        h.coordinator.begin();

        h.handle.fragment(Fragment::final_result(0, "question"));
        h.advance(Duration::from_secs(6)).await;
        assert_eq!(h.state(), DialogueState::Processing);
        let ticket = h.coordinator.in_flight_ticket().unwrap();

        h.handle.command(UserCommand::Quit);
        h.handle.post(Event::Answer {
            ticket,
            result: Ok("too late".to_string()),
        });
        h.advance(Duration::from_secs(10)).await;

        assert!(h.coordinator.transcript().is_empty());
        assert_eq!(h.state(), DialogueState::Idle);
        assert!(!h.output.texts().contains(&"too late".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_synthesis_failure_counts_as_ended() {
        let (handle, mut inbox) = channel();
        let input = MockSpeechInput::new();
        let input_log = input.log();
        let mut coordinator = Coordinator::new(
            &Config::default(),
            "Unspeakable",
            SpeechEngines::new(input, MockSynthesizer::new().with_failure("no voice")),
            Arc::new(MockAnsweringService::new()),
            handle,
        );
        coordinator.begin();
        while let Some(event) = inbox.try_recv() {
            coordinator.handle(event);
        }

        assert_eq!(coordinator.state(), DialogueState::Listening);
        assert!(input_log.is_active());
    }
}
