//! End-to-end conversations driven through `run` on a paused clock.
//!
//! A script task plays the part of the user and the host engines, posting
//! events at fixed virtual times while the dialogue runs.

use parley::config::Config;
use parley::dialogue::event::{SessionHandle, UserCommand, channel};
use parley::dialogue::observer::{CollectorObserver, ErrorSource, Notice};
use parley::dialogue::transcript::Role;
use parley::dialogue::{Coordinator, DialogueState, run};
use parley::host::SpeechEngines;
use parley::host::engine::Fragment;
use parley::host::mock::{InputLog, MockSpeechInput, MockSynthesizer, SynthesisLog};
use parley::service::AnsweringService;
use parley::service::mock::MockAnsweringService;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

const DESCRIPTION: &str = "Gravity is the force that pulls objects together.";

struct Outcome {
    coordinator: Coordinator,
    observer: CollectorObserver,
    input: InputLog,
    output: SynthesisLog,
}

impl Outcome {
    fn roles(&self) -> Vec<Role> {
        self.turns().into_iter().map(|(role, _, _)| role).collect()
    }

    fn turns(&self) -> Vec<(Role, String, u64)> {
        self.observer
            .notices()
            .into_iter()
            .filter_map(|notice| match notice {
                Notice::Turn(turn) => Some((turn.role, turn.text, turn.sequence)),
                _ => None,
            })
            .collect()
    }
}

async fn converse<F, Fut>(
    description: &str,
    service: Arc<MockAnsweringService>,
    input: MockSpeechInput,
    script: F,
) -> Outcome
where
    F: FnOnce(SessionHandle) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (handle, inbox) = channel();
    let output = MockSynthesizer::new().auto_complete(&handle);
    let (input_log, output_log) = (input.log(), output.log());
    let observer = CollectorObserver::new();

    let coordinator = Coordinator::new(
        &Config::default(),
        description,
        SpeechEngines::new(input, output),
        service as Arc<dyn AnsweringService>,
        handle.clone(),
    )
    .with_observer(Arc::new(observer.clone()));

    tokio::spawn(script(handle));
    let coordinator = run(coordinator, inbox).await;

    Outcome {
        coordinator,
        observer,
        input: input_log,
        output: output_log,
    }
}

async fn at(ms: u64, start: tokio::time::Instant) {
    tokio::time::sleep_until(start + Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn growing_transcript_is_asked_once_after_silence() {
    let service = Arc::new(MockAnsweringService::new().with_response("It keeps us on the ground."));

    let outcome = converse(DESCRIPTION, Arc::clone(&service), MockSpeechInput::new(), |h| async move {
        let start = tokio::time::Instant::now();
        at(100, start).await;
        h.fragment(Fragment::interim(0, "what"));
        at(1100, start).await;
        h.fragment(Fragment::interim(0, "what is"));
        at(2100, start).await;
        h.fragment(Fragment::interim(0, "what is gravity"));
        at(10_000, start).await;
        h.command(UserCommand::Quit);
    })
    .await;

    let calls = service.calls();
    assert_eq!(calls.len(), 1, "exactly one question reaches the service");
    assert_eq!(calls[0].query, "what is gravity");
    assert_eq!(calls[0].history.len(), 1);
    assert_eq!(calls[0].history[0].role, Role::System);
    assert_eq!(calls[0].history[0].text, DESCRIPTION);

    assert_eq!(
        outcome.turns(),
        vec![
            (Role::System, DESCRIPTION.to_string(), 0),
            (Role::User, "what is gravity".to_string(), 1),
            (Role::Assistant, "It keeps us on the ground.".to_string(), 2),
        ]
    );
    assert_eq!(
        outcome.output.texts(),
        vec![
            DESCRIPTION.to_string(),
            "It keeps us on the ground.".to_string(),
            Config::default().dialogue.goodbye,
        ]
    );
    assert!(outcome.coordinator.is_closed());
    assert!(outcome.coordinator.transcript().is_empty());
    assert!(!outcome.input.is_active());
}

#[tokio::test(start_paused = true)]
async fn pauses_shorter_than_the_silence_window_keep_the_latest_fragment() {
    let service = Arc::new(MockAnsweringService::new());

    converse(DESCRIPTION, Arc::clone(&service), MockSpeechInput::new(), |h| async move {
        let start = tokio::time::Instant::now();
        at(100, start).await;
        h.fragment(Fragment::final_result(0, "what is"));
        at(4000, start).await;
        h.fragment(Fragment::interim(1, "tell me about tides"));
        at(8500, start).await;
        h.fragment(Fragment::final_result(1, "tell me about the tides"));
        at(20_000, start).await;
        h.command(UserCommand::Quit);
    })
    .await;

    let queries: Vec<String> = service.calls().into_iter().map(|c| c.query).collect();
    assert_eq!(queries, vec!["tell me about the tides"]);
}

#[tokio::test(start_paused = true)]
async fn follow_up_question_carries_the_previous_exchange() {
    let service = Arc::new(
        MockAnsweringService::new()
            .with_response("About 9.8 metres per second squared.")
            .with_response("Yes, but much weaker."),
    );

    let outcome = converse(DESCRIPTION, Arc::clone(&service), MockSpeechInput::new(), |h| async move {
        let start = tokio::time::Instant::now();
        at(100, start).await;
        h.fragment(Fragment::final_result(0, "how strong is it"));
        at(10_000, start).await;
        h.fragment(Fragment::final_result(0, "is there gravity on the moon"));
        at(20_000, start).await;
        h.command(UserCommand::Quit);
    })
    .await;

    let calls = service.calls();
    assert_eq!(calls.len(), 2);
    let second: Vec<(Role, &str)> = calls[1]
        .history
        .iter()
        .map(|entry| (entry.role, entry.text.as_str()))
        .collect();
    assert_eq!(
        second,
        vec![
            (Role::System, DESCRIPTION),
            (Role::User, "how strong is it"),
            (Role::Assistant, "About 9.8 metres per second squared."),
        ]
    );
    let sequences: Vec<u64> = outcome.turns().into_iter().map(|(_, _, seq)| seq).collect();
    assert_eq!(sequences, vec![0, 1, 2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn quitting_while_the_service_thinks_drops_the_answer() {
    let service = Arc::new(
        MockAnsweringService::new()
            .with_response("This answer arrives too late.")
            .with_delay(Duration::from_secs(10)),
    );

    let outcome = converse(DESCRIPTION, Arc::clone(&service), MockSpeechInput::new(), |h| async move {
        let start = tokio::time::Instant::now();
        at(100, start).await;
        h.fragment(Fragment::final_result(0, "why do apples fall"));
        at(6000, start).await;
        h.command(UserCommand::Quit);
    })
    .await;
    tokio::time::sleep(Duration::from_secs(15)).await;

    assert_eq!(service.calls().len(), 1);
    assert_eq!(outcome.roles(), vec![Role::System, Role::User]);
    assert_eq!(
        outcome.output.texts().last().cloned(),
        Some(Config::default().dialogue.goodbye)
    );
    assert_eq!(outcome.coordinator.in_flight_ticket(), None);
    assert!(outcome.coordinator.transcript().is_empty());
}

#[tokio::test(start_paused = true)]
async fn service_failure_is_reported_and_listening_resumes() {
    let service = Arc::new(
        MockAnsweringService::new()
            .with_failure("backend unavailable")
            .with_response("Second time lucky."),
    );

    let outcome = converse(DESCRIPTION, Arc::clone(&service), MockSpeechInput::new(), |h| async move {
        let start = tokio::time::Instant::now();
        at(100, start).await;
        h.fragment(Fragment::final_result(0, "first try"));
        at(10_000, start).await;
        h.fragment(Fragment::final_result(0, "second try"));
        at(20_000, start).await;
        h.command(UserCommand::Quit);
    })
    .await;

    let errors = outcome.observer.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, ErrorSource::Service);
    assert!(errors[0].1.contains("backend unavailable"));
    assert_eq!(
        outcome.roles(),
        vec![Role::System, Role::User, Role::User, Role::Assistant]
    );
}

#[tokio::test(start_paused = true)]
async fn input_that_keeps_ending_backs_off_then_gives_up() {
    let service = Arc::new(MockAnsweringService::new());
    let input = MockSpeechInput::new();

    let outcome = converse("", Arc::clone(&service), input, |h| async move {
        let start = tokio::time::Instant::now();
        // Each end arrives after the previous restart has happened.
        for ms in [100, 1000, 2000, 4000, 7000, 12_000] {
            at(ms, start).await;
            h.recognition_ended();
        }
        at(13_000, start).await;
        h.command(UserCommand::Quit);
    })
    .await;

    let delays: Vec<u128> = outcome
        .observer
        .notices()
        .into_iter()
        .filter_map(|notice| match notice {
            Notice::Restarting { delay, .. } => Some(delay.as_millis()),
            _ => None,
        })
        .collect();
    assert_eq!(delays, vec![250, 500, 1000, 2000, 4000]);

    let errors = outcome.observer.errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].0, ErrorSource::Recognition);
    assert!(errors[0].1.contains("after 5 restarts"));
    assert!(outcome.observer.states().contains(&DialogueState::Idle));
    assert_eq!(outcome.input.starts(), 6);
    assert!(service.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn microphone_toggle_mutes_the_conversation() {
    let service = Arc::new(MockAnsweringService::new());

    let outcome = converse(DESCRIPTION, Arc::clone(&service), MockSpeechInput::new(), |h| async move {
        let start = tokio::time::Instant::now();
        at(100, start).await;
        h.command(UserCommand::ToggleMic);
        h.fragment(Fragment::final_result(0, "nobody hears this"));
        at(8000, start).await;
        h.command(UserCommand::ToggleMic);
        h.fragment(Fragment::final_result(0, "but this is heard"));
        at(16_000, start).await;
        h.command(UserCommand::Quit);
    })
    .await;

    let queries: Vec<String> = service.calls().into_iter().map(|c| c.query).collect();
    assert_eq!(queries, vec!["but this is heard"]);
    assert!(!outcome.input.is_active());
}
