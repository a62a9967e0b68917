//! Terminal application entry points.
//!
//! Wires the console speech engines, the HTTP service client and one of the
//! dialogues together, then runs the dialogue to completion.

use crate::config::Config;
use crate::dialogue::coordinator::Coordinator;
use crate::dialogue::event::channel;
use crate::dialogue::narration::NarrationFlow;
use crate::dialogue::notes::{NoteTaker, format_elapsed};
use crate::dialogue::observer::{ConsoleObserver, ErrorSource, Notice, SessionObserver};
use crate::dialogue::session::run;
use crate::dialogue::topic::TopicDictation;
use crate::error::Result;
use crate::host::console::ConsoleHost;
use crate::service::client::{SceneDescriber, SubjectDescriber};
use crate::service::http::HttpServiceClient;
use crate::service::protocol::{ImagePayload, SceneDescription};
use owo_colors::OwoColorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Settings shared by every interactive command.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    pub service_url: Option<String>,
    pub language: Option<String>,
    pub silence: Option<Duration>,
    pub quiet: bool,
    pub verbosity: u8,
}

impl SessionOptions {
    /// Apply CLI overrides on top of the loaded configuration and validate.
    pub fn apply(&self, mut config: Config) -> Result<Config> {
        if let Some(url) = &self.service_url {
            config.service.url = url.clone();
        }
        if let Some(language) = &self.language {
            config.speech.language = language.clone();
        }
        if let Some(silence) = self.silence {
            config.dialogue.silence_ms = silence.as_millis() as u64;
        }
        config.validate()?;
        Ok(config)
    }

    fn observer(&self) -> Arc<dyn SessionObserver> {
        Arc::new(ConsoleObserver::new(self.quiet, self.verbosity))
    }
}

fn print_controls(quiet: bool, controls: &str) {
    if !quiet {
        eprintln!("{}", controls.dimmed());
    }
}

/// Learn about a subject, then answer follow-up questions about it.
///
/// Without a subject, the user dictates one first and submits it with `/submit`.
pub async fn run_learn_command(
    config: Config,
    subject: Option<String>,
    options: SessionOptions,
) -> Result<()> {
    let config = options.apply(config)?;
    let client = Arc::new(HttpServiceClient::new(&config.service)?);
    let host = ConsoleHost::spawn();
    let observer = options.observer();

    let subject = match subject {
        Some(subject) => subject.trim().to_string(),
        None => {
            print_controls(
                options.quiet,
                "Say the subject, then /submit. /mic pauses, /quit exits.",
            );
            let (handle, inbox) = channel();
            host.attach(&handle);
            let dictation = TopicDictation::new(&config, host.engines().input, handle)
                .with_observer(Arc::clone(&observer));
            match run(dictation, inbox).await.into_subject() {
                Some(subject) => subject,
                None => return Ok(()),
            }
        }
    };

    if !options.quiet {
        eprintln!("{} {}", "Looking up".green(), subject);
    }
    let description = client.describe_subject(&subject).await?;

    converse(&config, &host, &description, client, observer, options.quiet).await
}

/// Hold a spoken Q&A conversation about `description`.
pub async fn run_ask_command(
    config: Config,
    description: String,
    options: SessionOptions,
) -> Result<()> {
    let config = options.apply(config)?;
    let client = Arc::new(HttpServiceClient::new(&config.service)?);
    let host = ConsoleHost::spawn();

    converse(
        &config,
        &host,
        &description,
        client,
        options.observer(),
        options.quiet,
    )
    .await
}

async fn converse(
    config: &Config,
    host: &ConsoleHost,
    description: &str,
    client: Arc<HttpServiceClient>,
    observer: Arc<dyn SessionObserver>,
    quiet: bool,
) -> Result<()> {
    print_controls(
        quiet,
        "Type what you would say. /stop skips speech, /mic toggles listening, /quit exits.",
    );
    let (handle, inbox) = channel();
    host.attach(&handle);
    let coordinator = Coordinator::new(config, description, host.engines(), client, handle)
        .with_observer(observer);
    let coordinator = run(coordinator, inbox).await;

    if !quiet {
        eprintln!(
            "{}",
            format!("Conversation ended after {} turns", coordinator.transcript().len()).dimmed()
        );
    }
    Ok(())
}

/// Describe a photo aloud and offer to teach about its subject.
///
/// A failed upload is reported and narrated as an empty scene.
pub async fn run_scene_command(config: Config, image: PathBuf, options: SessionOptions) -> Result<()> {
    let config = options.apply(config)?;
    let client = HttpServiceClient::new(&config.service)?;
    let observer = options.observer();

    let payload = ImagePayload::from_path(&image)?;
    let scene = match client.describe_scene(payload).await {
        Ok(scene) => scene,
        Err(e) => {
            observer.notice(&Notice::Error {
                source: ErrorSource::Service,
                message: e.to_string(),
            });
            SceneDescription::default()
        }
    };

    print_controls(options.quiet, "Answer yes or no. /stop skips speech, /quit exits.");
    let host = ConsoleHost::spawn();
    let (handle, inbox) = channel();
    host.attach(&handle);
    let flow = NarrationFlow::new(&config, scene, host.engines(), handle).with_observer(observer);
    run(flow, inbox).await;
    Ok(())
}

/// Dictate a note; `/mic` records or pauses, `/reset` zeroes the timer.
pub async fn run_notes_command(
    config: Config,
    output: Option<PathBuf>,
    options: SessionOptions,
) -> Result<()> {
    let config = options.apply(config)?;
    print_controls(
        options.quiet,
        "/mic starts or pauses recording, /reset zeroes the timer, /quit finishes.",
    );

    let host = ConsoleHost::spawn();
    let (handle, inbox) = channel();
    host.attach(&handle);
    let notes = NoteTaker::new(&config, host.engines().input, handle).with_observer(options.observer());
    let notes = run(notes, inbox).await;

    let elapsed = format_elapsed(notes.elapsed());
    let note = notes.into_note();
    match output {
        Some(path) => save_note(&path, &note)?,
        None => println!("{}", note),
    }
    if !options.quiet {
        eprintln!("{} {}", "Recorded".green(), elapsed);
    }
    Ok(())
}

fn save_note(path: &Path, note: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, format!("{}\n", note))?;
    Ok(())
}
