//! Entry point for the PDF narrator.
//!
//! Responsibilities here are intentionally minimal:
//! - Parse command-line arguments.
//! - Load user configuration from `conf/config.toml`.
//! - Extract the document text via `pdf`.
//! - Wire the configured speech backend to the playback controller and run
//!   the host loop.

mod backend;
mod cli;
mod commands;
mod host;
mod pdf;

use crate::backend::build_backend;
use crate::cli::parse_args;
use crate::commands::{HELP, spawn_stdin_reader};
use crate::host::{HostEvent, Reporter, run_event_loop};
use crate::pdf::extractor_for;
use anyhow::{Context, Result, anyhow};
use narrator_core::backend::BackendEventSink;
use narrator_core::cancellation::CancellationToken;
use narrator_core::config::load_config;
use narrator_core::events::PlaybackEvent;
use narrator_core::extraction::extract_document;
use narrator_core::playback::SpeechController;
use std::cell::RefCell;
use std::env;
use std::rc::Rc;
use std::sync::{Arc, mpsc};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let args = parse_args(env::args().skip(1))?;
    if !args.path.exists() {
        return Err(anyhow!("File not found: {}", args.path.display()));
    }
    let config = load_config(&args.config_path);
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        path = %args.path.display(),
        level = %config.log_level,
        backend = %config.backend,
        "Starting PDF narrator"
    );

    let (tx, rx) = mpsc::channel::<HostEvent>();
    let cancel = CancellationToken::new();
    {
        let tx = tx.clone();
        let cancel = cancel.clone();
        if let Err(err) = ctrlc::set_handler(move || {
            cancel.cancel();
            let _ = tx.send(HostEvent::Interrupt);
        }) {
            warn!("Failed to install Ctrl+C signal handler: {err}");
        }
    }

    let reporter = Rc::new(RefCell::new(Reporter::new(args.events_json)));
    let extractor = extractor_for(&args.path, &config);
    let extracted = extract_document(
        extractor.as_ref(),
        &args.path,
        Some(&cancel),
        |message, percent| {
            reporter.borrow_mut().render(&PlaybackEvent::Progress {
                message: message.to_string(),
                percent,
            })
        },
    );
    let document = match extracted {
        Ok(document) => document,
        Err(err) => {
            reporter.borrow_mut().render(&PlaybackEvent::Error {
                message: err.to_string(),
            });
            return Err(err)
                .with_context(|| format!("Failed to extract text from {}", args.path.display()));
        }
    };
    if document.pages_failed > 0 {
        warn!(
            failed = document.pages_failed,
            total = document.pages_total,
            "Some pages could not be read and were skipped"
        );
    }

    let sink: Arc<dyn BackendEventSink> = Arc::new(tx.clone());
    let backend = build_backend(&config, sink).context("Failed to start the speech backend")?;
    let mut controller = SpeechController::new(backend, &config);
    {
        let reporter = Rc::clone(&reporter);
        controller.subscribe(move |event: &PlaybackEvent| reporter.borrow_mut().render(event));
    }
    let sentences = controller
        .load_text(&document.text)
        .context("Failed to prepare text for reading")?;
    reporter.borrow_mut().set_sentences(sentences);
    info!(
        sentences = controller.sentences().len(),
        voice = controller.settings().voice.as_ref().map(|v| v.name.as_str()),
        rate = controller.settings().rate,
        "Document ready"
    );

    if !reporter.borrow().is_json() {
        eprintln!("{HELP}");
    }
    spawn_stdin_reader(tx).context("Failed to start the command reader")?;

    if let Err(err) = controller.speak() {
        warn!("Could not start speaking: {err}");
    }
    run_event_loop(&mut controller, &rx)?;
    info!("Exiting PDF narrator");
    Ok(())
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    warn!("Logging initialized; override level with config.log_level or RUST_LOG");
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("debug"));
    if let Err(err) = handle.modify(|filter| *filter = parsed.clone()) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        info!(%level, "Applied log level from config");
    }
}
