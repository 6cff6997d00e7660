//! Single-threaded host loop: backend events, user commands and estimator
//! ticks all arrive on one channel and are fed to the controller in order.

use crate::commands::UserCommand;
use anyhow::Result;
use narrator_core::backend::{BackendEvent, SpeechBackend};
use narrator_core::events::PlaybackEvent;
use narrator_core::playback::{SessionId, SpeechController};
use narrator_core::segmenter::Sentence;
use std::io::{self, Write};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum HostEvent {
    Backend(BackendEvent),
    Command(UserCommand),
    Interrupt,
    InputClosed,
}

impl From<BackendEvent> for HostEvent {
    fn from(event: BackendEvent) -> Self {
        HostEvent::Backend(event)
    }
}

/// Renders caller-facing events, either as JSON lines on stdout or as
/// readable text (sentences on stdout, status on stderr).
pub struct Reporter {
    json: bool,
    sentences: Vec<String>,
}

impl Reporter {
    pub fn new(json: bool) -> Self {
        Self {
            json,
            sentences: Vec::new(),
        }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    pub fn set_sentences(&mut self, sentences: &[Sentence]) {
        self.sentences = sentences.iter().map(|s| s.text.clone()).collect();
    }

    pub fn render(&mut self, event: &PlaybackEvent) {
        if self.json {
            match serde_json::to_string(event) {
                Ok(line) => println!("{line}"),
                Err(err) => warn!("Failed to serialize event: {err}"),
            }
            return;
        }
        match event {
            PlaybackEvent::HighlightChanged { sentence_index } => {
                let text = self
                    .sentences
                    .get(*sentence_index)
                    .map(String::as_str)
                    .unwrap_or("");
                println!("[{}/{}] {text}", sentence_index + 1, self.sentences.len());
            }
            PlaybackEvent::StateChanged { state } => eprintln!("-- {state} --"),
            PlaybackEvent::Progress { message, percent } => {
                // Per-sentence progress is already visible from the highlight line.
                if !message.starts_with("Reading sentence") {
                    match percent {
                        Some(pct) => eprintln!("{message} ({pct:.0}%)"),
                        None => eprintln!("{message}"),
                    }
                }
            }
            PlaybackEvent::Error { message } => eprintln!("error: {message}"),
        }
        let _ = io::stdout().flush();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoopControl {
    Continue,
    Quit,
}

/// Run until the user quits, Ctrl-C arrives, or input is closed and
/// playback has finished.
pub fn run_event_loop<B: SpeechBackend>(
    controller: &mut SpeechController<B>,
    rx: &Receiver<HostEvent>,
) -> Result<()> {
    let mut input_open = true;
    let mut next_tick: Option<(SessionId, Instant)> = None;

    loop {
        next_tick = match (controller.tick_interval(), next_tick) {
            (Some((session, _)), Some((scheduled, at))) if scheduled == session => {
                Some((session, at))
            }
            (Some((session, interval)), _) => Some((session, Instant::now() + interval)),
            (None, _) => None,
        };

        let received = match next_tick {
            Some((session, at)) => {
                match rx.recv_timeout(at.saturating_duration_since(Instant::now())) {
                    Ok(event) => Some(event),
                    Err(RecvTimeoutError::Timeout) => {
                        controller.tick(session);
                        next_tick = None;
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => None,
                }
            }
            None => rx.recv().ok(),
        };
        let Some(event) = received else {
            debug!("Host channel closed");
            break;
        };

        match event {
            HostEvent::Backend(event) => controller.handle_backend_event(event),
            HostEvent::Command(command) => {
                if apply_command(controller, command) == LoopControl::Quit {
                    controller.stop();
                    break;
                }
            }
            HostEvent::Interrupt => {
                info!("Received Ctrl+C; stopping playback");
                controller.stop();
                break;
            }
            HostEvent::InputClosed => {
                debug!("Command input closed");
                input_open = false;
            }
        }

        if !input_open && !controller.playback_state().is_active() {
            info!(state = %controller.playback_state(), "Playback finished and input closed");
            break;
        }
    }
    Ok(())
}

fn apply_command<B: SpeechBackend>(
    controller: &mut SpeechController<B>,
    command: UserCommand,
) -> LoopControl {
    match command {
        UserCommand::TogglePlayPause => {
            if let Err(err) = controller.toggle_play_pause() {
                debug!("Toggle rejected: {err}");
            }
        }
        UserCommand::Stop => controller.stop(),
        UserCommand::Restart => {
            if let Err(err) = controller.speak() {
                debug!("Restart rejected: {err}");
            }
        }
        UserCommand::AdjustRate(delta) => {
            let rate = controller.set_rate(controller.settings().rate + delta);
            info!(rate, "Speaking rate updated; applies from the next utterance");
            eprintln!("rate {rate:.1} (restart with r to apply)");
        }
        UserCommand::SelectVoice(name) => {
            if controller.set_voice_by_name(&name) {
                info!(voice = %name, "Voice selected");
                eprintln!("voice {name} (restart with r to apply)");
            } else {
                warn!(voice = %name, "No such voice");
                eprintln!("no voice named {name:?}");
            }
        }
        UserCommand::ListVoices => {
            let selected = controller.settings().voice.as_ref().map(|v| v.name.clone());
            for voice in controller.voices() {
                let marker = if selected.as_deref() == Some(voice.name.as_str()) {
                    "*"
                } else {
                    " "
                };
                eprintln!("{marker} {} ({})", voice.name, voice.language);
            }
        }
        UserCommand::Quit => return LoopControl::Quit,
    }
    LoopControl::Continue
}
