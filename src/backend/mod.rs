//! Concrete speech backends for the terminal host.
//!
//! Each utterance runs on its own worker thread. The backend keeps a handle
//! to the active worker and forwards pause/resume requests over a command
//! channel; cancellation flips the worker's token. Workers report back only
//! through the shared [`BackendEventSink`].

mod console;
#[cfg(feature = "piper")]
mod piper;

pub use console::ConsoleBackend;
#[cfg(feature = "piper")]
pub use piper::PiperBackend;

use anyhow::Result;
use narrator_core::backend::{
    BackendEvent, BackendEventSink, SpeechBackend, UtteranceEvent, UtteranceId,
};
use narrator_core::cancellation::CancellationToken;
use narrator_core::config::{AppConfig, BackendKind};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};
use tracing::debug;

/// How often an idle worker re-checks its cancellation token.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WorkerCommand {
    Pause,
    Resume,
}

/// Backend-side handle to the running utterance.
struct ActiveUtterance {
    id: UtteranceId,
    commands: Sender<WorkerCommand>,
    cancel: CancellationToken,
}

/// Bookkeeping shared by the backends: id allocation and the single active
/// worker.
#[derive(Default)]
struct UtteranceSlot {
    next_id: u64,
    active: Option<ActiveUtterance>,
}

impl UtteranceSlot {
    /// Allocate an id, cancelling whatever was still running.
    fn start(&mut self) -> (UtteranceId, Receiver<WorkerCommand>, CancellationToken) {
        if let Some(previous) = self.active.take() {
            debug!(utterance = previous.id.0, "Cancelling superseded utterance");
            previous.cancel.cancel();
        }
        self.next_id += 1;
        let id = UtteranceId(self.next_id);
        let (commands, rx) = mpsc::channel();
        let cancel = CancellationToken::new();
        self.active = Some(ActiveUtterance {
            id,
            commands,
            cancel: cancel.clone(),
        });
        (id, rx, cancel)
    }

    fn send(&self, id: UtteranceId, command: WorkerCommand) {
        match &self.active {
            Some(active) if active.id == id => {
                if active.commands.send(command).is_err() {
                    debug!(utterance = id.0, ?command, "Worker already finished");
                }
            }
            _ => debug!(utterance = id.0, ?command, "No active utterance to control"),
        }
    }

    fn cancel(&mut self, id: UtteranceId) {
        if self.active.as_ref().is_some_and(|active| active.id == id) {
            if let Some(active) = self.active.take() {
                active.cancel.cancel();
            }
        }
    }
}

impl Drop for UtteranceSlot {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel.cancel();
        }
    }
}

/// Worker-side view of one utterance: its identity, where events go, and
/// the control inputs.
struct WorkerContext {
    id: UtteranceId,
    sink: Arc<dyn BackendEventSink>,
    commands: Receiver<WorkerCommand>,
    cancel: CancellationToken,
    paused: bool,
}

/// Outcome of waiting on a worker's controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Cancelled,
}

impl WorkerContext {
    fn emit(&self, event: UtteranceEvent) {
        self.sink.deliver(BackendEvent::utterance(self.id, event));
    }

    /// Handle one control command, acknowledging real state changes.
    fn apply(&mut self, command: WorkerCommand) {
        match command {
            WorkerCommand::Pause if !self.paused => {
                self.paused = true;
                self.emit(UtteranceEvent::PauseAck);
            }
            WorkerCommand::Resume if self.paused => {
                self.paused = false;
                self.emit(UtteranceEvent::ResumeAck);
            }
            _ => {}
        }
    }

    /// Let `duration` of unpaused time pass while serving commands.
    fn wait_active(&mut self, duration: Duration) -> Flow {
        let mut remaining = duration;
        loop {
            if self.cancel.is_cancelled() {
                return Flow::Cancelled;
            }
            if self.paused {
                if self.wait_command(POLL_INTERVAL) == Flow::Cancelled {
                    return Flow::Cancelled;
                }
                continue;
            }
            if remaining.is_zero() {
                return Flow::Continue;
            }
            let slice = remaining.min(POLL_INTERVAL);
            let started = Instant::now();
            if self.wait_command(slice) == Flow::Cancelled {
                return Flow::Cancelled;
            }
            remaining = remaining.saturating_sub(started.elapsed());
        }
    }

    /// Block up to `timeout` for one command and apply it.
    fn wait_command(&mut self, timeout: Duration) -> Flow {
        match self.commands.recv_timeout(timeout) {
            Ok(command) => {
                self.apply(command);
                Flow::Continue
            }
            Err(RecvTimeoutError::Timeout) => Flow::Continue,
            Err(RecvTimeoutError::Disconnected) => {
                // Backend dropped its handle; treat as cancelled.
                Flow::Cancelled
            }
        }
    }

    /// Apply every queued command without blocking.
    #[cfg_attr(not(feature = "piper"), allow(dead_code))]
    fn drain_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            self.apply(command);
        }
    }
}

/// Build the backend named in config. Falls back to the console backend
/// when the requested one is not compiled in.
pub fn build_backend(
    config: &AppConfig,
    sink: Arc<dyn BackendEventSink>,
) -> Result<Box<dyn SpeechBackend>> {
    match config.backend {
        BackendKind::Console => Ok(Box::new(ConsoleBackend::new(sink, config.console_wpm))),
        #[cfg(feature = "piper")]
        BackendKind::Piper => Ok(Box::new(PiperBackend::new(
            sink,
            std::path::PathBuf::from(&config.piper_model_path),
            std::path::PathBuf::from(&config.piper_espeak_path),
        )?)),
        #[cfg(not(feature = "piper"))]
        BackendKind::Piper => {
            tracing::warn!("Built without the `piper` feature; using the console backend");
            Ok(Box::new(ConsoleBackend::new(sink, config.console_wpm)))
        }
    }
}
