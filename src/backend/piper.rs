//! Offline neural speech through `piper-rs`, played with `rodio`.
//!
//! Piper gives no word timing, so this backend reports no positions and the
//! controller falls back to estimated highlighting.

use super::{UtteranceSlot, WorkerCommand, WorkerContext, POLL_INTERVAL};
use anyhow::{Context, Result};
use narrator_core::backend::{
    BackendCapabilities, BackendEventSink, SpeechBackend, UtteranceEvent, UtteranceId,
    UtteranceRequest,
};
use narrator_core::error::BackendError;
use narrator_core::voice::{VoiceHandle, VoiceSettings};
use piper_rs::from_config_path;
use piper_rs::synth::{AudioOutputConfig, PiperSpeechSynthesizer};
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, Sink};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::RecvTimeoutError;
use std::thread;
use tracing::{debug, info, warn};

type PiperModel = Arc<dyn piper_rs::PiperModel + Send + Sync>;

pub struct PiperBackend {
    sink: Arc<dyn BackendEventSink>,
    model: PiperModel,
    voice: VoiceHandle,
    slot: UtteranceSlot,
}

impl PiperBackend {
    pub fn new(
        sink: Arc<dyn BackendEventSink>,
        model_path: PathBuf,
        espeak_path: PathBuf,
    ) -> Result<Self> {
        let espeak_path = sanitize_espeak_root(espeak_path);
        if env::var_os("PIPER_ESPEAKNG_DATA_DIRECTORY").is_none() {
            // Safe because we set a deterministic value before any worker starts.
            unsafe {
                env::set_var("PIPER_ESPEAKNG_DATA_DIRECTORY", &espeak_path);
            }
        }
        info!(
            model = %model_path.display(),
            espeak_root = %espeak_path.display(),
            "Initializing Piper speech backend"
        );

        let config_path = resolve_piper_config(&model_path);
        if !config_path.exists() {
            anyhow::bail!(
                "Piper config not found at {} (expected from {})",
                config_path.display(),
                model_path.display()
            );
        }
        let model = from_config_path(&config_path).context("Loading Piper model")?;

        let name = model_path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .map(|stem| stem.trim_end_matches(".onnx").to_string())
            .unwrap_or_else(|| "piper".to_string());
        let language = name.split(['-', '_']).next().unwrap_or("en").to_string();

        Ok(Self {
            sink,
            model,
            voice: VoiceHandle::new(name, language, true),
            slot: UtteranceSlot::default(),
        })
    }
}

impl SpeechBackend for PiperBackend {
    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            position_events: false,
        }
    }

    fn voices(&self) -> Vec<VoiceHandle> {
        vec![self.voice.clone()]
    }

    fn submit(&mut self, request: UtteranceRequest) -> Result<UtteranceId, BackendError> {
        if let Some(voice) = &request.settings.voice {
            if voice.name != self.voice.name {
                return Err(BackendError::UnsupportedVoice(voice.name.clone()));
            }
        }
        let (id, commands, cancel) = self.slot.start();
        let ctx = WorkerContext {
            id,
            sink: Arc::clone(&self.sink),
            commands,
            cancel,
            paused: false,
        };
        let model = Arc::clone(&self.model);
        debug!(
            utterance = id.0,
            chars = request.text.len(),
            rate = request.settings.rate,
            "Submitting Piper utterance"
        );
        thread::Builder::new()
            .name(format!("piper-utterance-{}", id.0))
            .spawn(move || {
                if let Err(err) = run_utterance(ctx, model, request) {
                    warn!("Piper utterance failed: {err:?}");
                }
            })
            .map_err(|err| BackendError::Unavailable(format!("failed to spawn worker: {err}")))?;
        Ok(id)
    }

    fn request_pause(&mut self, id: UtteranceId) {
        self.slot.send(id, WorkerCommand::Pause);
    }

    fn request_resume(&mut self, id: UtteranceId) {
        self.slot.send(id, WorkerCommand::Resume);
    }

    fn cancel(&mut self, id: UtteranceId) {
        self.slot.cancel(id);
    }
}

/// Synthesize, then play while serving pause/resume until the sink drains.
/// Failures are reported to the controller before being returned.
fn run_utterance(mut ctx: WorkerContext, model: PiperModel, request: UtteranceRequest) -> Result<()> {
    let audio = match synthesize(model, &request.text, &request.settings) {
        Ok(audio) => audio,
        Err(err) => {
            ctx.emit(UtteranceEvent::Failed {
                reason: format!("{err:#}"),
            });
            return Err(err);
        }
    };
    if ctx.cancel.is_cancelled() {
        debug!(utterance = ctx.id.0, "Cancelled before playback");
        return Ok(());
    }

    let (_stream, handle) = match OutputStream::try_default().context("Opening audio output") {
        Ok(output) => output,
        Err(err) => {
            ctx.emit(UtteranceEvent::Failed {
                reason: format!("{err:#}"),
            });
            return Err(err);
        }
    };
    let sink = match Sink::try_new(&handle).context("Creating sink") {
        Ok(sink) => sink,
        Err(err) => {
            ctx.emit(UtteranceEvent::Failed {
                reason: format!("{err:#}"),
            });
            return Err(err);
        }
    };
    sink.set_volume(request.settings.volume);
    sink.append(audio);

    // Requests that arrived during synthesis take effect before audio starts.
    ctx.drain_commands();
    if ctx.paused {
        sink.pause();
    } else {
        sink.play();
    }
    ctx.emit(UtteranceEvent::Started);
    info!(utterance = ctx.id.0, "Starting Piper playback");

    loop {
        if ctx.cancel.is_cancelled() {
            debug!(utterance = ctx.id.0, "Stopping cancelled playback");
            sink.stop();
            return Ok(());
        }
        match ctx.commands.recv_timeout(POLL_INTERVAL) {
            Ok(command) => {
                let was_paused = ctx.paused;
                let apply_pause = command == WorkerCommand::Pause && !was_paused;
                let apply_resume = command == WorkerCommand::Resume && was_paused;
                if apply_pause {
                    sink.pause();
                } else if apply_resume {
                    sink.play();
                }
                ctx.apply(command);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                sink.stop();
                return Ok(());
            }
        }
        if !ctx.paused && sink.empty() {
            ctx.emit(UtteranceEvent::Ended);
            debug!(utterance = ctx.id.0, "Piper playback finished");
            return Ok(());
        }
    }
}

fn synthesize(model: PiperModel, text: &str, settings: &VoiceSettings) -> Result<SamplesBuffer<f32>> {
    let piper = PiperSpeechSynthesizer::new(model).context("Preparing Piper synthesizer")?;
    debug!(
        rate = settings.rate,
        pitch = settings.pitch,
        chars = text.len(),
        "Synthesizing utterance with Piper"
    );
    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate: Option<u32> = None;
    let mut channels: Option<u16> = None;
    for chunk in piper
        .synthesize_lazy(text.to_string(), Some(output_config(settings)))
        .context("Synthesizing audio")?
    {
        let chunk = chunk.context("Synthesizing audio chunk")?;
        if sample_rate.is_none() {
            sample_rate = Some(chunk.info.sample_rate as u32);
            channels = Some(chunk.info.num_channels as u16);
        }
        samples.extend_from_slice(chunk.samples.as_slice());
    }
    if samples.is_empty() {
        anyhow::bail!("No speech data produced");
    }
    Ok(SamplesBuffer::new(
        channels.unwrap_or(1),
        sample_rate.unwrap_or(22050),
        samples,
    ))
}

fn output_config(settings: &VoiceSettings) -> AudioOutputConfig {
    // Rate and pitch are always sent so the scale has no step at 1.0.
    AudioOutputConfig {
        rate: Some(rate_to_percent(settings.rate)),
        volume: None,
        pitch: Some(pitch_to_percent(settings.pitch)),
        appended_silence_ms: None,
    }
}

/// eSpeak is configured with the directory holding `espeak-ng-data`, so a
/// path naming `espeak-ng-data` itself is walked up one level.
fn sanitize_espeak_root(path: PathBuf) -> PathBuf {
    if path.ends_with("espeak-ng-data") {
        if let Some(parent) = path.parent() {
            debug!(
                configured = %path.display(),
                root = %parent.display(),
                "Using parent of espeak-ng-data as eSpeak root"
            );
            return parent.to_path_buf();
        }
    }
    path
}

/// Voice configs sit next to their model as `<model>.onnx.json`.
fn resolve_piper_config(model_path: &Path) -> PathBuf {
    match model_path.extension() {
        Some(ext) if ext == "onnx" => model_path.with_extension("onnx.json"),
        _ => model_path.to_path_buf(),
    }
}

/// Piper's rate scale spans 0.5x to 5.5x in 0..=100 steps.
fn rate_to_percent(rate: f32) -> u8 {
    const SLOWEST: f32 = 0.5;
    const SPAN: f32 = 5.0;
    let steps = (rate.clamp(SLOWEST, SLOWEST + SPAN) - SLOWEST) / SPAN * 100.0;
    steps.round() as u8
}

/// Map the 0.5..=2.0 pitch range onto Piper's 0..=100 scale.
fn pitch_to_percent(pitch: f32) -> u8 {
    let clamped = pitch.clamp(0.5, 2.0);
    (((clamped - 0.5) / 1.5) * 100.0).round() as u8
}
