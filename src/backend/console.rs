//! Silent word-pacing backend.
//!
//! Positions are true character offsets into the utterance text, including
//! punctuation. Sentence spans assume one delimiter character between
//! sentences, so with `". "` separators the reported offsets run one char
//! further ahead per sentence. Short sentences late in a long document can
//! therefore be highlighted early or skipped; this is expected.

use super::{Flow, UtteranceSlot, WorkerCommand, WorkerContext};
use narrator_core::backend::{
    BackendCapabilities, BackendEventSink, SpeechBackend, UtteranceEvent, UtteranceId,
    UtteranceRequest,
};
use narrator_core::error::BackendError;
use narrator_core::voice::VoiceHandle;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, trace};

/// Silent backend that "reads" by pacing through the words of an utterance
/// at a fixed words-per-minute and reporting each word's character offset.
pub struct ConsoleBackend {
    sink: Arc<dyn BackendEventSink>,
    wpm: f32,
    slot: UtteranceSlot,
}

impl ConsoleBackend {
    pub fn new(sink: Arc<dyn BackendEventSink>, wpm: f32) -> Self {
        info!(wpm, "Initializing console speech backend");
        Self {
            sink,
            wpm,
            slot: UtteranceSlot::default(),
        }
    }

    fn catalog() -> Vec<VoiceHandle> {
        vec![
            VoiceHandle::new("Console Plain", "en-US", true),
            VoiceHandle::new("Console Natural", "en-US", false),
            VoiceHandle::new("Console Brisk", "en-GB", false),
        ]
    }
}

impl SpeechBackend for ConsoleBackend {
    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            position_events: true,
        }
    }

    fn voices(&self) -> Vec<VoiceHandle> {
        Self::catalog()
    }

    fn submit(&mut self, request: UtteranceRequest) -> Result<UtteranceId, BackendError> {
        if let Some(voice) = &request.settings.voice {
            if !Self::catalog().iter().any(|known| known.name == voice.name) {
                return Err(BackendError::UnsupportedVoice(voice.name.clone()));
            }
        }
        let words_per_second = f64::from(self.wpm) * f64::from(request.settings.rate) / 60.0;
        if !words_per_second.is_finite() || words_per_second <= 0.0 {
            return Err(BackendError::Synthesis(format!(
                "invalid speaking rate {}",
                request.settings.rate
            )));
        }
        let per_word = Duration::from_secs_f64(1.0 / words_per_second);

        let (id, commands, cancel) = self.slot.start();
        let ctx = WorkerContext {
            id,
            sink: Arc::clone(&self.sink),
            commands,
            cancel,
            paused: false,
        };
        debug!(
            utterance = id.0,
            chars = request.text.chars().count(),
            per_word_ms = per_word.as_millis() as u64,
            voice = request.settings.voice.as_ref().map(|v| v.name.as_str()),
            pitch = request.settings.pitch,
            volume = request.settings.volume,
            "Submitting console utterance"
        );
        thread::Builder::new()
            .name(format!("console-utterance-{}", id.0))
            .spawn(move || run_utterance(ctx, request.text, per_word))
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

fn run_utterance(mut ctx: WorkerContext, text: String, per_word: Duration) {
    ctx.emit(UtteranceEvent::Started);
    for (char_index, word) in word_offsets(&text) {
        if ctx.wait_active(Duration::ZERO) == Flow::Cancelled {
            debug!(utterance = ctx.id.0, "Console utterance cancelled");
            return;
        }
        trace!(utterance = ctx.id.0, char_index, word, "Speaking word");
        ctx.emit(UtteranceEvent::Position { char_index });
        if ctx.wait_active(per_word) == Flow::Cancelled {
            debug!(utterance = ctx.id.0, "Console utterance cancelled");
            return;
        }
    }
    ctx.emit(UtteranceEvent::Ended);
}

/// Start offsets (in `char`s) of every whitespace-separated word.
fn word_offsets(text: &str) -> Vec<(usize, &str)> {
    let mut words = Vec::new();
    let mut start: Option<(usize, usize)> = None;
    for (char_index, (byte_index, ch)) in text.char_indices().enumerate() {
        match (ch.is_whitespace(), start) {
            (false, None) => start = Some((char_index, byte_index)),
            (true, Some((word_char, word_byte))) => {
                words.push((word_char, &text[word_byte..byte_index]));
                start = None;
            }
            _ => {}
        }
    }
    if let Some((word_char, word_byte)) = start {
        words.push((word_char, &text[word_byte..]));
    }
    words
}
