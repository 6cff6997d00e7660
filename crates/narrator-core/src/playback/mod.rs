//! Playback state machine.
//!
//! `SpeechController` owns the single active session, the voice store and
//! the listener list. Commands (`speak`, `pause`, `resume`, `stop`) and
//! backend events (`handle_backend_event`, see `transitions`) are the only
//! ways session state changes. Pause and resume only *request* a change; the
//! state follows the backend's acknowledgment.

mod state;
mod transitions;

pub use state::{Document, PlaybackState, SessionId};

use crate::backend::{SpeechBackend, UtteranceRequest};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::error::PlaybackError;
use crate::events::{ListenerId, Listeners, PlaybackEvent, PlaybackListener};
use crate::highlight::{
    HighlightChange, HighlightMode, HighlightSynchronizer, HighlightTiming, SentenceMark,
    strategy_for,
};
use crate::segmenter::{Sentence, normalize_whitespace, segment};
use crate::voice::{VoiceHandle, VoiceSettings, VoiceStore};
use state::Session;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct SpeechController<B: SpeechBackend, C: Clock = SystemClock> {
    backend: B,
    clock: C,
    voices: VoiceStore,
    timing: HighlightTiming,
    listeners: Listeners,
    document: Option<Document>,
    session: Option<Session>,
    state: PlaybackState,
    next_session: u64,
}

impl<B: SpeechBackend> SpeechController<B, SystemClock> {
    pub fn new(backend: B, config: &AppConfig) -> Self {
        Self::with_clock(backend, SystemClock, config)
    }
}

impl<B: SpeechBackend, C: Clock> SpeechController<B, C> {
    pub fn with_clock(backend: B, clock: C, config: &AppConfig) -> Self {
        let mut voices = VoiceStore::from_config(config);
        voices.refresh_catalog(backend.voices());
        Self {
            backend,
            clock,
            voices,
            timing: HighlightTiming::from(config),
            listeners: Listeners::default(),
            document: None,
            session: None,
            state: PlaybackState::Idle,
            next_session: 0,
        }
    }

    /// Replace the default voice ranking, e.g. with a language preference.
    pub fn with_voice_store(mut self, mut voices: VoiceStore) -> Self {
        voices.refresh_catalog(self.backend.voices());
        self.voices = voices;
        self
    }

    pub fn subscribe(&mut self, listener: impl PlaybackListener + 'static) -> ListenerId {
        self.listeners.subscribe(Box::new(listener))
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.unsubscribe(id)
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.state
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn sentences(&self) -> &[Sentence] {
        self.document
            .as_ref()
            .map(|doc| doc.sentences())
            .unwrap_or(&[])
    }

    pub fn current_sentence_index(&self) -> usize {
        self.session
            .as_ref()
            .map(|session| session.sync.current_index())
            .unwrap_or(0)
    }

    /// Per-sentence highlight marks; all pending outside a session.
    pub fn sentence_marks(&self) -> Vec<SentenceMark> {
        match &self.session {
            Some(session) => session.sync.marks().to_vec(),
            None => vec![SentenceMark::Pending; self.sentences().len()],
        }
    }

    pub fn highlight_mode(&self) -> Option<HighlightMode> {
        self.session.as_ref().map(|session| session.sync.mode())
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session.as_ref().map(|session| session.id)
    }

    /// When the host should call `tick` next. `None` unless an estimated
    /// session is speaking and the backend has confirmed the start.
    pub fn tick_interval(&self) -> Option<(SessionId, Duration)> {
        if self.state != PlaybackState::Speaking {
            return None;
        }
        let session = self.session.as_ref().filter(|session| session.confirmed)?;
        session.sync.tick_interval().map(|every| (session.id, every))
    }

    pub fn settings(&self) -> &VoiceSettings {
        self.voices.settings()
    }

    pub fn voices(&self) -> &[VoiceHandle] {
        self.voices.catalog()
    }

    /// Applies to the next utterance; a running one keeps its settings.
    pub fn set_rate(&mut self, rate: f32) -> f32 {
        self.voices.set_rate(rate)
    }

    pub fn set_pitch(&mut self, pitch: f32) -> f32 {
        self.voices.set_pitch(pitch)
    }

    pub fn set_volume(&mut self, volume: f32) -> f32 {
        self.voices.set_volume(volume)
    }

    pub fn set_voice(&mut self, voice: Option<VoiceHandle>) {
        self.voices.set_voice(voice);
    }

    pub fn set_voice_by_name(&mut self, name: &str) -> bool {
        self.voices.set_voice_by_name(name)
    }

    /// Segment and keep `text` for reading. Any running session is stopped.
    pub fn load_text(&mut self, text: &str) -> Result<&[Sentence], PlaybackError> {
        let normalized = normalize_whitespace(text);
        if normalized.is_empty() {
            return Err(self.reject_input(PlaybackError::EmptyText));
        }
        self.stop();
        let sentences: Arc<[Sentence]> = segment(&normalized).into();
        info!(
            chars = normalized.chars().count(),
            sentences = sentences.len(),
            "Loaded text"
        );
        self.listeners.emit(PlaybackEvent::Progress {
            message: format!("Loaded {} sentences", sentences.len()),
            percent: None,
        });
        self.document = Some(Document {
            text: normalized,
            sentences,
        });
        Ok(self.sentences())
    }

    pub fn clear_text(&mut self) {
        self.stop();
        if self.document.take().is_some() {
            debug!("Cleared loaded text");
        }
    }

    /// Speak the loaded text from the beginning.
    pub fn speak(&mut self) -> Result<SessionId, PlaybackError> {
        let Some(document) = self.document.clone() else {
            return Err(self.reject_input(PlaybackError::EmptyText));
        };
        self.start_session(document)
    }

    /// Load `text` with caller-computed spans and speak it.
    pub fn speak_text(
        &mut self,
        text: &str,
        sentences: Vec<Sentence>,
    ) -> Result<SessionId, PlaybackError> {
        if text.trim().is_empty() {
            return Err(self.reject_input(PlaybackError::EmptyText));
        }
        let document = Document {
            text: text.to_string(),
            sentences: sentences.into(),
        };
        self.document = Some(document.clone());
        self.start_session(document)
    }

    pub fn pause(&mut self) -> Result<(), PlaybackError> {
        if self.state != PlaybackState::Speaking {
            return Err(self.invalid("pause"));
        }
        if let Some(session) = &self.session {
            debug!(session = session.id.0, "Requesting backend pause");
            self.backend.request_pause(session.utterance);
        }
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), PlaybackError> {
        if self.state != PlaybackState::Paused {
            return Err(self.invalid("resume"));
        }
        if let Some(session) = &self.session {
            debug!(session = session.id.0, "Requesting backend resume");
            self.backend.request_resume(session.utterance);
        }
        Ok(())
    }

    /// Pause while speaking, resume while paused, otherwise start reading.
    pub fn toggle_play_pause(&mut self) -> Result<(), PlaybackError> {
        match self.state {
            PlaybackState::Speaking => self.pause(),
            PlaybackState::Paused => self.resume(),
            _ => self.speak().map(|_| ()),
        }
    }

    /// Cancel speech and return to Idle immediately. Safe from any state.
    pub fn stop(&mut self) {
        if self.teardown_session() {
            info!("Stopped playback");
        }
        self.set_state(PlaybackState::Idle);
    }

    /// Drive the estimator. Ticks for a stale session, while not speaking, or
    /// before the backend confirmed the start are ignored.
    pub fn tick(&mut self, session_id: SessionId) {
        if self.state != PlaybackState::Speaking {
            return;
        }
        let now = self.clock.now();
        let change = match self.session.as_mut() {
            Some(session) if session.id == session_id => {
                if !session.confirmed {
                    debug!(session = session_id.0, "Ignoring tick before speech started");
                    return;
                }
                session.sync.on_tick(now)
            }
            _ => {
                debug!(session = session_id.0, "Ignoring stale highlight tick");
                return;
            }
        };
        if let Some(change) = change {
            self.emit_highlight(change);
        }
    }

    fn start_session(&mut self, document: Document) -> Result<SessionId, PlaybackError> {
        if self.teardown_session() {
            debug!("Tore down previous session before starting a new one");
        }

        self.next_session = self.next_session.wrapping_add(1);
        let id = SessionId(self.next_session);
        let started_at = self.clock.now();
        let settings = self.voices.settings().clone();
        let strategy = strategy_for(
            self.backend.capabilities(),
            &document.text,
            document.sentences.len(),
            settings.rate,
            &self.timing,
            started_at,
        );
        let sync = HighlightSynchronizer::new(Arc::clone(&document.sentences), strategy);
        let mode = sync.mode();

        let request = UtteranceRequest {
            text: document.text.clone(),
            settings,
        };
        match self.backend.submit(request) {
            Ok(utterance) => {
                info!(
                    session = id.0,
                    utterance = utterance.0,
                    sentences = document.sentences.len(),
                    ?mode,
                    "Started speaking"
                );
                self.session = Some(Session {
                    id,
                    utterance,
                    sync,
                    started_at,
                    confirmed: false,
                });
                self.set_state(PlaybackState::Speaking);
                Ok(id)
            }
            Err(err) => {
                warn!(session = id.0, "Speech backend rejected utterance: {err}");
                self.set_state(PlaybackState::Errored);
                self.listeners.emit(PlaybackEvent::Error {
                    message: err.to_string(),
                });
                Err(PlaybackError::Backend(err))
            }
        }
    }

    /// Cancel the backend request and drop the session. Returns whether a
    /// session existed.
    fn teardown_session(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        debug!(
            session = session.id.0,
            utterance = session.utterance.0,
            ran_ms = self
                .clock
                .now()
                .saturating_duration_since(session.started_at)
                .as_millis() as u64,
            "Cancelling utterance"
        );
        self.backend.cancel(session.utterance);
        true
    }

    fn set_state(&mut self, next: PlaybackState) {
        if self.state == next {
            return;
        }
        debug!(from = %self.state, to = %next, "Playback state changed");
        self.state = next;
        self.listeners
            .emit(PlaybackEvent::StateChanged { state: next });
    }

    fn emit_highlight(&mut self, change: HighlightChange) {
        let total = self.sentences().len();
        debug!(sentence = change.index, total, "Highlight advanced");
        self.listeners.emit(PlaybackEvent::HighlightChanged {
            sentence_index: change.index,
        });
        self.listeners.emit(PlaybackEvent::Progress {
            message: format!("Reading sentence {} of {}", change.index + 1, total),
            percent: Some(change.fraction * 100.0),
        });
    }

    fn reject_input(&mut self, err: PlaybackError) -> PlaybackError {
        warn!("Rejected command: {err}");
        self.listeners.emit(PlaybackEvent::Error {
            message: err.to_string(),
        });
        err
    }

    fn invalid(&self, command: &'static str) -> PlaybackError {
        debug!(command, state = %self.state, "Ignoring command in current state");
        PlaybackError::InvalidTransition {
            command,
            state: self.state,
        }
    }
}

#[cfg(test)]
mod tests;
