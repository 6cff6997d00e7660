use super::{PlaybackState, SpeechController};
use crate::backend::{BackendEvent, SpeechBackend, UtteranceEvent, UtteranceId};
use crate::clock::Clock;
use crate::events::PlaybackEvent;
use crate::highlight::HighlightChange;
use tracing::{debug, info, warn};

impl<B: SpeechBackend, C: Clock> SpeechController<B, C> {
    /// Feed one asynchronous backend notification into the state machine.
    ///
    /// Events for any utterance other than the active session's are stale
    /// and dropped without side effects.
    pub fn handle_backend_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::VoicesChanged => {
                let voices = self.backend.voices();
                self.voices.refresh_catalog(voices);
            }
            BackendEvent::Utterance { id, event } => {
                if !self.is_current_utterance(id) {
                    debug!(utterance = id.0, ?event, "Ignoring stale backend event");
                    return;
                }
                self.on_utterance_event(event);
            }
        }
    }

    fn is_current_utterance(&self, id: UtteranceId) -> bool {
        self.session
            .as_ref()
            .map(|session| session.utterance == id)
            .unwrap_or(false)
    }

    fn on_utterance_event(&mut self, event: UtteranceEvent) {
        match event {
            UtteranceEvent::Started => self.on_started(),
            UtteranceEvent::Position { char_index } => self.on_position(char_index),
            UtteranceEvent::PauseAck => self.on_pause_ack(),
            UtteranceEvent::ResumeAck => self.on_resume_ack(),
            UtteranceEvent::Ended => self.on_ended(),
            UtteranceEvent::Failed { reason } => self.on_failed(reason),
        }
    }

    fn on_started(&mut self) {
        let now = self.clock.now();
        let change = self.session.as_mut().and_then(|session| {
            if session.confirmed {
                return None;
            }
            session.confirmed = true;
            debug!(session = session.id.0, "Backend confirmed start");
            session.sync.begin(now)
        });
        self.maybe_emit(change);
    }

    fn on_position(&mut self, char_index: usize) {
        if self.state != PlaybackState::Speaking {
            debug!(char_index, state = %self.state, "Ignoring position outside speaking");
            return;
        }
        let now = self.clock.now();
        let change = self.session.as_mut().and_then(|session| {
            // Some engines skip the start notification; the first position implies it.
            session.confirmed = true;
            let begun = session.sync.begin(now);
            session.sync.on_position(char_index).or(begun)
        });
        self.maybe_emit(change);
    }

    fn on_pause_ack(&mut self) {
        if self.state != PlaybackState::Speaking {
            debug!(state = %self.state, "Ignoring duplicate pause acknowledgment");
            return;
        }
        let now = self.clock.now();
        if let Some(session) = self.session.as_mut() {
            session.sync.pause(now);
        }
        info!("Playback paused");
        self.set_state(PlaybackState::Paused);
    }

    fn on_resume_ack(&mut self) {
        if self.state != PlaybackState::Paused {
            debug!(state = %self.state, "Ignoring resume acknowledgment while not paused");
            return;
        }
        let now = self.clock.now();
        if let Some(session) = self.session.as_mut() {
            session.sync.resume(now);
        }
        info!("Playback resumed");
        self.set_state(PlaybackState::Speaking);
    }

    fn on_ended(&mut self) {
        if let Some(session) = self.session.take() {
            info!(session = session.id.0, "Finished speaking");
        }
        self.set_state(PlaybackState::Ended);
        self.listeners.emit(PlaybackEvent::Progress {
            message: "Finished reading".to_string(),
            percent: Some(100.0),
        });
    }

    fn on_failed(&mut self, reason: String) {
        if let Some(session) = self.session.take() {
            warn!(session = session.id.0, %reason, "Speech synthesis failed");
        }
        self.set_state(PlaybackState::Errored);
        self.listeners.emit(PlaybackEvent::Error {
            message: format!("Speech synthesis failed: {reason}"),
        });
    }

    fn maybe_emit(&mut self, change: Option<HighlightChange>) {
        if let Some(change) = change {
            self.emit_highlight(change);
        }
    }
}
