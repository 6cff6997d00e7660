//! Contract between the playback controller and a speech-producing engine.
//!
//! Every request is fire-and-forget. Engines report what actually happened
//! through [`BackendEvent`]s, which the host feeds back into
//! `SpeechController::handle_backend_event` on its own thread.

use crate::error::BackendError;
use crate::voice::{VoiceHandle, VoiceSettings};
use std::sync::mpsc;

/// Backend-assigned identity of one submitted utterance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtteranceId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BackendCapabilities {
    /// The engine emits `UtteranceEvent::Position` while speaking.
    pub position_events: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceRequest {
    pub text: String,
    pub settings: VoiceSettings,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UtteranceEvent {
    Started,
    /// Character offset (in `char`s) into the submitted text.
    Position { char_index: usize },
    PauseAck,
    ResumeAck,
    Ended,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    Utterance {
        id: UtteranceId,
        event: UtteranceEvent,
    },
    VoicesChanged,
}

impl BackendEvent {
    pub fn utterance(id: UtteranceId, event: UtteranceEvent) -> Self {
        BackendEvent::Utterance { id, event }
    }
}

pub trait SpeechBackend {
    fn capabilities(&self) -> BackendCapabilities;
    fn voices(&self) -> Vec<VoiceHandle>;
    fn submit(&mut self, request: UtteranceRequest) -> Result<UtteranceId, BackendError>;
    fn request_pause(&mut self, id: UtteranceId);
    fn request_resume(&mut self, id: UtteranceId);
    fn cancel(&mut self, id: UtteranceId);
}

impl<B: SpeechBackend + ?Sized> SpeechBackend for Box<B> {
    fn capabilities(&self) -> BackendCapabilities {
        (**self).capabilities()
    }

    fn voices(&self) -> Vec<VoiceHandle> {
        (**self).voices()
    }

    fn submit(&mut self, request: UtteranceRequest) -> Result<UtteranceId, BackendError> {
        (**self).submit(request)
    }

    fn request_pause(&mut self, id: UtteranceId) {
        (**self).request_pause(id)
    }

    fn request_resume(&mut self, id: UtteranceId) {
        (**self).request_resume(id)
    }

    fn cancel(&mut self, id: UtteranceId) {
        (**self).cancel(id)
    }
}

/// Where backend worker threads deliver their events.
pub trait BackendEventSink: Send + Sync {
    fn deliver(&self, event: BackendEvent);
}

impl<T> BackendEventSink for mpsc::Sender<T>
where
    T: From<BackendEvent> + Send,
{
    fn deliver(&self, event: BackendEvent) {
        // A closed channel means the host loop is gone; nothing left to notify.
        let _ = self.send(T::from(event));
    }
}
