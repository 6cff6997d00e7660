//! Sentence-synchronized speech playback for extracted document text.
//!
//! The engine is host-agnostic: a host supplies a [`backend::SpeechBackend`]
//! and a [`extraction::TextExtractor`], feeds backend events and estimator
//! ticks into a [`playback::SpeechController`], and renders whatever
//! [`events::PlaybackEvent`]s come out.

pub mod backend;
pub mod cancellation;
pub mod clock;
pub mod config;
pub mod error;
pub mod events;
pub mod extraction;
pub mod highlight;
pub mod playback;
pub mod segmenter;
pub mod voice;

pub use backend::{
    BackendCapabilities, BackendEvent, BackendEventSink, SpeechBackend, UtteranceEvent,
    UtteranceId, UtteranceRequest,
};
pub use cancellation::{CancellationToken, Cancelled};
pub use config::{AppConfig, BackendKind, LogLevel};
pub use error::{BackendError, ExtractionError, PlaybackError};
pub use events::{ListenerId, PlaybackEvent, PlaybackListener};
pub use extraction::{ExtractedDocument, TextExtractor, extract_document, reflow_page};
pub use highlight::{HighlightMode, SentenceMark};
pub use playback::{PlaybackState, SessionId, SpeechController};
pub use segmenter::{Sentence, segment};
pub use voice::{VoiceHandle, VoiceSettings, VoiceStore};
