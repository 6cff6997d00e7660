use crate::cancellation::Cancelled;
use crate::playback::PlaybackState;
use thiserror::Error;

/// Failures reported by a speech backend, either synchronously from
/// `submit` or asynchronously through a failure event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("speech backend unavailable: {0}")]
    Unavailable(String),
    #[error("voice not supported: {0}")]
    UnsupportedVoice(String),
    #[error("synthesis failed: {0}")]
    Synthesis(String),
}

/// Errors returned by playback commands.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("there is no text to speak")]
    EmptyText,
    #[error("cannot {command} while {state}")]
    InvalidTransition {
        command: &'static str,
        state: PlaybackState,
    },
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors from the text extraction pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("failed to open {path}: {reason}")]
    Open { path: String, reason: String },
    #[error("failed to extract page {page}: {reason}")]
    Page { page: usize, reason: String },
    #[error("no text could be extracted from {path} ({failed} of {total} pages failed)")]
    NoText {
        path: String,
        failed: usize,
        total: usize,
    },
    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}
