use crate::backend::UtteranceId;
use crate::highlight::HighlightSynchronizer;
use crate::segmenter::Sentence;
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackState {
    #[default]
    Idle,
    Speaking,
    Paused,
    Ended,
    Errored,
}

impl PlaybackState {
    /// A session exists only in these states.
    pub fn is_active(self) -> bool {
        matches!(self, PlaybackState::Speaking | PlaybackState::Paused)
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Speaking => "speaking",
            PlaybackState::Paused => "paused",
            PlaybackState::Ended => "ended",
            PlaybackState::Errored => "errored",
        };
        write!(f, "{}", label)
    }
}

/// Token identifying one playback session; ticks scheduled for an older
/// session are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SessionId(pub u64);

/// Text loaded for reading, with its sentence spans.
#[derive(Debug, Clone)]
pub struct Document {
    pub(super) text: String,
    pub(super) sentences: Arc<[Sentence]>,
}

impl Document {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }
}

pub(super) struct Session {
    pub(super) id: SessionId,
    pub(super) utterance: UtteranceId,
    pub(super) sync: HighlightSynchronizer,
    pub(super) started_at: Instant,
    pub(super) confirmed: bool,
}
