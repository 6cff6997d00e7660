//! Voice parameters and the backend-supplied voice catalog.

use crate::config::AppConfig;
use serde::Serialize;
use tracing::{debug, info};

pub const MIN_RATE: f32 = 0.5;
pub const MAX_RATE: f32 = 2.0;
pub const MIN_PITCH: f32 = 0.5;
pub const MAX_PITCH: f32 = 2.0;
pub const MIN_VOLUME: f32 = 0.0;
pub const MAX_VOLUME: f32 = 1.0;

/// `max(lo, min(hi, value))`; NaN collapses to `lo`.
pub fn clamp_to(value: f32, lo: f32, hi: f32) -> f32 {
    if value.is_nan() {
        return lo;
    }
    value.min(hi).max(lo)
}

/// A voice as listed by the speech backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceHandle {
    pub name: String,
    pub language: String,
    pub is_default: bool,
}

impl VoiceHandle {
    pub fn new(name: impl Into<String>, language: impl Into<String>, is_default: bool) -> Self {
        Self {
            name: name.into(),
            language: language.into(),
            is_default,
        }
    }
}

/// Parameters applied to every utterance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoiceSettings {
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    pub voice: Option<VoiceHandle>,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
            voice: None,
        }
    }
}

/// Scores voices for default selection. Zero means "no preference".
pub trait VoiceRanker {
    fn rank(&self, voice: &VoiceHandle) -> u32;
}

impl<F> VoiceRanker for F
where
    F: Fn(&VoiceHandle) -> u32,
{
    fn rank(&self, voice: &VoiceHandle) -> u32 {
        self(voice)
    }
}

/// Prefers voices whose name contains one of the configured markers.
/// Earlier markers outrank later ones.
#[derive(Debug, Clone)]
pub struct MarkerRanker {
    markers: Vec<String>,
}

impl MarkerRanker {
    pub fn new(markers: &[String]) -> Self {
        Self {
            markers: markers
                .iter()
                .map(|marker| marker.trim().to_lowercase())
                .filter(|marker| !marker.is_empty())
                .collect(),
        }
    }
}

impl VoiceRanker for MarkerRanker {
    fn rank(&self, voice: &VoiceHandle) -> u32 {
        let name = voice.name.to_lowercase();
        self.markers
            .iter()
            .position(|marker| name.contains(marker.as_str()))
            .map(|pos| (self.markers.len() - pos) as u32)
            .unwrap_or(0)
    }
}

/// Holds the voice settings and the catalog they select from.
pub struct VoiceStore {
    settings: VoiceSettings,
    catalog: Vec<VoiceHandle>,
    ranker: Box<dyn VoiceRanker>,
    requested_name: Option<String>,
}

impl VoiceStore {
    pub fn new(ranker: Box<dyn VoiceRanker>) -> Self {
        Self {
            settings: VoiceSettings::default(),
            catalog: Vec::new(),
            ranker,
            requested_name: None,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        let mut store = Self::new(Box::new(MarkerRanker::new(&config.preferred_voice_markers)));
        store.set_rate(config.voice_rate);
        store.set_pitch(config.voice_pitch);
        store.set_volume(config.voice_volume);
        store.requested_name = config.voice_name.clone();
        store
    }

    pub fn settings(&self) -> &VoiceSettings {
        &self.settings
    }

    pub fn catalog(&self) -> &[VoiceHandle] {
        &self.catalog
    }

    pub fn set_rate(&mut self, rate: f32) -> f32 {
        self.settings.rate = clamp_to(rate, MIN_RATE, MAX_RATE);
        debug!(requested = rate, rate = self.settings.rate, "Set speech rate");
        self.settings.rate
    }

    pub fn set_pitch(&mut self, pitch: f32) -> f32 {
        self.settings.pitch = clamp_to(pitch, MIN_PITCH, MAX_PITCH);
        debug!(requested = pitch, pitch = self.settings.pitch, "Set speech pitch");
        self.settings.pitch
    }

    pub fn set_volume(&mut self, volume: f32) -> f32 {
        self.settings.volume = clamp_to(volume, MIN_VOLUME, MAX_VOLUME);
        debug!(
            requested = volume,
            volume = self.settings.volume,
            "Set speech volume"
        );
        self.settings.volume
    }

    /// An explicit choice replaces any configured voice still awaited.
    pub fn set_voice(&mut self, voice: Option<VoiceHandle>) {
        debug!(voice = ?voice.as_ref().map(|v| v.name.as_str()), "Set voice");
        self.requested_name = None;
        self.settings.voice = voice;
    }

    /// Select a catalog voice by exact name. Unknown names leave the
    /// selection untouched and return `false`.
    pub fn set_voice_by_name(&mut self, name: &str) -> bool {
        match self.catalog.iter().find(|voice| voice.name == name) {
            Some(voice) => {
                self.settings.voice = Some(voice.clone());
                self.requested_name = None;
                info!(voice = %name, "Selected voice");
                true
            }
            None => {
                debug!(voice = %name, "Voice not in catalog; keeping selection");
                false
            }
        }
    }

    /// Replace the catalog. A selection that survives the refresh is kept;
    /// otherwise the default selection is recomputed.
    pub fn refresh_catalog(&mut self, voices: Vec<VoiceHandle>) {
        self.catalog = voices;
        if let Some(name) = self.requested_name.take() {
            if self.set_voice_by_name(&name) {
                return;
            }
            // Wait for a later catalog that may contain it.
            self.requested_name = Some(name);
        }

        let kept = self
            .settings
            .voice
            .as_ref()
            .and_then(|current| self.catalog.iter().find(|v| v.name == current.name))
            .cloned();
        self.settings.voice = kept.or_else(|| self.default_voice().cloned());
        info!(
            voices = self.catalog.len(),
            selected = ?self.settings.voice.as_ref().map(|v| v.name.as_str()),
            "Refreshed voice catalog"
        );
    }

    /// Ranked voice, then backend default, then first voice.
    pub fn default_voice(&self) -> Option<&VoiceHandle> {
        let mut best: Option<(&VoiceHandle, u32)> = None;
        for voice in &self.catalog {
            let score = self.ranker.rank(voice);
            if score > 0 && best.map(|(_, top)| score > top).unwrap_or(true) {
                best = Some((voice, score));
            }
        }
        best.map(|(voice, _)| voice)
            .or_else(|| self.catalog.iter().find(|voice| voice.is_default))
            .or_else(|| self.catalog.first())
    }
}
