use crate::voice::{MAX_PITCH, MAX_RATE, MAX_VOLUME, MIN_PITCH, MIN_RATE, MIN_VOLUME, clamp_to};
use serde::Deserialize;

/// Flat runtime configuration; the on-disk form is sectioned (see `tables`).
#[derive(Debug, Clone, PartialEq, Deserialize, serde::Serialize)]
pub struct AppConfig {
    #[serde(default = "crate::config::defaults::default_voice_rate")]
    pub voice_rate: f32,
    #[serde(default = "crate::config::defaults::default_voice_pitch")]
    pub voice_pitch: f32,
    #[serde(default = "crate::config::defaults::default_voice_volume")]
    pub voice_volume: f32,
    #[serde(default)]
    pub voice_name: Option<String>,
    #[serde(default = "crate::config::defaults::default_preferred_voice_markers")]
    pub preferred_voice_markers: Vec<String>,
    #[serde(default = "crate::config::defaults::default_base_wpm")]
    pub base_wpm: f32,
    #[serde(default = "crate::config::defaults::default_max_tick_ms")]
    pub max_tick_ms: u64,
    #[serde(default = "crate::config::defaults::default_min_tick_ms")]
    pub min_tick_ms: u64,
    #[serde(default = "crate::config::defaults::default_log_level")]
    pub log_level: LogLevel,
    #[serde(default = "crate::config::defaults::default_pdftotext_path")]
    pub pdftotext_path: String,
    #[serde(default = "crate::config::defaults::default_pdfinfo_path")]
    pub pdfinfo_path: String,
    #[serde(default = "crate::config::defaults::default_backend_kind")]
    pub backend: BackendKind,
    #[serde(default = "crate::config::defaults::default_console_wpm")]
    pub console_wpm: f32,
    #[serde(default = "crate::config::defaults::default_piper_model_path")]
    pub piper_model_path: String,
    #[serde(default = "crate::config::defaults::default_piper_espeak_path")]
    pub piper_espeak_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            voice_rate: crate::config::defaults::default_voice_rate(),
            voice_pitch: crate::config::defaults::default_voice_pitch(),
            voice_volume: crate::config::defaults::default_voice_volume(),
            voice_name: None,
            preferred_voice_markers: crate::config::defaults::default_preferred_voice_markers(),
            base_wpm: crate::config::defaults::default_base_wpm(),
            max_tick_ms: crate::config::defaults::default_max_tick_ms(),
            min_tick_ms: crate::config::defaults::default_min_tick_ms(),
            log_level: crate::config::defaults::default_log_level(),
            pdftotext_path: crate::config::defaults::default_pdftotext_path(),
            pdfinfo_path: crate::config::defaults::default_pdfinfo_path(),
            backend: crate::config::defaults::default_backend_kind(),
            console_wpm: crate::config::defaults::default_console_wpm(),
            piper_model_path: crate::config::defaults::default_piper_model_path(),
            piper_espeak_path: crate::config::defaults::default_piper_espeak_path(),
        }
    }
}

impl AppConfig {
    /// Keep every value in bounds regardless of where the config came from.
    pub fn sanitized(mut self) -> Self {
        self.voice_rate = clamp_to(self.voice_rate, MIN_RATE, MAX_RATE);
        self.voice_pitch = clamp_to(self.voice_pitch, MIN_PITCH, MAX_PITCH);
        self.voice_volume = clamp_to(self.voice_volume, MIN_VOLUME, MAX_VOLUME);
        if !self.base_wpm.is_finite() || self.base_wpm < 1.0 {
            self.base_wpm = crate::config::defaults::default_base_wpm();
        }
        if !self.console_wpm.is_finite() || self.console_wpm < 1.0 {
            self.console_wpm = crate::config::defaults::default_console_wpm();
        }
        self.min_tick_ms = self.min_tick_ms.max(1);
        self.max_tick_ms = self.max_tick_ms.max(self.min_tick_ms);
        self.voice_name = self
            .voice_name
            .take()
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());
        self
    }
}

/// Which speech backend the binary drives.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    Console,
    Piper,
}

impl Default for BackendKind {
    fn default() -> Self {
        BackendKind::Console
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            BackendKind::Console => "console",
            BackendKind::Piper => "piper",
        };
        write!(f, "{}", label)
    }
}

/// Supported logging verbosity levels.
#[derive(Debug, Clone, Copy, Deserialize, serde::Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Debug
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_filter_str())
    }
}

impl LogLevel {
    pub fn as_filter_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}
