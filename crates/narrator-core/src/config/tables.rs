use super::defaults;
use super::models::{AppConfig, BackendKind, LogLevel};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize, serde::Serialize)]
pub(super) struct ConfigTables {
    #[serde(default)]
    voice: VoiceConfig,
    #[serde(default)]
    highlight: HighlightConfig,
    #[serde(default)]
    logging: LoggingConfig,
    #[serde(default)]
    extraction: ExtractionConfig,
    #[serde(default)]
    backend: BackendConfig,
}

impl From<ConfigTables> for AppConfig {
    fn from(tables: ConfigTables) -> Self {
        AppConfig {
            voice_rate: tables.voice.rate,
            voice_pitch: tables.voice.pitch,
            voice_volume: tables.voice.volume,
            voice_name: tables.voice.name,
            preferred_voice_markers: tables.voice.preferred_markers,
            base_wpm: tables.highlight.base_wpm,
            max_tick_ms: tables.highlight.max_tick_ms,
            min_tick_ms: tables.highlight.min_tick_ms,
            log_level: tables.logging.log_level,
            pdftotext_path: tables.extraction.pdftotext_path,
            pdfinfo_path: tables.extraction.pdfinfo_path,
            backend: tables.backend.kind,
            console_wpm: tables.backend.console_wpm,
            piper_model_path: tables.backend.piper_model_path,
            piper_espeak_path: tables.backend.piper_espeak_path,
        }
    }
}

impl From<&AppConfig> for ConfigTables {
    fn from(config: &AppConfig) -> Self {
        ConfigTables {
            voice: VoiceConfig {
                rate: config.voice_rate,
                pitch: config.voice_pitch,
                volume: config.voice_volume,
                name: config.voice_name.clone(),
                preferred_markers: config.preferred_voice_markers.clone(),
            },
            highlight: HighlightConfig {
                base_wpm: config.base_wpm,
                max_tick_ms: config.max_tick_ms,
                min_tick_ms: config.min_tick_ms,
            },
            logging: LoggingConfig {
                log_level: config.log_level,
            },
            extraction: ExtractionConfig {
                pdftotext_path: config.pdftotext_path.clone(),
                pdfinfo_path: config.pdfinfo_path.clone(),
            },
            backend: BackendConfig {
                kind: config.backend,
                console_wpm: config.console_wpm,
                piper_model_path: config.piper_model_path.clone(),
                piper_espeak_path: config.piper_espeak_path.clone(),
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct VoiceConfig {
    #[serde(default = "defaults::default_voice_rate")]
    rate: f32,
    #[serde(default = "defaults::default_voice_pitch")]
    pitch: f32,
    #[serde(default = "defaults::default_voice_volume")]
    volume: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default = "defaults::default_preferred_voice_markers")]
    preferred_markers: Vec<String>,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        VoiceConfig {
            rate: defaults::default_voice_rate(),
            pitch: defaults::default_voice_pitch(),
            volume: defaults::default_voice_volume(),
            name: None,
            preferred_markers: defaults::default_preferred_voice_markers(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct HighlightConfig {
    #[serde(default = "defaults::default_base_wpm")]
    base_wpm: f32,
    #[serde(default = "defaults::default_max_tick_ms")]
    max_tick_ms: u64,
    #[serde(default = "defaults::default_min_tick_ms")]
    min_tick_ms: u64,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        HighlightConfig {
            base_wpm: defaults::default_base_wpm(),
            max_tick_ms: defaults::default_max_tick_ms(),
            min_tick_ms: defaults::default_min_tick_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct LoggingConfig {
    #[serde(default = "defaults::default_log_level")]
    log_level: LogLevel,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            log_level: defaults::default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct ExtractionConfig {
    #[serde(default = "defaults::default_pdftotext_path")]
    pdftotext_path: String,
    #[serde(default = "defaults::default_pdfinfo_path")]
    pdfinfo_path: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        ExtractionConfig {
            pdftotext_path: defaults::default_pdftotext_path(),
            pdfinfo_path: defaults::default_pdfinfo_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, serde::Serialize)]
struct BackendConfig {
    #[serde(default = "defaults::default_backend_kind")]
    kind: BackendKind,
    #[serde(default = "defaults::default_console_wpm")]
    console_wpm: f32,
    #[serde(default = "defaults::default_piper_model_path")]
    piper_model_path: String,
    #[serde(default = "defaults::default_piper_espeak_path")]
    piper_espeak_path: String,
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig {
            kind: defaults::default_backend_kind(),
            console_wpm: defaults::default_console_wpm(),
            piper_model_path: defaults::default_piper_model_path(),
            piper_espeak_path: defaults::default_piper_espeak_path(),
        }
    }
}
