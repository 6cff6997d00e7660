pub(crate) fn default_voice_rate() -> f32 {
    1.0
}

pub(crate) fn default_voice_pitch() -> f32 {
    1.0
}

pub(crate) fn default_voice_volume() -> f32 {
    1.0
}

pub(crate) fn default_preferred_voice_markers() -> Vec<String> {
    ["Natural", "Neural", "Google", "Premium"]
        .iter()
        .map(|marker| marker.to_string())
        .collect()
}

pub(crate) fn default_base_wpm() -> f32 {
    150.0
}

pub(crate) fn default_max_tick_ms() -> u64 {
    500
}

pub(crate) fn default_min_tick_ms() -> u64 {
    50
}

pub(crate) fn default_log_level() -> crate::config::LogLevel {
    crate::config::LogLevel::Debug
}

pub(crate) fn default_pdftotext_path() -> String {
    "pdftotext".to_string()
}

pub(crate) fn default_pdfinfo_path() -> String {
    "pdfinfo".to_string()
}

pub(crate) fn default_backend_kind() -> crate::config::BackendKind {
    crate::config::BackendKind::Console
}

pub(crate) fn default_console_wpm() -> f32 {
    180.0
}

pub(crate) fn default_piper_model_path() -> String {
    "/usr/share/piper-voices/en/en_US/ryan/high/en_US-ryan-high.onnx".to_string()
}

pub(crate) fn default_piper_espeak_path() -> String {
    "/usr/share".to_string()
}
