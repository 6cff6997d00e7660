//! Keeps the highlighted sentence in step with speech.
//!
//! A strategy is picked once per session: `PreciseTracker` when the backend
//! reports character positions, `EstimatedTracker` otherwise. The
//! synchronizer owns the cursor and sentence marks and only ever moves the
//! cursor forward.

use crate::backend::BackendCapabilities;
use crate::config::AppConfig;
use crate::segmenter::{Sentence, word_count};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SentenceMark {
    Pending,
    Active,
    Spoken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightMode {
    Precise,
    Estimated,
}

/// Estimator tuning, taken from the `[highlight]` config table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighlightTiming {
    pub base_wpm: f32,
    pub max_tick: Duration,
    pub min_tick: Duration,
}

impl Default for HighlightTiming {
    fn default() -> Self {
        Self {
            base_wpm: 150.0,
            max_tick: Duration::from_millis(500),
            min_tick: Duration::from_millis(50),
        }
    }
}

impl From<&AppConfig> for HighlightTiming {
    fn from(config: &AppConfig) -> Self {
        Self {
            base_wpm: config.base_wpm,
            max_tick: Duration::from_millis(config.max_tick_ms),
            min_tick: Duration::from_millis(config.min_tick_ms),
        }
    }
}

/// Cursor movement reported to listeners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighlightChange {
    pub index: usize,
    /// `(index + 1) / sentence_count`.
    pub fraction: f64,
}

pub trait HighlightStrategy {
    fn mode(&self) -> HighlightMode;

    /// Sentence for a reported character offset, if any.
    fn on_position(&mut self, _char_index: usize, _sentences: &[Sentence]) -> Option<usize> {
        None
    }

    /// Sentence the timer says should be active now.
    fn on_tick(&mut self, _now: Instant, _sentence_count: usize) -> Option<usize> {
        None
    }

    fn pause(&mut self, _now: Instant) {}

    fn resume(&mut self, _now: Instant) {}

    /// Start measuring elapsed time from `now`, e.g. once audio actually begins.
    fn restart(&mut self, _now: Instant) {}

    /// How often `on_tick` wants to be driven; `None` for event-driven modes.
    fn tick_interval(&self) -> Option<Duration> {
        None
    }
}

/// Maps backend character offsets onto sentence spans.
#[derive(Debug, Default)]
pub struct PreciseTracker;

impl HighlightStrategy for PreciseTracker {
    fn mode(&self) -> HighlightMode {
        HighlightMode::Precise
    }

    fn on_position(&mut self, char_index: usize, sentences: &[Sentence]) -> Option<usize> {
        // Ascending scan, so an offset on a shared boundary lands on the earlier span.
        sentences
            .iter()
            .position(|sentence| sentence.contains(char_index))
    }
}

/// Guesses progress from elapsed wall-clock time and a words-per-minute model.
#[derive(Debug)]
pub struct EstimatedTracker {
    estimated: Duration,
    interval: Duration,
    accumulated: Duration,
    running_since: Option<Instant>,
}

impl EstimatedTracker {
    pub fn new(
        text: &str,
        sentence_count: usize,
        rate: f32,
        timing: &HighlightTiming,
        now: Instant,
    ) -> Self {
        let words = word_count(text) as f64;
        let words_per_minute = f64::from(timing.base_wpm) * f64::from(rate);
        let seconds = if words_per_minute > 0.0 {
            words * 60.0 / words_per_minute
        } else {
            0.0
        };
        let estimated = if seconds.is_finite() && seconds > 0.0 {
            Duration::from_secs_f64(seconds)
        } else {
            Duration::ZERO
        };

        let per_half_sentence = if sentence_count == 0 {
            timing.max_tick
        } else {
            let divisor = u32::try_from(sentence_count.saturating_mul(2)).unwrap_or(u32::MAX);
            estimated / divisor
        };
        let interval = per_half_sentence.min(timing.max_tick).max(timing.min_tick);

        debug!(
            words,
            rate,
            estimated_ms = estimated.as_millis() as u64,
            interval_ms = interval.as_millis() as u64,
            "Estimated speech duration"
        );
        Self {
            estimated,
            interval,
            accumulated: Duration::ZERO,
            running_since: Some(now),
        }
    }

    pub fn estimated_duration(&self) -> Duration {
        self.estimated
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        let running = self
            .running_since
            .map(|since| now.saturating_duration_since(since))
            .unwrap_or(Duration::ZERO);
        self.accumulated + running
    }
}

impl HighlightStrategy for EstimatedTracker {
    fn mode(&self) -> HighlightMode {
        HighlightMode::Estimated
    }

    fn on_tick(&mut self, now: Instant, sentence_count: usize) -> Option<usize> {
        if sentence_count == 0 {
            return None;
        }
        let last = sentence_count - 1;
        if self.estimated.is_zero() {
            return Some(last);
        }
        let progress = self.elapsed(now).as_secs_f64() / self.estimated.as_secs_f64();
        let target = (progress * sentence_count as f64).floor();
        Some((target.max(0.0) as usize).min(last))
    }

    fn pause(&mut self, now: Instant) {
        if let Some(since) = self.running_since.take() {
            self.accumulated += now.saturating_duration_since(since);
        }
    }

    fn resume(&mut self, now: Instant) {
        if self.running_since.is_none() {
            self.running_since = Some(now);
        }
    }

    fn restart(&mut self, now: Instant) {
        self.accumulated = Duration::ZERO;
        self.running_since = Some(now);
    }

    fn tick_interval(&self) -> Option<Duration> {
        Some(self.interval)
    }
}

/// Pick the strategy for a new session.
pub fn strategy_for(
    capabilities: BackendCapabilities,
    text: &str,
    sentence_count: usize,
    rate: f32,
    timing: &HighlightTiming,
    now: Instant,
) -> Box<dyn HighlightStrategy> {
    if capabilities.position_events {
        Box::new(PreciseTracker)
    } else {
        Box::new(EstimatedTracker::new(
            text,
            sentence_count,
            rate,
            timing,
            now,
        ))
    }
}

pub struct HighlightSynchronizer {
    sentences: Arc<[Sentence]>,
    marks: Vec<SentenceMark>,
    current: Option<usize>,
    strategy: Box<dyn HighlightStrategy>,
}

impl HighlightSynchronizer {
    pub fn new(sentences: Arc<[Sentence]>, strategy: Box<dyn HighlightStrategy>) -> Self {
        let marks = vec![SentenceMark::Pending; sentences.len()];
        Self {
            sentences,
            marks,
            current: None,
            strategy,
        }
    }

    pub fn mode(&self) -> HighlightMode {
        self.strategy.mode()
    }

    pub fn is_inert(&self) -> bool {
        self.sentences.is_empty()
    }

    /// Cursor position; 0 before the first highlight.
    pub fn current_index(&self) -> usize {
        self.current.unwrap_or(0)
    }

    pub fn marks(&self) -> &[SentenceMark] {
        &self.marks
    }

    /// Speech has started: the estimate counts from `now` and the first
    /// sentence becomes active.
    pub fn begin(&mut self, now: Instant) -> Option<HighlightChange> {
        if self.current.is_some() {
            return None;
        }
        self.strategy.restart(now);
        self.advance_to(0)
    }

    pub fn on_position(&mut self, char_index: usize) -> Option<HighlightChange> {
        if self.is_inert() {
            return None;
        }
        let target = self.strategy.on_position(char_index, &self.sentences)?;
        self.advance_to(target)
    }

    pub fn on_tick(&mut self, now: Instant) -> Option<HighlightChange> {
        if self.is_inert() {
            return None;
        }
        let target = self.strategy.on_tick(now, self.sentences.len())?;
        self.advance_to(target)
    }

    pub fn pause(&mut self, now: Instant) {
        self.strategy.pause(now);
    }

    pub fn resume(&mut self, now: Instant) {
        self.strategy.resume(now);
    }

    pub fn tick_interval(&self) -> Option<Duration> {
        if self.is_inert() {
            return None;
        }
        self.strategy.tick_interval()
    }

    /// Drop every mark and rewind the cursor.
    pub fn clear(&mut self) {
        self.marks.iter_mut().for_each(|mark| *mark = SentenceMark::Pending);
        self.current = None;
    }

    fn advance_to(&mut self, target: usize) -> Option<HighlightChange> {
        if target >= self.sentences.len() {
            return None;
        }
        if let Some(current) = self.current {
            if target <= current {
                return None;
            }
        }
        for mark in &mut self.marks[..target] {
            *mark = SentenceMark::Spoken;
        }
        self.marks[target] = SentenceMark::Active;
        self.current = Some(target);
        Some(HighlightChange {
            index: target,
            fraction: (target + 1) as f64 / self.sentences.len() as f64,
        })
    }
}
