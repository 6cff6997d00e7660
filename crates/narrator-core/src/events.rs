//! Caller-facing notifications and the observer list that delivers them.
//!
//! Listeners are invoked synchronously, in subscription order, for every
//! event in the order it was emitted.

use crate::playback::PlaybackState;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlaybackEvent {
    HighlightChanged { sentence_index: usize },
    StateChanged { state: PlaybackState },
    Progress { message: String, percent: Option<f64> },
    Error { message: String },
}

pub trait PlaybackListener {
    fn on_event(&mut self, event: &PlaybackEvent);
}

impl<F> PlaybackListener for F
where
    F: FnMut(&PlaybackEvent),
{
    fn on_event(&mut self, event: &PlaybackEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
pub struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, Box<dyn PlaybackListener>)>,
}

impl Listeners {
    pub fn subscribe(&mut self, listener: Box<dyn PlaybackListener>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.entries.push((id, listener));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry_id, _)| *entry_id != id);
        self.entries.len() != before
    }

    pub fn emit(&mut self, event: PlaybackEvent) {
        for (_, listener) in self.entries.iter_mut() {
            listener.on_event(&event);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
