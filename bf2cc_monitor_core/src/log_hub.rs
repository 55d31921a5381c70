use std::sync::Arc;

use tokio::sync::broadcast;

pub const DEFAULT_CAPACITY: usize = 256;

/// Fans announcements out to anyone listening. Lines sent while nobody is
/// subscribed are dropped, and slow subscribers lose the oldest lines.
#[derive(Debug, Clone)]
pub struct LogHub {
    tx: broadcast::Sender<Arc<str>>,
}

impl LogHub {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn log(&self, line: impl Into<Arc<str>>) {
        // Err only means there are no subscribers
        let _ = self.tx.send(line.into());
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<str>> {
        self.tx.subscribe()
    }
}

impl Default for LogHub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
