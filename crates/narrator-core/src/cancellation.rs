use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation cancelled at stage={stage}")]
pub struct Cancelled {
    pub stage: &'static str,
}

/// Shared stop flag for extraction loops and backend worker threads.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn check_cancelled(&self, stage: &'static str) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            return Err(Cancelled { stage });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let token = CancellationToken::new();
        let worker = token.clone();
        assert!(worker.check_cancelled("start").is_ok());
        token.cancel();
        assert_eq!(
            worker.check_cancelled("page"),
            Err(Cancelled { stage: "page" })
        );
    }
}
