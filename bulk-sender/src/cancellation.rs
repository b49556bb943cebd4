use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Context for one send batch that can be cancelled between recipients.
#[derive(Clone, Debug)]
pub struct BatchContext {
    pub cancellation_token: CancellationToken,
    pub started_at: Instant,
}

impl BatchContext {
    pub fn new() -> Self {
        Self::with_token(CancellationToken::new())
    }

    /// Use an externally owned token, e.g. one cancelled by a Ctrl-C handler.
    pub fn with_token(cancellation_token: CancellationToken) -> Self {
        Self {
            cancellation_token,
            started_at: Instant::now(),
        }
    }

    /// Check if this batch has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Cancel this batch. Takes effect before the next recipient.
    pub fn cancel(&self) {
        if !self.is_cancelled() {
            info!("Cancelling batch after {:?}", self.elapsed());
        }
        self.cancellation_token.cancel();
    }

    /// Get elapsed time since the batch started
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

impl Default for BatchContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_seen_by_clones() {
        let context = BatchContext::new();
        let observer = context.clone();
        assert!(!observer.is_cancelled());
        context.cancel();
        context.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn test_external_token_is_shared() {
        let token = CancellationToken::new();
        let context = BatchContext::with_token(token.clone());
        token.cancel();
        assert!(context.is_cancelled());
    }
}
