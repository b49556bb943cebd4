//! Ctrl-C handling for one run of the CLI.
//!
//! A single listener lives for the whole run. While a batch is in flight the
//! first Ctrl-C cancels it between recipients; any other Ctrl-C (a second one
//! during the same batch, or one at a prompt) ends the process.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bulk_sender::BatchContext;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Exit status of a process stopped by SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// The running batch was asked to stop.
    StopBatch,
    /// Nothing left to stop gracefully.
    Exit,
}

/// The batch Ctrl-C currently applies to, if any.
#[derive(Clone, Default)]
pub struct ActiveBatch {
    slot: Arc<Mutex<Option<CancellationToken>>>,
}

impl ActiveBatch {
    fn lock(&self) -> MutexGuard<'_, Option<CancellationToken>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a fresh token; Ctrl-C cancels it until the guard drops.
    pub fn begin(&self) -> BatchGuard<'_> {
        let token = CancellationToken::new();
        *self.lock() = Some(token.clone());
        BatchGuard { owner: self, token }
    }

    pub fn interrupt(&self) -> Interrupt {
        match self.lock().as_ref() {
            Some(token) if !token.is_cancelled() => {
                token.cancel();
                Interrupt::StopBatch
            }
            _ => Interrupt::Exit,
        }
    }
}

pub struct BatchGuard<'a> {
    owner: &'a ActiveBatch,
    token: CancellationToken,
}

impl BatchGuard<'_> {
    pub fn context(&self) -> BatchContext {
        BatchContext::with_token(self.token.clone())
    }
}

impl Drop for BatchGuard<'_> {
    fn drop(&mut self) {
        *self.owner.lock() = None;
    }
}

/// Owns the Ctrl-C listener; dropping it stops listening.
pub struct Interrupts {
    active: ActiveBatch,
    listener: JoinHandle<()>,
}

impl Interrupts {
    /// Must be called from within the tokio runtime.
    pub fn install() -> Self {
        let active = ActiveBatch::default();
        let watched = active.clone();
        let listener = tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                match watched.interrupt() {
                    Interrupt::StopBatch => {
                        println!("\nStopping after the current message... (Ctrl-C again to quit)");
                    }
                    Interrupt::Exit => {
                        println!();
                        std::process::exit(INTERRUPTED_EXIT_CODE);
                    }
                }
            }
        });
        Self { active, listener }
    }

    pub fn batch(&self) -> BatchGuard<'_> {
        self.active.begin()
    }
}

impl Drop for Interrupts {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interrupt_without_batch_exits() {
        let active = ActiveBatch::default();
        assert_eq!(active.interrupt(), Interrupt::Exit);
    }

    #[test]
    fn test_first_interrupt_stops_batch_second_exits() {
        let active = ActiveBatch::default();
        let batch = active.begin();
        let context = batch.context();

        assert_eq!(active.interrupt(), Interrupt::StopBatch);
        assert!(context.is_cancelled());
        assert_eq!(active.interrupt(), Interrupt::Exit);
    }

    #[test]
    fn test_finished_batch_no_longer_catches_interrupts() {
        let active = ActiveBatch::default();
        let context = {
            let batch = active.begin();
            batch.context()
        };

        assert_eq!(active.interrupt(), Interrupt::Exit);
        assert!(!context.is_cancelled());
    }

    #[test]
    fn test_each_batch_gets_a_fresh_token() {
        let active = ActiveBatch::default();
        {
            let _first = active.begin();
            active.interrupt();
        }
        let second = active.begin();
        assert!(!second.context().is_cancelled());
        assert_eq!(active.interrupt(), Interrupt::StopBatch);
    }
}
