//! Latest-request-wins sequencing for route requests
//!
//! Every request takes a `Ticket`. Issuing a new ticket cancels the previous
//! one, so an answer that arrives after a newer request was made is dropped
//! instead of overwriting the newer answer.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Current {
    generation: u64,
    token: Option<CancellationToken>,
}

#[derive(Clone, Default)]
pub struct RequestSequencer {
    current: Arc<Mutex<Current>>,
}

/// Proof of which request a response belongs to
#[derive(Debug, Clone)]
pub struct Ticket {
    generation: u64,
    token: CancellationToken,
}

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Resolves once a newer request has been issued
    pub async fn superseded(&self) {
        self.token.cancelled().await
    }

    pub fn is_superseded(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request, cancelling whichever one was in flight
    pub fn issue(&self) -> Ticket {
        let mut current = self.current.lock();
        if let Some(previous) = current.token.take() {
            previous.cancel();
        }
        current.generation += 1;
        let token = CancellationToken::new();
        current.token = Some(token.clone());
        Ticket {
            generation: current.generation,
            token,
        }
    }

    pub fn is_current(&self, ticket: &Ticket) -> bool {
        self.current.lock().generation == ticket.generation && !ticket.is_superseded()
    }

    /// Cancel the in-flight request without starting a new one
    pub fn cancel_all(&self) {
        let mut current = self.current.lock();
        if let Some(token) = current.token.take() {
            token.cancel();
        }
        current.generation += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ticket_is_current() {
        let sequencer = RequestSequencer::new();
        let ticket = sequencer.issue();
        assert!(sequencer.is_current(&ticket));
        assert!(!ticket.is_superseded());
    }

    #[test]
    fn test_newer_ticket_supersedes_older() {
        let sequencer = RequestSequencer::new();
        let first = sequencer.issue();
        let second = sequencer.issue();

        assert!(!sequencer.is_current(&first));
        assert!(first.is_superseded());
        assert!(sequencer.is_current(&second));
        assert!(second.generation() > first.generation());
    }

    #[test]
    fn test_cancel_all_invalidates_current() {
        let sequencer = RequestSequencer::new();
        let ticket = sequencer.issue();
        sequencer.cancel_all();
        assert!(!sequencer.is_current(&ticket));
    }

    #[tokio::test]
    async fn test_superseded_future_resolves_on_new_issue() {
        let sequencer = RequestSequencer::new();
        let ticket = sequencer.issue();

        let waiter = tokio::spawn(async move { ticket.superseded().await });
        sequencer.issue();

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("superseded() should resolve")
            .unwrap();
    }
}
