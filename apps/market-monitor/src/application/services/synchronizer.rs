//! Round Synchronizer
//!
//! Lock-step alignment of N scheduler outputs. A round is emitted only once
//! every source has delivered its batch; the slowest source paces all of
//! them and a stalled source stalls the synchronizer.

use tokio::sync::mpsc;

use crate::domain::sampling::{SourceBatch, SyncRound};

/// Assembles one batch per source into numbered rounds.
#[derive(Debug)]
pub struct RoundSynchronizer {
    receivers: Vec<mpsc::UnboundedReceiver<SourceBatch>>,
    pending: Vec<Option<SourceBatch>>,
    round: u64,
}

impl RoundSynchronizer {
    /// Create a synchronizer over receivers in registration order.
    #[must_use]
    pub fn new(receivers: Vec<mpsc::UnboundedReceiver<SourceBatch>>) -> Self {
        let pending = receivers.iter().map(|_| None).collect();
        Self {
            receivers,
            pending,
            round: 0,
        }
    }

    /// Number of sources.
    #[must_use]
    pub fn sources(&self) -> usize {
        self.receivers.len()
    }

    /// Rounds emitted so far.
    #[must_use]
    pub const fn rounds(&self) -> u64 {
        self.round
    }

    /// Wait for the next complete round.
    ///
    /// Returns `None` once any source's channel closes; a partially
    /// collected round is discarded. Cancel-safe: batches already received
    /// stay buffered for the next call.
    pub async fn next_round(&mut self) -> Option<SyncRound> {
        if self.receivers.is_empty() {
            return None;
        }

        for (rx, slot) in self.receivers.iter_mut().zip(self.pending.iter_mut()) {
            if slot.is_none() {
                *slot = Some(rx.recv().await?);
            }
        }

        let batches = self
            .pending
            .iter_mut()
            .map(Option::take)
            .collect::<Option<Vec<_>>>()?;

        self.round += 1;
        Some(SyncRound {
            round: self.round,
            batches,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn batch(source: &str) -> SourceBatch {
        SourceBatch::new(source)
    }

    #[tokio::test]
    async fn emits_only_complete_rounds_in_order() {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel();
        let mut sync = RoundSynchronizer::new(vec![rx_a, rx_b]);

        tx_a.send(batch("a")).unwrap();
        tx_a.send(batch("a")).unwrap();
        tx_b.send(batch("b")).unwrap();

        let first = sync.next_round().await.unwrap();
        assert_eq!(first.round, 1);
        assert_eq!(
            first.batches.iter().map(|b| b.source.as_str()).collect::<Vec<_>>(),
            vec!["a", "b"]
        );

        // Second "a" batch is queued but "b" has not produced yet.
        let stalled = tokio::time::timeout(Duration::from_millis(50), sync.next_round()).await;
        assert!(stalled.is_err());

        tx_b.send(batch("b")).unwrap();
        let second = sync.next_round().await.unwrap();
        assert_eq!(second.round, 2);
        assert_eq!(sync.rounds(), 2);
    }

    #[tokio::test]
    async fn closed_source_ends_synchronizer() {
        let (tx_a, rx_a) = mpsc::unbounded_channel();
        let (tx_b, rx_b) = mpsc::unbounded_channel::<SourceBatch>();
        let mut sync = RoundSynchronizer::new(vec![rx_a, rx_b]);

        tx_a.send(batch("a")).unwrap();
        drop(tx_b);

        assert!(sync.next_round().await.is_none());
    }

    #[tokio::test]
    async fn no_sources_yields_nothing() {
        let mut sync = RoundSynchronizer::new(Vec::new());
        assert_eq!(sync.sources(), 0);
        assert!(sync.next_round().await.is_none());
    }
}
