// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered fan-out of committed changes to joined sessions

use lg_core::{Change, SequencedChange};
use tokio::sync::mpsc;

/// Sender half of a subscriber queue
pub type ChangeSender = mpsc::UnboundedSender<SequencedChange>;
/// Receiver half of a subscriber queue
pub type ChangeReceiver = mpsc::UnboundedReceiver<SequencedChange>;

/// Assigns sequence numbers and delivers every change to every subscriber
///
/// Owned by the coordinator actor, so publishing happens in commit order.
/// Each subscriber has its own unbounded FIFO; a slow session never blocks
/// the actor or other sessions.
#[derive(Default)]
pub struct Broadcast {
    seq: u64,
    subscribers: Vec<ChangeSender>,
}

impl Broadcast {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence number of the last published change
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Add a subscriber; it receives changes published from now on
    pub fn subscribe(&mut self, tx: ChangeSender) {
        self.subscribers.push(tx);
    }

    /// Stamp a change and push it to every live subscriber
    pub fn publish(&mut self, change: Change) -> SequencedChange {
        self.seq += 1;
        let sequenced = SequencedChange {
            seq: self.seq,
            change,
        };
        self.subscribers
            .retain(|tx| tx.send(sequenced.clone()).is_ok());
        sequenced
    }

    /// Get count of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
