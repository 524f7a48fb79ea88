//! Ordered event delivery to a single consumer.
//!
//! The debate driver owns an [`EventSink`]; the consumer holds the matching
//! receiver. Dropping the receiver is how a consumer cancels the debate:
//! the next `emit` fails and the driver stops issuing collaborator calls.

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::debug;

use super::types::{DebateEvent, EventEnvelope};

/// Default channel capacity.
pub const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("event consumer went away")]
pub struct SinkClosed;

/// Sending half: stamps sequence numbers and timestamps.
#[derive(Debug)]
pub struct EventSink {
    sender: mpsc::Sender<EventEnvelope>,
    next_sequence: u64,
}

impl EventSink {
    pub fn new(sender: mpsc::Sender<EventEnvelope>) -> Self {
        Self {
            sender,
            next_sequence: 0,
        }
    }

    /// Create a connected sink/receiver pair.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<EventEnvelope>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Sequence number the next event will carry.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Deliver `event`, waiting for channel capacity.
    pub async fn emit(&mut self, event: DebateEvent) -> Result<EventEnvelope, SinkClosed> {
        let envelope = EventEnvelope {
            sequence: self.next_sequence,
            timestamp: Utc::now(),
            event,
        };
        debug!(
            sequence = envelope.sequence,
            event_type = envelope.event.event_type(),
            "emitting event"
        );
        self.sender
            .send(envelope.clone())
            .await
            .map_err(|_| SinkClosed)?;
        self.next_sequence += 1;
        Ok(envelope)
    }
}

/// Drain a receiver until the sink side is dropped.
pub async fn collect(mut receiver: mpsc::Receiver<EventEnvelope>) -> Vec<EventEnvelope> {
    let mut events = Vec::new();
    while let Some(envelope) = receiver.recv().await {
        events.push(envelope);
    }
    events
}
