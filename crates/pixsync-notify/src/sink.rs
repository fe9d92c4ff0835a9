//! Transport side of a subscription.

use crate::error::SubscriberDeliveryError;
use tokio::sync::mpsc;

/// Something a serialized frame can be handed to without waiting.
pub trait EventSink: Send + Sync {
    /// Accept the frame now or fail; never block.
    fn try_send(&self, frame: &str) -> Result<(), SubscriberDeliveryError>;
}

/// Sink feeding a bounded queue drained by the connection's writer task.
///
/// A full queue means the peer is not reading; the hub drops it instead of buffering more.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<String>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx }
    }

    /// Sink plus the receiving end for a writer task.
    pub fn bounded(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }
}

impl EventSink for ChannelSink {
    fn try_send(&self, frame: &str) -> Result<(), SubscriberDeliveryError> {
        self.tx.try_send(frame.to_string()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SubscriberDeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => SubscriberDeliveryError::Closed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_and_closed() {
        let (sink, mut rx) = ChannelSink::bounded(1);
        assert!(sink.try_send("a").is_ok());
        assert_eq!(sink.try_send("b"), Err(SubscriberDeliveryError::Full));
        assert_eq!(rx.try_recv().unwrap(), "a");

        drop(rx);
        assert_eq!(sink.try_send("c"), Err(SubscriberDeliveryError::Closed));
    }
}
