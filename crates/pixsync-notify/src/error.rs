//! Delivery errors reported by an [`EventSink`](crate::EventSink).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriberDeliveryError {
    #[error("Subscriber is not keeping up")]
    Full,

    #[error("Subscriber connection closed")]
    Closed,

    #[error("Transport error: {0}")]
    Transport(String),
}
