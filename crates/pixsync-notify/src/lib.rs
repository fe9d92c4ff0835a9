//! Pixsync Notify - Fan-out of index changes to live subscribers.
//!
//! The hub only carries deltas from the moment a subscriber registers;
//! clients pull current state from the index separately.

mod error;
mod frame;
mod hub;
mod relay;
mod sink;

pub use error::SubscriberDeliveryError;
pub use frame::EventFrame;
pub use hub::{Delivery, Notifier, SubscriptionId};
pub use relay::spawn_relay;
pub use sink::{ChannelSink, EventSink};
