//! Shared runtime components

/// Pub/Sub subscription management
pub mod subscription;

pub use subscription::{
    MessageReceiver, PubSubMessage, SharedSubscriptionManager, Subscription, SubscriptionId,
    SubscriptionManager,
};
