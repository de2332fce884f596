//! Pub/Sub subscription management
//!
//! Every subscription owns an unbounded queue. `publish` snapshots the live
//! subscriptions of a channel and enqueues the message to each of them;
//! delivery happens on the consumer side, either through a
//! [`MessageReceiver`] drained by the caller or through a dedicated worker
//! thread that invokes a handler.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::config::PubSubConfig;
use crate::error::Result;

/// A message published to a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubSubMessage {
    /// The channel the message was published to
    pub channel: Bytes,
    /// The message content
    pub message: Bytes,
}

/// Identifier of a single subscription, unique per manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Raw numeric value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

/// Sending half kept by the manager
#[derive(Debug, Clone)]
struct Subscriber {
    tx: mpsc::UnboundedSender<PubSubMessage>,
    active: Arc<AtomicBool>,
}

impl Subscriber {
    /// Still registered and its receiver (or worker) is alive
    fn is_live(&self) -> bool {
        self.active.load(Ordering::Acquire) && !self.tx.is_closed()
    }
}

/// Handle to a registration, used to unsubscribe
#[derive(Debug, Clone)]
pub struct Subscription {
    id: SubscriptionId,
    channel: Bytes,
    active: Arc<AtomicBool>,
}

impl Subscription {
    /// Subscription id
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Channel this subscription listens on
    pub fn channel(&self) -> &Bytes {
        &self.channel
    }

    /// False once the subscription has been removed
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Receiving half of a queue-mode subscription.
///
/// Messages still queued when the subscription is removed are discarded.
#[derive(Debug)]
pub struct MessageReceiver {
    rx: mpsc::UnboundedReceiver<PubSubMessage>,
    active: Arc<AtomicBool>,
}

impl MessageReceiver {
    fn accept(&self, msg: PubSubMessage) -> Option<PubSubMessage> {
        self.active.load(Ordering::Acquire).then_some(msg)
    }

    /// Wait for the next message; `None` once unsubscribed
    pub async fn recv(&mut self) -> Option<PubSubMessage> {
        let msg = self.rx.recv().await?;
        self.accept(msg)
    }

    /// Next message if one is already queued
    pub fn try_recv(&mut self) -> Option<PubSubMessage> {
        let msg = self.rx.try_recv().ok()?;
        self.accept(msg)
    }

    /// Block the current thread until a message arrives.
    ///
    /// Must not be called from within an async runtime.
    pub fn blocking_recv(&mut self) -> Option<PubSubMessage> {
        let msg = self.rx.blocking_recv()?;
        self.accept(msg)
    }
}

/// Manages pub/sub subscriptions and message delivery
#[derive(Debug)]
pub struct SubscriptionManager {
    /// Channel subscriptions: channel -> live subscribers
    channels: DashMap<Bytes, HashMap<SubscriptionId, Subscriber>>,
    next_id: AtomicU64,
    worker_thread_name: String,
}

impl SubscriptionManager {
    /// Create a new subscription manager
    pub fn new() -> Self {
        Self {
            channels: DashMap::new(),
            next_id: AtomicU64::new(1),
            worker_thread_name: PubSubConfig::default().worker_thread_name,
        }
    }

    /// Create a subscription manager from validated settings
    pub fn with_config(config: &PubSubConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            channels: DashMap::with_shard_amount(config.shard_amount),
            next_id: AtomicU64::new(1),
            worker_thread_name: config.worker_thread_name.clone(),
        })
    }

    /// Subscribe to a channel, returns a receiver for messages
    pub fn subscribe_queue(&self, channel: &Bytes) -> (Subscription, MessageReceiver) {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::unbounded_channel();
        let active = Arc::new(AtomicBool::new(true));

        self.channels.entry(channel.clone()).or_default().insert(
            id,
            Subscriber {
                tx,
                active: Arc::clone(&active),
            },
        );
        trace!(channel = %String::from_utf8_lossy(channel), id = id.0, "subscribed");

        let subscription = Subscription {
            id,
            channel: channel.clone(),
            active: Arc::clone(&active),
        };
        (subscription, MessageReceiver { rx, active })
    }

    /// Subscribe to a channel with a handler run on a dedicated worker thread.
    ///
    /// Messages reach the handler in publish order. The worker exits once the
    /// subscription is removed or the manager is dropped.
    pub fn subscribe<F>(&self, channel: &Bytes, mut handler: F) -> Result<Subscription>
    where
        F: FnMut(PubSubMessage) + Send + 'static,
    {
        let (subscription, mut receiver) = self.subscribe_queue(channel);
        let name = format!("{}-{}", self.worker_thread_name, subscription.id.0);
        let id = subscription.id.0;

        let spawned = std::thread::Builder::new().name(name).spawn(move || {
            debug!(id, "subscription worker started");
            while let Some(msg) = receiver.blocking_recv() {
                handler(msg);
            }
            debug!(id, "subscription worker stopped");
        });

        if let Err(e) = spawned {
            self.unsubscribe(&subscription);
            return Err(e.into());
        }
        Ok(subscription)
    }

    /// Remove a subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        subscription.active.store(false, Ordering::Release);

        let removed = match self.channels.get_mut(&subscription.channel) {
            Some(mut subscribers) => subscribers.remove(&subscription.id).is_some(),
            None => false,
        };
        self.channels
            .remove_if(&subscription.channel, |_, subscribers| subscribers.is_empty());

        if removed {
            trace!(
                channel = %String::from_utf8_lossy(&subscription.channel),
                id = subscription.id.0,
                "unsubscribed"
            );
        }
        removed
    }

    /// Publish a message to a channel, returns number of receivers
    pub fn publish(&self, channel: &Bytes, message: &Bytes) -> usize {
        // Snapshot under the shard lock, send outside it
        let targets: Vec<Subscriber> = match self.channels.get(channel) {
            Some(subscribers) => subscribers.values().cloned().collect(),
            None => return 0,
        };

        let msg = PubSubMessage {
            channel: channel.clone(),
            message: message.clone(),
        };
        let mut closed = false;
        let receivers = targets
            .iter()
            .filter(|s| {
                if !s.active.load(Ordering::Acquire) {
                    return false;
                }
                let sent = s.tx.send(msg.clone()).is_ok();
                closed |= !sent;
                sent
            })
            .count();

        if closed {
            self.prune_closed(channel);
        }

        trace!(channel = %String::from_utf8_lossy(channel), receivers, "published");
        receivers
    }

    /// Drop subscribers whose receiver was dropped or whose worker died
    fn prune_closed(&self, channel: &Bytes) {
        if let Some(mut subscribers) = self.channels.get_mut(channel) {
            subscribers.retain(|id, s| {
                if !s.tx.is_closed() {
                    return true;
                }
                s.active.store(false, Ordering::Release);
                debug!(
                    channel = %String::from_utf8_lossy(channel),
                    id = id.0,
                    "removed closed subscription"
                );
                false
            });
        }
        self.channels
            .remove_if(channel, |_, subscribers| subscribers.is_empty());
    }

    /// Get the number of subscribers to a channel
    pub fn numsub(&self, channel: &Bytes) -> usize {
        self.channels
            .get(channel)
            .map(|subscribers| subscribers.values().filter(|s| s.is_live()).count())
            .unwrap_or(0)
    }

    /// Get all active channels (those with at least one subscriber), sorted
    pub fn channels(&self) -> Vec<Bytes> {
        let mut channels: Vec<Bytes> = self
            .channels
            .iter()
            .filter(|entry| entry.value().values().any(Subscriber::is_live))
            .map(|entry| entry.key().clone())
            .collect();
        channels.sort();
        channels
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe subscription manager handle
pub type SharedSubscriptionManager = Arc<SubscriptionManager>;
