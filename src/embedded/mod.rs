//! Embedded Brook -- use the stream log and pub/sub broker in-process.
//!
//! This module provides a high-level, ergonomic API that bundles a
//! [`StreamEngine`] and a [`SubscriptionManager`] with their
//! configuration. All operations are direct function calls.
//!
//! # Quick Start
//!
//! ```rust
//! use brook::embedded::Brook;
//! use brook::storage::{GroupReadPosition, GroupStart, StreamEntryId};
//!
//! # fn main() -> brook::Result<()> {
//! let brook = Brook::builder().default_max_len(1000).build()?;
//!
//! let id = brook.xadd("orders", [("sku", "42")], None)?;
//! let entries = brook.xread("orders", StreamEntryId::ZERO, None);
//! assert_eq!(entries[0].id, id);
//!
//! brook.xgroup_create("orders", "billing", GroupStart::Beginning)?;
//! let position = GroupReadPosition::NewMessages;
//! let batch = brook.xreadgroup("orders", "billing", "worker-1", position, Some(10))?;
//! assert_eq!(batch.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! [`Brook`] is `Send + Sync` and can be shared across threads via
//! `Arc<Brook>`. Streams are locked per key and consumer groups per group,
//! so callers working on different keys never contend.

mod builder;

pub use builder::BrookBuilder;

use std::path::Path;

use brook_core::config::Config;
use brook_core::runtime::{MessageReceiver, PubSubMessage, Subscription, SubscriptionManager};
use brook_core::storage::{
    Fields, GroupReadPosition, GroupStart, IdSpec, StreamEngine, StreamEntry, StreamEntryId,
    StreamGroupInfo,
};
use brook_core::Result;
use bytes::Bytes;

/// A high-level embedded Brook instance.
///
/// Create instances via [`Brook::builder()`], [`Brook::open()`] or
/// [`Brook::with_config()`].
#[derive(Debug)]
pub struct Brook {
    streams: StreamEngine,
    pubsub: SubscriptionManager,
    config: Config,
}

impl Brook {
    /// Create a [`BrookBuilder`] for configuring a new instance.
    pub fn builder() -> BrookBuilder {
        BrookBuilder::default()
    }

    /// Create an instance from a TOML configuration file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::from_file(path.as_ref())?;
        Self::with_config(config)
    }

    /// Create an instance from an already loaded configuration.
    pub fn with_config(config: Config) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub(crate) fn from_parts(
        streams: StreamEngine,
        pubsub: SubscriptionManager,
        config: Config,
    ) -> Self {
        Self {
            streams,
            pubsub,
            config,
        }
    }

    /// The configuration this instance was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The underlying stream engine.
    pub fn streams(&self) -> &StreamEngine {
        &self.streams
    }

    /// The underlying pub/sub broker.
    pub fn pubsub(&self) -> &SubscriptionManager {
        &self.pubsub
    }

    #[inline]
    fn kb(&self, key: impl AsRef<[u8]>) -> Bytes {
        Bytes::copy_from_slice(key.as_ref())
    }

    fn fields<I, F, V>(fields: I) -> Fields
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<Bytes>,
        V: Into<Bytes>,
    {
        fields
            .into_iter()
            .map(|(f, v)| (f.into(), v.into()))
            .collect()
    }

    // ====================================================================
    // Stream operations
    // ====================================================================

    /// Append an entry with a generated id, trimming to `max_len` if given.
    pub fn xadd<I, F, V>(
        &self,
        key: impl AsRef<[u8]>,
        fields: I,
        max_len: Option<usize>,
    ) -> Result<StreamEntryId>
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<Bytes>,
        V: Into<Bytes>,
    {
        self.streams
            .add(&self.kb(key), Self::fields(fields), max_len)
    }

    /// Append an entry with an explicit or generated id.
    pub fn xadd_with_id<I, F, V>(
        &self,
        key: impl AsRef<[u8]>,
        id: IdSpec,
        fields: I,
        max_len: Option<usize>,
    ) -> Result<StreamEntryId>
    where
        I: IntoIterator<Item = (F, V)>,
        F: Into<Bytes>,
        V: Into<Bytes>,
    {
        self.streams
            .add_with_id(&self.kb(key), id, Self::fields(fields), max_len)
    }

    /// Entries with an id above `after`; [`StreamEntryId::ZERO`] reads from the start.
    pub fn xread(
        &self,
        key: impl AsRef<[u8]>,
        after: StreamEntryId,
        count: Option<usize>,
    ) -> Vec<StreamEntry> {
        self.streams.read(&self.kb(key), &after, count)
    }

    /// Entries with `start <= id <= end`.
    pub fn xrange(
        &self,
        key: impl AsRef<[u8]>,
        start: StreamEntryId,
        end: StreamEntryId,
        count: Option<usize>,
    ) -> Vec<StreamEntry> {
        self.streams.range(&self.kb(key), &start, &end, count)
    }

    /// Number of entries in the stream (0 if it does not exist).
    pub fn xlen(&self, key: impl AsRef<[u8]>) -> usize {
        self.streams.len(&self.kb(key))
    }

    /// Trim the stream to at most `max_len` entries.
    pub fn xtrim(&self, key: impl AsRef<[u8]>, max_len: usize) -> usize {
        self.streams.trim(&self.kb(key), max_len)
    }

    /// Create a consumer group on an existing stream.
    pub fn xgroup_create(
        &self,
        key: impl AsRef<[u8]>,
        group: impl AsRef<[u8]>,
        start: GroupStart,
    ) -> Result<()> {
        self.streams
            .create_group(&self.kb(key), &self.kb(group), start)
    }

    /// Read through a consumer group.
    pub fn xreadgroup(
        &self,
        key: impl AsRef<[u8]>,
        group: impl AsRef<[u8]>,
        consumer: impl AsRef<[u8]>,
        position: GroupReadPosition,
        count: Option<usize>,
    ) -> Result<Vec<StreamEntry>> {
        self.streams.read_group(
            &self.kb(key),
            &self.kb(group),
            &self.kb(consumer),
            position,
            count,
        )
    }

    /// Snapshot of a consumer group.
    pub fn xinfo_group(
        &self,
        key: impl AsRef<[u8]>,
        group: impl AsRef<[u8]>,
    ) -> Result<StreamGroupInfo> {
        self.streams.group_info(&self.kb(key), &self.kb(group))
    }

    // ====================================================================
    // Pub/Sub operations
    // ====================================================================

    /// Subscribe with a handler invoked on a dedicated worker thread.
    pub fn subscribe<F>(&self, channel: impl AsRef<[u8]>, handler: F) -> Result<Subscription>
    where
        F: FnMut(PubSubMessage) + Send + 'static,
    {
        self.pubsub.subscribe(&self.kb(channel), handler)
    }

    /// Subscribe and drain messages yourself.
    pub fn subscribe_queue(&self, channel: impl AsRef<[u8]>) -> (Subscription, MessageReceiver) {
        self.pubsub.subscribe_queue(&self.kb(channel))
    }

    /// Remove a subscription. Unknown or already removed subscriptions are ignored.
    pub fn unsubscribe(&self, subscription: &Subscription) -> bool {
        self.pubsub.unsubscribe(subscription)
    }

    /// Publish a message, returns the number of subscriptions it was queued for.
    pub fn publish(&self, channel: impl AsRef<[u8]>, message: impl Into<Bytes>) -> usize {
        self.pubsub.publish(&self.kb(channel), &message.into())
    }

    /// Number of live subscriptions on a channel.
    pub fn numsub(&self, channel: impl AsRef<[u8]>) -> usize {
        self.pubsub.numsub(&self.kb(channel))
    }

    /// Channels with at least one subscription.
    pub fn channels(&self) -> Vec<Bytes> {
        self.pubsub.channels()
    }
}

impl Default for Brook {
    fn default() -> Self {
        Self::from_parts(
            StreamEngine::new(),
            SubscriptionManager::new(),
            Config::default(),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use brook_core::storage::ManualClock;
    use brook_core::BrookError;
    use std::sync::Arc;

    fn brook() -> Brook {
        Brook::builder()
            .clock(Arc::new(ManualClock::new(1_000)))
            .build()
            .expect("failed to create embedded brook")
    }

    #[test]
    fn test_default_instance() {
        let b = Brook::default();
        assert_eq!(b.config(), &Config::default());
        assert_eq!(b.xlen("nothing"), 0);
    }

    #[test]
    fn test_xadd_xread() {
        let b = brook();
        let id1 = b.xadd("s", [("field1", "value1")], None).unwrap();
        let id2 = b
            .xadd("s", vec![("field2".to_string(), "value2".to_string())], None)
            .unwrap();

        let entries = b.xread("s", StreamEntryId::ZERO, None);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].id, id1);
        assert_eq!(
            entries[0].fields,
            vec![(Bytes::from("field1"), Bytes::from("value1"))]
        );
        assert_eq!(entries[1].id, id2);
        assert_eq!(b.xlen("s"), 2);
    }

    #[test]
    fn test_fields_keep_order_and_duplicates() {
        let b = brook();
        b.xadd("s", [("a", "1"), ("b", "2"), ("a", "3")], None)
            .unwrap();
        let entries = b.xread("s", StreamEntryId::ZERO, None);
        let names: Vec<&[u8]> = entries[0].fields.iter().map(|(f, _)| f.as_ref()).collect();
        assert_eq!(names, vec![&b"a"[..], &b"b"[..], &b"a"[..]]);
    }

    #[test]
    fn test_xadd_with_id() {
        let b = brook();
        let id = StreamEntryId::new(10, 1);
        assert_eq!(
            b.xadd_with_id("s", IdSpec::Explicit(id), [("f", "v")], None)
                .unwrap(),
            id
        );
        let err = b
            .xadd_with_id("s", IdSpec::Explicit(StreamEntryId::new(10, 0)), [("f", "v")], None)
            .unwrap_err();
        assert!(matches!(err, BrookError::IdTooSmall));

        let next = b.xadd_with_id("s", IdSpec::Auto, [("f", "v")], None).unwrap();
        assert!(next > id);
    }

    #[test]
    fn test_xrange_and_xtrim() {
        let b = brook();
        for i in 0..4 {
            b.xadd("s", [("i", i.to_string())], None).unwrap();
        }
        assert_eq!(
            b.xrange("s", StreamEntryId::ZERO, StreamEntryId::MAX, Some(3))
                .len(),
            3
        );
        assert_eq!(b.xtrim("s", 1), 3);
        assert_eq!(b.xlen("s"), 1);
    }

    #[test]
    fn test_group_flow() {
        let b = brook();
        assert!(matches!(
            b.xgroup_create("s", "g", GroupStart::Beginning),
            Err(BrookError::NoSuchStream(_))
        ));
        for i in 0..3 {
            b.xadd("s", [("i", i.to_string())], None).unwrap();
        }
        b.xgroup_create("s", "g", GroupStart::Beginning).unwrap();

        let first = b
            .xreadgroup("s", "g", "a", GroupReadPosition::NewMessages, Some(1))
            .unwrap();
        let rest = b
            .xreadgroup("s", "g", "b", GroupReadPosition::NewMessages, None)
            .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(rest.len(), 2);

        let info = b.xinfo_group("s", "g").unwrap();
        assert_eq!(info.last_delivered_id, rest[1].id);
        assert_eq!(info.pending, 3);
    }

    #[test]
    fn test_pubsub_queue() {
        let b = brook();
        let (sub, mut rx) = b.subscribe_queue("news");
        assert_eq!(b.numsub("news"), 1);
        assert_eq!(b.channels(), vec![Bytes::from("news")]);
        assert_eq!(b.publish("news", "hello"), 1);
        assert_eq!(rx.try_recv().unwrap().message, Bytes::from("hello"));

        assert!(b.unsubscribe(&sub));
        assert!(!b.unsubscribe(&sub));
        assert_eq!(b.publish("news", "again"), 0);
    }
}
