//! Stream engine
//!
//! Routes stream operations to per-key [`Stream`]s held in a sharded
//! registry. Each stream sits behind its own `RwLock` and each consumer
//! group behind its own `Mutex`, so operations on different keys never
//! contend and group reads only serialize with readers of the same group
//! and with appends to the same key.

use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::id::{Clock, IdGenerator, IdSpec, StreamEntryId};
use super::streams::{Fields, GroupReadPosition, GroupStart, Stream, StreamEntry, StreamGroupInfo};
use crate::config::StreamsConfig;
use crate::error::{BrookError, Result};

fn lossy(bytes: &Bytes) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Registry of streams keyed by name
#[derive(Debug)]
pub struct StreamEngine {
    streams: DashMap<Bytes, Arc<RwLock<Stream>>>,
    ids: IdGenerator,
    default_max_len: Option<usize>,
}

impl Default for StreamEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamEngine {
    /// Create an engine with default settings and the system clock
    pub fn new() -> Self {
        Self {
            streams: DashMap::new(),
            ids: IdGenerator::default(),
            default_max_len: None,
        }
    }

    /// Create an engine from validated settings
    pub fn with_config(config: &StreamsConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            streams: DashMap::with_shard_amount(config.shard_amount),
            ids: IdGenerator::new(clock),
            default_max_len: config.default_max_len,
        })
    }

    /// Create an engine with default settings reading time from `clock`
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            streams: DashMap::new(),
            ids: IdGenerator::new(clock),
            default_max_len: None,
        }
    }

    fn stream(&self, key: &Bytes) -> Option<Arc<RwLock<Stream>>> {
        self.streams.get(key).map(|s| Arc::clone(s.value()))
    }

    fn stream_or_create(&self, key: &Bytes) -> Arc<RwLock<Stream>> {
        Arc::clone(self.streams.entry(key.clone()).or_default().value())
    }

    /// Append an entry with a generated id
    pub fn add(
        &self,
        key: &Bytes,
        fields: Fields,
        max_len: Option<usize>,
    ) -> Result<StreamEntryId> {
        self.add_with_id(key, IdSpec::Auto, fields, max_len)
    }

    /// Append an entry, trimming to `max_len` (or the configured default) afterwards
    pub fn add_with_id(
        &self,
        key: &Bytes,
        id: IdSpec,
        fields: Fields,
        max_len: Option<usize>,
    ) -> Result<StreamEntryId> {
        // Reject before the key is created so a failed add leaves no trace
        if let IdSpec::Explicit(id) = id {
            if id.is_zero() {
                return Err(BrookError::IdTooSmall);
            }
        }

        let handle = self.stream_or_create(key);
        let mut stream = handle.write();

        let new_id = match id {
            IdSpec::Auto => self.ids.next(&stream.last_id())?,
            IdSpec::Explicit(id) => id,
        };
        stream.append(new_id, fields)?;

        if let Some(max_len) = max_len.or(self.default_max_len) {
            let removed = stream.trim(max_len);
            if removed > 0 {
                trace!(key = %lossy(key), removed, max_len, "stream trimmed");
            }
        }

        trace!(key = %lossy(key), id = %new_id, "stream entry added");
        Ok(new_id)
    }

    /// Entries with an id strictly greater than `after`, oldest first.
    ///
    /// Pass [`StreamEntryId::ZERO`] to read from the beginning.
    pub fn read(
        &self,
        key: &Bytes,
        after: &StreamEntryId,
        count: Option<usize>,
    ) -> Vec<StreamEntry> {
        self.stream(key)
            .map(|handle| handle.read().read_after(after, count))
            .unwrap_or_default()
    }

    /// Entries with `start <= id <= end`; a count of zero yields nothing
    pub fn range(
        &self,
        key: &Bytes,
        start: &StreamEntryId,
        end: &StreamEntryId,
        count: Option<usize>,
    ) -> Vec<StreamEntry> {
        self.stream(key)
            .map(|handle| handle.read().range(start, end, count))
            .unwrap_or_default()
    }

    /// Number of entries currently in the stream
    pub fn len(&self, key: &Bytes) -> usize {
        self.stream(key).map(|h| h.read().len()).unwrap_or(0)
    }

    /// Last id ever assigned on the stream
    pub fn last_id(&self, key: &Bytes) -> Option<StreamEntryId> {
        self.stream(key).map(|h| h.read().last_id())
    }

    /// Whether the key has ever been written
    pub fn exists(&self, key: &Bytes) -> bool {
        self.streams.contains_key(key)
    }

    /// Trim the stream to `max_len` entries, returns the number removed
    pub fn trim(&self, key: &Bytes, max_len: usize) -> usize {
        self.stream(key)
            .map(|h| h.write().trim(max_len))
            .unwrap_or(0)
    }

    /// Register a consumer group on an existing stream
    pub fn create_group(&self, key: &Bytes, group: &Bytes, start: GroupStart) -> Result<()> {
        let handle = self
            .stream(key)
            .ok_or_else(|| BrookError::NoSuchStream(lossy(key)))?;
        let mut stream = handle.write();

        let start_id = match start {
            GroupStart::Beginning => StreamEntryId::ZERO,
            GroupStart::NewMessagesOnly => stream.last_id(),
        };
        if !stream.create_group(group.clone(), start_id) {
            return Err(BrookError::GroupAlreadyExists(lossy(group)));
        }

        debug!(
            key = %lossy(key),
            group = %lossy(group),
            start = %start_id,
            "consumer group created"
        );
        Ok(())
    }

    /// Read through a consumer group on behalf of `consumer`.
    ///
    /// With [`GroupReadPosition::NewMessages`] the group's shared cursor is
    /// read and advanced atomically, so concurrent consumers split the
    /// backlog between them.
    pub fn read_group(
        &self,
        key: &Bytes,
        group: &Bytes,
        consumer: &Bytes,
        position: GroupReadPosition,
        count: Option<usize>,
    ) -> Result<Vec<StreamEntry>> {
        let no_group = || BrookError::NoSuchGroup {
            key: lossy(key),
            group: lossy(group),
        };

        let handle = self.stream(key).ok_or_else(no_group)?;
        let stream = handle.read();
        let group_lock = stream.group(group).ok_or_else(no_group)?;
        let mut consumer_group = group_lock.lock();

        let entries = match position {
            GroupReadPosition::NewMessages => consumer_group.deliver_new(&stream, consumer, count),
            GroupReadPosition::Pending(after) => {
                consumer_group.redeliver_pending(&stream, consumer, &after, count)
            }
        };

        trace!(
            key = %lossy(key),
            group = %lossy(group),
            consumer = %lossy(consumer),
            delivered = entries.len(),
            cursor = %consumer_group.last_delivered_id,
            "group read"
        );
        Ok(entries)
    }

    /// Snapshot of a consumer group
    pub fn group_info(&self, key: &Bytes, group: &Bytes) -> Result<StreamGroupInfo> {
        let no_group = || BrookError::NoSuchGroup {
            key: lossy(key),
            group: lossy(group),
        };
        let handle = self.stream(key).ok_or_else(no_group)?;
        let stream = handle.read();
        let group_lock = stream.group(group).ok_or_else(no_group)?;
        let info = group_lock.lock().info();
        Ok(info)
    }

    /// Names of the consumer groups registered on the stream
    pub fn group_names(&self, key: &Bytes) -> Result<Vec<Bytes>> {
        let handle = self
            .stream(key)
            .ok_or_else(|| BrookError::NoSuchStream(lossy(key)))?;
        let names = handle.read().group_names();
        Ok(names)
    }
}
