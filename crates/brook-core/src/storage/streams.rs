//! Stream data structures

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use super::id::StreamEntryId;
use crate::error::{BrookError, Result};

/// Field-value pairs of an entry, in insertion order
pub type Fields = Vec<(Bytes, Bytes)>;

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// `None` and `Some(0)` both mean "no limit" for forward reads
fn effective_count(count: Option<usize>) -> usize {
    count.filter(|c| *c > 0).unwrap_or(usize::MAX)
}

/// A stream entry containing field-value pairs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEntry {
    /// The entry ID
    pub id: StreamEntryId,
    /// Field-value pairs
    pub fields: Fields,
}

/// A pending entry in a consumer group (PEL - Pending Entries List)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPendingEntry {
    /// The message ID
    pub id: StreamEntryId,
    /// Consumer that owns this pending entry
    pub consumer: Bytes,
    /// Time when the message was last delivered (milliseconds since Unix epoch)
    pub delivery_time: u64,
    /// Number of times this message was delivered
    pub delivery_count: u64,
}

/// A consumer in a consumer group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConsumer {
    /// Consumer name
    pub name: Bytes,
    /// Pending entries for this consumer, ordered by id
    pub pending: BTreeSet<StreamEntryId>,
    /// Last time this consumer was seen (milliseconds since Unix epoch)
    pub seen_time: u64,
}

impl StreamConsumer {
    /// Create a new consumer
    pub fn new(name: Bytes) -> Self {
        Self {
            name,
            pending: BTreeSet::new(),
            seen_time: now_ms(),
        }
    }
}

/// Where a new consumer group starts reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupStart {
    /// Deliver every entry currently in the stream (`0`)
    Beginning,
    /// Deliver only entries appended after the group is created (`$`)
    NewMessagesOnly,
}

/// Which entries a group read returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupReadPosition {
    /// Entries never delivered to any consumer of the group (`>`)
    NewMessages,
    /// The calling consumer's own pending entries with an id above the given one
    Pending(StreamEntryId),
}

/// A consumer group for a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConsumerGroup {
    /// Group name
    pub name: Bytes,
    /// Last delivered ID shared by every consumer of the group
    pub last_delivered_id: StreamEntryId,
    /// Pending entries list (PEL) - maps message ID to pending entry info
    pub pending: BTreeMap<StreamEntryId, StreamPendingEntry>,
    /// Consumers in this group
    pub consumers: HashMap<Bytes, StreamConsumer>,
    /// Number of entries handed out by the group
    pub entries_read: u64,
}

impl StreamConsumerGroup {
    /// Create a new consumer group
    pub fn new(name: Bytes, last_delivered_id: StreamEntryId) -> Self {
        Self {
            name,
            last_delivered_id,
            pending: BTreeMap::new(),
            consumers: HashMap::new(),
            entries_read: 0,
        }
    }

    /// Get or create a consumer
    pub fn get_or_create_consumer(&mut self, consumer_name: &Bytes) -> &mut StreamConsumer {
        self.consumers
            .entry(consumer_name.clone())
            .or_insert_with(|| StreamConsumer::new(consumer_name.clone()))
    }

    /// Record `id` as delivered to `consumer_name`
    pub fn add_pending(&mut self, id: StreamEntryId, consumer_name: &Bytes, now: u64) {
        let pending_entry = self
            .pending
            .entry(id)
            .or_insert_with(|| StreamPendingEntry {
                id,
                consumer: consumer_name.clone(),
                delivery_time: now,
                delivery_count: 0,
            });
        pending_entry.delivery_time = now;
        pending_entry.delivery_count += 1;

        let consumer = self.get_or_create_consumer(consumer_name);
        consumer.pending.insert(id);
        consumer.seen_time = now;
    }

    /// Hand out entries after the shared cursor to `consumer_name`.
    ///
    /// The cursor moves to the last returned id, so the next caller, from
    /// any consumer, continues where this one stopped.
    pub fn deliver_new(
        &mut self,
        stream: &Stream,
        consumer_name: &Bytes,
        count: Option<usize>,
    ) -> Vec<StreamEntry> {
        let entries = stream.read_after(&self.last_delivered_id, count);
        let now = now_ms();

        if let Some(last) = entries.last() {
            self.last_delivered_id = last.id;
        }
        for entry in &entries {
            self.add_pending(entry.id, consumer_name, now);
        }
        self.entries_read += entries.len() as u64;

        // A consumer that reads nothing is still registered with the group
        self.get_or_create_consumer(consumer_name).seen_time = now;
        entries
    }

    /// Re-read the pending entries of `consumer_name` with an id above `after`.
    ///
    /// Entries trimmed out of the stream are skipped. The cursor is untouched.
    pub fn redeliver_pending(
        &mut self,
        stream: &Stream,
        consumer_name: &Bytes,
        after: &StreamEntryId,
        count: Option<usize>,
    ) -> Vec<StreamEntry> {
        let limit = effective_count(count);
        let now = now_ms();
        let ids: Vec<StreamEntryId> = match self.consumers.get(consumer_name) {
            Some(consumer) => consumer
                .pending
                .range((std::ops::Bound::Excluded(*after), std::ops::Bound::Unbounded))
                .copied()
                .collect(),
            None => Vec::new(),
        };

        let entries: Vec<StreamEntry> = ids
            .into_iter()
            .filter_map(|id| stream.get(&id))
            .take(limit)
            .collect();
        for entry in &entries {
            self.add_pending(entry.id, consumer_name, now);
        }
        self.get_or_create_consumer(consumer_name).seen_time = now;
        entries
    }

    /// Get the number of pending entries
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Get pending entries for a specific consumer
    pub fn get_pending_for_consumer(&self, consumer_name: &Bytes) -> Vec<&StreamPendingEntry> {
        self.pending
            .values()
            .filter(|pe| pe.consumer == *consumer_name)
            .collect()
    }

    /// Point-in-time summary of the group
    pub fn info(&self) -> StreamGroupInfo {
        let mut consumers: Vec<StreamConsumerInfo> = self
            .consumers
            .values()
            .map(|c| StreamConsumerInfo {
                name: c.name.clone(),
                pending: c.pending.len(),
                seen_time: c.seen_time,
            })
            .collect();
        consumers.sort_by(|a, b| a.name.cmp(&b.name));

        StreamGroupInfo {
            name: self.name.clone(),
            last_delivered_id: self.last_delivered_id,
            entries_read: self.entries_read,
            pending: self.pending.len(),
            consumers,
        }
    }
}

/// Snapshot of a consumer, as reported by [`StreamConsumerGroup::info`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConsumerInfo {
    /// Consumer name
    pub name: Bytes,
    /// Number of entries delivered to the consumer and still pending
    pub pending: usize,
    /// Last time the consumer read from the group
    pub seen_time: u64,
}

/// Snapshot of a consumer group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamGroupInfo {
    /// Group name
    pub name: Bytes,
    /// Shared delivery cursor
    pub last_delivered_id: StreamEntryId,
    /// Entries handed out so far
    pub entries_read: u64,
    /// Size of the group's pending entries list
    pub pending: usize,
    /// Consumers sorted by name
    pub consumers: Vec<StreamConsumerInfo>,
}

/// Append-only log of entries for a single key
#[derive(Debug, Default)]
pub struct Stream {
    /// Entries ordered by ID
    entries: BTreeMap<StreamEntryId, Fields>,
    /// Last generated ID, kept across trims
    last_id: StreamEntryId,
    /// Consumer groups, each behind its own lock
    consumer_groups: HashMap<Bytes, Arc<Mutex<StreamConsumerGroup>>>,
}

impl Stream {
    /// Create a new empty stream
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the stream has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest id ever appended, or zero
    pub fn last_id(&self) -> StreamEntryId {
        self.last_id
    }

    /// Append an entry. `id` must be above the last id.
    pub fn append(&mut self, id: StreamEntryId, fields: Fields) -> Result<()> {
        if id.is_zero() || id <= self.last_id {
            return Err(BrookError::IdTooSmall);
        }
        self.entries.insert(id, fields);
        self.last_id = id;
        Ok(())
    }

    /// Trim the stream to a maximum length, dropping the oldest entries
    pub fn trim(&mut self, maxlen: usize) -> usize {
        let mut removed = 0;
        while self.entries.len() > maxlen {
            if self.entries.pop_first().is_none() {
                break;
            }
            removed += 1;
        }
        removed
    }

    /// Look up a single entry
    pub fn get(&self, id: &StreamEntryId) -> Option<StreamEntry> {
        self.entries.get(id).map(|fields| StreamEntry {
            id: *id,
            fields: fields.clone(),
        })
    }

    /// Entries with an id strictly greater than `after`
    pub fn read_after(&self, after: &StreamEntryId, count: Option<usize>) -> Vec<StreamEntry> {
        self.entries
            .range((std::ops::Bound::Excluded(*after), std::ops::Bound::Unbounded))
            .take(effective_count(count))
            .map(|(id, fields)| StreamEntry {
                id: *id,
                fields: fields.clone(),
            })
            .collect()
    }

    /// Get entries in an inclusive range.
    ///
    /// Unlike [`Stream::read_after`], a count of zero returns nothing.
    pub fn range(
        &self,
        start: &StreamEntryId,
        end: &StreamEntryId,
        count: Option<usize>,
    ) -> Vec<StreamEntry> {
        if start > end || count == Some(0) {
            return Vec::new();
        }
        self.entries
            .range(*start..=*end)
            .take(count.unwrap_or(usize::MAX))
            .map(|(id, fields)| StreamEntry {
                id: *id,
                fields: fields.clone(),
            })
            .collect()
    }

    /// Create a consumer group, returns false if the name is taken
    pub fn create_group(&mut self, name: Bytes, start_id: StreamEntryId) -> bool {
        if self.consumer_groups.contains_key(&name) {
            return false;
        }
        self.consumer_groups.insert(
            name.clone(),
            Arc::new(Mutex::new(StreamConsumerGroup::new(name, start_id))),
        );
        true
    }

    /// Get a consumer group
    pub fn group(&self, name: &Bytes) -> Option<Arc<Mutex<StreamConsumerGroup>>> {
        self.consumer_groups.get(name).cloned()
    }

    /// Names of all consumer groups
    pub fn group_names(&self) -> Vec<Bytes> {
        let mut names: Vec<Bytes> = self.consumer_groups.keys().cloned().collect();
        names.sort();
        names
    }
}
