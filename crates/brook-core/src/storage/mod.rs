//! Storage module for Brook
//!
//! In-memory stream storage:
//!
//! 1. **id**: entry identifiers and the clock-driven id generator
//! 2. **streams**: the per-key log, consumer groups and pending lists
//! 3. **engine**: the sharded registry routing operations to streams

pub mod engine;
pub mod id;
pub mod streams;

pub use engine::StreamEngine;
pub use id::{Clock, IdGenerator, IdSpec, ManualClock, StreamEntryId, SystemClock};
pub use streams::{
    Fields, GroupReadPosition, GroupStart, Stream, StreamConsumer, StreamConsumerGroup,
    StreamConsumerInfo, StreamEntry, StreamGroupInfo, StreamPendingEntry,
};
