//! Stream entry identifiers and their generator

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{BrookError, Result};

/// Stream entry ID (timestamp-sequence)
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct StreamEntryId {
    /// Milliseconds timestamp
    pub ms: u64,
    /// Sequence number within the millisecond
    pub seq: u64,
}

impl StreamEntryId {
    /// The zero id, ordered before every real entry
    pub const ZERO: StreamEntryId = StreamEntryId { ms: 0, seq: 0 };

    /// The largest representable id
    pub const MAX: StreamEntryId = StreamEntryId {
        ms: u64::MAX,
        seq: u64::MAX,
    };

    /// Create a new stream entry ID
    pub const fn new(ms: u64, seq: u64) -> Self {
        Self { ms, seq }
    }

    /// Parse a stream ID from string (format: "ms-seq" or "ms")
    pub fn parse(s: &str) -> Option<Self> {
        match s.split_once('-') {
            Some((ms, seq)) => Some(Self {
                ms: ms.parse().ok()?,
                seq: seq.parse().ok()?,
            }),
            None => Some(Self {
                ms: s.parse().ok()?,
                seq: 0,
            }),
        }
    }

    /// Whether this is the reserved zero id
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for StreamEntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

/// Id requested for a new entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdSpec {
    /// Let the stream generate the id (`*`)
    Auto,
    /// Use this exact id; it must be above the stream's last id
    Explicit(StreamEntryId),
}

impl IdSpec {
    /// Parse `*`, `ms` or `ms-seq`
    pub fn parse(s: &str) -> Option<Self> {
        if s == "*" {
            return Some(IdSpec::Auto);
        }
        StreamEntryId::parse(s).map(IdSpec::Explicit)
    }
}

/// Source of wall-clock milliseconds for id generation
pub trait Clock: Send + Sync + fmt::Debug {
    /// Milliseconds since the Unix epoch
    fn now_ms(&self) -> u64;
}

/// Clock backed by [`std::time::SystemTime`]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

/// Manually driven clock, useful for deterministic tests
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    /// Create a clock frozen at `ms`
    pub fn new(ms: u64) -> Self {
        Self {
            now: AtomicU64::new(ms),
        }
    }

    /// Move the clock to `ms` (may go backwards)
    pub fn set(&self, ms: u64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    /// Advance the clock by `delta` milliseconds
    pub fn advance(&self, delta: u64) {
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Produces ids strictly greater than a stream's last id.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    clock: Arc<dyn Clock>,
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

impl IdGenerator {
    /// Create a generator reading time from `clock`
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Next id after `last`.
    ///
    /// Uses the current millisecond when the clock is ahead of `last`,
    /// otherwise bumps the sequence within `last.ms`. A backwards clock
    /// therefore never reorders ids.
    pub fn next(&self, last: &StreamEntryId) -> Result<StreamEntryId> {
        let now_ms = self.clock.now_ms();
        if now_ms > last.ms {
            return Ok(StreamEntryId::new(now_ms, 0));
        }
        match last.seq.checked_add(1) {
            Some(seq) => Ok(StreamEntryId::new(last.ms, seq)),
            None => {
                tracing::warn!(last = %last, now_ms, "stream id sequence exhausted");
                Err(BrookError::InvalidIdKind {
                    last: last.to_string(),
                })
            }
        }
    }
}
