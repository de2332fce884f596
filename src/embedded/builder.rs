//! Builder for the embedded [`Brook`] handle.

use std::sync::Arc;

use brook_core::config::Config;
use brook_core::runtime::SubscriptionManager;
use brook_core::storage::{Clock, StreamEngine, SystemClock};
use brook_core::Result;

use super::Brook;

/// Builder for configuring and creating a [`Brook`] instance.
#[derive(Debug)]
pub struct BrookBuilder {
    config: Config,
    clock: Arc<dyn Clock>,
}

impl Default for BrookBuilder {
    fn default() -> Self {
        Self {
            config: Config::default(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl BrookBuilder {
    /// Replace the whole configuration. Later setters still apply on top.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Trim bound applied to appends that do not pass their own.
    pub fn default_max_len(mut self, max_len: usize) -> Self {
        self.config.streams.default_max_len = Some(max_len);
        self
    }

    /// Number of shards in the stream registry (power of two).
    pub fn stream_shards(mut self, shards: usize) -> Self {
        self.config.streams.shard_amount = shards;
        self
    }

    /// Number of shards in the channel registry (power of two).
    pub fn channel_shards(mut self, shards: usize) -> Self {
        self.config.pubsub.shard_amount = shards;
        self
    }

    /// Name prefix for pub/sub handler threads.
    pub fn worker_thread_name(mut self, name: impl Into<String>) -> Self {
        self.config.pubsub.worker_thread_name = name.into();
        self
    }

    /// Clock used for stream id generation.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Consume the builder and create a [`Brook`] instance.
    pub fn build(self) -> Result<Brook> {
        self.config.validate()?;
        crate::telemetry::parse_filter(&self.config.logging)?;

        let streams = StreamEngine::with_config(&self.config.streams, self.clock)?;
        let pubsub = SubscriptionManager::with_config(&self.config.pubsub)?;

        tracing::debug!(
            stream_shards = self.config.streams.shard_amount,
            channel_shards = self.config.pubsub.shard_amount,
            default_max_len = ?self.config.streams.default_max_len,
            "brook instance created"
        );
        Ok(Brook::from_parts(streams, pubsub, self.config))
    }
}
