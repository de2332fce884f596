//! # Brook Core
//!
//! Core engine for Brook: an in-memory, append-only stream log with
//! consumer groups, and a fan-out publish/subscribe broker.
//!
//! The two subsystems are independent:
//!
//! - [`storage::StreamEngine`] owns every stream, keyed by name. Entries get
//!   monotonically increasing [`storage::StreamEntryId`]s, streams can be
//!   trimmed to a maximum length, and consumer groups share a single
//!   delivery cursor so that their consumers split the backlog.
//! - [`runtime::SubscriptionManager`] maps channels to subscriptions and
//!   fans published messages out to a snapshot of the live subscribers.
//!
//! Both are safe to share across threads behind an `Arc`.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod runtime;
pub mod storage;

pub use error::{BrookError, Result};
