//! # Brook
//!
//! An in-memory stream log with consumer groups and a fan-out pub/sub
//! broker, as found inside a single-node data-structure server.
//!
//! This is the top-level crate. It re-exports `brook-core` and adds the
//! embedded handle and logging setup.
//!
//! ## Crate Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`storage`] | Stream ids, stream log, consumer groups, stream engine |
//! | [`runtime`] | Pub/sub subscription manager |
//! | [`config`] | TOML configuration |
//! | [`embedded`] | In-process [`embedded::Brook`] handle |
//! | [`telemetry`] | Logging initialisation |

// ── Re-exports from brook-core ───────────────────────────────────────────────

pub use brook_core::config;
pub use brook_core::error;
pub use brook_core::runtime;
pub use brook_core::storage;

pub use brook_core::{BrookError, Result};

pub mod embedded;
pub mod telemetry;

pub use embedded::{Brook, BrookBuilder};
