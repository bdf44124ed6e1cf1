//! # Nugs — concert catalog mirror
//!
//! Mirrors a remote concert/show catalog into a hybrid storage tier: a
//! local filesystem plus an optional rclone-backed remote. The library
//! owns four tightly coupled subsystems:
//!
//! - a **catalog cache** with atomic multi-file writes, derived indexes,
//!   and a cross-process file lock ([`cache`]);
//! - a **presence index and gap analyzer** that decides, per artist, which
//!   shows are already stored and which are missing ([`catalog`]);
//! - a **gap-fill and watch orchestrator** driving downloads with
//!   interrupt-aware cancellation and notification summaries ([`gapfill`],
//!   [`watch`]);
//! - a **storage provider** wrapping an external uploader CLI behind a
//!   typed interface, including progress-line parsing and strict
//!   verify-then-delete semantics ([`remote`]).
//!
//! External concerns — token acquisition, the media pipeline, push
//! delivery — stay behind the collaborator traits in [`contracts`].

pub mod api;
pub mod cache;
pub mod catalog;
pub mod concurrency;
pub mod config;
pub mod contracts;
pub mod diagnostics;
pub mod error;
pub mod exec;
pub mod gapfill;
pub mod logging;
pub mod model;
pub mod names;
pub mod remote;
pub mod watch;

// Re-export the main public API.
pub use crate::cache::CacheStore;
pub use crate::config::Config;
pub use crate::error::{NugsError, Result};
pub use crate::model::{
    ArtistCatalogAnalysis, CatalogSnapshot, GapFillResult, MediaType, Show, StreamParams,
};
