//! Settings persistence for Atelier.
//!
//! The settings document holds everything besides image records: the
//! boards, the selected board and the project history. It is small,
//! read once at startup and rewritten whole after every change.
//!
//! # Storage Backends
//!
//! All backends implement the [`SettingsStore`] trait:
//!
//! - [`JsonSettingsStore`] -- `settings.json` in the data directory
//! - [`InMemorySettingsStore`] -- session-lived, for tests and degraded mode
//!
//! # Design Rules
//!
//! 1. Loading never fails on damaged content; damaged parts fall back to
//!    first-run values.
//! 2. A flush replaces the whole document atomically.
//! 3. Project history is cut to the most recent entries before writing,
//!    and cut further when the document is over its byte limit.
//! 4. A failed flush leaves the in-memory state authoritative.

pub mod document;
pub mod error;
pub mod flusher;
pub mod json;
pub mod memory;
pub mod traits;

pub use document::{SettingsDocument, SETTINGS_VERSION};
pub use error::{SettingsError, SettingsResult};
pub use flusher::Flusher;
pub use json::{JsonSettingsConfig, JsonSettingsStore, SETTINGS_FILE_NAME};
pub use memory::InMemorySettingsStore;
pub use traits::SettingsStore;
