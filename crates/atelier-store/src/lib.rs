//! Gallery record storage for Atelier.
//!
//! This crate implements the binary object store: a keyed store of
//! [`GalleryRecord`]s (one per saved image) with secondary indexes by board
//! and by timestamp. It is the durable tier behind every opaque image id.
//!
//! # Storage Backends
//!
//! All backends implement the [`ObjectStore`] trait:
//!
//! - [`InMemoryObjectStore`] -- session-lived store for tests and degraded mode
//! - [`LogObjectStore`] -- crash-recoverable append-only record log on disk
//!
//! # Design Rules
//!
//! 1. `put` is insert-or-replace by id (last write wins).
//! 2. Each `put`/`delete` is atomic per record; there are no cross-record
//!    transactions.
//! 3. A failed operation did not happen: no partial write is ever
//!    observable after an error.
//! 4. Deleting a missing id is a no-op, not an error.
//! 5. The store never interprets the stored reference.

pub mod error;
pub mod index;
pub mod log;
pub mod memory;
pub mod record;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use index::RecordIndex;
pub use log::{LogObjectStore, LogStoreConfig};
pub use memory::InMemoryObjectStore;
pub use record::GalleryRecord;
pub use traits::ObjectStore;
