//! High-level gallery API for Atelier.
//!
//! [`Gallery`] is the entry point for applications embedding Atelier. It
//! owns the record store, the settings document and the optional disk
//! mirror, and exposes the two calls every image producer needs:
//! [`Gallery::save_image_to_board`] and [`Gallery::resolve_image_url`].

pub mod config;
pub mod error;
pub mod gallery;
pub mod mirror;
pub mod resolve;

pub use config::AtelierConfig;
pub use error::{GalleryError, GalleryResult};
pub use gallery::{Gallery, ImageSource, ReconcileOptions, ReconcileReport, SavedImage};
pub use mirror::{export_boards, sanitize_component, DiskMirror, ExportReport, FsMirror};
pub use resolve::{
    board_items, resolve, resolve_for_board, split_tabs, BoardItem, ItemKind, ObjectSnapshot,
    ResolveContext,
};

// Re-export key types
pub use atelier_boards::{Board, BoardError, BoardUpdate};
pub use atelier_store::GalleryRecord;
pub use atelier_types::{BoardId, Edit, Generation, ImageId, ImageRef, OutputAsset, ProjectHistory};
