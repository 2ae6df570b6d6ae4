//! Foundation types for Atelier.
//!
//! This crate provides the identity and structural types shared by every
//! other Atelier crate: how an image is named, how a name is classified into
//! a concrete reference, and the project history records that act as a
//! resolution fallback.
//!
//! # Key Types
//!
//! - [`ImageId`]: Opaque image identifier as stored in board membership lists
//! - [`ImageRef`]: Tagged union produced once by the identifier classifier
//! - [`InlineImage`]: Parsed `data:` URL that can decode back to bytes
//! - [`BoardId`]: Board identifier, with the reserved [`BoardId::DEFAULT`]
//! - [`Generation`] / [`Edit`]: Project history records with output assets

pub mod error;
pub mod identity;
pub mod image_ref;
pub mod project;
pub mod temporal;

pub use error::TypeError;
pub use identity::{BoardId, ImageId};
pub use image_ref::{classify, extension_for_mime, Classification, ImageRef, InlineImage};
pub use project::{Edit, Generation, OutputAsset, ProjectHistory};
pub use temporal::now_millis;
