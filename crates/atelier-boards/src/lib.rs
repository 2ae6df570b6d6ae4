//! Board membership for Atelier.
//!
//! Boards are named, user-curated collections of image ids. A board stores
//! only ids; the bytes live in the object store (or inline in the id
//! itself), so deleting a board never deletes an image.
//!
//! # Architecture
//!
//! - **The default board** (`"default"`, "My Creations") exists from first
//!   run and can never be deleted.
//! - **Membership** is an ordered list with set semantics. The same image
//!   may sit on several boards; [`BoardSet::move_image`] makes one board
//!   its only holder.
//! - **Selection** names the board new images land on. Deleting the
//!   selected board moves the selection to the first remaining board.
//!
//! # Modules
//!
//! - [`error`]: Error types for board operations
//! - [`board`]: The [`Board`] record
//! - [`names`]: Board name validation
//! - [`set`]: [`BoardSet`], the owner of all boards

pub mod board;
pub mod error;
pub mod names;
pub mod set;

pub use board::{Board, DEFAULT_BOARD_DESCRIPTION, DEFAULT_BOARD_NAME};
pub use error::{BoardError, BoardResult};
pub use names::{names_collide, normalize_name, MAX_NAME_CHARS};
pub use set::{BoardSet, BoardUpdate};
