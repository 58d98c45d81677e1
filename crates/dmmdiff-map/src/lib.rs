//! In-memory map model for dmmdiff.
//!
//! A [`Map`] pairs a dictionary of reusable tile definitions with a 3D grid
//! of fixed-width keys into that dictionary. The dictionary works like a
//! content-addressed store: identical tiles share one entry, and entries are
//! never mutated once written.
//!
//! # Design Rules
//!
//! 1. Dictionary entries are immutable; a new combination of atoms mints a new key.
//! 2. Tile equality is structural, never by key.
//! 3. Keys are minted deterministically (smallest free number), so the same
//!    sequence of writes always yields the same dictionary.
//! 4. Grid traversal order is z, then y, then x, ascending from 1.

pub mod error;
pub mod key;
pub mod map;

pub use error::{MapError, MapResult};
pub use key::{max_key_for, width_for, TileKey, BASE, MAX_KEY_LENGTH};
pub use map::{Interned, Map};
