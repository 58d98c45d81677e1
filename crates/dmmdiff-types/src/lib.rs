//! Foundation types for dmmdiff.
//!
//! This crate provides the value types shared by every other dmmdiff crate:
//! placed objects, the tiles they form, and the coordinate space of a map.
//!
//! # Key Types
//!
//! - [`Atom`] -- A placed object declaration: type-path plus literal variables
//! - [`AtomKind`] -- Movable / turf / area layer, derived from the type-path
//! - [`Tile`] -- The ordered atom sequence occupying one grid cell
//! - [`Coord`] -- A 1-based `(x, y, z)` grid coordinate
//! - [`Dimensions`] -- The extents of a map, with the canonical traversal order

pub mod atom;
pub mod coord;
pub mod error;
pub mod tile;

pub use atom::{escape_string, Atom, AtomKind, Var};
pub use coord::{Coord, Coords, Dimensions};
pub use error::TypeError;
pub use tile::Tile;
