//! Structural diff engine for dmmdiff maps.
//!
//! Compares two versions of a map cell by cell and produces a third map that
//! shows the new version annotated with what changed, together with change
//! counters for reporting.
//!
//! # Key Types
//!
//! - [`AtomGroups`] -- A tile split into movables, turfs and areas
//! - [`MapDiff`] -- Output map plus counters and an optional [`DiffNote`]
//! - [`DiffStats`] -- The counters alone, serializable

pub mod classify;
pub mod engine;
pub mod error;

pub use classify::{split_atom_groups, AtomGroups};
pub use engine::{
    create_diff, diff_texts, diff_turf_or_area, marker_atom, DiffNote, DiffStats, MapDiff,
    END_MARKER, MARKER_PATH, NEW_MARKER, OLD_MARKER,
};
pub use error::{DiffError, DiffResult};
