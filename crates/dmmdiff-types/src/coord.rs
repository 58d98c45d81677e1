use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// A 1-based grid coordinate.
///
/// `y = 1` is the top row of the textual layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Coord {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Coord {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl From<(u32, u32, u32)> for Coord {
    fn from((x, y, z): (u32, u32, u32)) -> Self {
        Self { x, y, z }
    }
}

/// The extents of a map: valid coordinates are `1..=x`, `1..=y`, `1..=z`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Dimensions {
    /// Create dimensions, rejecting any zero extent and any extents whose
    /// cell count overflows `usize`.
    pub fn new(x: u32, y: u32, z: u32) -> Result<Self, TypeError> {
        if x == 0 || y == 0 || z == 0 {
            return Err(TypeError::InvalidDimensions { x, y, z });
        }
        let dims = Self { x, y, z };
        if dims.checked_cell_count().is_none() {
            return Err(TypeError::TooLarge { x, y, z });
        }
        Ok(dims)
    }

    /// Total number of cells. Saturates at `usize::MAX` for extents that
    /// did not come through [`Dimensions::new`].
    pub fn cell_count(&self) -> usize {
        self.checked_cell_count().unwrap_or(usize::MAX)
    }

    fn checked_cell_count(&self) -> Option<usize> {
        usize::try_from(self.x)
            .ok()?
            .checked_mul(usize::try_from(self.y).ok()?)?
            .checked_mul(usize::try_from(self.z).ok()?)
    }

    /// Returns `true` if `coord` lies within these extents.
    pub fn contains(&self, coord: Coord) -> bool {
        (1..=self.x).contains(&coord.x)
            && (1..=self.y).contains(&coord.y)
            && (1..=self.z).contains(&coord.z)
    }

    /// Position of `coord` in the canonical traversal order, or `None` if it
    /// lies outside these extents.
    pub fn index_of(&self, coord: Coord) -> Option<usize> {
        if !self.contains(coord) {
            return None;
        }
        let (x, y, z) = (coord.x as usize - 1, coord.y as usize - 1, coord.z as usize - 1);
        z.checked_mul(self.y as usize)?
            .checked_add(y)?
            .checked_mul(self.x as usize)?
            .checked_add(x)
    }

    /// Iterate every coordinate in canonical order: z outermost, then y, then
    /// x, each ascending from 1.
    pub fn coords(&self) -> Coords {
        Coords {
            dims: *self,
            next: Some(Coord::new(1, 1, 1)),
        }
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Iterator over [`Dimensions::coords`].
#[derive(Clone, Debug)]
pub struct Coords {
    dims: Dimensions,
    next: Option<Coord>,
}

impl Iterator for Coords {
    type Item = Coord;

    fn next(&mut self) -> Option<Coord> {
        let current = self.next?;
        if !self.dims.contains(current) {
            self.next = None;
            return None;
        }
        let mut step = current;
        step.x += 1;
        if step.x > self.dims.x {
            step.x = 1;
            step.y += 1;
            if step.y > self.dims.y {
                step.y = 1;
                step.z += 1;
            }
        }
        self.next = (step.z <= self.dims.z).then_some(step);
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = match self.next.and_then(|c| self.dims.index_of(c)) {
            Some(idx) => self.dims.cell_count() - idx,
            None => 0,
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Coords {}
