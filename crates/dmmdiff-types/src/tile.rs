use std::fmt;

use serde::{Deserialize, Serialize};

use crate::atom::Atom;

/// The ordered atom sequence occupying one grid cell.
///
/// Order is part of the format: by convention movables come first, then one
/// turf, then one area. The convention is not enforced here; equality is
/// plain sequence equality.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tile(Vec<Atom>);

impl Tile {
    pub fn new(atoms: Vec<Atom>) -> Self {
        Self(atoms)
    }

    pub fn atoms(&self) -> &[Atom] {
        &self.0
    }

    pub fn into_atoms(self) -> Vec<Atom> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Atom>> for Tile {
    fn from(atoms: Vec<Atom>) -> Self {
        Self(atoms)
    }
}

impl FromIterator<Atom> for Tile {
    fn from_iter<I: IntoIterator<Item = Atom>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, atom) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{atom}")?;
        }
        Ok(())
    }
}
