//! Splitting a tile's atoms into layers.

use dmmdiff_types::{Atom, AtomKind};

/// A tile's atoms split by layer, order preserved within each group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AtomGroups<'a> {
    pub movables: Vec<&'a Atom>,
    pub turfs: Vec<&'a Atom>,
    pub areas: Vec<&'a Atom>,
    /// Atoms outside every known type-path family. They are kept as movables.
    pub unclassified: usize,
}

impl<'a> AtomGroups<'a> {
    /// Movables, then turfs, then areas.
    pub fn concat(&self) -> impl Iterator<Item = &'a Atom> + '_ {
        self.movables
            .iter()
            .chain(&self.turfs)
            .chain(&self.areas)
            .copied()
    }
}

/// Split `atoms` into movables, turfs and areas.
pub fn split_atom_groups(atoms: &[Atom]) -> AtomGroups<'_> {
    let mut groups = AtomGroups::default();
    for atom in atoms {
        match atom.kind() {
            AtomKind::Turf => groups.turfs.push(atom),
            AtomKind::Area => groups.areas.push(atom),
            AtomKind::Movable => {
                if !atom.is_recognized() {
                    groups.unclassified += 1;
                }
                groups.movables.push(atom);
            }
        }
    }
    groups
}
