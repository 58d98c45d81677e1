//! Cell-by-cell comparison of two maps.
//!
//! The output is itself a map: unchanged cells are copied from the old
//! version, and changed cells show the new version annotated with marker
//! objects describing what moved. Viewers that can open the map format can
//! therefore display a diff without knowing anything about dmmdiff.

use std::collections::HashMap;
use std::fmt;

use dmmdiff_map::{Map, MapError};
use dmmdiff_types::{Atom, Dimensions, Var};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::classify::split_atom_groups;
use crate::error::DiffResult;

/// Type-path of the annotation objects placed in changed cells.
pub const MARKER_PATH: &str = "/obj";

pub const NEW_MARKER: &str = "---NEW---";
pub const OLD_MARKER: &str = "---OLD---";
pub const END_MARKER: &str = "---END---";

/// Remark attached to a diff.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffNote {
    /// The maps have different extents and were not compared.
    SizeChanged { before: Dimensions, after: Dimensions },
    /// The dictionary key width changed; the diff still ran.
    KeyLengthChanged { before: usize, after: usize },
    /// Every cell resolved to the same tile.
    NoVisibleChanges,
}

impl fmt::Display for DiffNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeChanged { before, after } => write!(f, "Size changed: {before} to {after}"),
            Self::KeyLengthChanged { before, after } => {
                write!(f, "Key length changed: {before} to {after}")
            }
            Self::NoVisibleChanges => write!(f, "No visible changes"),
        }
    }
}

/// The outcome of [`create_diff`].
#[derive(Clone, Debug, Default)]
pub struct MapDiff {
    /// Cells whose tiles differ.
    pub tiles_changed: usize,
    /// The annotated output map; `None` when the sizes differ.
    pub diff_map: Option<Map>,
    pub note: Option<DiffNote>,
    pub movables_added: usize,
    pub movables_deleted: usize,
    pub turfs_changed: usize,
    pub areas_changed: usize,
    /// Atoms in changed cells whose type-path is outside every known family.
    pub unclassified_atoms: usize,
}

impl MapDiff {
    fn size_changed(before: Dimensions, after: Dimensions) -> Self {
        Self {
            note: Some(DiffNote::SizeChanged { before, after }),
            ..Self::default()
        }
    }

    /// Counters in a serializable form.
    pub fn stats(&self) -> DiffStats {
        DiffStats {
            note: self.note.as_ref().map(ToString::to_string),
            tiles_changed: self.tiles_changed,
            movables_added: self.movables_added,
            movables_deleted: self.movables_deleted,
            turfs_changed: self.turfs_changed,
            areas_changed: self.areas_changed,
            unclassified_atoms: self.unclassified_atoms,
        }
    }
}

/// The counters of a [`MapDiff`], without the output map.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffStats {
    pub note: Option<String>,
    pub tiles_changed: usize,
    pub movables_added: usize,
    pub movables_deleted: usize,
    pub turfs_changed: usize,
    pub areas_changed: usize,
    pub unclassified_atoms: usize,
}

/// An annotation object with a display name and a description.
pub fn marker_atom(name: &str, desc: &str) -> Atom {
    Atom::with_vars(
        MARKER_PATH,
        vec![Var::string("name", name), Var::string("desc", desc)],
    )
}

/// Pick the turf (or area) to display and describe any change.
///
/// The new version wins when it has one. A notice is produced only when both
/// versions have one and they differ.
pub fn diff_turf_or_area<'a>(
    old: &[&'a Atom],
    new: &[&'a Atom],
) -> (Option<&'a Atom>, Option<String>) {
    let old_last = old.last().copied();
    let new_last = new.last().copied();
    let notice = match (old_last, new_last) {
        (Some(o), Some(n)) if o != n => Some(format!("{o} TO {n}")),
        _ => None,
    };
    (new_last.or(old_last), notice)
}

/// Compare `before` and `after` cell by cell.
///
/// Maps of different dimensions are not compared; the result carries a
/// [`DiffNote::SizeChanged`] and no output map.
pub fn create_diff(before: &Map, after: &Map) -> DiffResult<MapDiff> {
    if before.dimensions() != after.dimensions() {
        debug!(before = %before.dimensions(), after = %after.dimensions(), "map size changed");
        return Ok(MapDiff::size_changed(before.dimensions(), after.dimensions()));
    }

    let mut out = Map::with_dictionary_of(before, before.dimensions());
    let mut diff = MapDiff::default();
    if before.key_length() != after.key_length() {
        diff.note = Some(DiffNote::KeyLengthChanged {
            before: before.key_length(),
            after: after.key_length(),
        });
    }

    for coord in before.coords() {
        let old_tile = before.get_tile(coord)?;
        let new_tile = after.get_tile(coord)?;

        if old_tile == new_tile {
            let key = before.key_at(coord)?.ok_or(MapError::UnsetCell(coord))?;
            out.bind(coord, key)?;
            continue;
        }
        diff.tiles_changed += 1;

        let old = split_atom_groups(old_tile.atoms());
        let new = split_atom_groups(new_tile.atoms());
        diff.unclassified_atoms += old.unclassified + new.unclassified;

        let (area, area_notice) = diff_turf_or_area(&old.areas, &new.areas);
        let (turf, turf_notice) = diff_turf_or_area(&old.turfs, &new.turfs);

        let mut atoms: Vec<Atom> = if old.movables != new.movables {
            let mut counts: HashMap<&Atom, (usize, usize)> = HashMap::new();
            for atom in &old.movables {
                counts.entry(*atom).or_default().0 += 1;
            }
            for atom in &new.movables {
                counts.entry(*atom).or_default().1 += 1;
            }
            for (old_count, new_count) in counts.into_values() {
                diff.movables_added += new_count.saturating_sub(old_count);
                diff.movables_deleted += old_count.saturating_sub(new_count);
            }

            let mut atoms = Vec::with_capacity(old.movables.len() + new.movables.len() + 5);
            atoms.push(marker_atom(NEW_MARKER, "new version's movables below this"));
            atoms.extend(new.movables.iter().map(|a| (*a).clone()));
            atoms.push(marker_atom(OLD_MARKER, "old version's movables below this"));
            atoms.extend(old.movables.iter().map(|a| (*a).clone()));
            atoms.push(marker_atom(END_MARKER, "end of movables diff"));
            atoms
        } else {
            new.movables.iter().map(|a| (*a).clone()).collect()
        };

        if let Some(notice) = turf_notice {
            atoms.push(marker_atom(&format!("TURF DIFF: {notice}"), &notice));
            diff.turfs_changed += 1;
        }
        if let Some(notice) = area_notice {
            atoms.push(marker_atom(&format!("AREA DIFF: {notice}"), &notice));
            diff.areas_changed += 1;
        }
        atoms.extend(turf.cloned());
        atoms.extend(area.cloned());

        out.set_tile(coord, atoms)?;
    }

    if diff.tiles_changed == 0 {
        diff.note = Some(DiffNote::NoVisibleChanges);
    }
    if diff.unclassified_atoms > 0 {
        debug!(count = diff.unclassified_atoms, "atoms outside known type-path families");
    }
    debug!(
        tiles_changed = diff.tiles_changed,
        movables_added = diff.movables_added,
        movables_deleted = diff.movables_deleted,
        turfs_changed = diff.turfs_changed,
        areas_changed = diff.areas_changed,
        "map diff complete"
    );

    diff.diff_map = Some(out);
    Ok(diff)
}

/// Parse two map texts and diff them.
pub fn diff_texts(before_text: &str, after_text: &str) -> DiffResult<MapDiff> {
    let before = dmmdiff_codec::parse(before_text)?;
    let after = dmmdiff_codec::parse(after_text)?;
    create_diff(&before, &after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiffError;
    use dmmdiff_codec::{parse, serialize, MapLayout};
    use dmmdiff_types::{Coord, Tile};
    use proptest::prelude::*;

    fn dims(x: u32, y: u32, z: u32) -> Dimensions {
        Dimensions::new(x, y, z).unwrap()
    }

    fn tile(paths: &[&str]) -> Tile {
        paths.iter().map(|p| Atom::new(*p)).collect()
    }

    fn floor() -> Tile {
        tile(&["/turf/floor", "/area/station"])
    }

    fn names(tile: &Tile) -> Vec<String> {
        tile.atoms()
            .iter()
            .map(|a| match a.get_var("name") {
                Some(name) if a.path() == MARKER_PATH => name.trim_matches('"').to_string(),
                _ => a.path().to_string(),
            })
            .collect()
    }

    #[test]
    fn identical_maps_have_no_visible_changes() {
        let mut map = Map::filled(dims(3, 3, 1), floor()).unwrap();
        map.set_tile(Coord::new(2, 2, 1), tile(&["/obj/a", "/turf/wall", "/area/station"]))
            .unwrap();

        let diff = create_diff(&map, &map).unwrap();
        assert_eq!(diff.tiles_changed, 0);
        assert_eq!(diff.note, Some(DiffNote::NoVisibleChanges));
        assert_eq!(diff.diff_map.as_ref(), Some(&map));
    }

    #[test]
    fn size_change_short_circuits() {
        let before = Map::filled(dims(10, 10, 1), floor()).unwrap();
        let after = Map::filled(dims(11, 10, 1), floor()).unwrap();

        let diff = create_diff(&before, &after).unwrap();
        assert_eq!(diff.tiles_changed, 0);
        assert!(diff.diff_map.is_none());
        let note = diff.note.unwrap().to_string();
        assert!(note.contains("Size changed"));
        assert_eq!(note, "Size changed: (10, 10, 1) to (11, 10, 1)");
    }

    #[test]
    fn added_duplicate_movable() {
        let before = Map::filled(dims(1, 1, 1), tile(&["/obj/cratebox", "/turf/floor", "/area/a"]))
            .unwrap();
        let after = Map::filled(
            dims(1, 1, 1),
            tile(&["/obj/cratebox", "/obj/cratebox", "/turf/floor", "/area/a"]),
        )
        .unwrap();

        let diff = create_diff(&before, &after).unwrap();
        assert_eq!(diff.tiles_changed, 1);
        assert_eq!(diff.movables_added, 1);
        assert_eq!(diff.movables_deleted, 0);
        assert_eq!(diff.turfs_changed, 0);

        let out = diff.diff_map.unwrap();
        let shown = out.get_tile(Coord::new(1, 1, 1)).unwrap();
        assert_eq!(
            names(shown),
            [
                NEW_MARKER,
                "/obj/cratebox",
                "/obj/cratebox",
                OLD_MARKER,
                "/obj/cratebox",
                END_MARKER,
                "/turf/floor",
                "/area/a",
            ]
        );
    }

    #[test]
    fn turf_change_appends_notice() {
        let before = Map::filled(dims(2, 1, 1), tile(&["/obj/a", "/turf/floor", "/area/a"])).unwrap();
        let mut after = before.clone();
        after
            .set_tile(Coord::new(1, 1, 1), tile(&["/obj/a", "/turf/wall", "/area/a"]))
            .unwrap();

        let diff = create_diff(&before, &after).unwrap();
        assert_eq!(diff.tiles_changed, 1);
        assert_eq!(diff.turfs_changed, 1);
        assert_eq!(diff.areas_changed, 0);
        assert_eq!((diff.movables_added, diff.movables_deleted), (0, 0));

        let out = diff.diff_map.unwrap();
        let shown = out.get_tile(Coord::new(1, 1, 1)).unwrap();
        assert_eq!(
            names(shown),
            ["/obj/a", "TURF DIFF: /turf/floor TO /turf/wall", "/turf/wall", "/area/a"]
        );
        let notice = &shown.atoms()[1];
        assert_eq!(notice.get_var("desc"), Some("\"/turf/floor TO /turf/wall\""));
        assert_eq!(
            out.get_tile(Coord::new(2, 1, 1)).unwrap(),
            before.get_tile(Coord::new(2, 1, 1)).unwrap()
        );
    }

    #[test]
    fn area_change_appends_notice() {
        let before = Map::filled(dims(1, 1, 1), tile(&["/turf/floor", "/area/a"])).unwrap();
        let after = Map::filled(dims(1, 1, 1), tile(&["/turf/floor", "/area/b"])).unwrap();

        let diff = create_diff(&before, &after).unwrap();
        assert_eq!((diff.turfs_changed, diff.areas_changed), (0, 1));
        let shown = diff.diff_map.unwrap();
        assert_eq!(
            names(shown.get_tile(Coord::new(1, 1, 1)).unwrap()),
            ["AREA DIFF: /area/a TO /area/b", "/turf/floor", "/area/b"]
        );
    }

    #[test]
    fn missing_turf_falls_back_to_old() {
        let a = Atom::new("/turf/a");
        let b = Atom::new("/turf/b");
        assert_eq!(diff_turf_or_area(&[&a], &[]), (Some(&a), None));
        assert_eq!(diff_turf_or_area(&[], &[&b]), (Some(&b), None));
        assert_eq!(diff_turf_or_area(&[], &[]), (None, None));
        assert_eq!(diff_turf_or_area(&[&a], &[&a]), (Some(&a), None));
        assert_eq!(
            diff_turf_or_area(&[&a, &b], &[&b, &a]),
            (Some(&a), Some("/turf/b TO /turf/a".to_string()))
        );
    }

    #[test]
    fn reordered_movables_count_as_change_without_counters() {
        let before = Map::filled(dims(1, 1, 1), tile(&["/obj/a", "/obj/b", "/turf/f", "/area/a"])).unwrap();
        let after = Map::filled(dims(1, 1, 1), tile(&["/obj/b", "/obj/a", "/turf/f", "/area/a"])).unwrap();

        let diff = create_diff(&before, &after).unwrap();
        assert_eq!(diff.tiles_changed, 1);
        assert_eq!((diff.movables_added, diff.movables_deleted), (0, 0));
        let shown = diff.diff_map.unwrap();
        assert_eq!(names(shown.get_tile(Coord::new(1, 1, 1)).unwrap())[0], NEW_MARKER);
    }

    #[test]
    fn key_length_note_survives_changes() {
        let before = Map::filled(dims(2, 1, 1), floor()).unwrap();
        let mut after = Map::new(2, dims(2, 1, 1)).unwrap();
        after.set_tile(Coord::new(1, 1, 1), floor()).unwrap();
        after
            .set_tile(Coord::new(2, 1, 1), tile(&["/turf/wall", "/area/station"]))
            .unwrap();

        let diff = create_diff(&before, &after).unwrap();
        assert_eq!(
            diff.note.as_ref().map(ToString::to_string).as_deref(),
            Some("Key length changed: 1 to 2")
        );

        let unchanged = Map::filled(dims(2, 1, 1), floor()).unwrap();
        let mut wide = Map::new(2, dims(2, 1, 1)).unwrap();
        wide.set_tile(Coord::new(1, 1, 1), floor()).unwrap();
        wide.set_tile(Coord::new(2, 1, 1), floor()).unwrap();
        let diff = create_diff(&unchanged, &wide).unwrap();
        assert_eq!(diff.note, Some(DiffNote::NoVisibleChanges));
    }

    #[test]
    fn marker_text_is_escaped() {
        let marker = marker_atom("TURF DIFF: /turf{name = \"a[1]\"}", "d");
        assert_eq!(marker.get_var("name"), Some(r#""TURF DIFF: /turf{name = \"a\[1]\"}""#));
        assert_eq!(marker.path(), "/obj");
    }

    #[test]
    fn unclassified_atoms_are_counted() {
        let before = Map::filled(dims(1, 1, 1), tile(&["/turf/f", "/area/a"])).unwrap();
        let after = Map::filled(dims(1, 1, 1), tile(&["/effect/x", "/turf/f", "/area/a"])).unwrap();
        let diff = create_diff(&before, &after).unwrap();
        assert_eq!(diff.unclassified_atoms, 1);
        assert_eq!(diff.movables_added, 1);
    }

    #[test]
    fn unset_cells_propagate() {
        let before = Map::new(1, dims(1, 1, 1)).unwrap();
        let after = Map::filled(dims(1, 1, 1), floor()).unwrap();
        let err = create_diff(&before, &after).unwrap_err();
        assert!(matches!(err, DiffError::Map(MapError::UnsetCell(_))));
    }

    #[test]
    fn diff_texts_parses_both_sides() {
        let before = "\"a\" = (/turf/floor,/area/a)\n(1,1,1) = {\"\naa\n\"}\n";
        let after = "\"a\" = (/turf/floor,/area/a)\n\"b\" = (/obj/x,/turf/floor,/area/a)\n(1,1,1) = {\"\nab\n\"}\n";
        let diff = diff_texts(before, after).unwrap();
        assert_eq!(diff.tiles_changed, 1);
        assert_eq!(diff.movables_added, 1);

        let err = diff_texts(before, "garbage").unwrap_err();
        assert!(matches!(err, DiffError::Codec(_)));
    }

    #[test]
    fn stats_serialize() {
        let before = Map::filled(dims(1, 1, 1), floor()).unwrap();
        let diff = create_diff(&before, &before).unwrap();
        let json = serde_json::to_value(diff.stats()).unwrap();
        assert_eq!(json["note"], "No visible changes");
        assert_eq!(json["tiles_changed"], 0);
    }

    fn tile_strategy() -> impl Strategy<Value = Tile> {
        (
            prop::collection::vec(
                prop::sample::select(vec!["/obj/a", "/obj/b", "/mob/c", "/obj/crate"]),
                0..4,
            ),
            prop::sample::select(vec!["/turf/floor", "/turf/wall"]),
            prop::sample::select(vec!["/area/a", "/area/b"]),
        )
            .prop_map(|(movables, turf, area)| {
                movables
                    .into_iter()
                    .chain([turf, area])
                    .map(Atom::new)
                    .collect()
            })
    }

    fn map_pair() -> impl Strategy<Value = (Map, Map)> {
        (1u32..5, 1u32..5, 1u32..3).prop_flat_map(|(x, y, z)| {
            let d = Dimensions::new(x, y, z).unwrap();
            let cells = d.cell_count();
            (
                prop::collection::vec(tile_strategy(), cells),
                prop::collection::vec(tile_strategy(), cells),
            )
                .prop_map(move |(a, b)| {
                    let mut before = Map::new(1, d).unwrap();
                    let mut after = Map::new(1, d).unwrap();
                    for ((coord, ta), tb) in d.coords().zip(a).zip(b) {
                        before.set_tile(coord, ta).unwrap();
                        after.set_tile(coord, tb).unwrap();
                    }
                    (before, after)
                })
        })
    }

    fn movable_count(map: &Map) -> i64 {
        map.coords()
            .map(|c| split_atom_groups(map.get_tile(c).unwrap().atoms()).movables.len() as i64)
            .sum()
    }

    proptest! {
        #[test]
        fn tiles_changed_counts_differing_cells((before, after) in map_pair()) {
            let diff = create_diff(&before, &after).unwrap();
            let expected = before
                .coords()
                .filter(|c| before.get_tile(*c).unwrap() != after.get_tile(*c).unwrap())
                .count();
            prop_assert_eq!(diff.tiles_changed, expected);
            prop_assert!(diff.diff_map.unwrap().is_complete());
        }

        #[test]
        fn movable_counters_balance((before, after) in map_pair()) {
            let diff = create_diff(&before, &after).unwrap();
            prop_assert_eq!(
                diff.movables_added as i64 - diff.movables_deleted as i64,
                movable_count(&after) - movable_count(&before)
            );
        }

        #[test]
        fn self_diff_is_identity((map, _) in map_pair()) {
            let diff = create_diff(&map, &map).unwrap();
            prop_assert_eq!(diff.tiles_changed, 0);
            prop_assert_eq!(diff.note, Some(DiffNote::NoVisibleChanges));
            prop_assert_eq!(diff.diff_map.as_ref(), Some(&map));
        }

        #[test]
        fn counters_survive_reserialization((before, after) in map_pair(), tgm in any::<bool>()) {
            let layout = if tgm { MapLayout::Tgm } else { MapLayout::Dmm };
            let reparsed_before = parse(&serialize(&before, layout).unwrap()).unwrap();
            let reparsed_after = parse(&serialize(&after, layout).unwrap()).unwrap();
            let direct = create_diff(&before, &after).unwrap();
            let reparsed = create_diff(&reparsed_before, &reparsed_after).unwrap();
            prop_assert_eq!(direct.stats(), reparsed.stats());
        }
    }
}
