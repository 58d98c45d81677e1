//! [`Map`] → map text, in either layout.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Write as _;

use dmmdiff_map::{max_key_for, width_for, Map, MapError, TileKey};
use dmmdiff_types::{Atom, Coord, Tile};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CodecError, CodecResult};

/// First line of every TGM file. Tools that convert standard maps look for it
/// to avoid converting twice.
pub const TGM_HEADER: &str =
    "//MAP CONVERTED BY dmm2tgm.py THIS HEADER COMMENT PREVENTS RECONVERSION, DO NOT REMOVE";

/// Text layout used when writing a map.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MapLayout {
    /// Merge-friendly layout: one atom per line, one grid block per column.
    #[default]
    Tgm,
    /// Standard layout: one entry per line, one grid block per z-level.
    Dmm,
}

impl MapLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tgm => "tgm",
            Self::Dmm => "dmm",
        }
    }
}

impl std::str::FromStr for MapLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tgm" => Ok(Self::Tgm),
            "dmm" => Ok(Self::Dmm),
            other => Err(format!("unknown map layout {other:?} (expected tgm or dmm)")),
        }
    }
}

/// Guess the layout of map text from its header.
pub fn detect_layout(text: &str) -> MapLayout {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    if text.starts_with(TGM_HEADER) {
        MapLayout::Tgm
    } else {
        MapLayout::Dmm
    }
}

/// Serialize `map` as text.
///
/// Only entries referenced by the grid are written, in ascending key order.
/// The key width is the smallest that fits the written entries; keys are
/// renumbered densely when their current numbers do not fit it.
pub fn serialize(map: &Map, layout: MapLayout) -> CodecResult<String> {
    if let Some(coord) = map.first_unset() {
        return Err(CodecError::IncompleteMap(coord));
    }

    let mut referenced = BTreeSet::new();
    for coord in map.coords() {
        if let Some(key) = map.key_at(coord)? {
            referenced.insert(key);
        }
    }

    let key_length = width_for(referenced.len())?;
    let fits = referenced
        .last()
        .map_or(true, |key| key.index() < max_key_for(key_length));
    let names: HashMap<TileKey, String> = if fits {
        referenced
            .iter()
            .map(|key| Ok((*key, key.encode(key_length)?)))
            .collect::<CodecResult<_>>()?
    } else {
        debug!(entries = referenced.len(), key_length, "renumbering dictionary keys");
        referenced
            .iter()
            .zip(0u32..)
            .map(|(key, index)| Ok((*key, TileKey::from_index(index).encode(key_length)?)))
            .collect::<CodecResult<_>>()?
    };

    let mut out = String::new();
    if layout == MapLayout::Tgm {
        out.push_str(TGM_HEADER);
        out.push('\n');
    }

    for key in &referenced {
        let tile = map
            .definition(*key)
            .ok_or(MapError::UnknownKey(*key))?;
        let name = &names[key];
        match layout {
            MapLayout::Tgm => write_tgm_entry(&mut out, name, tile),
            MapLayout::Dmm => {
                let _ = writeln!(out, "\"{name}\" = ({tile})");
            }
        }
    }
    out.push('\n');

    let dims = map.dimensions();
    let name_at = |coord| key_name(map, &names, coord);

    match layout {
        MapLayout::Tgm => {
            for z in 1..=dims.z {
                for x in 1..=dims.x {
                    let _ = writeln!(out, "({x},1,{z}) = {{\"");
                    for y in 1..=dims.y {
                        out.push_str(name_at(Coord::new(x, y, z))?);
                        out.push('\n');
                    }
                    out.push_str("\"}\n");
                }
            }
        }
        MapLayout::Dmm => {
            for z in 1..=dims.z {
                if z > 1 {
                    out.push('\n');
                }
                let _ = writeln!(out, "(1,1,{z}) = {{\"");
                for y in 1..=dims.y {
                    for x in 1..=dims.x {
                        out.push_str(name_at(Coord::new(x, y, z))?);
                    }
                    out.push('\n');
                }
                out.push_str("\"}\n");
            }
        }
    }

    Ok(out)
}

fn key_name<'n>(
    map: &Map,
    names: &'n HashMap<TileKey, String>,
    coord: Coord,
) -> CodecResult<&'n str> {
    let key = map.key_at(coord)?.ok_or(CodecError::IncompleteMap(coord))?;
    names
        .get(&key)
        .map(String::as_str)
        .ok_or_else(|| MapError::UnknownKey(key).into())
}

fn write_tgm_entry(out: &mut String, name: &str, tile: &Tile) {
    let _ = writeln!(out, "\"{name}\" = (");
    let count = tile.len();
    for (i, atom) in tile.atoms().iter().enumerate() {
        write_tgm_atom(out, atom);
        out.push_str(if i + 1 == count { ")\n" } else { ",\n" });
    }
    if count == 0 {
        out.push_str(")\n");
    }
}

fn write_tgm_atom(out: &mut String, atom: &Atom) {
    out.push_str(atom.path());
    if atom.vars().is_empty() {
        return;
    }
    out.push_str("{\n");
    let last = atom.vars().len() - 1;
    for (i, var) in atom.vars().iter().enumerate() {
        let _ = write!(out, "\t{var}");
        out.push_str(if i == last { "\n" } else { ";\n" });
    }
    out.push_str("\t}");
}
