use std::collections::{BTreeMap, HashMap};
use std::fmt;

use dmmdiff_types::{Coord, Coords, Dimensions, Tile};
use tracing::debug;

use crate::error::{MapError, MapResult};
use crate::key::{max_key_for, TileKey, MAX_KEY_LENGTH};

/// Outcome of installing a dictionary entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interned {
    /// The definition was new and is now stored under the requested key.
    New(TileKey),
    /// An identical definition already exists under this key; nothing was stored.
    Existing(TileKey),
}

impl Interned {
    /// The key that now resolves to the definition.
    pub fn key(&self) -> TileKey {
        match self {
            Self::New(key) | Self::Existing(key) => *key,
        }
    }
}

/// A parsed (or generated) map: tile dictionary plus keyed grid.
///
/// The dictionary is interned in both directions: `dictionary` resolves
/// keys to tiles, `interned` finds the key of an existing tile in O(1).
#[derive(Clone)]
pub struct Map {
    key_length: usize,
    dimensions: Dimensions,
    dictionary: BTreeMap<TileKey, Tile>,
    interned: HashMap<Tile, TileKey>,
    grid: Vec<Option<TileKey>>,
    next_free: u32,
}

impl Map {
    /// An empty map: no dictionary entries and every cell unset.
    pub fn new(key_length: usize, dimensions: Dimensions) -> MapResult<Self> {
        if key_length == 0 || key_length > MAX_KEY_LENGTH {
            return Err(MapError::InvalidKeyLength(key_length));
        }
        Ok(Self {
            key_length,
            dimensions,
            dictionary: BTreeMap::new(),
            interned: HashMap::new(),
            grid: vec![None; dimensions.cell_count()],
            next_free: 0,
        })
    }

    /// A map of `dimensions` whose every cell holds `tile`.
    pub fn filled(dimensions: Dimensions, tile: Tile) -> MapResult<Self> {
        let mut map = Self::new(1, dimensions)?;
        for coord in dimensions.coords() {
            map.set_tile(coord, tile.clone())?;
        }
        Ok(map)
    }

    /// A map with an empty grid that starts from a copy of `other`'s
    /// dictionary and key width, so tiles already known to `other` keep
    /// their keys.
    pub fn with_dictionary_of(other: &Map, dimensions: Dimensions) -> Self {
        Self {
            key_length: other.key_length,
            dimensions,
            dictionary: other.dictionary.clone(),
            interned: other.interned.clone(),
            grid: vec![None; dimensions.cell_count()],
            next_free: other.next_free,
        }
    }

    pub fn key_length(&self) -> usize {
        self.key_length
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Number of dictionary entries, referenced or not.
    pub fn dictionary_len(&self) -> usize {
        self.dictionary.len()
    }

    /// Dictionary entries in ascending key order.
    pub fn definitions(&self) -> impl Iterator<Item = (TileKey, &Tile)> + '_ {
        self.dictionary.iter().map(|(k, t)| (*k, t))
    }

    pub fn definition(&self, key: TileKey) -> Option<&Tile> {
        self.dictionary.get(&key)
    }

    /// The key of an existing definition structurally equal to `tile`.
    pub fn key_for(&self, tile: &Tile) -> Option<TileKey> {
        self.interned.get(tile).copied()
    }

    /// Install a definition under a specific key.
    ///
    /// If an identical definition is already stored under another key, nothing
    /// is stored and that key is returned as [`Interned::Existing`]; callers
    /// should bind grid cells to it instead.
    pub fn insert_definition(&mut self, key: TileKey, tile: Tile) -> MapResult<Interned> {
        if self.dictionary.contains_key(&key) {
            return Err(MapError::DuplicateKey(key));
        }
        if let Some(existing) = self.interned.get(&tile) {
            debug!(duplicate = %key, canonical = %existing, "duplicate tile definition");
            return Ok(Interned::Existing(*existing));
        }
        self.interned.insert(tile.clone(), key);
        self.dictionary.insert(key, tile);
        Ok(Interned::New(key))
    }

    /// Iterate every coordinate in canonical order (z, then y, then x).
    pub fn coords(&self) -> Coords {
        self.dimensions.coords()
    }

    fn index(&self, coord: Coord) -> MapResult<usize> {
        self.dimensions
            .index_of(coord)
            .ok_or(MapError::OutOfBounds {
                coord,
                dimensions: self.dimensions,
            })
    }

    /// The key bound at `coord`, if the cell has been set.
    pub fn key_at(&self, coord: Coord) -> MapResult<Option<TileKey>> {
        let idx = self.index(coord)?;
        Ok(self.grid[idx])
    }

    /// Bind `coord` to an existing dictionary key.
    pub fn bind(&mut self, coord: Coord, key: TileKey) -> MapResult<()> {
        let idx = self.index(coord)?;
        if !self.dictionary.contains_key(&key) {
            return Err(MapError::UnknownKey(key));
        }
        self.grid[idx] = Some(key);
        Ok(())
    }

    /// Resolve the tile at `coord` through the dictionary.
    pub fn get_tile(&self, coord: Coord) -> MapResult<&Tile> {
        let key = self.key_at(coord)?.ok_or(MapError::UnsetCell(coord))?;
        self.dictionary.get(&key).ok_or(MapError::UnknownKey(key))
    }

    /// Write `atoms` at `coord`, reusing the key of an identical definition or
    /// minting a new one.
    pub fn set_tile(&mut self, coord: Coord, atoms: impl Into<Tile>) -> MapResult<TileKey> {
        let idx = self.index(coord)?;
        let tile = atoms.into();
        let key = match self.interned.get(&tile) {
            Some(key) => *key,
            None => {
                let key = self.mint_key()?;
                self.interned.insert(tile.clone(), key);
                self.dictionary.insert(key, tile);
                key
            }
        };
        self.grid[idx] = Some(key);
        Ok(key)
    }

    /// Smallest unused key number, widening keys when the current width is
    /// full.
    fn mint_key(&mut self) -> MapResult<TileKey> {
        loop {
            while self.dictionary.contains_key(&TileKey::from_index(self.next_free)) {
                self.next_free += 1;
            }
            if self.next_free < max_key_for(self.key_length) {
                let key = TileKey::from_index(self.next_free);
                self.next_free += 1;
                return Ok(key);
            }
            if self.key_length >= MAX_KEY_LENGTH {
                return Err(MapError::KeySpaceExhausted {
                    entries: self.dictionary.len(),
                });
            }
            self.key_length += 1;
            debug!(key_length = self.key_length, "widened dictionary keys");
        }
    }

    /// The first unset cell in canonical order, if any.
    pub fn first_unset(&self) -> Option<Coord> {
        self.coords().zip(&self.grid).find(|(_, k)| k.is_none()).map(|(c, _)| c)
    }

    /// Returns `true` once every cell has been set.
    pub fn is_complete(&self) -> bool {
        self.grid.iter().all(Option::is_some)
    }

    fn resolve(&self, key: Option<TileKey>) -> Option<&Tile> {
        key.and_then(|k| self.dictionary.get(&k))
    }
}

/// Structural equality: same extents and the same tile at every cell.
/// Keys and unreferenced dictionary entries are ignored.
impl PartialEq for Map {
    fn eq(&self, other: &Self) -> bool {
        self.dimensions == other.dimensions
            && self
                .grid
                .iter()
                .zip(&other.grid)
                .all(|(a, b)| self.resolve(*a) == other.resolve(*b))
    }
}

impl Eq for Map {}

impl fmt::Debug for Map {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Map")
            .field("key_length", &self.key_length)
            .field("dimensions", &self.dimensions)
            .field("dictionary_len", &self.dictionary.len())
            .finish()
    }
}
