//! Map text → [`Map`].
//!
//! Accepts both the standard DMM layout (single-line dictionary entries, one
//! grid block per z-level) and the TGM layout (multi-line entries, one grid
//! block per column). Any problem aborts the whole parse.

use std::collections::HashMap;

use dmmdiff_map::{Interned, Map, TileKey};
use dmmdiff_types::{Atom, Coord, Dimensions, Tile, Var};

use crate::error::{CodecResult, FormatError, FormatErrorKind};
use crate::scan::{scan_top_level, split_top_level};

/// Parse map text into a [`Map`].
pub fn parse(text: &str) -> CodecResult<Map> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut parser = Parser::new(text);
    parser.run()?;
    parser.finish()
}

/// Parse one dictionary entry body (the text between the parentheses).
pub fn parse_tile(body: &str) -> Result<Tile, String> {
    split_top_level(body, ',')
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(parse_atom)
        .collect::<Result<Vec<_>, _>>()
        .map(Tile::new)
}

/// Parse a single atom declaration such as `/obj/item{name = "x"; dir = 4}`.
pub fn parse_atom(text: &str) -> Result<Atom, String> {
    let text = text.trim();
    if text.is_empty() {
        return Err("empty atom declaration".into());
    }
    let (path, vars) = match text.find('{') {
        None => (text, Vec::new()),
        Some(open) => {
            let block = text[open + 1..]
                .strip_suffix('}')
                .ok_or_else(|| format!("unterminated variable block in {text:?}"))?;
            (text[..open].trim(), parse_vars(block)?)
        }
    };
    if path.is_empty() || path.contains(|c: char| c.is_whitespace() || c == '"') {
        return Err(format!("invalid type path {path:?}"));
    }
    Ok(Atom::with_vars(path, vars))
}

fn parse_vars(block: &str) -> Result<Vec<Var>, String> {
    split_top_level(block, ';')
        .map_err(|e| e.to_string())?
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|assignment| {
            let (name, value) = assignment
                .split_once('=')
                .ok_or_else(|| format!("expected `name = value`, found {assignment:?}"))?;
            let (name, value) = (name.trim(), value.trim());
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
                return Err(format!("invalid variable name {name:?}"));
            }
            if value.is_empty() {
                return Err(format!("variable {name:?} has no value"));
            }
            Ok(Var::new(name, value))
        })
        .collect()
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    /// Byte offset at which each line starts.
    line_starts: Vec<usize>,
    key_length: Option<usize>,
    entries: Vec<(TileKey, Tile)>,
    defined: HashMap<TileKey, usize>,
    cells: HashMap<Coord, TileKey>,
    extent: (u32, u32, u32),
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(src.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            src,
            pos: 0,
            line_starts,
            key_length: None,
            entries: Vec::new(),
            defined: HashMap::new(),
            cells: HashMap::new(),
            extent: (0, 0, 0),
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    /// 1-based line containing byte offset `pos`.
    fn line_at(&self, pos: usize) -> usize {
        self.line_starts.partition_point(|&start| start <= pos)
    }

    fn error(&self, kind: FormatErrorKind) -> FormatError {
        FormatError::at(self.line_at(self.pos), kind)
    }

    /// Skip whitespace and comments between top-level items.
    fn skip_trivia(&mut self) -> Result<(), FormatError> {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();
            if trimmed.starts_with("//") {
                self.pos += trimmed.find('\n').map_or(trimmed.len(), |i| i + 1);
            } else if trimmed.starts_with("/*") {
                let end = trimmed
                    .find("*/")
                    .ok_or_else(|| self.error(FormatErrorKind::UnexpectedEof("comment")))?;
                self.pos += end + 2;
            } else {
                return Ok(());
            }
        }
    }

    fn expect(&mut self, token: char) -> Result<(), FormatError> {
        let rest = self.rest();
        let trimmed = rest.trim_start();
        self.pos += rest.len() - trimmed.len();
        if !trimmed.starts_with(token) {
            return Err(self.error(FormatErrorKind::MalformedEntry(format!(
                "expected `{token}`"
            ))));
        }
        self.pos += token.len_utf8();
        Ok(())
    }

    fn run(&mut self) -> Result<(), FormatError> {
        loop {
            self.skip_trivia()?;
            match self.rest().chars().next() {
                None => return Ok(()),
                Some('"') => {
                    if !self.cells.is_empty() {
                        return Err(self.error(FormatErrorKind::MalformedEntry(
                            "dictionary entry after the grid".into(),
                        )));
                    }
                    self.parse_entry()?;
                }
                Some('(') => self.parse_block()?,
                Some(other) => {
                    return Err(self.error(FormatErrorKind::MalformedEntry(format!(
                        "unexpected character {other:?}"
                    ))))
                }
            }
        }
    }

    /// `"key" = (atom,atom,...)`
    fn parse_entry(&mut self) -> Result<(), FormatError> {
        let line = self.line_at(self.pos);
        self.pos += 1;

        let rest = self.rest();
        let end = rest
            .find(|c: char| c == '"' || c == '\n')
            .ok_or_else(|| FormatError::at(line, FormatErrorKind::UnexpectedEof("dictionary key")))?;
        if !rest[end..].starts_with('"') {
            return Err(FormatError::at(
                line,
                FormatErrorKind::MalformedEntry("unterminated key".into()),
            ));
        }
        let key_text = &rest[..end];
        self.pos += end + 1;

        let key = TileKey::parse(key_text)
            .map_err(|_| FormatError::at(line, FormatErrorKind::InvalidKey(key_text.into())))?;
        match self.key_length {
            None => self.key_length = Some(key_text.len()),
            Some(expected) if expected != key_text.len() => {
                return Err(FormatError::at(
                    line,
                    FormatErrorKind::KeyWidthMismatch {
                        key: key_text.into(),
                        expected,
                    },
                ));
            }
            Some(_) => {}
        }
        if self.defined.contains_key(&key) {
            return Err(FormatError::at(
                line,
                FormatErrorKind::DuplicateKey(key_text.into()),
            ));
        }

        self.expect('=')?;
        self.expect('(')?;

        let rest = self.rest();
        let end = scan_top_level(rest, |_, c| c == ')')
            .map_err(|e| FormatError::at(line, FormatErrorKind::MalformedEntry(e.to_string())))?
            .ok_or_else(|| {
                FormatError::at(line, FormatErrorKind::UnexpectedEof("dictionary entry"))
            })?;
        let tile = parse_tile(&rest[..end])
            .map_err(|reason| FormatError::at(line, FormatErrorKind::MalformedEntry(reason)))?;
        self.pos += end + 1;

        self.defined.insert(key, line);
        self.entries.push((key, tile));
        Ok(())
    }

    /// `(x,y,z) = {"` newline, rows of keys, `"}`
    fn parse_block(&mut self) -> Result<(), FormatError> {
        let line = self.line_at(self.pos);
        self.pos += 1;

        let rest = self.rest();
        let close = rest
            .find(')')
            .ok_or_else(|| FormatError::at(line, FormatErrorKind::UnexpectedEof("grid coordinate")))?;
        let origin_text = &rest[..close];
        let origin = parse_origin(origin_text).ok_or_else(|| {
            FormatError::at(line, FormatErrorKind::InvalidCoordinate(origin_text.into()))
        })?;
        self.pos += close + 1;

        self.expect('=')?;
        self.expect('{')?;
        if !self.rest().starts_with('"') {
            return Err(self.error(FormatErrorKind::MalformedEntry(
                "expected `\"` to open a grid block".into(),
            )));
        }
        self.pos += 1;
        let content_line = self.line_at(self.pos);

        let rest = self.rest();
        let end = rest
            .find("\"}")
            .ok_or_else(|| FormatError::at(line, FormatErrorKind::UnexpectedEof("grid block")))?;
        let content = &rest[..end];
        self.pos += end + 2;

        let key_length = self
            .key_length
            .ok_or_else(|| FormatError::at(line, FormatErrorKind::EmptyDictionary))?;

        let mut rows: Vec<&str> = content
            .split('\n')
            .map(|r| r.strip_suffix('\r').unwrap_or(r))
            .collect();
        let mut first_row_line = content_line;
        if rows.first() == Some(&"") {
            rows.remove(0);
            first_row_line += 1;
        }
        if rows.last() == Some(&"") {
            rows.pop();
        }

        for (dy, row) in rows.iter().enumerate() {
            let row_line = first_row_line + dy;
            if !row.is_ascii() {
                return Err(FormatError::at(row_line, FormatErrorKind::InvalidKey((*row).into())));
            }
            if row.len() % key_length != 0 {
                return Err(FormatError::at(
                    row_line,
                    FormatErrorKind::RowLength {
                        length: row.len(),
                        key_length,
                    },
                ));
            }
            for dx in 0..row.len() / key_length {
                let text = &row[dx * key_length..(dx + 1) * key_length];
                let key = TileKey::parse(text)
                    .map_err(|_| FormatError::at(row_line, FormatErrorKind::InvalidKey(text.into())))?;
                if !self.defined.contains_key(&key) {
                    return Err(FormatError::at(row_line, FormatErrorKind::DanglingKey(text.into())));
                }
                let coord = offset(origin, dx, dy).ok_or_else(|| {
                    FormatError::at(row_line, FormatErrorKind::InvalidCoordinate(origin_text.into()))
                })?;
                if self.cells.insert(coord, key).is_some() {
                    return Err(FormatError::at(row_line, FormatErrorKind::OverlappingCell(coord)));
                }
                self.extent = (
                    self.extent.0.max(coord.x),
                    self.extent.1.max(coord.y),
                    self.extent.2.max(coord.z),
                );
            }
        }
        Ok(())
    }

    fn finish(self) -> CodecResult<Map> {
        let key_length = self
            .key_length
            .ok_or_else(|| FormatError::new(FormatErrorKind::EmptyDictionary))?;
        if self.cells.is_empty() {
            return Err(FormatError::new(FormatErrorKind::MissingGrid).into());
        }
        let (x, y, z) = self.extent;
        let dimensions = Dimensions::new(x, y, z).map_err(|e| {
            FormatError::new(FormatErrorKind::InvalidCoordinate(e.to_string()))
        })?;
        if self.cells.len() != dimensions.cell_count() {
            if let Some(missing) = dimensions.coords().find(|c| !self.cells.contains_key(c)) {
                return Err(FormatError::new(FormatErrorKind::IncompleteGrid(missing)).into());
            }
        }

        let mut map = Map::new(key_length, dimensions)?;
        let mut aliases = HashMap::new();
        for (key, tile) in self.entries {
            if let Interned::Existing(canonical) = map.insert_definition(key, tile)? {
                aliases.insert(key, canonical);
            }
        }
        for (coord, key) in self.cells {
            map.bind(coord, aliases.get(&key).copied().unwrap_or(key))?;
        }
        Ok(map)
    }
}

fn parse_origin(text: &str) -> Option<Coord> {
    let mut parts = text.split(',').map(|p| p.trim().parse::<u32>().ok());
    let (x, y, z) = (parts.next()??, parts.next()??, parts.next()??);
    if parts.next().is_some() || x == 0 || y == 0 || z == 0 {
        return None;
    }
    Some(Coord::new(x, y, z))
}

fn offset(origin: Coord, dx: usize, dy: usize) -> Option<Coord> {
    let x = origin.x.checked_add(u32::try_from(dx).ok()?)?;
    let y = origin.y.checked_add(u32::try_from(dy).ok()?)?;
    Some(Coord::new(x, y, origin.z))
}
