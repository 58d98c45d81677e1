use std::fmt;

use serde::{Deserialize, Serialize};

/// Type-path roots that the map format knows about.
///
/// Anything outside these families is still accepted (as a movable) but is
/// reported by [`Atom::is_recognized`].
const KNOWN_ROOTS: &[&str] = &["/obj", "/mob", "/turf", "/area", "/atom", "/datum"];

/// Returns `true` if `path` is `root` itself or a subtype of it.
fn in_family(path: &str, root: &str) -> bool {
    match path.strip_prefix(root) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}

/// The layer an atom occupies within a tile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AtomKind {
    /// Objects, mobs and anything else that is not a turf or an area.
    Movable,
    /// The floor/wall layer.
    Turf,
    /// The zone layer.
    Area,
}

impl AtomKind {
    /// Classify a type-path by its family prefix.
    pub fn of_path(path: &str) -> Self {
        if in_family(path, "/turf") {
            Self::Turf
        } else if in_family(path, "/area") {
            Self::Area
        } else {
            Self::Movable
        }
    }
}

impl fmt::Display for AtomKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Movable => write!(f, "movable"),
            Self::Turf => write!(f, "turf"),
            Self::Area => write!(f, "area"),
        }
    }
}

/// A literal variable assignment on an atom, e.g. `name = "crate"`.
///
/// `value` is kept as the raw literal text from the map file (quotes
/// included for strings), so equality is exact textual equality.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Var {
    pub name: String,
    pub value: String,
}

impl Var {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// A variable holding a string literal; `text` is quoted and escaped.
    pub fn string(name: impl Into<String>, text: &str) -> Self {
        Self::new(name, escape_string(text))
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.value)
    }
}

/// Quote `text` as a map-format string literal.
///
/// Backslashes, double quotes and opening brackets (which would otherwise
/// start an embedded expression) are escaped.
pub fn escape_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for ch in text.chars() {
        match ch {
            '\\' | '"' | '[' => {
                out.push('\\');
                out.push(ch);
            }
            '\n' => out.push_str("\\n"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

/// A single placed object declaration: a type-path plus optional literal
/// variable overrides.
///
/// The layer ([`AtomKind`]) is derived from the path once, at construction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Atom {
    path: String,
    vars: Vec<Var>,
    kind: AtomKind,
}

impl Atom {
    /// An atom with no variable overrides.
    pub fn new(path: impl Into<String>) -> Self {
        Self::with_vars(path, Vec::new())
    }

    pub fn with_vars(path: impl Into<String>, vars: Vec<Var>) -> Self {
        let path = path.into();
        let kind = AtomKind::of_path(&path);
        Self { path, vars, kind }
    }

    /// Builder-style variable append.
    pub fn var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.push(Var::new(name, value));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn vars(&self) -> &[Var] {
        &self.vars
    }

    pub fn kind(&self) -> AtomKind {
        self.kind
    }

    /// Look up a variable's raw literal by name.
    pub fn get_var(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.value.as_str())
    }

    /// Returns `true` if the path belongs to a known type family.
    ///
    /// Unrecognised atoms (including an empty path) are still treated as
    /// movables.
    pub fn is_recognized(&self) -> bool {
        KNOWN_ROOTS.iter().any(|root| in_family(&self.path, root))
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path)?;
        if self.vars.is_empty() {
            return Ok(());
        }
        f.write_str("{")?;
        for (i, var) in self.vars.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{var}")?;
        }
        f.write_str("}")
    }
}
