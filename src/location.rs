use std::collections::BTreeMap;

use crate::Location;

/// Maps the JSON pointer of a change to a position in the source text of one document.
///
/// Parsing is not this crate's business, so whoever parses the documents can hand a provider
/// per side to [`crate::DiffOptions`]. A missing mapping leaves [`crate::Change::location`] unset.
pub trait LocationProvider {
    /// Look up the position of the value at `path` (a JSON pointer, `""` for the root).
    fn locate(&self, path: &str) -> Option<Location>;
}

impl<F> LocationProvider for F
where
    F: Fn(&str) -> Option<Location>,
{
    fn locate(&self, path: &str) -> Option<Location> {
        self(path)
    }
}

/// A [`LocationProvider`] backed by an explicit table of pointers for one file.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    file: Option<String>,
    positions: BTreeMap<String, (usize, usize)>,
}

impl SourceMap {
    /// Create an empty map for `file`.
    pub fn new(file: Option<String>) -> Self {
        Self {
            file,
            positions: BTreeMap::new(),
        }
    }

    /// Register the 1-based `line` and `column` of the value at `path`.
    pub fn insert(&mut self, path: impl Into<String>, line: usize, column: usize) -> &mut Self {
        self.positions.insert(path.into(), (line, column));
        self
    }

    /// Number of registered positions.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Whether no position has been registered.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl LocationProvider for SourceMap {
    fn locate(&self, path: &str) -> Option<Location> {
        let (line, column) = *self.positions.get(path)?;
        Some(Location {
            line,
            column,
            file: self.file.clone(),
        })
    }
}

/// Append one reference token to a JSON pointer, escaping it per RFC 6901.
pub(crate) fn child_path(path: &str, token: &str) -> String {
    let mut out = String::with_capacity(path.len() + token.len() + 1);
    out.push_str(path);
    out.push('/');
    for c in token.chars() {
        match c {
            '~' => out.push_str("~0"),
            '/' => out.push_str("~1"),
            c => out.push(c),
        }
    }
    out
}

/// Escape a single reference token per RFC 6901.
pub(crate) fn escape_token(token: &str) -> String {
    child_path("", token)[1..].to_owned()
}
