#![forbid(unsafe_code)]

//! Accessor paths into the JSON form of a boxed value.
//!
//! A [`Path`] is an ordered list of [`PathSegment`]s. It can be parsed from
//! the usual accessor syntax:
//!
//! ```
//! use valbox_core::path::{Path, PathSegment};
//!
//! let path = Path::parse("users[0].name");
//! assert_eq!(
//!     path.segments(),
//!     &[
//!         PathSegment::Key("users".into()),
//!         PathSegment::Index(0),
//!         PathSegment::Key("name".into()),
//!     ]
//! );
//! ```
//!
//! Dotted numeric keys (`"items.0"`) stay keys, but lookup treats a numeric
//! key on a sequence as an index, so `"items.0"` and `"items[0]"` reach the
//! same element. An empty path addresses the whole value.

use std::fmt;

use serde_json::Value;

/// One step of a [`Path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl PathSegment {
    fn step<'a>(&self, value: &'a Value) -> Option<&'a Value> {
        match (self, value) {
            (Self::Key(key), Value::Object(map)) => map.get(key),
            (Self::Key(key), Value::Array(items)) => {
                key.parse::<usize>().ok().and_then(|i| items.get(i))
            }
            (Self::Index(index), Value::Array(items)) => items.get(*index),
            (Self::Index(index), Value::Object(map)) => map.get(&index.to_string()),
            _ => None,
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_owned())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        Self::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// An ordered accessor path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    /// The empty path, addressing the whole value.
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse accessor syntax: `a.b`, `a[0]`, `a["x.y"]`, `a.0`.
    ///
    /// Parsing never fails. An unterminated `[` is kept as part of the key.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let mut segments = Vec::new();
        let mut key = String::new();
        let mut after_bracket = false;
        let mut last_was_dot = false;
        let mut chars = input.chars();

        while let Some(ch) = chars.next() {
            last_was_dot = false;
            match ch {
                '.' => {
                    if !after_bracket {
                        segments.push(PathSegment::Key(std::mem::take(&mut key)));
                    }
                    after_bracket = false;
                    last_was_dot = true;
                }
                '[' => {
                    let mut inner = String::new();
                    let mut closed = false;
                    for c in chars.by_ref() {
                        if c == ']' {
                            closed = true;
                            break;
                        }
                        inner.push(c);
                    }
                    if !closed {
                        key.push('[');
                        key.push_str(&inner);
                        after_bracket = false;
                        continue;
                    }
                    if !key.is_empty() {
                        segments.push(PathSegment::Key(std::mem::take(&mut key)));
                    }
                    segments.push(bracket_segment(&inner));
                    after_bracket = true;
                }
                _ => {
                    key.push(ch);
                    after_bracket = false;
                }
            }
        }
        if !key.is_empty() || last_was_dot {
            segments.push(PathSegment::Key(key));
        }
        Self { segments }
    }

    #[must_use]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Append a segment, returning the extended path.
    #[must_use]
    pub fn join(mut self, segment: impl Into<PathSegment>) -> Self {
        self.segments.push(segment.into());
        self
    }

    /// Walk the path from `root`. `None` when any segment is absent.
    #[must_use]
    pub fn lookup<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |value, segment| segment.step(value))
    }
}

fn bracket_segment(inner: &str) -> PathSegment {
    let inner = inner.trim();
    let quoted = inner.len() >= 2
        && ((inner.starts_with('"') && inner.ends_with('"'))
            || (inner.starts_with('\'') && inner.ends_with('\'')));
    if quoted {
        return PathSegment::Key(inner[1..inner.len() - 1].to_owned());
    }
    match inner.parse::<usize>() {
        Ok(index) => PathSegment::Index(index),
        Err(_) => PathSegment::Key(inner.to_owned()),
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Key(key) if i == 0 => f.write_str(key)?,
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(input: &str) -> Self {
        Self::parse(input)
    }
}

impl From<String> for Path {
    fn from(input: String) -> Self {
        Self::parse(&input)
    }
}

impl From<&Path> for Path {
    fn from(path: &Path) -> Self {
        path.clone()
    }
}

impl From<Vec<PathSegment>> for Path {
    fn from(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }
}

impl From<&[PathSegment]> for Path {
    fn from(segments: &[PathSegment]) -> Self {
        Self {
            segments: segments.to_vec(),
        }
    }
}

impl From<&[&str]> for Path {
    fn from(keys: &[&str]) -> Self {
        keys.iter().copied().map(PathSegment::from).collect()
    }
}

impl<const N: usize> From<[&str; N]> for Path {
    fn from(keys: [&str; N]) -> Self {
        keys.into_iter().map(PathSegment::from).collect()
    }
}

impl FromIterator<PathSegment> for Path {
    fn from_iter<I: IntoIterator<Item = PathSegment>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().collect(),
        }
    }
}
