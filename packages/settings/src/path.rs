//! Settings paths and the tree walks that use them.
//!
//! A path is an ordered list of object keys, written dotted
//! (`security.aiFeatures`) at the edges. Reads only descend through objects;
//! writes create missing objects and replace non-object intermediates on the
//! way down, leaving every other branch untouched.

use std::fmt;

use serde_json::{Map, Value};

use crate::error::{Result, SettingsError};

#[derive(Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SettingsPath {
    segments: Vec<String>,
}

impl SettingsPath {
    /// The empty path, addressing the whole document.
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dotted path. The empty string is the root path.
    ///
    /// ```rust
    /// use tally_settings::SettingsPath;
    ///
    /// let path = SettingsPath::parse("preferences.theme").unwrap();
    /// assert_eq!(path.segments(), ["preferences", "theme"]);
    /// assert!(SettingsPath::parse("a..b").is_err());
    /// ```
    pub fn parse(dotted: &str) -> Result<Self> {
        if dotted.is_empty() {
            return Ok(Self::root());
        }
        dotted
            .split('.')
            .enumerate()
            .map(|(position, segment)| {
                if segment.is_empty() {
                    Err(SettingsError::InvalidPath {
                        message: format!("empty segment at position {} in '{}'", position, dotted),
                    })
                } else {
                    Ok(segment.to_string())
                }
            })
            .collect::<Result<Vec<_>>>()
            .map(|segments| Self { segments })
    }

    /// Accept either a dotted string or an array of string keys.
    pub fn from_json(value: &Value) -> Result<Self> {
        match value {
            Value::String(dotted) => Self::parse(dotted),
            Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    Value::String(key) if !key.is_empty() => Ok(key.clone()),
                    other => Err(SettingsError::InvalidPath {
                        message: format!("path keys must be non-empty strings, got {}", other),
                    }),
                })
                .collect::<Result<Vec<_>>>()
                .map(|segments| Self { segments }),
            other => Err(SettingsError::InvalidPath {
                message: format!("expected a dotted string or array of keys, got {}", other),
            }),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.segments.iter()
    }
}

impl<S: Into<String>> FromIterator<S> for SettingsPath {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            segments: iter.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Display for SettingsPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

/// Walk `path` through nested objects.
///
/// Returns `None` as soon as a key is missing or an intermediate value is
/// not an object. The root path yields the tree itself.
pub fn get_path<'a>(tree: &'a Value, path: &SettingsPath) -> Option<&'a Value> {
    path.iter()
        .try_fold(tree, |cursor, key| cursor.as_object()?.get(key))
}

/// Set `value` at `path`, creating intermediate objects as needed.
///
/// An intermediate that exists but is not an object is replaced by a fresh
/// object (last write wins). Siblings along the path are preserved.
pub fn set_path(tree: &mut Value, path: &SettingsPath, value: Value) -> Result<()> {
    let Some((leaf, parents)) = path.segments().split_last() else {
        return Err(SettingsError::InvalidPath {
            message: "cannot set a value at the root path".to_string(),
        });
    };

    let mut cursor = ensure_object(tree, "<root>");
    for key in parents {
        let child = cursor
            .entry(key.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        cursor = ensure_object(child, key);
    }
    cursor.insert(leaf.clone(), value);
    Ok(())
}

fn ensure_object<'a>(value: &'a mut Value, key: &str) -> &'a mut Map<String, Value> {
    if !value.is_object() {
        tracing::debug!(key, replaced = type_name(value), "replacing non-object intermediate");
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just made an object"),
    }
}

pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
