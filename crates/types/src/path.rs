//! Field paths addressing nodes of a form data tree.
//!
//! A path is the chain of field names and array item ids from the root model
//! down to one field. Its DOM id joins the segments with `-`
//! (`stores-0-bike_stock-1-bike`); the same string is what declarative event
//! bindings carry back, so the renderer and the data store share one scheme.
//! Field names containing `-` or `%`, or made only of digits, are escaped so
//! ids parse back unambiguously.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::form::ItemId;

/// Separator between segments of a DOM id.
pub const PATH_SEPARATOR: char = '-';

/// One step of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathSegment {
    /// Named field of an object, nested model, or selected union variant.
    Field(String),
    /// Array item addressed by its stable id.
    Item(ItemId),
}

/// Errors surfaced when parsing a DOM id back into a path.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathParseError {
    #[error("path '{0}' contains an empty segment")]
    EmptySegment(String),
    #[error("path '{0}' contains an invalid escape sequence")]
    InvalidEscape(String),
}

/// Address of a field inside a schema's form data tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// The empty path addressing the root model.
    pub fn root() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<PathSegment>) -> Self {
        Self { segments }
    }

    /// Returns a child path for a named field.
    pub fn field(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Field(name.to_string()));
        Self { segments }
    }

    /// Returns a child path for an array item.
    pub fn item(&self, id: ItemId) -> Self {
        let mut segments = self.segments.clone();
        segments.push(PathSegment::Item(id));
        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn last(&self) -> Option<&PathSegment> {
        self.segments.last()
    }

    /// Name of the trailing field segment, if the path ends in one.
    pub fn last_field(&self) -> Option<&str> {
        match self.segments.last() {
            Some(PathSegment::Field(name)) => Some(name),
            _ => None,
        }
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// DOM id for the node at this path; empty for the root.
    pub fn dom_id(&self) -> String {
        self.segments
            .iter()
            .map(|segment| match segment {
                PathSegment::Field(name) => escape_field_name(name),
                PathSegment::Item(id) => id.to_string(),
            })
            .collect::<Vec<_>>()
            .join(&PATH_SEPARATOR.to_string())
    }

    /// Composite key `{schema}::{dom id}` used by the field cache.
    pub fn cache_key(&self, schema_name: &str) -> String {
        format!("{}::{}", schema_name, self.dom_id())
    }

    /// Parses a DOM id produced by [`FieldPath::dom_id`].
    pub fn parse(dom_id: &str) -> Result<Self, PathParseError> {
        if dom_id.is_empty() {
            return Ok(Self::root());
        }
        let mut segments = Vec::new();
        for raw in dom_id.split(PATH_SEPARATOR) {
            if raw.is_empty() {
                return Err(PathParseError::EmptySegment(dom_id.to_string()));
            }
            if raw.bytes().all(|byte| byte.is_ascii_digit())
                && let Ok(id) = raw.parse::<u64>()
            {
                segments.push(PathSegment::Item(ItemId(id)));
                continue;
            }
            let name = unescape_field_name(raw).ok_or_else(|| PathParseError::InvalidEscape(dom_id.to_string()))?;
            segments.push(PathSegment::Field(name));
        }
        Ok(Self { segments })
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.dom_id())
        }
    }
}

fn escape_field_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    let all_digits = !name.is_empty() && name.bytes().all(|byte| byte.is_ascii_digit());
    for (index, character) in name.chars().enumerate() {
        match character {
            '%' => escaped.push_str("%25"),
            '-' => escaped.push_str("%2D"),
            digit if all_digits && index == 0 => escaped.push_str(&format!("%{:02X}", digit as u32)),
            other => escaped.push(other),
        }
    }
    escaped
}

fn unescape_field_name(raw: &str) -> Option<String> {
    let mut name = String::with_capacity(raw.len());
    let mut characters = raw.chars();
    while let Some(character) = characters.next() {
        if character != '%' {
            name.push(character);
            continue;
        }
        let high = characters.next()?;
        let low = characters.next()?;
        let code = u8::from_str_radix(&format!("{high}{low}"), 16).ok()?;
        name.push(char::from(code));
    }
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_composite_dom_ids() {
        let path = FieldPath::root()
            .field("stores")
            .item(ItemId(0))
            .field("bike_stock")
            .item(ItemId(3))
            .field("bike");
        assert_eq!(path.dom_id(), "stores-0-bike_stock-3-bike");
        assert_eq!(path.cache_key("bike_shop"), "bike_shop::stores-0-bike_stock-3-bike");
        assert_eq!(FieldPath::parse(&path.dom_id()).unwrap(), path);
    }

    #[test]
    fn sibling_names_at_different_depths_do_not_collide() {
        let top = FieldPath::root().field("name");
        let nested = FieldPath::root().field("owner").field("name");
        assert_ne!(top.dom_id(), nested.dom_id());
    }

    #[test]
    fn escapes_separator_and_numeric_field_names() {
        let path = FieldPath::root().field("first-name").field("2024").field("50%");
        let id = path.dom_id();
        assert_eq!(id, "first%2Dname-%32024-50%25");
        assert_eq!(FieldPath::parse(&id).unwrap(), path);
    }

    #[test]
    fn rejects_malformed_ids() {
        assert!(matches!(FieldPath::parse("a--b"), Err(PathParseError::EmptySegment(_))));
        assert!(matches!(FieldPath::parse("a%2"), Err(PathParseError::InvalidEscape(_))));
        assert!(FieldPath::parse("").unwrap().is_root());
    }

    #[test]
    fn parent_and_last_field() {
        let path = FieldPath::root().field("stores").item(ItemId(1));
        assert_eq!(path.last(), Some(&PathSegment::Item(ItemId(1))));
        assert_eq!(path.parent().unwrap().last_field(), Some("stores"));
        assert!(FieldPath::root().parent().is_none());
    }
}
