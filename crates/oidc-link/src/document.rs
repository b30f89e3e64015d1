//! Claims and userinfo document model.
//!
//! Both the claims decoded from the ID token and the document returned by the
//! userinfo endpoint are represented as a [`Document`]: a tagged tree of
//! mappings, sequences and scalars. Mapping keys come in two equivalent forms
//! ([`DocumentKey::Text`] and [`DocumentKey::Symbol`]); upstreams are free to
//! use either one, so lookups always try both.
//!
//! # Example
//!
//! ```ignore
//! use oidc_link::document::Document;
//! use serde_json::json;
//!
//! let claims = Document::from(json!({"email": "a@example.com"}));
//! assert_eq!(claims.get("email").and_then(Document::as_str), Some("a@example.com"));
//! ```

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A key in a [`Mapping`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DocumentKey {
    /// Plain string key, as produced by JSON decoding.
    Text(String),

    /// Interned claim name, as produced by upstreams that symbolize keys.
    Symbol(String),
}

impl DocumentKey {
    /// Creates a plain string key.
    #[must_use]
    pub fn text(name: impl Into<String>) -> Self {
        Self::Text(name.into())
    }

    /// Creates a symbolic key.
    #[must_use]
    pub fn symbol(name: impl Into<String>) -> Self {
        Self::Symbol(name.into())
    }

    /// Returns the key name regardless of its form.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Text(name) | Self::Symbol(name) => name,
        }
    }
}

/// A scalar leaf value.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    /// Boolean value.
    Bool(bool),
    /// Numeric value.
    Number(serde_json::Number),
    /// String value.
    String(String),
}

/// An ordered mapping from [`DocumentKey`] to [`Document`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mapping {
    entries: IndexMap<DocumentKey, Document>,
}

impl Mapping {
    /// Creates an empty mapping.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a value, returning the previous value for the same key.
    pub fn insert(&mut self, key: DocumentKey, value: Document) -> Option<Document> {
        self.entries.insert(key, value)
    }

    /// Looks up `name`, first as a text key and then as a symbolic key.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Document> {
        self.entries
            .get(&DocumentKey::Text(name.to_string()))
            .or_else(|| self.entries.get(&DocumentKey::Symbol(name.to_string())))
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the mapping has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&DocumentKey, &Document)> {
        self.entries.iter()
    }
}

impl FromIterator<(DocumentKey, Document)> for Mapping {
    fn from_iter<I: IntoIterator<Item = (DocumentKey, Document)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A claims or userinfo document.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Document {
    /// No value (JSON `null`, or nothing at all).
    #[default]
    Absent,
    /// A scalar leaf.
    Scalar(Scalar),
    /// An ordered sequence.
    Sequence(Vec<Document>),
    /// A keyed mapping.
    Mapping(Mapping),
}

impl Document {
    /// Returns `true` if this is [`Document::Absent`].
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// Returns `true` if the value carries no usable data.
    ///
    /// Absent values, empty or whitespace-only strings, empty sequences and
    /// empty mappings are blank. Numbers and booleans never are.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Absent => true,
            Self::Scalar(Scalar::String(s)) => s.trim().is_empty(),
            Self::Scalar(_) => false,
            Self::Sequence(items) => items.is_empty(),
            Self::Mapping(mapping) => mapping.is_empty(),
        }
    }

    /// Returns the mapping if this document is one.
    #[must_use]
    pub fn as_mapping(&self) -> Option<&Mapping> {
        match self {
            Self::Mapping(mapping) => Some(mapping),
            _ => None,
        }
    }

    /// Returns the items if this document is a sequence.
    #[must_use]
    pub fn as_sequence(&self) -> Option<&[Document]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the string if this document is a string scalar.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Looks up a key when this document is a mapping.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Document> {
        self.as_mapping().and_then(|mapping| mapping.get(name))
    }

    /// Renders a scalar as a string.
    ///
    /// Numeric subject identifiers are common, so numbers and booleans are
    /// rendered too. Sequences, mappings and absent values yield `None`.
    #[must_use]
    pub fn to_scalar_string(&self) -> Option<String> {
        match self {
            Self::Scalar(Scalar::String(s)) => Some(s.clone()),
            Self::Scalar(Scalar::Number(n)) => Some(n.to_string()),
            Self::Scalar(Scalar::Bool(b)) => Some(b.to_string()),
            _ => None,
        }
    }

    /// Rewrites every mapping key into its symbolic form.
    #[must_use]
    pub fn symbolize(self) -> Self {
        match self {
            Self::Mapping(mapping) => Self::Mapping(
                mapping
                    .entries
                    .into_iter()
                    .map(|(key, value)| {
                        let name = match key {
                            DocumentKey::Text(name) | DocumentKey::Symbol(name) => name,
                        };
                        (DocumentKey::Symbol(name), value.symbolize())
                    })
                    .collect(),
            ),
            Self::Sequence(items) => {
                Self::Sequence(items.into_iter().map(Self::symbolize).collect())
            }
            other => other,
        }
    }

    /// Converts the document back into JSON. Both key forms become object keys.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            Self::Absent => Value::Null,
            Self::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            Self::Scalar(Scalar::Number(n)) => Value::Number(n.clone()),
            Self::Scalar(Scalar::String(s)) => Value::String(s.clone()),
            Self::Sequence(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            Self::Mapping(mapping) => Value::Object(
                mapping
                    .iter()
                    .map(|(key, value)| (key.name().to_string(), value.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Document {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;

        match value {
            Value::Null => Self::Absent,
            Value::Bool(b) => Self::Scalar(Scalar::Bool(b)),
            Value::Number(n) => Self::Scalar(Scalar::Number(n)),
            Value::String(s) => Self::Scalar(Scalar::String(s)),
            Value::Array(items) => Self::Sequence(items.into_iter().map(Self::from).collect()),
            Value::Object(object) => Self::Mapping(
                object
                    .into_iter()
                    .map(|(key, value)| (DocumentKey::Text(key), Self::from(value)))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Document {
    fn from(value: &str) -> Self {
        Self::Scalar(Scalar::String(value.to_string()))
    }
}

impl From<String> for Document {
    fn from(value: String) -> Self {
        Self::Scalar(Scalar::String(value))
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl Serialize for Document {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Document {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::from)
    }
}
