//! Wire-level record representation exchanged with the backing store.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

/// A stored record: attribute name to wire value.
pub type Item = HashMap<String, AttributeValue>;

/// Attribute value as the backing store understands it.
///
/// Numbers travel as canonical decimal text so that values are hashable and
/// compare exactly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeValue {
    S(String),
    N(String),
    Bool(bool),
    Ss(BTreeSet<String>),
    Ns(BTreeSet<String>),
    Null,
}

impl AttributeValue {
    /// Short wire type tag.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Self::S(_) => "S",
            Self::N(_) => "N",
            Self::Bool(_) => "BOOL",
            Self::Ss(_) => "SS",
            Self::Ns(_) => "NS",
            Self::Null => "NULL",
        }
    }

    /// Returns `true` for the two set variants.
    pub fn is_set(&self) -> bool {
        matches!(self, Self::Ss(_) | Self::Ns(_))
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S(s) => write!(f, "{s}"),
            Self::N(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Ss(set) | Self::Ns(set) => {
                let parts: Vec<&str> = set.iter().map(String::as_str).collect();
                write!(f, "{{{}}}", parts.join(","))
            }
            Self::Null => write!(f, "null"),
        }
    }
}

/// Identity of a record inside its table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PrimaryKey {
    /// Hash (partition) key value
    pub hash: AttributeValue,
    /// Range key value, when the table declares one
    pub range: Option<AttributeValue>,
}

impl PrimaryKey {
    /// Creates a hash-only key.
    pub fn hash(hash: AttributeValue) -> Self {
        Self { hash, range: None }
    }

    /// Creates a hash + range key.
    pub fn composite(hash: AttributeValue, range: AttributeValue) -> Self {
        Self {
            hash,
            range: Some(range),
        }
    }

    /// Reads the key out of a record using the table's key attribute names.
    ///
    /// Returns `None` when the record lacks one of the key attributes.
    pub fn from_item(item: &Item, hash_name: &str, range_name: Option<&str>) -> Option<Self> {
        let hash = item.get(hash_name)?.clone();
        let range = match range_name {
            Some(name) => Some(item.get(name)?.clone()),
            None => None,
        };
        Some(Self { hash, range })
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.range {
            Some(range) => write!(f, "{}/{}", self.hash, range),
            None => write!(f, "{}", self.hash),
        }
    }
}
