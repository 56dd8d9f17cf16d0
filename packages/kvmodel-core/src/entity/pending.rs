//! Per-field pending operations awaiting the next partial write.

use crate::store::AttributeUpdate;
use crate::types::AttributeValue;

/// Change recorded against one field of a stored entity.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum PendingOp {
    /// Field unchanged since the last load or save
    #[default]
    None,
    /// Overwrite with a new value
    Replace(AttributeValue),
    /// Remove the attribute
    Delete,
    /// Add members to a set
    Add(AttributeValue),
    /// Remove members from a set
    Remove(AttributeValue),
}

impl PendingOp {
    /// Short name, used in conflict errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::None => "nothing",
            Self::Replace(_) => "replace",
            Self::Delete => "delete",
            Self::Add(_) => "set add",
            Self::Remove(_) => "set remove",
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    /// Records a whole-value assignment; `None` deletes the attribute.
    ///
    /// Returns the kind of the conflicting pending op when a set delta is
    /// already staged.
    pub(crate) fn record_assign(&mut self, value: Option<AttributeValue>) -> Result<(), &'static str> {
        match self {
            Self::Add(_) | Self::Remove(_) => Err(self.kind()),
            _ => {
                *self = match value {
                    Some(value) => Self::Replace(value),
                    None => Self::Delete,
                };
                Ok(())
            }
        }
    }

    /// Records a set addition, merging with an earlier addition.
    pub(crate) fn record_add(&mut self, delta: AttributeValue) -> Result<(), &'static str> {
        match self {
            Self::None => {
                *self = Self::Add(delta);
                Ok(())
            }
            Self::Add(current) => merge_sets(current, delta).ok_or("set add"),
            _ => Err(self.kind()),
        }
    }

    /// Records a set removal, merging with an earlier removal.
    pub(crate) fn record_remove(&mut self, delta: AttributeValue) -> Result<(), &'static str> {
        match self {
            Self::None => {
                *self = Self::Remove(delta);
                Ok(())
            }
            Self::Remove(current) => merge_sets(current, delta).ok_or("set remove"),
            _ => Err(self.kind()),
        }
    }

    /// Update verb carrying this op, if any.
    pub fn to_update(&self, name: &str) -> Option<AttributeUpdate> {
        let name = name.to_string();
        match self {
            Self::None => None,
            Self::Replace(value) => Some(AttributeUpdate::Put {
                name,
                value: value.clone(),
            }),
            Self::Delete => Some(AttributeUpdate::Delete { name }),
            Self::Add(value) => Some(AttributeUpdate::Add {
                name,
                value: value.clone(),
            }),
            Self::Remove(value) => Some(AttributeUpdate::DeleteFromSet {
                name,
                value: value.clone(),
            }),
        }
    }
}

/// Unions `delta` into `current`. Returns `None` if the set kinds differ.
fn merge_sets(current: &mut AttributeValue, delta: AttributeValue) -> Option<()> {
    match (current, delta) {
        (AttributeValue::Ss(current), AttributeValue::Ss(delta))
        | (AttributeValue::Ns(current), AttributeValue::Ns(delta)) => {
            current.extend(delta);
            Some(())
        }
        _ => None,
    }
}
