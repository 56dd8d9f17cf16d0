//! Attribute update verbs sent with a partial write.

use serde::{Deserialize, Serialize};

use crate::types::AttributeValue;

/// One attribute change in an `update_item` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeUpdate {
    /// Replace the attribute value
    Put { name: String, value: AttributeValue },
    /// Remove the attribute
    Delete { name: String },
    /// Union into a set, or add to a number
    Add { name: String, value: AttributeValue },
    /// Remove members from a set
    DeleteFromSet { name: String, value: AttributeValue },
}

impl AttributeUpdate {
    /// Name of the attribute this update targets.
    pub fn name(&self) -> &str {
        match self {
            Self::Put { name, .. }
            | Self::Delete { name }
            | Self::Add { name, .. }
            | Self::DeleteFromSet { name, .. } => name,
        }
    }

    /// Short verb name, used in logs.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Put { .. } => "PUT",
            Self::Delete { .. } => "DELETE",
            Self::Add { .. } => "ADD",
            Self::DeleteFromSet { .. } => "DELETE_FROM_SET",
        }
    }
}
