use serde::{Deserialize, Serialize};

use super::id::ItemId;
use crate::error::{RepoError, Result};

/// A named material or product.
///
/// `id` is `None` until the item has been stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ItemId>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Item {
    /// Create an unsaved item.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: None,
        }
    }

    /// Builder-style description setter.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check the fields a stored item must satisfy.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Validation`] when the name is blank.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(RepoError::validation("item name must not be blank"));
        }
        Ok(())
    }

    /// The identity of a stored item.
    ///
    /// # Errors
    ///
    /// Returns [`RepoError::Validation`] when the item was never stored.
    pub fn require_id(&self) -> Result<ItemId> {
        self.id.ok_or_else(|| {
            RepoError::validation(format!("item '{}' has no identity", self.name))
        })
    }
}
