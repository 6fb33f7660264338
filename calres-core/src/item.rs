//! Cached item rows and the fields compared against live items.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CalresError, CalresResult};
use crate::live::LiveItem;

/// Store-assigned identifier of a cached item, stable across updates.
pub type ItemId = i64;

/// The core fields of an item. Two items with equal fields need no update.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ItemFields {
    pub display_name: String,
    pub email: String,
    pub group_restrictions: Vec<String>,
}

impl ItemFields {
    pub fn from_live(live: &dyn LiveItem) -> Self {
        ItemFields {
            display_name: live.display_name().to_string(),
            email: live.email().to_string(),
            group_restrictions: live.group_restrictions(),
        }
    }

    /// Group restrictions as stored: a JSON array in backend order, `[]` when empty.
    pub fn group_restrictions_json(&self) -> CalresResult<String> {
        serde_json::to_string(&self.group_restrictions)
            .map_err(|e| CalresError::Serialization(e.to_string()))
    }
}

/// Parse a stored group restriction column. An empty column reads as no restrictions.
pub fn parse_group_restrictions(raw: &str) -> CalresResult<Vec<String>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }

    serde_json::from_str(raw).map_err(|e| {
        CalresError::Serialization(format!("Invalid group restrictions '{raw}': {e}"))
    })
}

/// A resource or room previously seen on a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedItem {
    pub id: ItemId,
    pub backend_id: String,
    pub external_id: String,
    #[serde(flatten)]
    pub fields: ItemFields,
    /// A stored column could not be decoded. The row is rewritten on the
    /// next successful pass of its backend.
    #[serde(skip)]
    pub needs_rewrite: bool,
}

impl fmt::Display for CachedItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.fields.display_name, self.external_id)
    }
}

/// A single key/value annotation of a cached item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub item_id: ItemId,
    pub key: String,
    pub value: String,
}
