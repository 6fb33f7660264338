//! The two kinds of bookable items kept in the cache.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    #[serde(rename = "resources", alias = "resource")]
    Resource,
    #[serde(rename = "rooms", alias = "room")]
    Room,
}

impl ItemKind {
    pub const ALL: [ItemKind; 2] = [ItemKind::Resource, ItemKind::Room];

    /// Table holding the cached items of this kind.
    pub fn table(&self) -> &'static str {
        match self {
            ItemKind::Resource => "calendar_resources",
            ItemKind::Room => "calendar_rooms",
        }
    }

    /// Table holding the metadata rows of this kind.
    pub fn metadata_table(&self) -> &'static str {
        match self {
            ItemKind::Resource => "calendar_resources_md",
            ItemKind::Room => "calendar_rooms_md",
        }
    }

    /// Column naming the external id in the item table and the item id in
    /// the metadata table.
    pub fn id_column(&self) -> &'static str {
        match self {
            ItemKind::Resource => "resource_id",
            ItemKind::Room => "room_id",
        }
    }

    pub fn plural(&self) -> &'static str {
        match self {
            ItemKind::Resource => "resources",
            ItemKind::Room => "rooms",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemKind::Resource => write!(f, "resource"),
            ItemKind::Room => write!(f, "room"),
        }
    }
}

impl FromStr for ItemKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "resource" | "resources" => Ok(ItemKind::Resource),
            "room" | "rooms" => Ok(ItemKind::Room),
            other => Err(format!(
                "Unknown kind '{other}' (expected 'resources' or 'rooms')"
            )),
        }
    }
}
