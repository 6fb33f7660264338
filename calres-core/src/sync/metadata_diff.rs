use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sync::DiffKind;

/// A change to a single metadata key of one item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataDiff {
    pub kind: DiffKind,
    pub key: String,
    pub old: Option<String>,
    pub new: Option<String>,
}

impl fmt::Display for MetadataDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.old, &self.new) {
            (Some(old), Some(new)) => write!(f, "{} {}: {} -> {}", self.kind, self.key, old, new),
            (_, Some(value)) | (Some(value), None) => {
                write!(f, "{} {}: {}", self.kind, self.key, value)
            }
            (None, None) => write!(f, "{} {}", self.kind, self.key),
        }
    }
}

impl MetadataDiff {
    pub fn get_diff(key: &str, old: Option<&String>, new: Option<&String>) -> Option<MetadataDiff> {
        let kind = match (old, new) {
            (None, Some(_)) => DiffKind::Create,
            (Some(_), None) => DiffKind::Delete,
            (Some(o), Some(n)) if o != n => DiffKind::Update,
            _ => return None,
        };

        Some(MetadataDiff {
            kind,
            key: key.to_string(),
            old: old.cloned(),
            new: new.cloned(),
        })
    }

    /// Changes turning `stored` into exactly `live`, ordered by key.
    pub fn between(
        stored: &BTreeMap<String, String>,
        live: &BTreeMap<String, String>,
    ) -> Vec<MetadataDiff> {
        let mut keys: Vec<&String> = stored.keys().chain(live.keys()).collect();
        keys.sort();
        keys.dedup();

        keys.into_iter()
            .filter_map(|key| MetadataDiff::get_diff(key, stored.get(key), live.get(key)))
            .collect()
    }
}
