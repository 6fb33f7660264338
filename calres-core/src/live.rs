//! Items as reported live by a backend.
//!
//! Every live item has a basic identity. Metadata is an optional capability:
//! items that carry key/value annotations expose a [`MetadataProvider`]
//! through [`LiveItem::metadata_provider`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub trait LiveItem: Send + Sync {
    fn id(&self) -> &str;
    fn display_name(&self) -> &str;
    fn email(&self) -> &str;

    /// Groups allowed to book this item, in backend order.
    fn group_restrictions(&self) -> Vec<String> {
        Vec::new()
    }

    fn metadata_provider(&self) -> Option<&dyn MetadataProvider> {
        None
    }
}

pub trait MetadataProvider {
    fn available_metadata_keys(&self) -> Vec<String>;

    /// `None` when the backend has no value for `key`.
    fn metadata_for_key(&self, key: &str) -> Option<String>;
}

/// A live item as transferred by the provider protocol.
///
/// `metadata` is absent for backends without metadata support. Present but
/// `null` values are keys the backend lists without a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveRecord {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub group_restrictions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<BTreeMap<String, Option<String>>>,
}

impl LiveRecord {
    pub fn new(id: impl Into<String>, display_name: impl Into<String>) -> Self {
        LiveRecord {
            id: id.into(),
            display_name: display_name.into(),
            email: String::new(),
            group_restrictions: Vec::new(),
            metadata: None,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_group_restrictions<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_restrictions = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Adds a metadata key, turning this into a metadata-capable item.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Option<&str>) -> Self {
        self.metadata
            .get_or_insert_with(BTreeMap::new)
            .insert(key.into(), value.map(String::from));
        self
    }
}

impl LiveItem for LiveRecord {
    fn id(&self) -> &str {
        &self.id
    }

    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn email(&self) -> &str {
        &self.email
    }

    fn group_restrictions(&self) -> Vec<String> {
        self.group_restrictions.clone()
    }

    fn metadata_provider(&self) -> Option<&dyn MetadataProvider> {
        self.metadata.as_ref().map(|_| self as &dyn MetadataProvider)
    }
}

impl MetadataProvider for LiveRecord {
    fn available_metadata_keys(&self) -> Vec<String> {
        self.metadata
            .as_ref()
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn metadata_for_key(&self, key: &str) -> Option<String> {
        self.metadata.as_ref()?.get(key).cloned().flatten()
    }
}
