//! Metadata extraction from live items.

use std::collections::BTreeMap;

use crate::live::LiveItem;

/// Collects the key/value metadata a live item currently exposes.
///
/// Items without the metadata capability yield an empty map. Keys whose
/// value lookup comes back empty are left out rather than stored as `""`.
pub fn extract(live: &dyn LiveItem) -> BTreeMap<String, String> {
    let Some(provider) = live.metadata_provider() else {
        return BTreeMap::new();
    };

    provider
        .available_metadata_keys()
        .into_iter()
        .filter_map(|key| provider.metadata_for_key(&key).map(|value| (key, value)))
        .collect()
}
