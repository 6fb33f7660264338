//! Backend diff computation and application.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracing::{debug, warn};

use crate::backend::Backend;
use crate::error::{CalresError, CalresResult};
use crate::item::{CachedItem, ItemFields, ItemId};
use crate::kind::ItemKind;
use crate::metadata;
use crate::store::CacheStore;
use crate::sync::{DiffCounts, DiffKind, ItemDiff, ItemFailure, MetadataDiff};

/// Pending changes for one item the backend still reports.
#[derive(Debug, Clone)]
pub struct ItemSync {
    pub external_id: String,
    /// Internal id of the cached row, `None` for items seen for the first time.
    pub cached_id: Option<ItemId>,
    /// Core field change, `None` when the cached fields already match.
    pub item: Option<ItemDiff>,
    pub metadata: Vec<MetadataDiff>,
}

/// Represents the differences between a backend's live items and the cache.
#[derive(Debug, Clone)]
pub struct BackendDiff {
    pub kind: ItemKind,
    pub backend_id: String,
    pub to_delete: Vec<ItemDiff>,
    pub to_sync: Vec<ItemSync>,
    /// Listed ids that could not be fetched; their cache rows are left alone.
    pub unreachable: Vec<String>,
}

impl BackendDiff {
    pub fn is_empty(&self) -> bool {
        self.to_delete.is_empty() && self.to_sync.is_empty()
    }

    /// Compares a backend with its cached items.
    ///
    /// Fails only when the backend cannot list its items, in which case
    /// nothing about the backend may be changed.
    pub async fn from_backend(
        kind: ItemKind,
        backend: &dyn Backend,
        cached: Vec<CachedItem>,
        store: &dyn CacheStore,
    ) -> CalresResult<Self> {
        let backend_id = backend.identifier().to_string();
        let live_ids = backend.list_all(kind).await?;

        let mut seen = HashSet::new();
        let live_ids: Vec<String> = live_ids
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();

        let mut cached_by_id: HashMap<String, CachedItem> = cached
            .into_iter()
            .map(|item| (item.external_id.clone(), item))
            .collect();

        // Cached items the backend no longer reports
        let mut to_delete: Vec<ItemDiff> = cached_by_id
            .values()
            .filter(|item| !seen.contains(&item.external_id))
            .filter_map(|item| ItemDiff::get_diff(&item.external_id, Some(item.clone()), None))
            .collect();
        to_delete.sort_by(|a, b| a.external_id.cmp(&b.external_id));

        let mut to_sync = Vec::new();
        let mut unreachable = Vec::new();

        for external_id in live_ids {
            let live = match backend.get(kind, &external_id).await {
                Ok(live) => live,
                Err(e) => {
                    warn!(
                        backend = %backend_id,
                        %kind,
                        id = %external_id,
                        error = %e,
                        "could not fetch item, leaving cache entry untouched"
                    );
                    unreachable.push(external_id);
                    continue;
                }
            };

            let fields = ItemFields::from_live(live.as_ref());
            let live_metadata = metadata::extract(live.as_ref());

            let cached = cached_by_id.remove(&external_id);
            let cached_id = cached.as_ref().map(|c| c.id);
            let stored_metadata = match cached_id {
                Some(id) => store.metadata_for(kind, id)?,
                None => BTreeMap::new(),
            };

            let item = ItemDiff::get_diff(&external_id, cached, Some(fields));
            let metadata = MetadataDiff::between(&stored_metadata, &live_metadata);

            if item.is_some() || !metadata.is_empty() {
                to_sync.push(ItemSync {
                    external_id,
                    cached_id,
                    item,
                    metadata,
                });
            }
        }

        Ok(BackendDiff {
            kind,
            backend_id,
            to_delete,
            to_sync,
            unreachable,
        })
    }

    /// Writes the diff to the store: deletions first, then inserts and
    /// updates with their metadata.
    ///
    /// A constraint violation only abandons the item it occurred on; those
    /// items are returned and left for the next run. Any other store error
    /// stops the backend.
    pub fn apply(&self, store: &mut dyn CacheStore) -> CalresResult<Vec<ItemFailure>> {
        let mut failed = Vec::new();

        for diff in &self.to_delete {
            let Some(old) = &diff.old else { continue };
            match store.delete(self.kind, old.id) {
                Ok(()) => debug!(backend = %self.backend_id, kind = %self.kind, "{}", diff),
                Err(e) => failed.push(self.item_failed(&diff.external_id, e)?),
            }
        }

        for sync in &self.to_sync {
            if let Err(e) = self.apply_item(store, sync) {
                failed.push(self.item_failed(&sync.external_id, e)?);
            }
        }

        Ok(failed)
    }

    fn apply_item(&self, store: &mut dyn CacheStore, sync: &ItemSync) -> CalresResult<()> {
        let (id, metadata) = match (sync.cached_id, &sync.item) {
            (Some(id), Some(diff)) => {
                if let Some(fields) = &diff.new {
                    store.update(self.kind, id, fields)?;
                    debug!(backend = %self.backend_id, kind = %self.kind, "{}", diff);
                }
                (id, sync.metadata.clone())
            }
            (Some(id), None) => (id, sync.metadata.clone()),
            (None, Some(diff @ ItemDiff { new: Some(fields), .. })) => {
                let (id, metadata) = self.insert(store, sync, fields)?;
                debug!(backend = %self.backend_id, kind = %self.kind, "{}", diff);
                (id, metadata)
            }
            (None, _) => return Ok(()),
        };

        for diff in &metadata {
            apply_metadata(store, self.kind, id, diff)?;
        }

        Ok(())
    }

    /// Turns a constraint violation into a per-item failure, passes anything else on.
    fn item_failed(&self, external_id: &str, err: CalresError) -> CalresResult<ItemFailure> {
        let CalresError::StoreIntegrity(reason) = err else {
            return Err(err);
        };

        warn!(
            backend = %self.backend_id,
            kind = %self.kind,
            id = %external_id,
            error = %reason,
            "could not write item, leaving it for the next run"
        );

        Ok(ItemFailure {
            external_id: external_id.to_string(),
            reason,
        })
    }

    /// Inserts a new item. When another run inserted the same item in the
    /// meantime, the existing row is taken over and its metadata re-diffed.
    fn insert(
        &self,
        store: &mut dyn CacheStore,
        sync: &ItemSync,
        fields: &ItemFields,
    ) -> CalresResult<(ItemId, Vec<MetadataDiff>)> {
        let reason = match store.insert(self.kind, &self.backend_id, &sync.external_id, fields) {
            Ok(id) => return Ok((id, sync.metadata.clone())),
            Err(CalresError::StoreIntegrity(reason)) => reason,
            Err(e) => return Err(e),
        };

        let Some(existing) = store.find(self.kind, &self.backend_id, &sync.external_id)? else {
            return Err(CalresError::StoreIntegrity(reason));
        };

        warn!(
            backend = %self.backend_id,
            kind = %self.kind,
            id = %sync.external_id,
            "item was inserted concurrently, updating existing row"
        );

        if existing.needs_rewrite || existing.fields != *fields {
            store.update(self.kind, existing.id, fields)?;
        }

        let live: BTreeMap<String, String> = sync
            .metadata
            .iter()
            .filter_map(|d| d.new.clone().map(|value| (d.key.clone(), value)))
            .collect();
        let stored = store.metadata_for(self.kind, existing.id)?;

        Ok((existing.id, MetadataDiff::between(&stored, &live)))
    }

    /// Item-level counts of this diff.
    pub fn counts(&self) -> DiffCounts {
        let mut counts = DiffCounts::default();
        let item_diffs = self
            .to_delete
            .iter()
            .chain(self.to_sync.iter().filter_map(|s| s.item.as_ref()));
        for diff in item_diffs {
            counts.add(diff.kind);
        }
        counts
    }

    pub fn metadata_counts(&self) -> DiffCounts {
        let mut counts = DiffCounts::default();
        for diff in self.to_sync.iter().flat_map(|s| &s.metadata) {
            counts.add(diff.kind);
        }
        counts
    }
}

fn apply_metadata(
    store: &mut dyn CacheStore,
    kind: ItemKind,
    id: ItemId,
    diff: &MetadataDiff,
) -> CalresResult<()> {
    match (diff.kind, &diff.new) {
        (DiffKind::Create, Some(value)) => store.insert_metadata(kind, id, &diff.key, value),
        (DiffKind::Update, Some(value)) => store.update_metadata(kind, id, &diff.key, value),
        (DiffKind::Delete, _) => store.delete_metadata(kind, id, &diff.key),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::LiveRecord;
    use crate::store::SqliteStore;
    use crate::testing::FakeBackend;

    fn seed(store: &mut SqliteStore, backend: &str, id: &str, name: &str) -> ItemId {
        store
            .insert(
                ItemKind::Resource,
                backend,
                id,
                &ItemFields {
                    display_name: name.into(),
                    email: format!("{id}@foo.bar"),
                    group_restrictions: vec![],
                },
            )
            .unwrap()
    }

    #[tokio::test]
    async fn test_diff_partitions_cached_items() {
        let mut store = SqliteStore::in_memory().unwrap();
        let res5 = seed(&mut store, "backend3", "res5", "Beamer3");
        let res6 = seed(&mut store, "backend3", "res6", "Pointer");
        store
            .insert_metadata(ItemKind::Resource, res6, "meta99", "value99")
            .unwrap();

        let backend = FakeBackend::new("backend3")
            .with_item(
                LiveRecord::new("res6", "Pointer123")
                    .with_email("res6@foo.bar")
                    .with_metadata("meta99", Some("value99-new")),
            )
            .with_item(LiveRecord::new("res7", "Resource4").with_email("res7@foo.bar"));

        let cached = store
            .find_all_for_backend(ItemKind::Resource, "backend3")
            .unwrap();
        let diff = BackendDiff::from_backend(ItemKind::Resource, &backend, cached, &store)
            .await
            .unwrap();

        assert_eq!(diff.to_delete.len(), 1);
        assert_eq!(diff.to_delete[0].old.as_ref().map(|c| c.id), Some(res5));

        assert_eq!(diff.to_sync.len(), 2);
        let res6_sync = &diff.to_sync[0];
        assert_eq!(res6_sync.cached_id, Some(res6));
        assert_eq!(res6_sync.item.as_ref().map(|d| d.kind), Some(DiffKind::Update));
        assert_eq!(res6_sync.metadata[0].kind, DiffKind::Update);

        let res7_sync = &diff.to_sync[1];
        assert_eq!(res7_sync.cached_id, None);
        assert_eq!(res7_sync.item.as_ref().map(|d| d.kind), Some(DiffKind::Create));

        let counts = diff.counts();
        assert_eq!((counts.created, counts.updated, counts.deleted), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_duplicate_listing_is_processed_once() {
        let store = SqliteStore::in_memory().unwrap();
        let backend = FakeBackend::new("backend4")
            .with_item(LiveRecord::new("res8", "Beamer"))
            .with_listed_id("res8");

        let diff = BackendDiff::from_backend(ItemKind::Resource, &backend, vec![], &store)
            .await
            .unwrap();

        assert_eq!(diff.to_sync.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_leaves_item_untouched() {
        let mut store = SqliteStore::in_memory().unwrap();
        seed(&mut store, "backend3", "res6", "Pointer");

        let backend = FakeBackend::new("backend3")
            .with_item(LiveRecord::new("res6", "Pointer123"))
            .with_item(LiveRecord::new("res7", "Resource4"))
            .with_broken_fetch("res6")
            .with_broken_fetch("res7");

        let cached = store
            .find_all_for_backend(ItemKind::Resource, "backend3")
            .unwrap();
        let diff = BackendDiff::from_backend(ItemKind::Resource, &backend, cached, &store)
            .await
            .unwrap();

        assert!(diff.is_empty());
        assert_eq!(diff.unreachable, vec!["res6", "res7"]);

        let mut store = store;
        assert!(diff.apply(&mut store).unwrap().is_empty());
        let items = store.find_all_for_kind(ItemKind::Resource).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].fields.display_name, "Pointer");
    }

    #[tokio::test]
    async fn test_listing_failure_is_an_error() {
        let store = SqliteStore::in_memory().unwrap();
        let backend = FakeBackend::unavailable("backend2");

        let err = BackendDiff::from_backend(ItemKind::Room, &backend, vec![], &store)
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_concurrent_insert_adopts_existing_row() {
        let mut store = SqliteStore::in_memory().unwrap();
        let backend = FakeBackend::new("backend4").with_item(
            LiveRecord::new("res8", "Beamer")
                .with_email("res8@foo.bar")
                .with_metadata("meta2", Some("value2")),
        );

        let diff = BackendDiff::from_backend(ItemKind::Resource, &backend, vec![], &store)
            .await
            .unwrap();

        // Another run gets there between diff and apply.
        let existing = seed(&mut store, "backend4", "res8", "Old name");
        store
            .insert_metadata(ItemKind::Resource, existing, "stale", "x")
            .unwrap();

        assert!(diff.apply(&mut store).unwrap().is_empty());

        let items = store.find_all_for_kind(ItemKind::Resource).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, existing);
        assert_eq!(items[0].fields.display_name, "Beamer");

        let metadata = store.metadata_for(ItemKind::Resource, existing).unwrap();
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata["meta2"], "value2");
    }

    #[tokio::test]
    async fn test_integrity_error_abandons_only_that_item() {
        let mut store = SqliteStore::in_memory().unwrap();
        let res1 = seed(&mut store, "backend3", "res1", "Beamer1");

        let backend = FakeBackend::new("backend3")
            .with_item(
                LiveRecord::new("res1", "Beamer1")
                    .with_email("res1@foo.bar")
                    .with_metadata("k", Some("v")),
            )
            .with_item(LiveRecord::new("res2", "TV1").with_email("res2@foo.bar"));

        let cached = store
            .find_all_for_backend(ItemKind::Resource, "backend3")
            .unwrap();
        let diff = BackendDiff::from_backend(ItemKind::Resource, &backend, cached, &store)
            .await
            .unwrap();

        // Another run writes the same key between diff and apply.
        store
            .insert_metadata(ItemKind::Resource, res1, "k", "other")
            .unwrap();

        let failed = diff.apply(&mut store).unwrap();

        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].external_id, "res1");

        let ids: Vec<_> = store
            .find_all_for_backend(ItemKind::Resource, "backend3")
            .unwrap()
            .into_iter()
            .map(|item| item.external_id)
            .collect();
        assert_eq!(ids, vec!["res1", "res2"]);
    }
}
