//! Persistence of cached items and their metadata.

mod sqlite;

use std::collections::BTreeMap;

use crate::error::CalresResult;
use crate::item::{CachedItem, ItemFields, ItemId};
use crate::kind::ItemKind;

pub use sqlite::SqliteStore;

/// The cache as seen by the reconciler.
///
/// Every operation is atomic for the single row it touches. `(backend id,
/// external id)` is unique per kind; inserting a duplicate fails with
/// [`CalresError::StoreIntegrity`](crate::CalresError::StoreIntegrity).
pub trait CacheStore: Send {
    fn find_all_for_kind(&self, kind: ItemKind) -> CalresResult<Vec<CachedItem>>;

    fn find_all_for_backend(&self, kind: ItemKind, backend_id: &str)
    -> CalresResult<Vec<CachedItem>>;

    fn find(
        &self,
        kind: ItemKind,
        backend_id: &str,
        external_id: &str,
    ) -> CalresResult<Option<CachedItem>>;

    fn insert(
        &mut self,
        kind: ItemKind,
        backend_id: &str,
        external_id: &str,
        fields: &ItemFields,
    ) -> CalresResult<ItemId>;

    /// Overwrites every core field of the item.
    fn update(&mut self, kind: ItemKind, id: ItemId, fields: &ItemFields) -> CalresResult<()>;

    /// Deletes the item together with its metadata.
    fn delete(&mut self, kind: ItemKind, id: ItemId) -> CalresResult<()>;

    fn metadata_for(&self, kind: ItemKind, id: ItemId) -> CalresResult<BTreeMap<String, String>>;

    fn insert_metadata(
        &mut self,
        kind: ItemKind,
        id: ItemId,
        key: &str,
        value: &str,
    ) -> CalresResult<()>;

    fn update_metadata(
        &mut self,
        kind: ItemKind,
        id: ItemId,
        key: &str,
        value: &str,
    ) -> CalresResult<()>;

    fn delete_metadata(&mut self, kind: ItemKind, id: ItemId, key: &str) -> CalresResult<()>;
}
