//! SQLite-backed cache store.

use std::collections::BTreeMap;
use std::path::Path;

use rusqlite::{Connection, ErrorCode, Params, params};
use tracing::warn;

use crate::error::{CalresError, CalresResult};
use crate::item::{CachedItem, ItemFields, ItemId, MetadataEntry, parse_group_restrictions};
use crate::kind::ItemKind;
use crate::store::CacheStore;

pub struct SqliteStore {
    conn: Connection,
}

/// Item row before the group restriction column is decoded.
struct RawItem {
    id: ItemId,
    backend_id: String,
    external_id: String,
    email: String,
    display_name: String,
    group_restrictions: String,
}

impl RawItem {
    /// An undecodable group restriction column reads as empty and marks the
    /// item for rewriting, so one bad row cannot block the rest of the cache.
    fn into_item(self, kind: ItemKind) -> CachedItem {
        let (group_restrictions, needs_rewrite) =
            match parse_group_restrictions(&self.group_restrictions) {
                Ok(groups) => (groups, false),
                Err(e) => {
                    warn!(
                        backend = %self.backend_id,
                        %kind,
                        id = %self.external_id,
                        error = %e,
                        "unreadable cache row, it will be rewritten"
                    );
                    (Vec::new(), true)
                }
            };

        CachedItem {
            id: self.id,
            backend_id: self.backend_id,
            external_id: self.external_id,
            fields: ItemFields {
                display_name: self.display_name,
                email: self.email,
                group_restrictions,
            },
            needs_rewrite,
        }
    }
}

fn store_err(err: rusqlite::Error) -> CalresError {
    match err.sqlite_error_code() {
        Some(ErrorCode::ConstraintViolation) => CalresError::StoreIntegrity(err.to_string()),
        _ => CalresError::Store(err.to_string()),
    }
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> CalresResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(store_err)?;
        let store = Self { conn };
        store.bootstrap()?;
        Ok(store)
    }

    pub fn in_memory() -> CalresResult<Self> {
        let conn = Connection::open_in_memory().map_err(store_err)?;
        let store = Self { conn };
        store.bootstrap()?;
        Ok(store)
    }

    fn bootstrap(&self) -> CalresResult<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(store_err)?;

        for kind in ItemKind::ALL {
            let table = kind.table();
            let md_table = kind.metadata_table();
            let col = kind.id_column();

            self.conn
                .execute_batch(&format!(
                    "
                    CREATE TABLE IF NOT EXISTS {table} (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        backend_id TEXT NOT NULL,
                        {col} TEXT NOT NULL,
                        email TEXT NOT NULL DEFAULT '',
                        displayname TEXT NOT NULL DEFAULT '',
                        group_restrictions TEXT NOT NULL DEFAULT '[]',
                        UNIQUE (backend_id, {col})
                    );
                    CREATE TABLE IF NOT EXISTS {md_table} (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        {col} INTEGER NOT NULL REFERENCES {table}(id) ON DELETE CASCADE,
                        key TEXT NOT NULL,
                        value TEXT NOT NULL,
                        UNIQUE ({col}, key)
                    );
                    "
                ))
                .map_err(store_err)?;
        }

        Ok(())
    }

    fn query_items(
        &self,
        kind: ItemKind,
        filter: &str,
        params: impl Params,
    ) -> CalresResult<Vec<CachedItem>> {
        let sql = format!(
            "SELECT id, backend_id, {col}, email, displayname, group_restrictions
             FROM {table} {filter} ORDER BY id ASC",
            col = kind.id_column(),
            table = kind.table(),
        );

        let mut stmt = self.conn.prepare(&sql).map_err(store_err)?;
        let rows = stmt
            .query_map(params, |row| {
                Ok(RawItem {
                    id: row.get(0)?,
                    backend_id: row.get(1)?,
                    external_id: row.get(2)?,
                    email: row.get(3)?,
                    display_name: row.get(4)?,
                    group_restrictions: row.get(5)?,
                })
            })
            .map_err(store_err)?;

        rows.map(|row| row.map(|raw| raw.into_item(kind)).map_err(store_err))
            .collect()
    }

    /// Every metadata row of a kind, in insertion order.
    pub fn metadata_entries(&self, kind: ItemKind) -> CalresResult<Vec<MetadataEntry>> {
        let sql = format!(
            "SELECT {col}, key, value FROM {md_table} ORDER BY id ASC",
            col = kind.id_column(),
            md_table = kind.metadata_table(),
        );

        let mut stmt = self.conn.prepare(&sql).map_err(store_err)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(MetadataEntry {
                    item_id: row.get(0)?,
                    key: row.get(1)?,
                    value: row.get(2)?,
                })
            })
            .map_err(store_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(store_err)
    }
}

impl CacheStore for SqliteStore {
    fn find_all_for_kind(&self, kind: ItemKind) -> CalresResult<Vec<CachedItem>> {
        self.query_items(kind, "", [])
    }

    fn find_all_for_backend(
        &self,
        kind: ItemKind,
        backend_id: &str,
    ) -> CalresResult<Vec<CachedItem>> {
        self.query_items(kind, "WHERE backend_id = ?1", params![backend_id])
    }

    fn find(
        &self,
        kind: ItemKind,
        backend_id: &str,
        external_id: &str,
    ) -> CalresResult<Option<CachedItem>> {
        let filter = format!("WHERE backend_id = ?1 AND {} = ?2", kind.id_column());
        let mut items = self.query_items(kind, &filter, params![backend_id, external_id])?;
        Ok(items.pop())
    }

    fn insert(
        &mut self,
        kind: ItemKind,
        backend_id: &str,
        external_id: &str,
        fields: &ItemFields,
    ) -> CalresResult<ItemId> {
        let sql = format!(
            "INSERT INTO {table} (backend_id, {col}, email, displayname, group_restrictions)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            table = kind.table(),
            col = kind.id_column(),
        );

        self.conn
            .execute(
                &sql,
                params![
                    backend_id,
                    external_id,
                    fields.email,
                    fields.display_name,
                    fields.group_restrictions_json()?,
                ],
            )
            .map_err(store_err)?;

        Ok(self.conn.last_insert_rowid())
    }

    fn update(&mut self, kind: ItemKind, id: ItemId, fields: &ItemFields) -> CalresResult<()> {
        let sql = format!(
            "UPDATE {} SET email = ?1, displayname = ?2, group_restrictions = ?3 WHERE id = ?4",
            kind.table()
        );

        self.conn
            .execute(
                &sql,
                params![
                    fields.email,
                    fields.display_name,
                    fields.group_restrictions_json()?,
                    id
                ],
            )
            .map_err(store_err)?;
        Ok(())
    }

    fn delete(&mut self, kind: ItemKind, id: ItemId) -> CalresResult<()> {
        let tx = self.conn.transaction().map_err(store_err)?;
        tx.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1",
                kind.metadata_table(),
                kind.id_column()
            ),
            params![id],
        )
        .map_err(store_err)?;
        tx.execute(
            &format!("DELETE FROM {} WHERE id = ?1", kind.table()),
            params![id],
        )
        .map_err(store_err)?;
        tx.commit().map_err(store_err)
    }

    fn metadata_for(&self, kind: ItemKind, id: ItemId) -> CalresResult<BTreeMap<String, String>> {
        let sql = format!(
            "SELECT key, value FROM {} WHERE {} = ?1",
            kind.metadata_table(),
            kind.id_column()
        );

        let mut stmt = self.conn.prepare(&sql).map_err(store_err)?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(store_err)?;

        rows.collect::<Result<BTreeMap<_, _>, _>>()
            .map_err(store_err)
    }

    fn insert_metadata(
        &mut self,
        kind: ItemKind,
        id: ItemId,
        key: &str,
        value: &str,
    ) -> CalresResult<()> {
        let sql = format!(
            "INSERT INTO {} ({}, key, value) VALUES (?1, ?2, ?3)",
            kind.metadata_table(),
            kind.id_column()
        );

        self.conn
            .execute(&sql, params![id, key, value])
            .map_err(store_err)?;
        Ok(())
    }

    fn update_metadata(
        &mut self,
        kind: ItemKind,
        id: ItemId,
        key: &str,
        value: &str,
    ) -> CalresResult<()> {
        let sql = format!(
            "UPDATE {} SET value = ?1 WHERE {} = ?2 AND key = ?3",
            kind.metadata_table(),
            kind.id_column()
        );

        self.conn
            .execute(&sql, params![value, id, key])
            .map_err(store_err)?;
        Ok(())
    }

    fn delete_metadata(&mut self, kind: ItemKind, id: ItemId, key: &str) -> CalresResult<()> {
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1 AND key = ?2",
            kind.metadata_table(),
            kind.id_column()
        );

        self.conn
            .execute(&sql, params![id, key])
            .map_err(store_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(name: &str, groups: &[&str]) -> ItemFields {
        ItemFields {
            display_name: name.to_string(),
            email: format!("{}@foo.bar", name.to_lowercase()),
            group_restrictions: groups.iter().map(|g| g.to_string()).collect(),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let mut store = SqliteStore::in_memory().unwrap();
        let id = store
            .insert(ItemKind::Resource, "backend3", "res6", &fields("Pointer", &["foo", "bar"]))
            .unwrap();

        let item = store
            .find(ItemKind::Resource, "backend3", "res6")
            .unwrap()
            .unwrap();
        assert_eq!(item.id, id);
        assert_eq!(item.fields.group_restrictions, vec!["foo", "bar"]);

        assert!(store.find(ItemKind::Room, "backend3", "res6").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_insert_is_integrity_error() {
        let mut store = SqliteStore::in_memory().unwrap();
        store
            .insert(ItemKind::Room, "backend1", "room1", &fields("Board", &[]))
            .unwrap();

        let err = store
            .insert(ItemKind::Room, "backend1", "room1", &fields("Board", &[]))
            .unwrap_err();
        assert!(matches!(err, CalresError::StoreIntegrity(_)));

        // Same external id on another backend is a different item.
        store
            .insert(ItemKind::Room, "backend2", "room1", &fields("Board", &[]))
            .unwrap();
    }

    #[test]
    fn test_update_keeps_internal_id() {
        let mut store = SqliteStore::in_memory().unwrap();
        let id = store
            .insert(ItemKind::Resource, "backend3", "res6", &fields("Pointer", &["foo"]))
            .unwrap();

        store
            .update(ItemKind::Resource, id, &fields("Pointer123", &["foo", "biz"]))
            .unwrap();

        let items = store.find_all_for_backend(ItemKind::Resource, "backend3").unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, id);
        assert_eq!(items[0].fields.display_name, "Pointer123");
    }

    #[test]
    fn test_delete_removes_metadata() {
        let mut store = SqliteStore::in_memory().unwrap();
        let kept = store
            .insert(ItemKind::Resource, "backend2", "res3", &fields("Beamer2", &[]))
            .unwrap();
        let gone = store
            .insert(ItemKind::Resource, "backend3", "res5", &fields("Beamer3", &[]))
            .unwrap();
        store.insert_metadata(ItemKind::Resource, kept, "meta1", "value1").unwrap();
        store.insert_metadata(ItemKind::Resource, gone, "meta1", "value1").unwrap();

        store.delete(ItemKind::Resource, gone).unwrap();

        let entries = store.metadata_entries(ItemKind::Resource).unwrap();
        assert_eq!(
            entries,
            vec![MetadataEntry {
                item_id: kept,
                key: "meta1".into(),
                value: "value1".into(),
            }]
        );
        assert_eq!(store.find_all_for_kind(ItemKind::Resource).unwrap().len(), 1);
    }

    #[test]
    fn test_metadata_roundtrip() {
        let mut store = SqliteStore::in_memory().unwrap();
        let id = store
            .insert(ItemKind::Room, "backend1", "room1", &fields("Board", &[]))
            .unwrap();

        store.insert_metadata(ItemKind::Room, id, "seats", "10").unwrap();
        store.insert_metadata(ItemKind::Room, id, "floor", "2").unwrap();
        store.update_metadata(ItemKind::Room, id, "seats", "12").unwrap();
        store.delete_metadata(ItemKind::Room, id, "floor").unwrap();

        let metadata = store.metadata_for(ItemKind::Room, id).unwrap();
        assert_eq!(metadata.len(), 1);
        assert_eq!(metadata["seats"], "12");

        let err = store.insert_metadata(ItemKind::Room, id, "seats", "14").unwrap_err();
        assert!(matches!(err, CalresError::StoreIntegrity(_)));
    }

    #[test]
    fn test_open_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/cache.sqlite");

        {
            let mut store = SqliteStore::open(&path).unwrap();
            store
                .insert(ItemKind::Resource, "backend4", "res9", &fields("Beamer2", &[]))
                .unwrap();
        }

        let reopened = SqliteStore::open(&path).unwrap();
        let items = reopened.find_all_for_kind(ItemKind::Resource).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].fields.group_restrictions, Vec::<String>::new());
    }

    fn seed_unreadable_row(store: &SqliteStore, backend: &str, id: &str) {
        store
            .conn
            .execute(
                "INSERT INTO calendar_resources (backend_id, resource_id, displayname, group_restrictions)
                 VALUES (?1, ?2, 'Old', 'foo')",
                params![backend, id],
            )
            .unwrap();
    }

    #[test]
    fn test_unreadable_group_restrictions_do_not_fail_the_query() {
        let mut store = SqliteStore::in_memory().unwrap();
        seed_unreadable_row(&store, "old", "x");
        store
            .insert(ItemKind::Resource, "backend3", "res6", &fields("Pointer", &["foo"]))
            .unwrap();

        let items = store.find_all_for_kind(ItemKind::Resource).unwrap();
        assert_eq!(items.len(), 2);
        assert!(items[0].needs_rewrite);
        assert!(items[0].fields.group_restrictions.is_empty());
        assert!(!items[1].needs_rewrite);
    }

    #[tokio::test]
    async fn test_unreadable_row_does_not_block_reconciliation() {
        use std::sync::Arc;

        use crate::backend::Registry;
        use crate::live::LiveRecord;
        use crate::sync::reconcile;
        use crate::testing::FakeBackend;

        let mut store = SqliteStore::in_memory().unwrap();
        seed_unreadable_row(&store, "old", "x");
        seed_unreadable_row(&store, "backend3", "res6");

        let backend = FakeBackend::new("backend3")
            .with_item(LiveRecord::new("res6", "Old"))
            .with_item(LiveRecord::new("res7", "Resource4"));
        let registry = Registry::new().with(Arc::new(backend));

        let report = reconcile(ItemKind::Resource, &registry, &mut store)
            .await
            .unwrap();
        assert_eq!(report.orphaned, vec!["old"]);

        let items = store
            .find_all_for_backend(ItemKind::Resource, "backend3")
            .unwrap();
        let ids: Vec<_> = items.iter().map(|i| i.external_id.as_str()).collect();
        assert_eq!(ids, vec!["res6", "res7"]);
        assert!(items.iter().all(|i| !i.needs_rewrite));
    }
}
