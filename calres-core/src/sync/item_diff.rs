use std::fmt;

use serde::{Deserialize, Serialize};

use crate::item::{CachedItem, ItemFields};
use crate::sync::DiffKind;

/// A change to the core fields of one cached item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDiff {
    pub kind: DiffKind,
    pub external_id: String,
    pub old: Option<CachedItem>,
    pub new: Option<ItemFields>,
}

impl fmt::Display for ItemDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} ({})",
            self.kind,
            self.display_name(),
            self.external_id
        )
    }
}

impl ItemDiff {
    pub fn get_diff(
        external_id: &str,
        old: Option<CachedItem>,
        new: Option<ItemFields>,
    ) -> Option<ItemDiff> {
        let kind = match (&old, &new) {
            (None, Some(_)) => DiffKind::Create,
            (Some(_), None) => DiffKind::Delete,
            (Some(cached), Some(live)) if cached.needs_rewrite || cached.fields != *live => {
                DiffKind::Update
            }
            _ => return None,
        };

        Some(ItemDiff {
            kind,
            external_id: external_id.to_string(),
            old,
            new,
        })
    }

    /// Display name of the item (prefer new, fallback to old)
    pub fn display_name(&self) -> &str {
        self.new
            .as_ref()
            .map(|f| f.display_name.as_str())
            .or_else(|| self.old.as_ref().map(|c| c.fields.display_name.as_str()))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cached(name: &str) -> CachedItem {
        CachedItem {
            id: 6,
            backend_id: "backend3".into(),
            external_id: "res6".into(),
            fields: ItemFields {
                display_name: name.into(),
                email: "res6@foo.bar".into(),
                group_restrictions: vec!["foo".into(), "bar".into()],
            },
            needs_rewrite: false,
        }
    }

    #[test]
    fn test_equal_fields_produce_no_diff() {
        let item = cached("Pointer");
        let live = item.fields.clone();
        assert!(ItemDiff::get_diff("res6", Some(item), Some(live)).is_none());
    }

    #[test]
    fn test_unreadable_row_is_always_updated() {
        let item = CachedItem {
            needs_rewrite: true,
            ..cached("Pointer")
        };
        let live = item.fields.clone();

        let diff = ItemDiff::get_diff("res6", Some(item), Some(live)).unwrap();
        assert_eq!(diff.kind, DiffKind::Update);
    }

    #[test]
    fn test_group_order_change_is_an_update() {
        let item = cached("Pointer");
        let mut live = item.fields.clone();
        live.group_restrictions.reverse();

        let diff = ItemDiff::get_diff("res6", Some(item), Some(live)).unwrap();
        assert_eq!(diff.kind, DiffKind::Update);
    }

    #[test]
    fn test_create_and_delete() {
        let create = ItemDiff::get_diff("res7", None, Some(ItemFields::default())).unwrap();
        assert_eq!(create.kind, DiffKind::Create);

        let delete = ItemDiff::get_diff("res6", Some(cached("Pointer")), None).unwrap();
        assert_eq!(delete.kind, DiffKind::Delete);
        assert_eq!(delete.to_string(), "-: Pointer (res6)");

        assert!(ItemDiff::get_diff("res0", None, None).is_none());
    }
}
