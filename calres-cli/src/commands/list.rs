use anyhow::Result;
use calres_core::ItemKind;
use calres_core::config::CalresConfig;
use calres_core::store::{CacheStore, SqliteStore};
use owo_colors::OwoColorize;

use crate::render::Render;

pub fn run(config: &CalresConfig, kind: ItemKind, backend: Option<&str>) -> Result<()> {
    let store = SqliteStore::open(config.database_path())?;

    let mut items = match backend {
        Some(backend_id) => store.find_all_for_backend(kind, backend_id)?,
        None => store.find_all_for_kind(kind)?,
    };

    items.sort_by(|a, b| (&a.backend_id, a.id).cmp(&(&b.backend_id, b.id)));

    if items.is_empty() {
        println!("{}", format!("No cached {}", kind.plural()).dimmed());
        return Ok(());
    }

    let mut current_backend: Option<&str> = None;
    for item in &items {
        if current_backend != Some(item.backend_id.as_str()) {
            println!("{}", item.backend_id.bold());
            current_backend = Some(item.backend_id.as_str());
        }

        println!("   {}", item.render());
        for (key, value) in store.metadata_for(kind, item.id)? {
            println!("      {}: {}", key.dimmed(), value);
        }
    }

    Ok(())
}
