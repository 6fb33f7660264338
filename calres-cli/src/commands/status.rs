use std::collections::BTreeMap;

use anyhow::Result;
use calres_core::ItemKind;
use calres_core::backend::BackendRegistry;
use calres_core::config::CalresConfig;
use calres_core::store::{CacheStore, SqliteStore};
use owo_colors::OwoColorize;

use crate::render::Render;

pub fn run(config: &CalresConfig) -> Result<()> {
    let database = config.database_path();
    let store = SqliteStore::open(&database)?;

    println!("{} {}\n", "Cache:".dimmed(), database.display());

    for kind in ItemKind::ALL {
        println!("{}", kind.render());

        let registry = config.registry(kind);
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for backend in registry.backends() {
            counts.entry(backend.identifier().to_string()).or_default();
        }
        for item in store.find_all_for_kind(kind)? {
            *counts.entry(item.backend_id).or_default() += 1;
        }

        if counts.is_empty() {
            println!("   {}", "No backends configured".dimmed());
        }

        for (backend_id, count) in counts {
            let line = format!("   {} {} cached", backend_id, count);
            if registry.backend(&backend_id).is_some() {
                println!("{}", line);
            } else {
                println!("{} {}", line, "(not configured)".yellow());
            }
        }
        println!();
    }

    Ok(())
}
