use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{error, info, warn};

use crate::backend::BackendRegistry;
use crate::error::{CalresError, CalresResult};
use crate::item::CachedItem;
use crate::kind::ItemKind;
use crate::store::CacheStore;
use crate::sync::{BackendDiff, BackendOutcome, BackendReport, KindReport};

/// Brings the cached items of `kind` in line with every registered backend.
///
/// Backends are processed one after another. A backend that cannot list its
/// items is skipped and keeps its cache as is; a failure while writing one
/// backend's changes does not stop the others. Only reading the cache up
/// front can fail the whole run.
pub async fn reconcile(
    kind: ItemKind,
    registry: &dyn BackendRegistry,
    store: &mut dyn CacheStore,
) -> CalresResult<KindReport> {
    let started_at = Utc::now();

    let mut cached_by_backend: BTreeMap<String, Vec<CachedItem>> = BTreeMap::new();
    for item in store.find_all_for_kind(kind)? {
        cached_by_backend
            .entry(item.backend_id.clone())
            .or_default()
            .push(item);
    }

    let mut backends = Vec::new();

    for backend in registry.backends() {
        let backend_id = backend.identifier().to_string();
        let cached = cached_by_backend.remove(&backend_id).unwrap_or_default();

        let diff = BackendDiff::from_backend(kind, backend.as_ref(), cached, &*store).await;

        let outcome = match diff {
            Err(e) => {
                warn!(
                    backend = %backend_id,
                    %kind,
                    error = %e,
                    "skipping backend, cached {} left untouched",
                    kind.plural()
                );
                BackendOutcome::Skipped {
                    transient: e.is_transient(),
                    reason: e.to_string(),
                }
            }
            Ok(diff) => match diff.apply(store) {
                Ok(failed) => {
                    let counts = diff.counts();
                    info!(
                        backend = %backend_id,
                        %kind,
                        created = counts.created,
                        updated = counts.updated,
                        deleted = counts.deleted,
                        unreachable = diff.unreachable.len(),
                        failed = failed.len(),
                        "backend synced"
                    );
                    BackendOutcome::Synced { diff, failed }
                }
                Err(e) => {
                    error!(backend = %backend_id, %kind, error = %e, "applying changes failed");
                    BackendOutcome::Failed {
                        reason: e.to_string(),
                    }
                }
            },
        };

        backends.push(BackendReport {
            backend_id,
            outcome,
        });
    }

    let orphaned: Vec<String> = cached_by_backend
        .into_iter()
        .filter(|(id, _)| registry.backend(id).is_none())
        .map(|(id, items)| {
            let err = CalresError::BackendNotFound(id.clone());
            warn!(%kind, cached = items.len(), "{err}, keeping its cached {}", kind.plural());
            id
        })
        .collect();

    Ok(KindReport {
        kind,
        started_at,
        finished_at: Utc::now(),
        backends,
        orphaned,
    })
}
