//! The scheduled job that refreshes the resource and room caches.

use std::sync::Arc;

use tracing::{error, info};
use uuid::Uuid;

use crate::backend::BackendRegistry;
use crate::error::CalresResult;
use crate::kind::ItemKind;
use crate::store::CacheStore;
use crate::sync::{self, KindReport};

pub struct UpdateResourcesRoomsJob {
    resources: Arc<dyn BackendRegistry>,
    rooms: Arc<dyn BackendRegistry>,
}

/// Result of one job run across both kinds.
#[derive(Debug)]
pub struct JobReport {
    pub run_id: Uuid,
    pub kinds: Vec<KindReport>,
    /// Kinds whose cache could not be read at all.
    pub failures: Vec<(ItemKind, String)>,
}

impl JobReport {
    pub fn kind(&self, kind: ItemKind) -> Option<&KindReport> {
        self.kinds.iter().find(|r| r.kind == kind)
    }
}

impl UpdateResourcesRoomsJob {
    pub fn new(resources: Arc<dyn BackendRegistry>, rooms: Arc<dyn BackendRegistry>) -> Self {
        UpdateResourcesRoomsJob { resources, rooms }
    }

    pub fn registry(&self, kind: ItemKind) -> &dyn BackendRegistry {
        match kind {
            ItemKind::Resource => self.resources.as_ref(),
            ItemKind::Room => self.rooms.as_ref(),
        }
    }

    /// Reconciles resources, then rooms. Never fails: problems are logged and
    /// recorded in the report, and the next run retries.
    pub async fn run(&self, store: &mut dyn CacheStore) -> JobReport {
        self.run_kinds(&ItemKind::ALL, store).await
    }

    pub async fn run_kinds(&self, kinds: &[ItemKind], store: &mut dyn CacheStore) -> JobReport {
        let run_id = Uuid::new_v4();
        info!(%run_id, "updating resource and room cache");

        let mut report = JobReport {
            run_id,
            kinds: Vec::new(),
            failures: Vec::new(),
        };

        for &kind in kinds {
            match self.run_kind(kind, store).await {
                Ok(kind_report) => report.kinds.push(kind_report),
                Err(e) => {
                    error!(%run_id, %kind, error = %e, "could not reconcile {}", kind.plural());
                    report.failures.push((kind, e.to_string()));
                }
            }
        }

        info!(%run_id, "cache update finished");
        report
    }

    pub async fn run_kind(
        &self,
        kind: ItemKind,
        store: &mut dyn CacheStore,
    ) -> CalresResult<KindReport> {
        sync::reconcile(kind, self.registry(kind), store).await
    }
}
