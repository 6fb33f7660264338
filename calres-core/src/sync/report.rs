//! Outcome of a reconciliation run.

use chrono::{DateTime, Utc};

use crate::kind::ItemKind;
use crate::sync::{BackendDiff, DiffKind};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiffCounts {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl DiffCounts {
    pub fn add(&mut self, kind: DiffKind) {
        match kind {
            DiffKind::Create => self.created += 1,
            DiffKind::Update => self.updated += 1,
            DiffKind::Delete => self.deleted += 1,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }
}

impl std::ops::AddAssign for DiffCounts {
    fn add_assign(&mut self, other: Self) {
        self.created += other.created;
        self.updated += other.updated;
        self.deleted += other.deleted;
    }
}

/// An item whose changes could not be written; the rest of its backend was.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub external_id: String,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub enum BackendOutcome {
    /// The diff was written, except for the items listed in `failed`.
    Synced {
        diff: BackendDiff,
        failed: Vec<ItemFailure>,
    },
    /// The backend could not be listed; its cache was left untouched.
    Skipped { reason: String, transient: bool },
    /// Writing the diff failed part way; the next run picks up the rest.
    Failed { reason: String },
}

#[derive(Debug, Clone)]
pub struct BackendReport {
    pub backend_id: String,
    pub outcome: BackendOutcome,
}

impl BackendReport {
    pub fn diff(&self) -> Option<&BackendDiff> {
        match &self.outcome {
            BackendOutcome::Synced { diff, .. } => Some(diff),
            _ => None,
        }
    }
}

/// Result of reconciling every backend of one kind.
#[derive(Debug, Clone)]
pub struct KindReport {
    pub kind: ItemKind,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub backends: Vec<BackendReport>,
    /// Backend ids with cached items but no registered backend. Their items are kept.
    pub orphaned: Vec<String>,
}

impl KindReport {
    pub fn counts(&self) -> DiffCounts {
        let mut counts = DiffCounts::default();
        for diff in self.backends.iter().filter_map(BackendReport::diff) {
            counts += diff.counts();
        }
        counts
    }

    pub fn metadata_counts(&self) -> DiffCounts {
        let mut counts = DiffCounts::default();
        for diff in self.backends.iter().filter_map(BackendReport::diff) {
            counts += diff.metadata_counts();
        }
        counts
    }

    /// Whether the run changed anything in the cache.
    pub fn is_noop(&self) -> bool {
        self.backends
            .iter()
            .filter_map(BackendReport::diff)
            .all(BackendDiff::is_empty)
    }

    /// Backends that could not be listed. Their cache is exactly as before the run.
    pub fn skipped(&self) -> impl Iterator<Item = &BackendReport> {
        self.backends
            .iter()
            .filter(|r| matches!(r.outcome, BackendOutcome::Skipped { .. }))
    }

    /// Backends whose changes were written only in part.
    pub fn failed(&self) -> impl Iterator<Item = &BackendReport> {
        self.backends.iter().filter(|r| match &r.outcome {
            BackendOutcome::Failed { .. } => true,
            BackendOutcome::Synced { failed, .. } => !failed.is_empty(),
            BackendOutcome::Skipped { .. } => false,
        })
    }
}
