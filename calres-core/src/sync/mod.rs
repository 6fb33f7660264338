//! Reconciliation of cached items against their backends.

mod backend_diff;
mod diff_kind;
mod item_diff;
mod metadata_diff;
mod reconcile;
mod report;

pub use backend_diff::{BackendDiff, ItemSync};
pub use diff_kind::DiffKind;
pub use item_diff::ItemDiff;
pub use metadata_diff::MetadataDiff;
pub use reconcile::reconcile;
pub use report::{BackendOutcome, BackendReport, DiffCounts, ItemFailure, KindReport};
