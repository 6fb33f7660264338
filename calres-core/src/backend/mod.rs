//! Backends enumerate and describe the resources and rooms of one provider.
//!
//! The reconciler only ever talks to the [`Backend`] and [`BackendRegistry`]
//! traits. [`ProviderBackend`] implements a backend on top of an external
//! `calres-provider-<name>` executable, [`Registry`] holds the backends
//! configured for one item kind.

pub mod protocol;
pub mod provider;
mod registry;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CalresResult;
use crate::kind::ItemKind;
use crate::live::LiveItem;

pub use provider::{Provider, ProviderBackend};
pub use registry::Registry;

/// A connector to an external resource/room provider.
///
/// Calls fail with [`CalresError::BackendUnavailable`](crate::CalresError::BackendUnavailable)
/// when the provider is temporarily unreachable.
#[async_trait]
pub trait Backend: Send + Sync {
    fn identifier(&self) -> &str;

    async fn list_all_resources(&self) -> CalresResult<Vec<String>>;

    async fn get_resource(&self, id: &str) -> CalresResult<Box<dyn LiveItem>>;

    async fn list_all_rooms(&self) -> CalresResult<Vec<String>>;

    async fn get_room(&self, id: &str) -> CalresResult<Box<dyn LiveItem>>;

    async fn list_all(&self, kind: ItemKind) -> CalresResult<Vec<String>> {
        match kind {
            ItemKind::Resource => self.list_all_resources().await,
            ItemKind::Room => self.list_all_rooms().await,
        }
    }

    async fn get(&self, kind: ItemKind, id: &str) -> CalresResult<Box<dyn LiveItem>> {
        match kind {
            ItemKind::Resource => self.get_resource(id).await,
            ItemKind::Room => self.get_room(id).await,
        }
    }
}

/// The set of backends currently configured for one item kind.
pub trait BackendRegistry: Send + Sync {
    fn backends(&self) -> Vec<Arc<dyn Backend>>;

    fn backend(&self, id: &str) -> Option<Arc<dyn Backend>>;
}
