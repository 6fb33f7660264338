//! Core types for the calres resource and room cache.
//!
//! This crate provides everything the `calres` binary drives:
//! - `backend` for the backend registry and the provider subprocess protocol
//! - `store` for the local SQLite cache
//! - `sync` for diffing backends against the cache and applying the result
//! - `job` for the scheduled entry point that reconciles resources and rooms

pub mod backend;
pub mod config;
pub mod error;
pub mod item;
pub mod job;
pub mod kind;
pub mod live;
pub mod metadata;
pub mod store;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{CalresError, CalresResult};
pub use item::{CachedItem, ItemFields, ItemId, MetadataEntry};
pub use kind::ItemKind;
pub use live::{LiveItem, LiveRecord, MetadataProvider};
