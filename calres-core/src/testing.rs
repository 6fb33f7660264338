//! In-memory backends for tests.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::backend::Backend;
use crate::error::{CalresError, CalresResult};
use crate::live::{LiveItem, LiveRecord};

/// Serves the same items for resources and rooms. `listed: None` behaves like
/// a backend that is down.
pub struct FakeBackend {
    id: String,
    listed: Option<Vec<String>>,
    items: Vec<LiveRecord>,
    broken_fetch: HashSet<String>,
}

impl FakeBackend {
    pub fn new(id: &str) -> Self {
        FakeBackend {
            id: id.to_string(),
            listed: Some(Vec::new()),
            items: Vec::new(),
            broken_fetch: HashSet::new(),
        }
    }

    pub fn unavailable(id: &str) -> Self {
        FakeBackend {
            listed: None,
            ..FakeBackend::new(id)
        }
    }

    pub fn with_item(mut self, item: LiveRecord) -> Self {
        if let Some(listed) = self.listed.as_mut() {
            listed.push(item.id.clone());
        }
        self.items.push(item);
        self
    }

    /// Adds an id to the listing without a matching item.
    pub fn with_listed_id(mut self, id: &str) -> Self {
        if let Some(listed) = self.listed.as_mut() {
            listed.push(id.to_string());
        }
        self
    }

    pub fn with_broken_fetch(mut self, id: &str) -> Self {
        self.broken_fetch.insert(id.to_string());
        self
    }

    fn list(&self) -> CalresResult<Vec<String>> {
        self.listed
            .clone()
            .ok_or_else(|| CalresError::BackendUnavailable(format!("{} is down", self.id)))
    }

    fn fetch(&self, id: &str) -> CalresResult<Box<dyn LiveItem>> {
        if self.listed.is_none() || self.broken_fetch.contains(id) {
            return Err(CalresError::BackendUnavailable(format!(
                "{} could not fetch {id}",
                self.id
            )));
        }

        self.items
            .iter()
            .find(|item| item.id == id)
            .cloned()
            .map(|item| Box::new(item) as Box<dyn LiveItem>)
            .ok_or_else(|| CalresError::Provider(format!("{id} not found")))
    }
}

#[async_trait]
impl Backend for FakeBackend {
    fn identifier(&self) -> &str {
        &self.id
    }

    async fn list_all_resources(&self) -> CalresResult<Vec<String>> {
        self.list()
    }

    async fn get_resource(&self, id: &str) -> CalresResult<Box<dyn LiveItem>> {
        self.fetch(id)
    }

    async fn list_all_rooms(&self) -> CalresResult<Vec<String>> {
        self.list()
    }

    async fn get_room(&self, id: &str) -> CalresResult<Box<dyn LiveItem>> {
        self.fetch(id)
    }
}
