//! Defines the JSON protocol used for communication between calres and
//! provider binaries over stdin/stdout.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::live::LiveRecord;

pub trait ProviderCommand: Serialize {
    type Response: DeserializeOwned;
    fn command() -> Command;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Command {
    ListResources,
    GetResource,
    ListRooms,
    GetRoom,
}

/// Request sent from calres to a provider.
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub command: Command,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Response sent from a provider to calres.
///
/// `Unavailable` marks an outage the provider expects to recover from; the
/// cached items of that backend are kept as they are.
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response<T> {
    Success { data: T },
    Error { error: String },
    Unavailable { error: String },
}

/// List the ids of all resources the backend exposes.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListResources {
    /// Backend-specific config (e.g. ldap_base, api_url)
    #[serde(flatten)]
    pub backend_config: serde_json::Map<String, serde_json::Value>,
}

impl ProviderCommand for ListResources {
    type Response = Vec<String>;
    fn command() -> Command {
        Command::ListResources
    }
}

/// Fetch a single resource by id.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetResource {
    #[serde(flatten)]
    pub backend_config: serde_json::Map<String, serde_json::Value>,
    pub id: String,
}

impl ProviderCommand for GetResource {
    type Response = LiveRecord;
    fn command() -> Command {
        Command::GetResource
    }
}

/// List the ids of all rooms the backend exposes.
#[derive(Debug, Serialize, Deserialize)]
pub struct ListRooms {
    #[serde(flatten)]
    pub backend_config: serde_json::Map<String, serde_json::Value>,
}

impl ProviderCommand for ListRooms {
    type Response = Vec<String>;
    fn command() -> Command {
        Command::ListRooms
    }
}

/// Fetch a single room by id.
#[derive(Debug, Serialize, Deserialize)]
pub struct GetRoom {
    #[serde(flatten)]
    pub backend_config: serde_json::Map<String, serde_json::Value>,
    pub id: String,
}

impl ProviderCommand for GetRoom {
    type Response = LiveRecord;
    fn command() -> Command {
        Command::GetRoom
    }
}
