//! Provider subprocess backends.
//!
//! A provider is an external binary (e.g. `calres-provider-ldap`) that
//! answers one JSON request per invocation over stdin/stdout. Any executable
//! that speaks the protocol in [`protocol`](crate::backend::protocol) can
//! back a calres backend.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::debug;

use crate::backend::Backend;
use crate::backend::protocol::{
    Command, GetResource, GetRoom, ListResources, ListRooms, ProviderCommand, Request, Response,
};
use crate::error::{CalresError, CalresResult};
use crate::live::LiveItem;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Provider(String);

impl Provider {
    pub fn from_name(name: &str) -> Self {
        Provider(name.to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    fn binary_name(&self) -> String {
        format!("calres-provider-{}", self.0)
    }

    fn binary_path(&self) -> CalresResult<std::path::PathBuf> {
        let binary_name = self.binary_name();
        which::which(&binary_name).map_err(|_| CalresError::ProviderNotInstalled(binary_name))
    }

    /// Call a typed provider command and return the result.
    ///
    /// A provider that does not answer within the timeout is reported as
    /// unavailable, like any other transient outage.
    pub async fn call<C: ProviderCommand>(&self, cmd: C) -> CalresResult<C::Response> {
        timeout(PROVIDER_TIMEOUT, self.call_raw(C::command(), cmd))
            .await
            .map_err(|_| {
                CalresError::BackendUnavailable(format!(
                    "{} timed out after {}s",
                    self.binary_name(),
                    PROVIDER_TIMEOUT.as_secs()
                ))
            })?
    }

    async fn call_raw<P: Serialize, R: DeserializeOwned>(
        &self,
        command: Command,
        params: P,
    ) -> CalresResult<R> {
        let params = serde_json::to_value(params)
            .map_err(|e| CalresError::Serialization(e.to_string()))?;
        let request = Request { command, params };
        let request_json = serde_json::to_string(&request)
            .map_err(|e| CalresError::Serialization(e.to_string()))?;

        let binary_path = self.binary_path()?;
        debug!(provider = %self.0, ?command, "calling provider");

        let mut child = TokioCommand::new(&binary_path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                CalresError::Provider(format!("Failed to spawn {}: {}", binary_path.display(), e))
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| CalresError::Provider("Provider stdin was not captured".into()))?;
        stdin
            .write_all(format!("{request_json}\n").as_bytes())
            .await?;
        drop(stdin);

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            return Err(CalresError::Provider(format!(
                "{} exited with status: {}",
                self.binary_name(),
                output.status.code().unwrap_or(-1)
            )));
        }

        parse_response(&self.binary_name(), &output.stdout)
    }
}

/// Decode a provider's stdout into the command's response type.
fn parse_response<R: DeserializeOwned>(binary_name: &str, stdout: &[u8]) -> CalresResult<R> {
    let response_str = String::from_utf8_lossy(stdout);
    if response_str.trim().is_empty() {
        return Err(CalresError::Provider(format!(
            "{binary_name} returned no response"
        )));
    }

    let response: Response<R> = serde_json::from_str(response_str.trim()).map_err(|e| {
        CalresError::Provider(format!("Failed to parse {binary_name} response: {e}"))
    })?;

    match response {
        Response::Success { data } => Ok(data),
        Response::Error { error } => Err(CalresError::Provider(error)),
        Response::Unavailable { error } => Err(CalresError::BackendUnavailable(error)),
    }
}

/// A backend served by a provider binary, configured with the key/values of
/// its `[backends.params]` table.
#[derive(Clone, Debug)]
pub struct ProviderBackend {
    identifier: String,
    provider: Provider,
    params: serde_json::Map<String, serde_json::Value>,
}

impl ProviderBackend {
    pub fn new(
        identifier: impl Into<String>,
        provider: Provider,
        params: &HashMap<String, toml::Value>,
    ) -> Self {
        let params = params
            .iter()
            .filter_map(|(k, v)| serde_json::to_value(v).ok().map(|v| (k.clone(), v)))
            .collect();

        ProviderBackend {
            identifier: identifier.into(),
            provider,
            params,
        }
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }
}

#[async_trait]
impl Backend for ProviderBackend {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    async fn list_all_resources(&self) -> CalresResult<Vec<String>> {
        self.provider
            .call(ListResources {
                backend_config: self.params.clone(),
            })
            .await
    }

    async fn get_resource(&self, id: &str) -> CalresResult<Box<dyn LiveItem>> {
        let record = self
            .provider
            .call(GetResource {
                backend_config: self.params.clone(),
                id: id.to_string(),
            })
            .await?;
        Ok(Box::new(record))
    }

    async fn list_all_rooms(&self) -> CalresResult<Vec<String>> {
        self.provider
            .call(ListRooms {
                backend_config: self.params.clone(),
            })
            .await
    }

    async fn get_room(&self, id: &str) -> CalresResult<Box<dyn LiveItem>> {
        let record = self
            .provider
            .call(GetRoom {
                backend_config: self.params.clone(),
                id: id.to_string(),
            })
            .await?;
        Ok(Box::new(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::LiveRecord;

    #[test]
    fn test_parse_success_response() {
        let stdout = br#"{"status":"success","data":{"id":"room1","display_name":"Board room"}}
"#;
        let record: LiveRecord = parse_response("calres-provider-test", stdout).unwrap();
        assert_eq!(record.id, "room1");
        assert!(record.metadata.is_none());
    }

    #[test]
    fn test_unavailable_response_is_transient() {
        let stdout = br#"{"status":"unavailable","error":"directory server down"}"#;
        let err = parse_response::<Vec<String>>("calres-provider-test", stdout).unwrap_err();
        assert!(err.is_transient());
        assert!(err.to_string().contains("directory server down"));
    }

    #[test]
    fn test_error_response_is_provider_error() {
        let stdout = br#"{"status":"error","error":"no such room"}"#;
        let err = parse_response::<LiveRecord>("calres-provider-test", stdout).unwrap_err();
        assert!(matches!(err, CalresError::Provider(msg) if msg == "no such room"));
    }

    #[test]
    fn test_empty_output_is_rejected() {
        let err = parse_response::<Vec<String>>("calres-provider-test", b"  \n").unwrap_err();
        assert!(err.to_string().contains("returned no response"));
    }

    #[tokio::test]
    async fn test_missing_binary_reports_not_installed() {
        let backend = ProviderBackend::new(
            "office",
            Provider::from_name("does-not-exist-anywhere"),
            &HashMap::new(),
        );

        let err = backend.list_all_rooms().await.unwrap_err();
        assert!(matches!(err, CalresError::ProviderNotInstalled(name)
            if name == "calres-provider-does-not-exist-anywhere"));
    }

    #[test]
    fn test_params_are_converted_to_json() {
        let mut params = HashMap::new();
        params.insert("ldap_base".to_string(), toml::Value::String("ou=rooms".into()));
        params.insert("page_size".to_string(), toml::Value::Integer(50));

        let backend = ProviderBackend::new("office", Provider::from_name("ldap"), &params);

        assert_eq!(backend.params["ldap_base"], "ou=rooms");
        assert_eq!(backend.params["page_size"], 50);
        assert_eq!(backend.provider().name(), "ldap");
    }
}
