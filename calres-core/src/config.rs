//! Global calres configuration.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::backend::{Provider, ProviderBackend, Registry};
use crate::error::{CalresError, CalresResult};
use crate::job::UpdateResourcesRoomsJob;
use crate::kind::ItemKind;

static DEFAULT_DATABASE_PATH: &str = "~/.local/share/calres/cache.sqlite";
static DEFAULT_INTERVAL: &str = "15m";

fn default_database_path() -> PathBuf {
    PathBuf::from(DEFAULT_DATABASE_PATH)
}

fn default_interval() -> String {
    DEFAULT_INTERVAL.to_string()
}

fn default_kinds() -> Vec<ItemKind> {
    ItemKind::ALL.to_vec()
}

/// A backend served by a `calres-provider-<provider>` binary.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackendConfig {
    pub id: String,
    pub provider: String,
    #[serde(default = "default_kinds")]
    pub kinds: Vec<ItemKind>,
    /// Passed to the provider with every request.
    #[serde(default)]
    pub params: HashMap<String, toml::Value>,
}

/// Global configuration at ~/.config/calres/config.toml
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CalresConfig {
    #[serde(default = "default_database_path")]
    pub database: PathBuf,

    #[serde(default = "default_interval")]
    pub interval: String,

    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

impl Default for CalresConfig {
    fn default() -> Self {
        CalresConfig {
            database: default_database_path(),
            interval: default_interval(),
            backends: Vec::new(),
        }
    }
}

impl CalresConfig {
    pub fn config_path() -> CalresResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CalresError::Config("Could not determine config directory".into()))?
            .join("calres");

        Ok(config_dir.join("config.toml"))
    }

    /// Load ~/.config/calres/config.toml, creating a commented default on first use.
    pub fn load() -> CalresResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    /// Load a config file, with `CALRES_*` environment variables taking precedence.
    pub fn load_from(path: &Path) -> CalresResult<Self> {
        Config::builder()
            .add_source(File::from(path.to_path_buf()).required(false))
            .add_source(Environment::with_prefix("CALRES"))
            .build()
            .map_err(|e| CalresError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CalresError::Config(e.to_string()))
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> CalresResult<()> {
        let contents = format!(
            "\
# calres configuration

# Where the resource and room cache lives:
# database = \"{DEFAULT_DATABASE_PATH}\"

# How often `calres watch` refreshes the cache:
# interval = \"{DEFAULT_INTERVAL}\"

# Backends are served by calres-provider-<provider> binaries in PATH:
# [[backends]]
# id = \"office\"
# provider = \"ldap\"
# kinds = [\"resources\", \"rooms\"]
# [backends.params]
# ldap_base = \"ou=rooms,dc=example,dc=com\"
"
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CalresError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| CalresError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        let full_path_str = shellexpand::tilde(&self.database.to_string_lossy()).into_owned();

        PathBuf::from(full_path_str)
    }

    pub fn interval(&self) -> CalresResult<Duration> {
        humantime::parse_duration(&self.interval)
            .map_err(|e| CalresError::Config(format!("Invalid interval '{}': {e}", self.interval)))
    }

    /// Registry of the backends configured for `kind`.
    pub fn registry(&self, kind: ItemKind) -> Registry {
        let mut registry = Registry::new();

        for backend in self.backends.iter().filter(|b| b.kinds.contains(&kind)) {
            registry.register(Arc::new(ProviderBackend::new(
                backend.id.clone(),
                Provider::from_name(&backend.provider),
                &backend.params,
            )));
        }

        registry
    }

    pub fn job(&self) -> UpdateResourcesRoomsJob {
        UpdateResourcesRoomsJob::new(
            Arc::new(self.registry(ItemKind::Resource)),
            Arc::new(self.registry(ItemKind::Room)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendRegistry;

    #[test]
    fn test_default_config_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("calres/config.toml");

        CalresConfig::create_default_config(&path).unwrap();
        let config = CalresConfig::load_from(&path).unwrap();

        assert_eq!(config.database, PathBuf::from(DEFAULT_DATABASE_PATH));
        assert_eq!(config.interval().unwrap(), Duration::from_secs(15 * 60));
        assert!(config.backends.is_empty());
    }

    #[test]
    fn test_backends_are_split_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
database = "/var/lib/calres/cache.sqlite"
interval = "90s"

[[backends]]
id = "office"
provider = "ldap"
[backends.params]
ldap_base = "ou=rooms,dc=example,dc=com"

[[backends]]
id = "inventory"
provider = "snipeit"
kinds = ["resources"]
"#,
        )
        .unwrap();

        let config = CalresConfig::load_from(&path).unwrap();

        assert_eq!(config.database_path(), PathBuf::from("/var/lib/calres/cache.sqlite"));
        assert_eq!(config.interval().unwrap(), Duration::from_secs(90));
        assert_eq!(config.backends[0].kinds, ItemKind::ALL.to_vec());
        assert_eq!(
            config.backends[0].params["ldap_base"].as_str(),
            Some("ou=rooms,dc=example,dc=com")
        );

        let resources = config.registry(ItemKind::Resource);
        let rooms = config.registry(ItemKind::Room);
        assert_eq!(resources.len(), 2);
        assert_eq!(rooms.len(), 1);
        assert!(rooms.backend("inventory").is_none());
    }

    #[test]
    fn test_invalid_interval_is_config_error() {
        let config = CalresConfig {
            interval: "often".into(),
            ..Default::default()
        };
        assert!(matches!(config.interval(), Err(CalresError::Config(_))));
    }

    #[test]
    fn test_database_path_expands_tilde() {
        let config = CalresConfig::default();
        let path = config.database_path();
        assert!(!path.to_string_lossy().starts_with('~'));
        assert!(path.ends_with(".local/share/calres/cache.sqlite"));
    }
}
