use std::path::PathBuf;

use config::Config;

use crate::error::StoreError;

/// Storage engine selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Fjall,
    Memory,
}

/// The `[store]` section
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub database_path: PathBuf,
    pub clear_on_start: bool,
    pub sync_writes: bool,
}

impl StoreConfig {
    /// Load the `[store]` section, with defaults filled in from the module's defaults file
    pub fn try_load(config: &Config) -> Result<Self, StoreError> {
        let full_config = Config::builder()
            .add_source(config::File::from_str(
                include_str!("../config.default.toml"),
                config::FileFormat::Toml,
            ))
            .add_source(config.clone())
            .build()?;
        Ok(full_config.get("store")?)
    }

    pub fn memory() -> Self {
        Self {
            backend: StoreBackend::Memory,
            database_path: PathBuf::new(),
            clear_on_start: false,
            sync_writes: false,
        }
    }

    pub fn fjall(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: StoreBackend::Fjall,
            database_path: path.into(),
            clear_on_start: false,
            sync_writes: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_section_is_missing() {
        let config = Config::builder().build().unwrap();
        let store = StoreConfig::try_load(&config).unwrap();
        assert_eq!(store.backend, StoreBackend::Fjall);
        assert_eq!(store.database_path, PathBuf::from("watchtower-db"));
        assert!(!store.clear_on_start);
        assert!(!store.sync_writes);
    }

    #[test]
    fn user_values_override_defaults() {
        let config = Config::builder()
            .add_source(config::File::from_str(
                "[store]\nbackend = \"memory\"\nsync-writes = true\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        let store = StoreConfig::try_load(&config).unwrap();
        assert_eq!(store.backend, StoreBackend::Memory);
        assert!(store.sync_writes);
        assert_eq!(store.database_path, PathBuf::from("watchtower-db"));
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let config = Config::builder()
            .add_source(config::File::from_str(
                "[store]\nbackend = \"sled\"\n",
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap();
        assert!(matches!(StoreConfig::try_load(&config), Err(StoreError::Config(_))));
    }
}
