//! `SettingsStore` implementations.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::models::records::UserRecord;
use crate::settings::{SettingsError, SettingsStore};

/// Keys written for an optional field that is absent are removed, so a cleared value does
/// not come back on the next load.
const OPTIONAL_KEYS: [&str; 3] = ["keyAchievement", "portfolioUrl", "location"];

/// Stores settings as one flat JSON object of key/value pairs.
///
/// Keys this service does not know about are preserved across saves. Writes go to a sibling
/// temp file first and are renamed into place.
pub struct JsonFileSettings {
    path: PathBuf,
    // serializes read-modify-write cycles
    lock: RwLock<()>,
}

impl JsonFileSettings {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: RwLock::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_map(&self) -> Result<Map<String, Value>, SettingsError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Map::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Map::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_map(&self, map: &Map<String, Value>) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(map)?).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for JsonFileSettings {
    async fn load_user(&self) -> Result<Option<UserRecord>, SettingsError> {
        let _guard = self.lock.read().await;
        let map = self.read_map().await?;
        if !map.contains_key("name") {
            debug!("No user settings stored at {}", self.path.display());
            return Ok(None);
        }
        Ok(Some(serde_json::from_value(Value::Object(map))?))
    }

    async fn save_user(&self, user: &UserRecord) -> Result<(), SettingsError> {
        let _guard = self.lock.write().await;
        let mut map = self.read_map().await?;
        for key in OPTIONAL_KEYS {
            map.remove(key);
        }
        // older files keep the experience under "years"
        map.remove("years");
        if let Value::Object(fields) = serde_json::to_value(user)? {
            map.extend(fields);
        }
        self.write_map(&map).await?;
        info!("User settings saved to {}", self.path.display());
        Ok(())
    }
}

/// Process-local store, for tests and ephemeral runs.
#[derive(Default)]
pub struct MemorySettings {
    user: RwLock<Option<UserRecord>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn load_user(&self) -> Result<Option<UserRecord>, SettingsError> {
        Ok(self.user.read().await.clone())
    }

    async fn save_user(&self, user: &UserRecord) -> Result<(), SettingsError> {
        *self.user.write().await = Some(user.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserRecord {
        UserRecord {
            name: "Ada".into(),
            years_experience: 6,
            current_role: "Engineer".into(),
            top_skills: "Rust, Go".into(),
            location: Some("London".into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSettings::new(dir.path().join("settings.json"));
        assert_eq!(store.load_user().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileSettings::new(dir.path().join("nested").join("settings.json"));
        store.save_user(&user()).await.unwrap();
        assert_eq!(store.load_user().await.unwrap(), Some(user()));
    }

    #[tokio::test]
    async fn test_save_preserves_unknown_keys_and_clears_optionals() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(
            &path,
            r#"{"theme":"dark","name":"Old","years":2,"currentRole":"Dev","topSkills":"C","portfolioUrl":"https://old"}"#,
        )
        .await
        .unwrap();
        let store = JsonFileSettings::new(&path);

        let loaded = store.load_user().await.unwrap().unwrap();
        assert_eq!(loaded.years_experience, 2);
        assert_eq!(loaded.portfolio_url.as_deref(), Some("https://old"));

        store.save_user(&user()).await.unwrap();
        let raw: Value = serde_json::from_slice(&tokio::fs::read(&path).await.unwrap()).unwrap();
        assert_eq!(raw["theme"], "dark");
        assert_eq!(raw["yearsExperience"], 6);
        assert!(raw.get("years").is_none());
        assert!(raw.get("portfolioUrl").is_none());
        assert_eq!(store.load_user().await.unwrap(), Some(user()));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        let store = JsonFileSettings::new(&path);
        assert!(matches!(store.load_user().await, Err(SettingsError::Parse(_))));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemorySettings::new();
        assert_eq!(store.load_user().await.unwrap(), None);
        store.save_user(&user()).await.unwrap();
        assert_eq!(store.load_user().await.unwrap(), Some(user()));
    }
}
