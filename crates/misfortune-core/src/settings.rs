//! World-scoped settings as seen by the module: a small key/value surface over
//! whatever persistence the host provides.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use contracts::{LogEntry, TriggerConfig, DEFAULT_TRIGGER_VALUE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    Pool,
    Log,
    ShowPlayers,
    TriggerValue,
    ChatFlavor,
}

impl SettingKey {
    pub fn name(self) -> &'static str {
        match self {
            Self::Pool => "misfortunePool",
            Self::Log => "misfortuneLog",
            Self::ShowPlayers => "showPlayersTracker",
            Self::TriggerValue => "triggerValue",
            Self::ChatFlavor => "chatFlavor",
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("settings backend error: {0}")]
    Backend(String),
    #[error("settings value for {key} is malformed: {source}")]
    Malformed {
        key: &'static str,
        source: serde_json::Error,
    },
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Persistence for world settings. Writes are assumed atomic per key.
pub trait SettingsBackend: Send {
    fn get(&self, key: SettingKey) -> Result<Option<Value>, StoreError>;

    fn set(&mut self, key: SettingKey, value: Value) -> Result<(), StoreError>;

    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// In-memory world settings. Clones share the same map, so several module
/// instances can stand in for clients of one world.
#[derive(Debug, Clone, Default)]
pub struct MemorySettings {
    values: Arc<Mutex<HashMap<SettingKey, Value>>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsBackend for MemorySettings {
    fn get(&self, key: SettingKey) -> Result<Option<Value>, StoreError> {
        let values = self
            .values
            .lock()
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(values.get(&key).cloned())
    }

    fn set(&mut self, key: SettingKey, value: Value) -> Result<(), StoreError> {
        let mut values = self
            .values
            .lock()
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        values.insert(key, value);
        Ok(())
    }
}

/// Typed accessors over a boxed backend.
pub struct WorldSettings {
    backend: Box<dyn SettingsBackend>,
}

impl WorldSettings {
    pub fn new(backend: Box<dyn SettingsBackend>) -> Self {
        Self { backend }
    }

    pub fn read<T: DeserializeOwned>(&self, key: SettingKey) -> Result<Option<T>, StoreError> {
        match self.backend.get(key)? {
            None | Some(Value::Null) => Ok(None),
            Some(raw) => serde_json::from_value(raw)
                .map(Some)
                .map_err(|source| StoreError::Malformed {
                    key: key.name(),
                    source,
                }),
        }
    }

    pub fn write<T: Serialize>(&mut self, key: SettingKey, value: &T) -> Result<(), StoreError> {
        let raw = serde_json::to_value(value)?;
        self.backend.set(key, raw)
    }

    /// Negative persisted values are clamped, not rejected.
    pub fn pool(&self) -> Result<u64, StoreError> {
        let raw: Option<i64> = self.read(SettingKey::Pool)?;
        Ok(raw.map(|value| value.max(0) as u64).unwrap_or(0))
    }

    pub fn log(&self) -> Result<Vec<LogEntry>, StoreError> {
        Ok(self.read(SettingKey::Log)?.unwrap_or_default())
    }

    pub fn config(&self) -> Result<TriggerConfig, StoreError> {
        let defaults = TriggerConfig::default();
        Ok(TriggerConfig {
            trigger_value: self
                .read(SettingKey::TriggerValue)?
                .unwrap_or(DEFAULT_TRIGGER_VALUE),
            show_players: self
                .read(SettingKey::ShowPlayers)?
                .unwrap_or(defaults.show_players),
            chat_flavor: self
                .read(SettingKey::ChatFlavor)?
                .unwrap_or(defaults.chat_flavor),
        })
    }

    pub fn save_config(&mut self, config: &TriggerConfig) -> Result<(), StoreError> {
        self.write(SettingKey::TriggerValue, &config.trigger_value)?;
        self.write(SettingKey::ShowPlayers, &config.show_players)?;
        self.write(SettingKey::ChatFlavor, &config.chat_flavor)
    }

    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.backend.flush()
    }
}

impl std::fmt::Debug for WorldSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldSettings").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_apply_on_first_load() {
        let settings = WorldSettings::new(Box::new(MemorySettings::new()));
        assert_eq!(settings.pool().expect("pool"), 0);
        assert!(settings.log().expect("log").is_empty());
        assert_eq!(settings.config().expect("config"), TriggerConfig::default());
    }

    #[test]
    fn negative_pool_is_clamped_on_read() {
        let mut backend = MemorySettings::new();
        backend.set(SettingKey::Pool, json!(-4)).expect("set");
        let settings = WorldSettings::new(Box::new(backend));
        assert_eq!(settings.pool().expect("pool"), 0);
    }

    #[test]
    fn malformed_value_names_the_key() {
        let mut backend = MemorySettings::new();
        backend
            .set(SettingKey::TriggerValue, json!("eighty-eight"))
            .expect("set");
        let settings = WorldSettings::new(Box::new(backend));
        let err = settings.config().expect_err("malformed trigger value");
        assert!(err.to_string().contains("triggerValue"));
    }

    #[test]
    fn clones_share_one_world() {
        let backend = MemorySettings::new();
        let mut writer = WorldSettings::new(Box::new(backend.clone()));
        let reader = WorldSettings::new(Box::new(backend));
        writer.write(SettingKey::Pool, &5_u64).expect("write");
        assert_eq!(reader.pool().expect("pool"), 5);
    }
}
