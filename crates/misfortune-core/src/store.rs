use std::collections::VecDeque;

use contracts::{DisplayCue, LogEntry, LOG_CAPACITY};
use tracing::warn;

use crate::settings::{SettingKey, SettingsBackend, StoreError, WorldSettings};

/// Result of a pool write, handed to the local display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolChange {
    pub previous: u64,
    pub current: u64,
}

impl PoolChange {
    pub fn cue(&self) -> Option<DisplayCue> {
        cue_between(self.previous, self.current)
    }
}

pub fn cue_between(previous: u64, current: u64) -> Option<DisplayCue> {
    if current > previous {
        Some(DisplayCue::PulseUp)
    } else if current < previous {
        Some(DisplayCue::PulseDown)
    } else {
        None
    }
}

/// Keep only the most recent `LOG_CAPACITY` entries.
fn trim_log(log: &mut VecDeque<LogEntry>) {
    while log.len() > LOG_CAPACITY {
        log.pop_front();
    }
}

/// The persisted pool counter and its trailing log, fronted by a local cache.
///
/// Reads are served from the cache, so a write is visible to the next read on
/// this client immediately. Persistence failures never abort a write; they are
/// kept in `last_persistence_error` until the next successful write.
#[derive(Debug)]
pub struct CounterStore {
    settings: WorldSettings,
    pool: u64,
    log: VecDeque<LogEntry>,
    last_persistence_error: Option<String>,
}

impl CounterStore {
    pub fn load(backend: Box<dyn SettingsBackend>) -> Result<Self, StoreError> {
        let settings = WorldSettings::new(backend);
        let pool = settings.pool()?;
        let mut log: VecDeque<LogEntry> = settings.log()?.into();
        trim_log(&mut log);

        Ok(Self {
            settings,
            pool,
            log,
            last_persistence_error: None,
        })
    }

    pub fn read(&self) -> u64 {
        self.pool
    }

    pub fn write(&mut self, new_value: i64) -> PoolChange {
        let previous = self.pool;
        self.pool = new_value.max(0) as u64;

        let result = self.settings.write(SettingKey::Pool, &self.pool);
        self.record_persistence(result);

        PoolChange {
            previous,
            current: self.pool,
        }
    }

    pub fn append_log(&mut self, entry: LogEntry) {
        self.log.push_back(entry);
        trim_log(&mut self.log);

        let result = self.settings.write(SettingKey::Log, &self.log);
        self.record_persistence(result);
    }

    /// Oldest first.
    pub fn log(&self) -> impl DoubleEndedIterator<Item = &LogEntry> + ExactSizeIterator {
        self.log.iter()
    }

    /// Drop the local cache and re-read persisted state, as a page reload would.
    pub fn reload(&mut self) -> Result<u64, StoreError> {
        self.pool = self.settings.pool()?;
        self.log = self.settings.log()?.into();
        trim_log(&mut self.log);
        Ok(self.pool)
    }

    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.settings.write(SettingKey::Pool, &self.pool)?;
        self.settings.write(SettingKey::Log, &self.log)?;
        self.settings.flush()?;
        self.last_persistence_error = None;
        Ok(())
    }

    pub fn settings(&self) -> &WorldSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut WorldSettings {
        &mut self.settings
    }

    pub fn last_persistence_error(&self) -> Option<&str> {
        self.last_persistence_error.as_deref()
    }

    fn record_persistence(&mut self, result: Result<(), StoreError>) {
        match result {
            Ok(()) => self.last_persistence_error = None,
            Err(err) => {
                warn!(error = %err, "failed to persist misfortune state");
                self.last_persistence_error = Some(err.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MemorySettings;
    use serde_json::Value;

    struct FailingSettings;

    impl SettingsBackend for FailingSettings {
        fn get(&self, _key: SettingKey) -> Result<Option<Value>, StoreError> {
            Ok(None)
        }

        fn set(&mut self, _key: SettingKey, _value: Value) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk full".to_string()))
        }
    }

    #[test]
    fn write_clamps_at_zero() {
        let mut store = CounterStore::load(Box::new(MemorySettings::new())).expect("load");
        let change = store.write(-3);
        assert_eq!(store.read(), 0);
        assert_eq!(change.cue(), None);
    }

    #[test]
    fn write_persists_and_reports_direction() {
        let backend = MemorySettings::new();
        let mut store = CounterStore::load(Box::new(backend.clone())).expect("load");

        let up = store.write(2);
        assert_eq!(up.cue(), Some(DisplayCue::PulseUp));
        let down = store.write(1);
        assert_eq!(down.cue(), Some(DisplayCue::PulseDown));

        let reloaded = CounterStore::load(Box::new(backend)).expect("reload");
        assert_eq!(reloaded.read(), 1);
    }

    #[test]
    fn log_evicts_oldest_past_capacity() {
        let mut store = CounterStore::load(Box::new(MemorySettings::new())).expect("load");
        for pool in 1..=(LOG_CAPACITY as u64 + 5) {
            store.append_log(LogEntry::earned(Some("Anna".to_string()), Some(88), pool));
        }

        assert_eq!(store.log().len(), LOG_CAPACITY);
        assert_eq!(store.log().next().map(|entry| entry.pool), Some(6));
        assert_eq!(
            store.log().next_back().map(|entry| entry.pool),
            Some(LOG_CAPACITY as u64 + 5)
        );
    }

    #[test]
    fn persistence_failure_keeps_local_value() {
        let mut store = CounterStore::load(Box::new(FailingSettings)).expect("load");
        store.write(4);
        assert_eq!(store.read(), 4);
        assert!(store
            .last_persistence_error()
            .is_some_and(|err| err.contains("disk full")));
    }

    #[test]
    fn reload_observes_other_writers() {
        let backend = MemorySettings::new();
        let mut local = CounterStore::load(Box::new(backend.clone())).expect("load");
        let mut remote = CounterStore::load(Box::new(backend)).expect("load");

        remote.write(3);
        assert_eq!(local.read(), 0);
        assert_eq!(local.reload().expect("reload"), 3);
    }

    #[test]
    fn oversized_persisted_log_is_trimmed_on_load_and_reload() {
        let mut backend = MemorySettings::new();
        let seeded: Vec<LogEntry> = (1..=60)
            .map(|pool| LogEntry::earned(Some("Anna".to_string()), Some(88), pool))
            .collect();
        backend
            .set(SettingKey::Log, serde_json::to_value(&seeded).expect("encode"))
            .expect("seed log");

        let mut store = CounterStore::load(Box::new(backend.clone())).expect("load");
        assert_eq!(store.log().len(), LOG_CAPACITY);

        backend
            .set(SettingKey::Log, serde_json::to_value(&seeded).expect("encode"))
            .expect("reseed log");
        store.reload().expect("reload");
        assert_eq!(store.log().len(), LOG_CAPACITY);
        assert_eq!(store.log().next().map(|entry| entry.pool), Some(11));
        assert_eq!(store.log().next_back().map(|entry| entry.pool), Some(60));
    }
}
