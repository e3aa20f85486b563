//! Runtime Settings
//!
//! Mutable settings changed through the admin API: the watched app set, the
//! notification channel and the polling interval. Values survive restarts in
//! a JSON file next to the database. Interval changes are broadcast over a
//! watch channel so the poll loop can re-arm its timer without restarting.

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsData {
    pub watched_apps: Vec<String>,
    pub notification_channel_id: Option<u64>,
    pub check_interval_hours: f64,
}

impl SettingsData {
    fn with_interval(check_interval_hours: f64) -> Self {
        Self {
            watched_apps: Vec::new(),
            notification_channel_id: None,
            check_interval_hours,
        }
    }
}

#[derive(Clone)]
pub struct RuntimeSettings {
    inner: Arc<RwLock<SettingsData>>,
    interval_tx: Arc<watch::Sender<f64>>,
    path: Option<PathBuf>,
}

impl RuntimeSettings {
    /// Load settings from `path`, or initialize the file with defaults if it
    /// does not exist yet.
    pub fn load_or_init(path: PathBuf, default_interval_hours: f64) -> anyhow::Result<Self> {
        let data = if path.exists() {
            let raw = fs::read_to_string(&path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?
        } else {
            SettingsData::with_interval(default_interval_hours)
        };

        let settings = Self::from_data(data, Some(path));
        settings.persist()?;
        Ok(settings)
    }

    /// In-memory settings that are never written to disk.
    #[cfg(test)]
    pub fn detached(data: SettingsData) -> Self {
        Self::from_data(data, None)
    }

    fn from_data(data: SettingsData, path: Option<PathBuf>) -> Self {
        let (interval_tx, _) = watch::channel(data.check_interval_hours);
        Self {
            inner: Arc::new(RwLock::new(data)),
            interval_tx: Arc::new(interval_tx),
            path,
        }
    }

    /// Snapshot of the watched app ids, in insertion order.
    pub fn watched_apps(&self) -> Vec<String> {
        self.read().watched_apps.clone()
    }

    pub fn is_watched(&self, app_id: &str) -> bool {
        self.read().watched_apps.iter().any(|id| id == app_id)
    }

    /// Add an app id to the watched set. Returns false without persisting if
    /// the id is already present.
    pub fn add_watched(&self, app_id: &str) -> anyhow::Result<bool> {
        {
            let mut data = self.write();
            if data.watched_apps.iter().any(|id| id == app_id) {
                return Ok(false);
            }
            data.watched_apps.push(app_id.to_string());
        }
        self.persist()?;
        Ok(true)
    }

    /// Remove an app id from the watched set. Returns false if it was not
    /// being watched. The status row for the id is intentionally left behind.
    pub fn remove_watched(&self, app_id: &str) -> anyhow::Result<bool> {
        {
            let mut data = self.write();
            let before = data.watched_apps.len();
            data.watched_apps.retain(|id| id != app_id);
            if data.watched_apps.len() == before {
                return Ok(false);
            }
        }
        self.persist()?;
        Ok(true)
    }

    pub fn notification_channel_id(&self) -> Option<u64> {
        self.read().notification_channel_id
    }

    pub fn set_notification_channel_id(&self, channel_id: u64) -> anyhow::Result<()> {
        self.write().notification_channel_id = Some(channel_id);
        self.persist()
    }

    pub fn check_interval_hours(&self) -> f64 {
        self.read().check_interval_hours
    }

    /// Update the polling interval and notify the poll loop.
    pub fn set_check_interval(&self, hours: f64) -> anyhow::Result<()> {
        self.write().check_interval_hours = hours;
        self.persist()?;
        // No receiver just means the poll loop has not started yet.
        let _ = self.interval_tx.send(hours);
        Ok(())
    }

    /// Receiver that yields the interval every time it changes.
    pub fn subscribe_interval(&self) -> watch::Receiver<f64> {
        self.interval_tx.subscribe()
    }

    fn persist(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let snapshot = self.read().clone();
        write_atomic(path, &snapshot)
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SettingsData> {
        self.inner.read().expect("settings lock poisoned")
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SettingsData> {
        self.inner.write().expect("settings lock poisoned")
    }
}

/// Write the settings file through a temp file + rename so a crash mid-write
/// leaves either the old or the new content.
fn write_atomic(path: &Path, data: &SettingsData) -> anyhow::Result<()> {
    let raw = serde_json::to_vec_pretty(data).context("failed to serialize settings")?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, raw).with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}
