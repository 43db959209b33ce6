//! Per-content playback preferences (resume position, rate, voice).
//!
//! Persistence is best effort: read and write failures are logged and
//! swallowed, malformed records load as "no preferences". Narration never
//! depends on the store being healthy.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;

use super::timing::PlaybackRate;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("preference storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("preference record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Storage key for a content item's preferences.
pub fn storage_key(content_id: &str) -> String {
    format!("voices:{}", content_id)
}

// ── Record ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PersistedPreferences {
    pub position_ms: u64,
    pub rate: PlaybackRate,
    pub voice_id: Option<String>,
}

/// Wire shape: `{ "positionMs": 1234, "rate": 1.25, "voiceId": "…" }`.
/// Every field is optional so older or hand-edited records still load.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPreferences {
    #[serde(default)]
    position_ms: Option<serde_json::Number>,
    #[serde(default)]
    rate: Option<serde_json::Number>,
    #[serde(default)]
    voice_id: Option<String>,
}

impl From<&PersistedPreferences> for StoredPreferences {
    fn from(prefs: &PersistedPreferences) -> Self {
        Self {
            position_ms: Some(prefs.position_ms.into()),
            rate: serde_json::Number::from_f64(f64::from(prefs.rate.multiplier())),
            voice_id: prefs.voice_id.clone(),
        }
    }
}

impl From<StoredPreferences> for PersistedPreferences {
    fn from(stored: StoredPreferences) -> Self {
        let position_ms = stored
            .position_ms
            .and_then(|ms| ms.as_f64())
            .filter(|ms| ms.is_finite() && *ms > 0.0)
            .map(|ms| ms as u64)
            .unwrap_or(0);
        let rate = stored
            .rate
            .and_then(|rate| rate.as_f64())
            .and_then(PlaybackRate::from_multiplier)
            .unwrap_or_default();
        let voice_id = stored.voice_id.filter(|id| !id.is_empty());
        Self {
            position_ms,
            rate,
            voice_id,
        }
    }
}

impl PersistedPreferences {
    pub fn to_json(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(&StoredPreferences::from(self))?)
    }

    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let stored: StoredPreferences = serde_json::from_str(json)?;
        Ok(stored.into())
    }
}

// ── Store Trait ────────────────────────────────────────

/// Durable string key-value storage.
#[async_trait]
pub trait PreferencesStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<String>, StoreError>;

    async fn save(&self, key: &str, value: String) -> Result<(), StoreError>;
}

/// One JSON file per key inside a directory.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<data dir>/narration-engine/preferences`, or a relative fallback.
    pub fn default_dir() -> PathBuf {
        dirs_next::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("narration-engine")
            .join("preferences")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", urlencoding::encode(key)))
    }

    /// Unique per write, so concurrent writers never share a staging file.
    fn staging_path_for(&self, key: &str) -> PathBuf {
        static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!(
            "{}.json.{}-{}.tmp",
            urlencoding::encode(key),
            std::process::id(),
            seq
        ))
    }
}

#[async_trait]
impl PreferencesStore for FileStore {
    async fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        match tokio::fs::read_to_string(self.path_for(key)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, key: &str, value: String) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let staging = self.staging_path_for(key);
        let written = match tokio::fs::write(&staging, value).await {
            Ok(()) => tokio::fs::rename(&staging, self.path_for(key)).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(e.into());
        }
        Ok(())
    }
}

/// Process-local store; contents vanish with the value.
#[derive(Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(key: &str, value: &str) -> Self {
        let mut entries = HashMap::new();
        entries.insert(key.to_string(), value.to_string());
        Self {
            entries: RwLock::new(entries),
        }
    }

    pub async fn raw(&self, key: &str) -> Option<String> {
        self.entries.read().await.get(key).cloned()
    }
}

#[async_trait]
impl PreferencesStore for MemoryStore {
    async fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.raw(key).await)
    }

    async fn save(&self, key: &str, value: String) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

// ── Keeper ─────────────────────────────────────────────

/// Typed, failure-swallowing facade over a [`PreferencesStore`].
#[derive(Clone)]
pub struct PreferenceKeeper {
    store: Arc<dyn PreferencesStore>,
}

impl PreferenceKeeper {
    pub fn new(store: Arc<dyn PreferencesStore>) -> Self {
        Self { store }
    }

    /// Read preferences for `content_id`; any failure reads as `None`.
    pub async fn load(&self, content_id: &str) -> Option<PersistedPreferences> {
        let key = storage_key(content_id);
        let raw = match self.store.load(&key).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to read narration preferences");
                return None;
            }
        };
        match PersistedPreferences::from_json(&raw) {
            Ok(prefs) => Some(prefs),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "ignoring malformed narration preferences");
                None
            }
        }
    }

    /// Write preferences, logging rather than returning failures.
    pub async fn save(&self, content_id: &str, prefs: &PersistedPreferences) {
        let key = storage_key(content_id);
        let result = match prefs.to_json() {
            Ok(json) => self.store.save(&key, json).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => tracing::trace!(key = %key, position_ms = prefs.position_ms, "saved narration preferences"),
            Err(e) => tracing::warn!(key = %key, error = %e, "failed to save narration preferences"),
        }
    }
}

// ── Writer ─────────────────────────────────────────────

/// Ordered, non-blocking writes for one content item.
///
/// A single task performs every save in submission order. When saves queue
/// up behind a slow store only the newest record is written.
pub struct PreferenceWriter {
    content_id: String,
    tx: mpsc::UnboundedSender<PersistedPreferences>,
    task: JoinHandle<()>,
}

impl PreferenceWriter {
    pub fn spawn(keeper: PreferenceKeeper, content_id: impl Into<String>) -> Self {
        let content_id = content_id.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(write_loop(keeper, content_id.clone(), rx));
        Self {
            content_id,
            tx,
            task,
        }
    }

    /// Queue `prefs`; returns immediately.
    pub fn submit(&self, prefs: PersistedPreferences) {
        if self.tx.send(prefs).is_err() {
            tracing::warn!(content_id = %self.content_id, "preference writer stopped, dropping save");
        }
    }

    /// Write everything still queued, then stop the writer task.
    pub async fn close(self) {
        let Self {
            content_id,
            tx,
            task,
        } = self;
        drop(tx);
        if let Err(e) = task.await {
            tracing::warn!(content_id = %content_id, error = %e, "preference writer ended abnormally");
        }
    }
}

async fn write_loop(
    keeper: PreferenceKeeper,
    content_id: String,
    mut rx: mpsc::UnboundedReceiver<PersistedPreferences>,
) {
    while let Some(mut prefs) = rx.recv().await {
        while let Ok(newer) = rx.try_recv() {
            prefs = newer;
        }
        keeper.save(&content_id, &prefs).await;
    }
}
