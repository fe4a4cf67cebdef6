//! Session storage and persistence.
//!
//! # Design Decisions
//! - Each entry carries the Unix time of its last save; an entry older than
//!   the cookie lifetime is never handed back and is removed on sight
//! - A background sweep bounds the map even for clients that never return
//! - The persistence file is replaced by rename, so a crash mid-write leaves
//!   the previous file intact

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time;
use uuid::Uuid;

use crate::observability::metrics;
use crate::session::SessionData;

/// Lifetime of a stored session when none is configured (30 days).
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Errors raised by session persistence.
#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("session file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Opaque identifier carried in the session cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Backing store for session data.
///
/// Must be safe for concurrent use; the engine imposes no ordering between
/// requests of the same client.
pub trait SessionStore: Send + Sync {
    fn load(&self, id: &SessionId) -> Option<SessionData>;
    fn save(&self, id: &SessionId, data: SessionData);
}

/// A session as held in memory and on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredSession {
    #[serde(flatten)]
    data: SessionData,
    /// Unix seconds of the last save.
    saved_at: u64,
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// In-memory session store with expiry and optional JSON persistence.
#[derive(Clone)]
pub struct MemorySessionStore {
    inner: Arc<DashMap<SessionId, StoredSession>>,
    persistence_path: Option<PathBuf>,
    max_age: Duration,
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MemorySessionStore {
    pub fn new(persistence_path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
            persistence_path,
            max_age: DEFAULT_MAX_AGE,
        }
    }

    /// Set how long a session lives after its last save.
    ///
    /// Entries already older than `max_age` are dropped immediately.
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self.purge_expired();
        self
    }

    pub fn max_age(&self) -> Duration {
        self.max_age
    }

    /// Load from file if it exists; saves go back to the same file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SessionStoreError> {
        let path = path.as_ref();
        let store = Self::new(Some(path.to_path_buf()));
        if path.exists() {
            let reader = BufReader::new(File::open(path)?);
            let map: HashMap<Uuid, StoredSession> = serde_json::from_reader(reader)?;
            for (id, stored) in map {
                store.inner.insert(SessionId(id), stored);
            }
            store.purge_expired();
            tracing::info!(sessions = store.inner.len(), path = %path.display(), "Loaded sessions from file");
        }
        Ok(store)
    }

    /// Write live sessions to the persistence file, if one is configured.
    ///
    /// The data goes to `<path>.part` first and is renamed over `path`.
    pub fn save_to_file(&self) -> Result<(), SessionStoreError> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };

        self.purge_expired();
        let map: HashMap<Uuid, StoredSession> = self
            .inner
            .iter()
            .map(|r| (r.key().0, r.value().clone()))
            .collect();

        let partial = partial_path(path);
        {
            let mut writer = BufWriter::new(File::create(&partial)?);
            serde_json::to_writer(&mut writer, &map)?;
            writer.flush()?;
        }
        std::fs::rename(&partial, path)?;

        tracing::info!(sessions = map.len(), path = %path.display(), "Saved sessions to file");
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.inner.len()
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(unix_now())
    }

    fn purge_expired_at(&self, now: u64) -> usize {
        let before = self.inner.len();
        self.inner.retain(|_, stored| !self.is_expired(stored.saved_at, now));
        let removed = before.saturating_sub(self.inner.len());
        if removed > 0 {
            metrics::record_sessions_expired(removed);
            tracing::debug!(removed, remaining = self.inner.len(), "Expired sessions dropped");
        }
        removed
    }

    fn is_expired(&self, saved_at: u64, now: u64) -> bool {
        now.saturating_sub(saved_at) >= self.max_age.as_secs()
    }

    fn save_at(&self, id: &SessionId, data: SessionData, now: u64) {
        if data.is_empty() {
            self.inner.remove(id);
        } else {
            self.inner.insert(*id, StoredSession { data, saved_at: now });
        }
    }

    /// Sweep expired entries every `every` until `shutdown` fires.
    pub fn spawn_sweeper(&self, every: Duration, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        let store = self.clone();
        let every = every.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = time::interval(every);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        store.purge_expired();
                    }
                    _ = shutdown.recv() => {
                        tracing::info!("Session sweeper shutting down");
                        break;
                    }
                }
            }
        })
    }
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

impl SessionStore for MemorySessionStore {
    fn load(&self, id: &SessionId) -> Option<SessionData> {
        let now = unix_now();
        let stored = self.inner.get(id).map(|r| r.value().clone())?;
        if self.is_expired(stored.saved_at, now) {
            self.inner
                .remove_if(id, |_, s| self.is_expired(s.saved_at, now));
            return None;
        }
        Some(stored.data)
    }

    fn save(&self, id: &SessionId, data: SessionData) {
        self.save_at(id, data, unix_now());
    }
}
