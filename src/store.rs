use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::model::{ExtractionResult, ExtractionStatus};

pub const DEFAULT_TTL_SECONDS: i64 = 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractionId(Uuid);

impl ExtractionId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for ExtractionId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl FromStr for ExtractionId {
    type Err = uuid::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(value.trim()).map(Self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractionSummary {
    pub id: ExtractionId,
    pub file_name: String,
    pub status: ExtractionStatus,
    pub table_count: usize,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug)]
struct StoredExtraction {
    result: Arc<ExtractionResult>,
    stored_at: DateTime<Utc>,
}

/// Results live for `ttl` after insertion. Expired entries are never
/// returned and are dropped by [`evict_expired`](Self::evict_expired).
#[derive(Debug)]
pub struct ExtractionStore {
    ttl: Duration,
    entries: RwLock<HashMap<ExtractionId, StoredExtraction>>,
}

impl ExtractionStore {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ExtractionId, StoredExtraction>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ExtractionId, StoredExtraction>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_live(&self, entry: &StoredExtraction, now: DateTime<Utc>) -> bool {
        now - entry.stored_at < self.ttl
    }

    pub fn insert(&self, result: ExtractionResult) -> ExtractionId {
        self.insert_at(result, Utc::now())
    }

    pub fn insert_at(&self, result: ExtractionResult, now: DateTime<Utc>) -> ExtractionId {
        let id = ExtractionId::generate();
        debug!(%id, file = %result.file_name, "storing extraction");
        self.write().insert(
            id,
            StoredExtraction {
                result: Arc::new(result),
                stored_at: now,
            },
        );
        id
    }

    #[must_use]
    pub fn get(&self, id: ExtractionId) -> Option<Arc<ExtractionResult>> {
        self.get_at(id, Utc::now())
    }

    #[must_use]
    pub fn get_at(&self, id: ExtractionId, now: DateTime<Utc>) -> Option<Arc<ExtractionResult>> {
        self.read()
            .get(&id)
            .filter(|entry| self.is_live(entry, now))
            .map(|entry| Arc::clone(&entry.result))
    }

    #[must_use]
    pub fn list(&self) -> Vec<ExtractionSummary> {
        self.list_at(Utc::now())
    }

    #[must_use]
    pub fn list_at(&self, now: DateTime<Utc>) -> Vec<ExtractionSummary> {
        let mut summaries = self
            .read()
            .iter()
            .filter(|(_, entry)| self.is_live(entry, now))
            .map(|(id, entry)| ExtractionSummary {
                id: *id,
                file_name: entry.result.file_name.clone(),
                status: entry.result.status,
                table_count: entry.result.tables.len(),
                stored_at: entry.stored_at,
            })
            .collect::<Vec<_>>();
        summaries.sort_by_key(|summary| summary.stored_at);
        summaries
    }

    pub fn remove(&self, id: ExtractionId) -> Option<Arc<ExtractionResult>> {
        self.write().remove(&id).map(|entry| entry.result)
    }

    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, entry| now - entry.stored_at < self.ttl);
        let evicted = before - entries.len();
        if evicted > 0 {
            debug!(evicted, "evicted expired extractions");
        }
        evicted
    }

    pub fn clear(&self) {
        self.write().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

impl Default for ExtractionStore {
    fn default() -> Self {
        Self::new(Duration::seconds(DEFAULT_TTL_SECONDS))
    }
}
