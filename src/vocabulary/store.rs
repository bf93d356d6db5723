//! Vocabulary Store - per-user vocabulary and correction log
//!
//! Backed by a single pretty-printed JSON document. Every write re-reads the
//! whole document, mutates it and rewrites it. The read-modify-write cycle runs
//! under one async mutex so concurrent writers in this process linearize.
//!
//! Reads are fail-soft: an unreadable or corrupt document is treated as empty
//! and the next write replaces it.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Description stamped into a freshly created document
pub const STORE_DESCRIPTION: &str = "French vocabulary and corrections log";

/// Number of entries returned in `UserStats::recent_words`
pub const RECENT_WORDS_LIMIT: usize = 10;

/// Errors raised while reading or writing the backing document
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on vocabulary file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid vocabulary document {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Which list of a user record an entry goes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Vocabulary,
    Correction,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Vocabulary => write!(f, "vocabulary"),
            EntryKind::Correction => write!(f, "correction"),
        }
    }
}

/// A logged word with its definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VocabularyEntry {
    pub word: String,
    pub definition: String,
    pub timestamp: DateTime<Utc>,
    /// Day the entry was first logged, `dd/mm/yyyy` in local time
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_seen: Option<DateTime<Utc>>,
}

/// Corrections share the entry shape; `word` holds the corrected form and
/// `last_seen` is never set.
pub type CorrectionEntry = VocabularyEntry;

impl VocabularyEntry {
    pub fn new(word: &str, definition: &str, now: DateTime<Utc>) -> Self {
        Self {
            word: word.to_string(),
            definition: definition.to_string(),
            timestamp: now,
            date: french_date(now),
            last_seen: None,
        }
    }
}

/// Everything logged for one user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub first_seen: DateTime<Utc>,
    #[serde(default)]
    pub vocabulary: Vec<VocabularyEntry>,
    #[serde(default)]
    pub corrections: Vec<CorrectionEntry>,
}

impl UserRecord {
    pub fn new(first_seen: DateTime<Utc>) -> Self {
        Self {
            first_seen,
            vocabulary: Vec::new(),
            corrections: Vec::new(),
        }
    }

    /// Summary counts plus the most recently added words
    pub fn stats(&self) -> UserStats {
        let start = self.vocabulary.len().saturating_sub(RECENT_WORDS_LIMIT);
        UserStats {
            total_vocabulary: self.vocabulary.len(),
            total_corrections: self.corrections.len(),
            first_seen: self.first_seen,
            recent_words: self.vocabulary[start..].to_vec(),
        }
    }
}

/// Per-user summary returned by `VocabularyStore::get_stats`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStats {
    pub total_vocabulary: usize,
    pub total_corrections: usize,
    pub first_seen: DateTime<Utc>,
    pub recent_words: Vec<VocabularyEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The whole persisted document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VocabularyDocument {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub users: BTreeMap<String, UserRecord>,
}

impl VocabularyDocument {
    /// Document written when no backing file exists yet
    pub fn initial(now: DateTime<Utc>) -> Self {
        Self {
            metadata: Metadata {
                created: Some(now),
                description: Some(STORE_DESCRIPTION.to_string()),
            },
            users: BTreeMap::new(),
        }
    }

    /// Apply one log call to the in-memory document.
    ///
    /// Corrections are appended unconditionally. A vocabulary word already
    /// present (case-insensitive) has its definition replaced and gains a
    /// `last_seen` stamp; otherwise it is appended.
    pub fn record(
        &mut self,
        user_id: &str,
        word: &str,
        definition: &str,
        kind: EntryKind,
        now: DateTime<Utc>,
    ) {
        let user = self
            .users
            .entry(user_id.to_string())
            .or_insert_with(|| UserRecord::new(now));

        match kind {
            EntryKind::Correction => {
                user.corrections.push(VocabularyEntry::new(word, definition, now));
            }
            EntryKind::Vocabulary => {
                let needle = word.to_lowercase();
                match user
                    .vocabulary
                    .iter_mut()
                    .find(|v| v.word.to_lowercase() == needle)
                {
                    Some(existing) => {
                        existing.definition = definition.to_string();
                        existing.last_seen = Some(now);
                    }
                    None => user.vocabulary.push(VocabularyEntry::new(word, definition, now)),
                }
            }
        }
    }
}

/// Format an instant the way a French locale prints a short date
pub fn french_date(instant: DateTime<Utc>) -> String {
    instant.with_timezone(&Local).format("%d/%m/%Y").to_string()
}

/// JSON-file backed vocabulary log
pub struct VocabularyStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl VocabularyStore {
    /// Create a store handle without touching the filesystem
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create a store handle and make sure the backing document exists
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let store = Self::new(path);
        store.ensure_initialized().await?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the backing document with empty `users` if it does not exist
    pub async fn ensure_initialized(&self) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let exists = tokio::fs::try_exists(&self.path)
            .await
            .map_err(|source| self.io_error(source))?;
        if exists {
            return Ok(());
        }

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| self.io_error(source))?;
        }

        self.save(&VocabularyDocument::initial(Utc::now())).await?;
        info!("Created vocabulary log at {}", self.path.display());
        Ok(())
    }

    /// Read and parse the backing document
    pub async fn try_load(&self) -> Result<VocabularyDocument, StoreError> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| self.io_error(source))?;
        serde_json::from_str(&contents).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })
    }

    /// Read the backing document, falling back to an empty one on any error
    pub async fn load(&self) -> VocabularyDocument {
        match self.try_load().await {
            Ok(doc) => doc,
            Err(e) => {
                error!("Error reading vocabulary file: {}", e);
                VocabularyDocument::default()
            }
        }
    }

    /// Rewrite the whole document. Goes through a sibling temp file so
    /// readers never observe a half-written document.
    async fn save(&self, doc: &VocabularyDocument) -> Result<(), StoreError> {
        let body = serde_json::to_string_pretty(doc).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|source| self.io_error(source))?;
        if let Err(source) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(self.io_error(source));
        }

        debug!("Wrote vocabulary log {}", self.path.display());
        Ok(())
    }

    /// Record one vocabulary word or correction for a user.
    ///
    /// Never fails from the caller's point of view: read errors reset to an
    /// empty document, write errors are logged and dropped.
    pub async fn log_entry(&self, user_id: &str, word: &str, definition: &str, kind: EntryKind) {
        let _guard = self.write_lock.lock().await;

        let mut doc = self.load().await;
        doc.record(user_id, word, definition, kind, Utc::now());

        if let Err(e) = self.save(&doc).await {
            error!("Error writing vocabulary file: {}", e);
            return;
        }

        info!("Logged {}: {} for {}", kind, word, user_id);
    }

    /// Everything logged for a user, if anything
    pub async fn get_user_vocabulary(&self, user_id: &str) -> Option<UserRecord> {
        self.load().await.users.remove(user_id)
    }

    /// Identifiers of every user with a record
    pub async fn get_all_users(&self) -> Vec<String> {
        self.load().await.users.into_keys().collect()
    }

    /// Summary for a user, `None` when the user is unknown
    pub async fn get_stats(&self, user_id: &str) -> Option<UserStats> {
        self.get_user_vocabulary(user_id).await.map(|record| record.stats())
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}
