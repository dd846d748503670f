use std::{
    collections::{HashMap, HashSet},
    fmt, fs,
    io::Write,
    path::PathBuf,
    sync::Arc,
};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    clock::{Clock, SystemClock},
    error::StorageError,
    model::CorrectionType,
    normalizer::content_digest,
};

/// Similarity above which an accepted correction suppresses a new check.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

/// One user reaction to a suggested correction. Never mutated after insertion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionRecord {
    /// Record identifier.
    pub id: Uuid,
    /// Digest of the original text.
    pub content_digest: String,
    /// Text the suggestion applied to.
    pub original_text: String,
    /// Text after the user's decision.
    pub corrected_text: String,
    /// What the user did.
    pub correction_type: CorrectionType,
    /// When the decision was recorded.
    pub timestamp: DateTime<Utc>,
}

/// Append-only JSON-lines journal, one file per user.
#[derive(Debug, Clone)]
pub struct CorrectionJournal {
    base_path: PathBuf,
}

impl CorrectionJournal {
    /// Journal rooted at `base_path`.
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// File names are digests so user ids never reach the filesystem verbatim.
    fn user_file(&self, user_id: &str) -> PathBuf {
        self.base_path
            .join(format!("{}.jsonl", content_digest(user_id)))
    }

    /// Appends one record to the user's journal.
    pub fn append(&self, user_id: &str, record: &CorrectionRecord) -> Result<(), StorageError> {
        fs::create_dir_all(&self.base_path)?;
        let line = serde_json::to_vec(&JournalLine { user_id, record })?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.user_file(user_id))?;
        file.write_all(&line)?;
        file.write_all(b"\n")?;
        file.flush()?;
        Ok(())
    }

    /// Replays every journal file. Unreadable files and lines are skipped.
    pub fn load_all(&self) -> Result<HashMap<String, Vec<CorrectionRecord>>, StorageError> {
        let mut histories: HashMap<String, Vec<CorrectionRecord>> = HashMap::new();
        if !self.base_path.exists() {
            return Ok(histories);
        }
        for entry in fs::read_dir(&self.base_path)?.flatten() {
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != "jsonl") {
                continue;
            }
            let data = match fs::read_to_string(&path) {
                Ok(data) => data,
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "skipping unreadable correction journal");
                    continue;
                }
            };
            for line in data.lines().filter(|line| !line.trim().is_empty()) {
                if let Ok(parsed) = serde_json::from_str::<OwnedJournalLine>(line) {
                    histories
                        .entry(parsed.user_id)
                        .or_default()
                        .push(parsed.record);
                }
            }
        }
        for records in histories.values_mut() {
            records.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        }
        Ok(histories)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JournalLine<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    record: &'a CorrectionRecord,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnedJournalLine {
    user_id: String,
    #[serde(flatten)]
    record: CorrectionRecord,
}

/// Per-user history of correction decisions.
pub struct CorrectionMemory {
    histories: RwLock<HashMap<String, Vec<CorrectionRecord>>>,
    journal: Option<CorrectionJournal>,
    threshold: f64,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for CorrectionMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorrectionMemory")
            .field("users", &self.histories.read().len())
            .field("journal", &self.journal)
            .field("threshold", &self.threshold)
            .finish()
    }
}

impl Default for CorrectionMemory {
    fn default() -> Self {
        Self::in_memory(DEFAULT_SIMILARITY_THRESHOLD, Arc::new(SystemClock))
    }
}

impl CorrectionMemory {
    /// Memory without persistence.
    #[must_use]
    pub fn in_memory(threshold: f64, clock: Arc<dyn Clock>) -> Self {
        Self {
            histories: RwLock::new(HashMap::new()),
            journal: None,
            threshold,
            clock,
        }
    }

    /// Memory backed by a journal, replaying existing history first.
    pub fn with_journal(
        journal: CorrectionJournal,
        threshold: f64,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StorageError> {
        let histories = journal.load_all()?;
        Ok(Self {
            histories: RwLock::new(histories),
            journal: Some(journal),
            threshold,
            clock,
        })
    }

    /// Appends a decision to the user's history. Journal failures are logged
    /// and absorbed; the in-memory history is always updated.
    pub fn record(
        &self,
        user_id: &str,
        original_text: &str,
        corrected_text: &str,
        correction_type: CorrectionType,
    ) -> CorrectionRecord {
        let record = CorrectionRecord {
            id: Uuid::new_v4(),
            content_digest: content_digest(original_text),
            original_text: original_text.to_string(),
            corrected_text: corrected_text.to_string(),
            correction_type,
            timestamp: self.clock.now(),
        };
        self.histories
            .write()
            .entry(user_id.to_string())
            .or_default()
            .push(record.clone());
        if let Some(journal) = &self.journal {
            if let Err(err) = journal.append(user_id, &record) {
                tracing::warn!(error = %err, "correction journal append failed");
            }
        }
        record
    }

    /// True when the user previously accepted a correction similar to `candidate`.
    #[must_use]
    pub fn has_accepted_similar(&self, user_id: &str, candidate: &str) -> bool {
        let histories = self.histories.read();
        let Some(records) = histories.get(user_id) else {
            return false;
        };
        let candidate_tokens = token_set(candidate);
        records
            .iter()
            .filter(|record| record.correction_type == CorrectionType::Accepted)
            .any(|record| {
                jaccard(&token_set(&record.corrected_text), &candidate_tokens) > self.threshold
            })
    }

    /// Snapshot of one user's history in insertion order.
    #[must_use]
    pub fn history(&self, user_id: &str) -> Vec<CorrectionRecord> {
        self.histories
            .read()
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }
}

/// Token-set Jaccard similarity after lower-casing and stripping punctuation.
/// Two texts without tokens have similarity 0.
#[must_use]
pub fn similarity(a: &str, b: &str) -> f64 {
    jaccard(&token_set(a), &token_set(b))
}

fn token_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .chars()
        .map(|ch| if ch.is_alphanumeric() || ch.is_whitespace() { ch } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
