//! In-memory strike map behind one reader/writer lock, with atomic file persistence.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::types::{StrikeError, StrikeRecord};
use crate::metrics;

#[derive(Debug, Default)]
struct LedgerState {
    records: HashMap<String, StrikeRecord>,
    /// Strikes added since the last `reset_cycle_counters`.
    strikes_added: u64,
    /// Records removed by `reset` since the last `reset_cycle_counters`.
    strikes_reset: u64,
}

/// Concurrency-safe strike ledger.
///
/// All operations take the single lock for their whole duration, so concurrent
/// `add` calls on the same key never lose an increment.
#[derive(Debug)]
pub struct StrikeLedger {
    state: RwLock<LedgerState>,
    persist_path: Option<PathBuf>,
}

impl StrikeLedger {
    /// Ledger without a persistence target; `save` and `load` are no-ops.
    pub fn in_memory() -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            persist_path: None,
        }
    }

    /// Open a ledger persisted at `path`, loading any existing state.
    ///
    /// Never fails: unreadable or corrupt state is logged and the ledger
    /// starts empty.
    pub async fn open(path: impl Into<PathBuf>) -> Self {
        let ledger = Self {
            state: RwLock::new(LedgerState::default()),
            persist_path: Some(path.into()),
        };
        if let Err(e) = ledger.load().await {
            warn!(error = %e, "Failed to load persisted strikes, starting fresh");
        }
        ledger
    }

    pub fn persist_path(&self) -> Option<&Path> {
        self.persist_path.as_deref()
    }

    /// Record a strike for `id` and return the new count.
    pub async fn add(&self, id: &str, job: &str, name: &str) -> u32 {
        let now = Utc::now();
        let mut state = self.state.write().await;
        state.strikes_added += 1;

        let count = match state.records.get_mut(id) {
            Some(record) => {
                record.count += 1;
                record.last_seen = now;
                record.job = job.to_string();
                if !name.is_empty() {
                    record.name = name.to_string();
                }
                record.count
            }
            None => {
                state
                    .records
                    .insert(id.to_string(), StrikeRecord::new(job, name, now));
                1
            }
        };

        metrics::STRIKES_ADDED.inc();
        metrics::STRIKES_TRACKED.set(state.records.len() as i64);
        debug!(download_id = id, job, count, "Strike added");
        count
    }

    /// Current strike count, 0 when untracked.
    pub async fn get(&self, id: &str) -> u32 {
        let state = self.state.read().await;
        state.records.get(id).map(|r| r.count).unwrap_or(0)
    }

    /// `true` once `id` has at least `max_strikes` strikes.
    pub async fn has_exceeded(&self, id: &str, max_strikes: u32) -> bool {
        self.get(id).await >= max_strikes
    }

    /// Forget `id`. Unknown ids are ignored and leave the counters untouched.
    pub async fn reset(&self, id: &str) {
        let mut state = self.state.write().await;
        if state.records.remove(id).is_some() {
            state.strikes_reset += 1;
            metrics::STRIKES_RESET.inc();
            metrics::STRIKES_TRACKED.set(state.records.len() as i64);
            debug!(download_id = id, "Strikes reset");
        }
    }

    /// Drop every record. Cycle counters are left as they are.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.records.clear();
        metrics::STRIKES_TRACKED.set(0);
    }

    /// Remove records not seen within `max_age`, whatever their count.
    pub async fn cleanup(&self, max_age: Duration) -> usize {
        let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(max_age)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);

        let mut state = self.state.write().await;
        let before = state.records.len();
        state.records.retain(|_, record| record.last_seen >= cutoff);
        let removed = before - state.records.len();

        if removed > 0 {
            metrics::STRIKES_TRACKED.set(state.records.len() as i64);
            debug!(removed, max_age_secs = max_age.num_seconds(), "Cleaned up stale strikes");
        }
        removed
    }

    /// Return `(added, reset)` since the previous call and zero both.
    pub async fn reset_cycle_counters(&self) -> (u64, u64) {
        let mut state = self.state.write().await;
        let counters = (state.strikes_added, state.strikes_reset);
        state.strikes_added = 0;
        state.strikes_reset = 0;
        counters
    }

    pub async fn count(&self) -> usize {
        self.state.read().await.records.len()
    }

    pub async fn get_record(&self, id: &str) -> Option<StrikeRecord> {
        self.state.read().await.records.get(id).cloned()
    }

    pub async fn get_all_records(&self) -> HashMap<String, StrikeRecord> {
        self.state.read().await.records.clone()
    }

    /// Persist every record, replacing the target atomically.
    ///
    /// The snapshot is written to a sibling temp file, synced, then renamed
    /// over the target. A failed rename removes the temp file.
    pub async fn save(&self) -> Result<(), StrikeError> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };

        let data = {
            let state = self.state.read().await;
            let sorted: BTreeMap<&String, &StrikeRecord> = state.records.iter().collect();
            serde_json::to_vec_pretty(&sorted).map_err(StrikeError::Serialize)?
        };

        atomic_write(path, &data).await?;
        debug!(path = %path.display(), bytes = data.len(), "Saved strikes");
        Ok(())
    }

    /// Replace in-memory records with the persisted snapshot.
    ///
    /// A missing file is not an error. On a parse error the current records
    /// are left untouched.
    pub async fn load(&self) -> Result<(), StrikeError> {
        let Some(path) = &self.persist_path else {
            return Ok(());
        };

        let data = match tokio::fs::read(path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(io_error(path, e)),
        };

        let mut records: HashMap<String, StrikeRecord> =
            serde_json::from_slice(&data).map_err(|e| StrikeError::Parse {
                path: path.display().to_string(),
                source: e,
            })?;
        // A record only exists while it holds at least one strike.
        records.retain(|_, r| r.count > 0);

        let mut state = self.state.write().await;
        state.records = records;
        metrics::STRIKES_TRACKED.set(state.records.len() as i64);
        debug!(path = %path.display(), count = state.records.len(), "Loaded persisted strikes");
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StrikeError {
    StrikeError::Io {
        path: path.display().to_string(),
        source,
    }
}

async fn atomic_write(target: &Path, data: &[u8]) -> Result<(), StrikeError> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_error(parent, e))?;
    }

    let file_name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "strikes".to_string());
    let tmp = target.with_file_name(format!(".{}.tmp-{}", file_name, uuid::Uuid::new_v4()));

    let written = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(data).await?;
        file.sync_all().await
    }
    .await;
    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(io_error(&tmp, e));
    }

    if let Err(e) = tokio::fs::rename(&tmp, target).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(io_error(target, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_add_increments_and_returns_count() {
        let ledger = StrikeLedger::in_memory();
        assert_eq!(ledger.add("abc", "stalled", "Show.S01E01").await, 1);
        assert_eq!(ledger.add("abc", "stalled", "Show.S01E01").await, 2);
        assert_eq!(ledger.add("abc", "slow", "").await, 3);

        let record = ledger.get_record("abc").await.unwrap();
        assert_eq!(record.count, 3);
        assert_eq!(record.job, "slow");
        // empty names don't clobber a known label
        assert_eq!(record.name, "Show.S01E01");
        assert!(record.last_seen >= record.first_seen);
    }

    #[tokio::test]
    async fn test_get_unknown_is_zero() {
        let ledger = StrikeLedger::in_memory();
        assert_eq!(ledger.get("missing").await, 0);
        assert!(!ledger.has_exceeded("missing", 1).await);
    }

    #[tokio::test]
    async fn test_has_exceeded_is_inclusive() {
        let ledger = StrikeLedger::in_memory();
        ledger.add("abc", "stalled", "").await;
        assert!(ledger.has_exceeded("abc", 1).await);
        assert!(!ledger.has_exceeded("abc", 2).await);
        ledger.add("abc", "stalled", "").await;
        assert!(ledger.has_exceeded("abc", 2).await);
    }

    #[tokio::test]
    async fn test_reset_counts_only_existing_records() {
        let ledger = StrikeLedger::in_memory();
        ledger.add("abc", "stalled", "").await;
        ledger.reset("abc").await;
        ledger.reset("abc").await;
        ledger.reset("never-seen").await;

        assert_eq!(ledger.get("abc").await, 0);
        assert!(ledger.get_record("abc").await.is_none());
        assert_eq!(ledger.reset_cycle_counters().await, (1, 1));
    }

    #[tokio::test]
    async fn test_reset_cycle_counters_zeroes() {
        let ledger = StrikeLedger::in_memory();
        ledger.add("a", "stalled", "").await;
        ledger.add("b", "stalled", "").await;
        assert_eq!(ledger.reset_cycle_counters().await, (2, 0));
        assert_eq!(ledger.reset_cycle_counters().await, (0, 0));
    }

    #[tokio::test]
    async fn test_clear_keeps_cycle_counters() {
        let ledger = StrikeLedger::in_memory();
        ledger.add("a", "stalled", "").await;
        ledger.add("b", "stalled", "").await;
        ledger.clear().await;
        assert_eq!(ledger.count().await, 0);
        assert_eq!(ledger.reset_cycle_counters().await, (2, 0));
    }

    #[tokio::test]
    async fn test_cleanup_uses_last_seen_only() {
        let ledger = StrikeLedger::in_memory();
        ledger.add("fresh", "stalled", "").await;
        for _ in 0..5 {
            ledger.add("stale", "stalled", "").await;
        }
        {
            let mut state = ledger.state.write().await;
            let record = state.records.get_mut("stale").unwrap();
            record.last_seen = Utc::now() - chrono::Duration::days(8);
        }

        let removed = ledger.cleanup(Duration::from_secs(7 * 24 * 3600)).await;
        assert_eq!(removed, 1);
        assert_eq!(ledger.get("stale").await, 0);
        assert_eq!(ledger.get("fresh").await, 1);
    }

    #[tokio::test]
    async fn test_get_all_records_is_a_copy() {
        let ledger = StrikeLedger::in_memory();
        ledger.add("abc", "stalled", "").await;
        let mut copy = ledger.get_all_records().await;
        copy.get_mut("abc").unwrap().count = 99;
        copy.remove("abc");
        assert_eq!(ledger.get("abc").await, 1);
    }

    #[tokio::test]
    async fn test_concurrent_adds_same_key() {
        let ledger = Arc::new(StrikeLedger::in_memory());
        let mut handles = Vec::new();
        for _ in 0..50 {
            let ledger = Arc::clone(&ledger);
            handles.push(tokio::spawn(async move {
                for _ in 0..20 {
                    ledger.add("shared", "stalled", "").await;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(ledger.get("shared").await, 1000);
    }

    #[tokio::test]
    async fn test_save_without_path_is_noop() {
        let ledger = StrikeLedger::in_memory();
        ledger.add("abc", "stalled", "").await;
        assert!(ledger.save().await.is_ok());
        assert!(ledger.load().await.is_ok());
        assert_eq!(ledger.get("abc").await, 1);
    }

    #[tokio::test]
    async fn test_save_creates_directories_and_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("strikes.json");
        let ledger = StrikeLedger::open(&path).await;
        ledger.add("abc", "stalled", "Movie (2020)").await;
        ledger.save().await.unwrap();

        assert!(path.exists());
        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("strikes.json")]);

        let json: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(json["abc"]["count"], 1);
        assert_eq!(json["abc"]["job"], "stalled");
        assert_eq!(json["abc"]["name"], "Movie (2020)");
        assert!(json["abc"]["first_seen"].is_string());
    }

    #[tokio::test]
    async fn test_open_corrupt_file_starts_empty_and_stays_writable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("strikes.json");
        std::fs::write(&path, b"{not json").unwrap();

        let ledger = StrikeLedger::open(&path).await;
        assert_eq!(ledger.count().await, 0);
        assert!(matches!(ledger.load().await, Err(StrikeError::Parse { .. })));

        ledger.add("abc", "stalled", "").await;
        ledger.save().await.unwrap();
        let reopened = StrikeLedger::open(&path).await;
        assert_eq!(reopened.get("abc").await, 1);
    }

    #[tokio::test]
    async fn test_load_drops_records_without_strikes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("strikes.json");
        std::fs::write(
            &path,
            br#"{
                "live": {"count": 2, "first_seen": "2026-01-01T00:00:00Z",
                         "last_seen": "2026-01-02T00:00:00Z", "job": "remove_stalled"},
                "empty": {"count": 0, "first_seen": "2026-01-01T00:00:00Z",
                          "last_seen": "2026-01-02T00:00:00Z", "job": "remove_stalled"}
            }"#,
        )
        .unwrap();

        let ledger = StrikeLedger::open(&path).await;

        assert_eq!(ledger.count().await, 1);
        assert_eq!(ledger.get("live").await, 2);
        assert!(ledger.get_record("empty").await.is_none());
        assert_eq!(ledger.add("empty", "remove_stalled", "").await, 1);
    }

    #[tokio::test]
    async fn test_save_fails_when_target_is_a_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("strikes.json");
        std::fs::create_dir(&path).unwrap();

        let ledger = StrikeLedger {
            state: RwLock::new(LedgerState::default()),
            persist_path: Some(path.clone()),
        };
        ledger.add("abc", "stalled", "").await;
        assert!(matches!(ledger.save().await, Err(StrikeError::Io { .. })));

        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .contains(".tmp-")
            })
            .count();
        assert_eq!(leftovers, 0);
    }
}
