//! [`SendHistoryStore`] — append-only JSON Lines log with a minute index.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{Duration, Local, NaiveDateTime, Timelike};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::HistoryError;

/// Outcome of one dispatch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SendOutcome {
    Sent,
    Failed,
    Skipped,
}

/// One dispatch attempt for one slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendRecord {
    /// Slot this attempt targeted, truncated to the minute.
    pub target_minute: NaiveDateTime,
    pub message_id: String,
    pub data_hash: String,
    pub sent_at: NaiveDateTime,
    pub outcome: SendOutcome,
}

#[derive(Debug)]
struct Inner {
    /// Attempts grouped by slot; at most one `Sent` per key.
    index: BTreeMap<NaiveDateTime, Vec<SendRecord>>,
    file: Option<File>,
    path: Option<PathBuf>,
    /// Exclusive advisory lock on the sidecar lock file, held for the
    /// store's lifetime. Released when the handle closes. Lives on the
    /// sidecar rather than the data file so prune compaction (which
    /// replaces the data file) cannot drop it.
    _lock: Option<File>,
}

impl Inner {
    fn has_sent(&self, minute: NaiveDateTime) -> bool {
        self.index
            .get(&minute)
            .is_some_and(|records| records.iter().any(|r| r.outcome == SendOutcome::Sent))
    }

    fn append(&mut self, record: SendRecord) -> Result<(), HistoryError> {
        if let Some(file) = self.file.as_mut() {
            let mut line = serde_json::to_string(&record)
                .map_err(|e| HistoryError::Corrupt { line: 0, reason: e.to_string() })?;
            line.push('\n');
            file.write_all(line.as_bytes())?;
            file.flush()?;
        }
        self.index.entry(record.target_minute).or_default().push(record);
        Ok(())
    }
}

/// Durable log of dispatch attempts. Concurrent `record_sent` calls in one
/// process are serialized behind a mutex; across processes, `open` takes an
/// exclusive advisory lock on a sidecar file, so a second worker pointed at
/// the same history path fails fast instead of double-sending. Either way
/// the store, not its callers, yields exactly one winner per slot.
#[derive(Debug)]
pub struct SendHistoryStore {
    inner: Mutex<Inner>,
}

impl SendHistoryStore {
    /// Open (or create) a JSON Lines history file and rebuild the index.
    /// Unparseable lines are skipped with a warning, not fatal. Fails with
    /// [`HistoryError::Locked`] when another store holds the same path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, HistoryError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(path.with_extension("jsonl.lock"))?;
        lock.try_lock_exclusive().map_err(|e| {
            if e.kind() == std::io::ErrorKind::WouldBlock {
                HistoryError::Locked(path.clone())
            } else {
                HistoryError::Io(e)
            }
        })?;

        let mut index: BTreeMap<NaiveDateTime, Vec<SendRecord>> = BTreeMap::new();
        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for (number, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<SendRecord>(&line) {
                    Ok(record) => {
                        index.entry(record.target_minute).or_default().push(record)
                    }
                    Err(e) => {
                        warn!(line = number + 1, error = %e, "skipping corrupt history line");
                        continue;
                    }
                };
            }
        }
        let record_count: usize = index.values().map(Vec::len).sum();
        info!(path = %path.display(), records = record_count, "send history loaded");

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            inner: Mutex::new(Inner {
                index,
                file: Some(file),
                path: Some(path),
                _lock: Some(lock),
            }),
        })
    }

    /// Volatile store for tests and dry runs.
    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Inner {
                index: BTreeMap::new(),
                file: None,
                path: None,
                _lock: None,
            }),
        }
    }

    /// Record a successful dispatch for a slot.
    ///
    /// Fails with [`HistoryError::DuplicateSlot`] when the slot already has a
    /// `Sent` record; the losing caller skips, it does not retry.
    pub fn record_sent(
        &self,
        target_minute: NaiveDateTime,
        message_id: &str,
        data_hash: &str,
    ) -> Result<(), HistoryError> {
        self.record_sent_at(target_minute, message_id, data_hash, Local::now().naive_local())
    }

    /// [`record_sent`](Self::record_sent) with an explicit `sent_at`, for
    /// deterministic tests and recovery replay.
    pub fn record_sent_at(
        &self,
        target_minute: NaiveDateTime,
        message_id: &str,
        data_hash: &str,
        sent_at: NaiveDateTime,
    ) -> Result<(), HistoryError> {
        let minute = truncate(target_minute);
        let mut inner = self.inner.lock().expect("history lock poisoned");
        if inner.has_sent(minute) {
            return Err(HistoryError::DuplicateSlot(minute));
        }
        inner.append(SendRecord {
            target_minute: minute,
            message_id: message_id.to_string(),
            data_hash: data_hash.to_string(),
            sent_at,
            outcome: SendOutcome::Sent,
        })?;
        debug!(slot = %minute, message_id, "recorded sent slot");
        Ok(())
    }

    /// Record a failed or skipped attempt (diagnostics; non-unique).
    pub fn record_attempt(
        &self,
        target_minute: NaiveDateTime,
        outcome: SendOutcome,
        message_id: &str,
        data_hash: &str,
        at: NaiveDateTime,
    ) -> Result<(), HistoryError> {
        let minute = truncate(target_minute);
        let mut inner = self.inner.lock().expect("history lock poisoned");
        inner.append(SendRecord {
            target_minute: minute,
            message_id: message_id.to_string(),
            data_hash: data_hash.to_string(),
            sent_at: at,
            outcome,
        })
    }

    pub fn has_sent_for_slot(&self, target_minute: NaiveDateTime) -> bool {
        let inner = self.inner.lock().expect("history lock poisoned");
        inner.has_sent(truncate(target_minute))
    }

    /// Expected slots within the lookback window that have no `Sent` record,
    /// ascending. Idempotent: the same inputs yield the same answer until a
    /// new send lands.
    pub fn find_missing_slots(
        &self,
        expected: &[NaiveDateTime],
        now: NaiveDateTime,
        lookback: Duration,
    ) -> Vec<NaiveDateTime> {
        let horizon = now - lookback;
        let inner = self.inner.lock().expect("history lock poisoned");
        let mut missing: Vec<NaiveDateTime> = expected
            .iter()
            .map(|&slot| truncate(slot))
            .filter(|&slot| slot >= horizon && slot <= now)
            .filter(|&slot| !inner.has_sent(slot))
            .collect();
        missing.sort();
        missing.dedup();
        missing
    }

    /// Delete records older than the retention horizon, compacting the
    /// backing file. Returns how many records were dropped.
    pub fn prune_older_than(
        &self,
        retention: Duration,
        now: NaiveDateTime,
    ) -> Result<usize, HistoryError> {
        let horizon = now - retention;
        let mut inner = self.inner.lock().expect("history lock poisoned");

        let before: usize = inner.index.values().map(Vec::len).sum();
        inner.index.retain(|&minute, _| minute >= horizon);
        let after: usize = inner.index.values().map(Vec::len).sum();
        let dropped = before - after;

        if dropped > 0 {
            if let Some(path) = inner.path.clone() {
                let tmp = path.with_extension("jsonl.tmp");
                {
                    let mut file = File::create(&tmp)?;
                    for record in inner.index.values().flatten() {
                        let mut line = serde_json::to_string(record)
                            .map_err(|e| HistoryError::Corrupt { line: 0, reason: e.to_string() })?;
                        line.push('\n');
                        file.write_all(line.as_bytes())?;
                    }
                    file.flush()?;
                }
                fs::rename(&tmp, &path)?;
                inner.file = Some(OpenOptions::new().append(true).open(&path)?);
            }
            info!(dropped, "pruned send history");
        }
        Ok(dropped)
    }

    /// Total records held (all outcomes).
    pub fn len(&self) -> usize {
        let inner = self.inner.lock().expect("history lock poisoned");
        inner.index.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn truncate(t: NaiveDateTime) -> NaiveDateTime {
    t.date()
        .and_hms_opt(t.hour(), t.minute(), 0)
        .expect("hour/minute taken from a valid datetime")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn minute(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    #[test]
    fn second_sent_for_same_slot_is_rejected() {
        let store = SendHistoryStore::in_memory();
        store
            .record_sent_at(minute(11, 45), "msg-1", "hash-a", minute(11, 45))
            .unwrap();

        let err = store
            .record_sent_at(minute(11, 45), "msg-2", "hash-b", minute(11, 46))
            .unwrap_err();
        assert!(matches!(err, HistoryError::DuplicateSlot(m) if m == minute(11, 45)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn seconds_are_truncated_before_dedup() {
        let store = SendHistoryStore::in_memory();
        let with_seconds = NaiveDate::from_ymd_opt(2025, 6, 2)
            .unwrap()
            .and_hms_opt(11, 45, 30)
            .unwrap();
        store
            .record_sent_at(with_seconds, "msg-1", "hash-a", with_seconds)
            .unwrap();
        assert!(store.has_sent_for_slot(minute(11, 45)));
        assert!(store
            .record_sent_at(minute(11, 45), "msg-2", "hash-a", minute(11, 46))
            .is_err());
    }

    #[test]
    fn concurrent_writers_produce_one_winner() {
        let store = Arc::new(SendHistoryStore::in_memory());
        let mut handles = Vec::new();
        for i in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                store.record_sent_at(
                    minute(12, 0),
                    &format!("msg-{i}"),
                    "hash",
                    minute(12, 0),
                )
            }));
        }
        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let winners = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(winners, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn find_missing_slots_reports_unsent_only() {
        let store = SendHistoryStore::in_memory();
        let expected = vec![minute(11, 0), minute(11, 15), minute(11, 30), minute(11, 45)];
        store
            .record_sent_at(minute(11, 15), "msg", "hash", minute(11, 15))
            .unwrap();
        // A failed attempt does not count as sent.
        store
            .record_attempt(minute(11, 30), SendOutcome::Failed, "msg", "hash", minute(11, 30))
            .unwrap();

        let now = minute(11, 50);
        let missing = store.find_missing_slots(&expected, now, Duration::hours(2));
        assert_eq!(missing, vec![minute(11, 0), minute(11, 30), minute(11, 45)]);

        // Idempotent without new sends.
        assert_eq!(store.find_missing_slots(&expected, now, Duration::hours(2)), missing);

        // Empty when everything was sent.
        for slot in &missing {
            store.record_sent_at(*slot, "msg", "hash", now).unwrap();
        }
        assert!(store.find_missing_slots(&expected, now, Duration::hours(2)).is_empty());
    }

    #[test]
    fn find_missing_slots_honors_lookback() {
        let store = SendHistoryStore::in_memory();
        let expected = vec![minute(8, 0), minute(11, 30)];
        let missing = store.find_missing_slots(&expected, minute(11, 50), Duration::hours(2));
        // 08:00 is outside the 2h lookback.
        assert_eq!(missing, vec![minute(11, 30)]);
    }

    #[test]
    fn persists_across_reopen_and_prunes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");

        {
            let store = SendHistoryStore::open(&path).unwrap();
            store
                .record_sent_at(minute(9, 0), "msg-early", "hash", minute(9, 0))
                .unwrap();
            store
                .record_sent_at(minute(11, 45), "msg-late", "hash", minute(11, 45))
                .unwrap();
        }

        let store = SendHistoryStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert!(store.has_sent_for_slot(minute(9, 0)));

        // Prune the early record, then make sure the compacted file reloads.
        let dropped = store
            .prune_older_than(Duration::hours(2), minute(12, 0))
            .unwrap();
        assert_eq!(dropped, 1);
        assert!(!store.has_sent_for_slot(minute(9, 0)));

        drop(store);
        let reopened = SendHistoryStore::open(&path).unwrap();
        assert_eq!(reopened.len(), 1);
        assert!(reopened.has_sent_for_slot(minute(11, 45)));
    }

    #[test]
    fn second_open_of_same_path_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");

        let store = SendHistoryStore::open(&path).unwrap();
        store
            .record_sent_at(minute(11, 45), "msg", "hash", minute(11, 45))
            .unwrap();

        // A second store on the same path (a stray parallel worker) cannot
        // build its own index and double-send; it is refused at open.
        let err = SendHistoryStore::open(&path).unwrap_err();
        assert!(matches!(err, HistoryError::Locked(p) if p == path));

        // The lock dies with the store, so a clean restart works.
        drop(store);
        let reopened = SendHistoryStore::open(&path).unwrap();
        assert!(reopened.has_sent_for_slot(minute(11, 45)));
    }

    #[test]
    fn corrupt_lines_are_skipped_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history.jsonl");
        {
            let store = SendHistoryStore::open(&path).unwrap();
            store
                .record_sent_at(minute(10, 0), "msg", "hash", minute(10, 0))
                .unwrap();
        }
        fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"not json\n")
            .unwrap();

        let store = SendHistoryStore::open(&path).unwrap();
        assert_eq!(store.len(), 1);
    }
}
