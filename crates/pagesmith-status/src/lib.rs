//! Process-lifetime task status tracking
//!
//! [`StatusTable`] maps a submission nonce to its last-known
//! [`TaskStatusRecord`]. Records are created lazily on the first update,
//! mutated in place afterwards and never deleted.
//!
//! # Concurrency
//!
//! The table is backed by a `DashMap`, so an upsert for one nonce holds only
//! that entry's shard lock. Readers never observe a half-written record.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::trace;

use pagesmith_utils::types::{TaskStatus, TaskStatusRecord};

/// Read/write access to task status records.
///
/// The orchestrator is the only writer; the HTTP front door and CLI read.
pub trait StatusStore: Send + Sync {
    /// Create or overwrite the record for `nonce`, refreshing `updated_at`.
    fn update(&self, nonce: &str, status: TaskStatus, message: &str) -> TaskStatusRecord;

    fn get(&self, nonce: &str) -> Option<TaskStatusRecord>;

    /// All records, oldest first.
    fn list_all(&self) -> Vec<TaskStatusRecord>;
}

/// Concurrent in-memory status table.
#[derive(Debug, Default)]
pub struct StatusTable {
    records: DashMap<String, TaskStatusRecord>,
}

impl StatusTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for sharing the table between components.
    #[must_use]
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// `updated_at` never goes backwards, even if the wall clock does.
fn next_timestamp(previous: DateTime<Utc>) -> DateTime<Utc> {
    Utc::now().max(previous)
}

impl StatusStore for StatusTable {
    fn update(&self, nonce: &str, status: TaskStatus, message: &str) -> TaskStatusRecord {
        let entry = self
            .records
            .entry(nonce.to_string())
            .and_modify(|record| {
                record.status = status;
                record.message = message.to_string();
                record.updated_at = next_timestamp(record.updated_at);
            })
            .or_insert_with(|| {
                let now = Utc::now();
                TaskStatusRecord {
                    nonce: nonce.to_string(),
                    status,
                    message: message.to_string(),
                    created_at: now,
                    updated_at: now,
                }
            });

        trace!(nonce, status = %status, "Status updated");
        entry.value().clone()
    }

    fn get(&self, nonce: &str) -> Option<TaskStatusRecord> {
        self.records.get(nonce).map(|entry| entry.value().clone())
    }

    fn list_all(&self) -> Vec<TaskStatusRecord> {
        let mut records: Vec<TaskStatusRecord> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.nonce.cmp(&b.nonce))
        });
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn first_update_creates_record() {
        let table = StatusTable::new();
        assert!(table.get("n1").is_none());

        let record = table.update("n1", TaskStatus::Processing, "Generating");

        assert_eq!(record.nonce, "n1");
        assert_eq!(record.status, TaskStatus::Processing);
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn later_updates_mutate_in_place() {
        let table = StatusTable::new();
        let first = table.update("n1", TaskStatus::Processing, "Generating");
        let second = table.update("n1", TaskStatus::Completed, "Done");

        assert_eq!(table.len(), 1, "no duplicate record per nonce");
        assert_eq!(second.created_at, first.created_at, "created_at is preserved");
        assert!(second.updated_at >= first.updated_at);
        assert_eq!(table.get("n1").unwrap().message, "Done");
    }

    #[test]
    fn timestamps_never_move_backwards() {
        let future = Utc::now() + Duration::hours(1);
        assert_eq!(next_timestamp(future), future);
        assert!(next_timestamp(Utc::now() - Duration::hours(1)) <= Utc::now());
    }

    #[test]
    fn list_all_returns_every_record_oldest_first() {
        let table = StatusTable::new();
        table.update("a", TaskStatus::Processing, "x");
        table.update("b", TaskStatus::Failed, "y");
        table.update("a", TaskStatus::Completed, "z");

        let all = table.list_all();
        assert_eq!(all.len(), 2);
        assert!(all[0].created_at <= all[1].created_at);
        assert!(all.iter().any(|r| r.nonce == "a" && r.status == TaskStatus::Completed));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_are_isolated_per_nonce() {
        let table = StatusTable::shared();
        let mut handles = Vec::new();

        for i in 0..16 {
            let table = Arc::clone(&table);
            handles.push(tokio::spawn(async move {
                let nonce = format!("nonce-{}", i % 4);
                for step in 0..50 {
                    table.update(&nonce, TaskStatus::Processing, &format!("step {step}"));
                }
                table.update(&nonce, TaskStatus::Completed, "done");
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(table.len(), 4);
        for record in table.list_all() {
            assert_eq!(record.status, TaskStatus::Completed);
            assert!(record.updated_at >= record.created_at);
        }
    }
}
