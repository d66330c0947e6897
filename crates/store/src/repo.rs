//! SQLite-backed watermark repository.

use crate::error::{ErrorKind, Result};
use crate::models::{MetadataRow, StoredTimestamp};
use crate::{CrawlerMetadata, Database, WatermarkStore, WriteOutcome};
use async_trait::async_trait;
use exn::ResultExt;
use sqlx::SqlitePool;
use time::OffsetDateTime;

/// Repository for crawler watermarks in the SQLite database.
///
/// Each compare-and-set is a single conditional statement, so SQLite's write
/// lock makes the compare and the write indivisible without an explicit
/// transaction:
///
/// | Expected | Statement                                          |
/// |----------|----------------------------------------------------|
/// | `None`   | `INSERT … ON CONFLICT DO UPDATE … WHERE IS NULL`   |
/// | `Some`   | `UPDATE … WHERE (secs, nanos) = expected`          |
///
/// Zero affected rows means another writer got there first.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WatermarkStore for Repository {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn get_metadata(&self, index: &str, crawler: &str) -> Result<CrawlerMetadata> {
        let row: Option<MetadataRow> = sqlx::query_as(include_str!("../queries/get_metadata.sql"))
            .bind(index)
            .bind(crawler)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        match row {
            Some(row) => Ok(<(String, CrawlerMetadata)>::try_from(row)?.1),
            None => Ok(CrawlerMetadata::default()),
        }
    }

    async fn set_metadata(
        &self,
        index: &str,
        crawler: &str,
        expected: Option<OffsetDateTime>,
        timestamp: OffsetDateTime,
    ) -> Result<WriteOutcome> {
        let timestamp = StoredTimestamp::from(timestamp);
        let result = match expected {
            None => sqlx::query(include_str!("../queries/insert_metadata.sql"))
                .bind(index)
                .bind(crawler)
                .bind(timestamp.secs)
                .bind(timestamp.nanos)
                .execute(&self.pool)
                .await
                .or_raise(|| ErrorKind::Database)?,
            Some(expected) => {
                let expected = StoredTimestamp::from(expected);
                sqlx::query(include_str!("../queries/update_metadata.sql"))
                    .bind(timestamp.secs)
                    .bind(timestamp.nanos)
                    .bind(index)
                    .bind(crawler)
                    .bind(expected.secs)
                    .bind(expected.nanos)
                    .execute(&self.pool)
                    .await
                    .or_raise(|| ErrorKind::Database)?
            },
        };
        Ok(match result.rows_affected() {
            0 => WriteOutcome::Conflict,
            _ => WriteOutcome::Written,
        })
    }

    async fn list_metadata(&self, index: &str) -> Result<Vec<(String, CrawlerMetadata)>> {
        let rows: Vec<MetadataRow> = sqlx::query_as(include_str!("../queries/list_metadata_for_index.sql"))
            .bind(index)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(|r| r.try_into()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Arc;
    use time::macros::datetime;

    async fn repository() -> (Database, Repository) {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::from(&db);
        (db, repo)
    }

    #[tokio::test]
    async fn test_missing_record_has_no_commit() {
        let (_db, repo) = repository().await;
        let metadata = repo.get_metadata("proj1", "c1").await.unwrap();
        assert_eq!(metadata, CrawlerMetadata::default());
    }

    #[tokio::test]
    async fn test_first_write_then_read() {
        let (_db, repo) = repository().await;
        let t1 = datetime!(2021-01-01 00:00:00.5 UTC);
        assert_eq!(repo.set_metadata("proj1", "c1", None, t1).await.unwrap(), WriteOutcome::Written);
        assert_eq!(repo.get_metadata("proj1", "c1").await.unwrap().last_commit_at, Some(t1));
    }

    #[tokio::test]
    async fn test_first_write_conflicts_when_record_exists() {
        let (_db, repo) = repository().await;
        let t1 = datetime!(2021-01-01 00:00 UTC);
        let t2 = datetime!(2021-01-02 00:00 UTC);
        repo.set_metadata("proj1", "c1", None, t2).await.unwrap();
        assert_eq!(repo.set_metadata("proj1", "c1", None, t1).await.unwrap(), WriteOutcome::Conflict);
        assert_eq!(repo.get_metadata("proj1", "c1").await.unwrap().last_commit_at, Some(t2));
    }

    #[tokio::test]
    async fn test_compare_and_set() {
        let (_db, repo) = repository().await;
        let t1 = datetime!(2021-01-01 00:00 UTC);
        let t2 = datetime!(2021-01-02 00:00 UTC);
        let t3 = datetime!(2021-01-03 00:00 UTC);
        repo.set_metadata("proj1", "c1", None, t1).await.unwrap();
        // Stale expectation loses.
        assert_eq!(repo.set_metadata("proj1", "c1", Some(t2), t3).await.unwrap(), WriteOutcome::Conflict);
        assert_eq!(repo.get_metadata("proj1", "c1").await.unwrap().last_commit_at, Some(t1));
        // Fresh expectation wins.
        assert_eq!(repo.set_metadata("proj1", "c1", Some(t1), t3).await.unwrap(), WriteOutcome::Written);
        assert_eq!(repo.get_metadata("proj1", "c1").await.unwrap().last_commit_at, Some(t3));
    }

    #[tokio::test]
    async fn test_same_value_write_is_written() {
        let (_db, repo) = repository().await;
        let t1 = datetime!(2021-01-01 00:00 UTC);
        repo.set_metadata("proj1", "c1", None, t1).await.unwrap();
        assert_eq!(repo.set_metadata("proj1", "c1", Some(t1), t1).await.unwrap(), WriteOutcome::Written);
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let (_db, repo) = repository().await;
        let t1 = datetime!(2021-01-01 00:00 UTC);
        let t2 = datetime!(2022-01-01 00:00 UTC);
        repo.set_metadata("proj1", "c1", None, t1).await.unwrap();
        repo.set_metadata("proj2", "c1", None, t2).await.unwrap();
        repo.set_metadata("proj1", "c2", None, t2).await.unwrap();
        assert_eq!(repo.get_metadata("proj1", "c1").await.unwrap().last_commit_at, Some(t1));
        assert_eq!(repo.get_metadata("proj2", "c1").await.unwrap().last_commit_at, Some(t2));

        let listed = repo.list_metadata("proj1").await.unwrap();
        let names: Vec<_> = listed.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, ["c1", "c2"]);
        assert!(repo.list_metadata("unknown").await.unwrap().is_empty());
    }

    #[rstest]
    #[case(datetime!(1600-01-01 00:00 UTC), datetime!(2300-01-01 00:00:00.000000001 UTC))]
    #[case(datetime!(0001-01-01 00:00 UTC), datetime!(9999-12-31 23:59:59.999999999 UTC))]
    #[case(datetime!(1969-12-31 23:59:59.5 UTC), datetime!(1970-01-01 00:00 UTC))]
    #[tokio::test]
    async fn test_full_timestamp_range(#[case] first: OffsetDateTime, #[case] second: OffsetDateTime) {
        let (_db, repo) = repository().await;
        assert_eq!(repo.set_metadata("proj1", "c1", None, first).await.unwrap(), WriteOutcome::Written);
        assert_eq!(repo.get_metadata("proj1", "c1").await.unwrap().last_commit_at, Some(first));
        assert_eq!(repo.set_metadata("proj1", "c1", Some(first), second).await.unwrap(), WriteOutcome::Written);
        assert_eq!(repo.list_metadata("proj1").await.unwrap()[0].1.last_commit_at, Some(second));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_first_writes_have_one_winner() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::connect(dir.path().join("race.db"), Some(4)).await.unwrap();
        let repo = Arc::new(Repository::from(&db));
        let base = datetime!(2021-01-01 00:00 UTC);
        let writes = (0..8i64).map(|i| {
            let repo = Arc::clone(&repo);
            tokio::spawn(async move {
                repo.set_metadata("proj1", "c1", None, base + time::Duration::minutes(i)).await.unwrap()
            })
        });
        let outcomes = futures::future::join_all(writes).await;
        let written = outcomes.into_iter().filter(|o| matches!(o, Ok(WriteOutcome::Written))).count();
        assert_eq!(written, 1);
        db.close().await;
    }
}
