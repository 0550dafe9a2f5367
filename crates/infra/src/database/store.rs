//! SQLite-backed scheduling store.
//!
//! Implements the `SchedulingStore` port over the pooled connection manager.
//! All database work runs in `spawn_blocking` to avoid blocking the async
//! runtime. JSON columns (platforms, metadata, result) are serialized with
//! `serde_json`; timestamps are Unix seconds.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};
use syndica_core::scheduling::ports::SchedulingStore;
use syndica_domain::{
    Cadence, DispatchReport, MediaKind, NewRecurrencePolicy, NewScheduledPost, PostStatus,
    RecurrencePolicy, Result, ScheduledPost, SyndicaError, TimeOfDay,
};
use tokio::task;

use super::manager::{map_sql_error, DbManager};

const POST_COLUMNS: &str = "id, platforms, content, media_url, media_type, publish_at, timezone, \
                            priority, metadata, status, published_at, result, error, created_at, \
                            updated_at";

const POLICY_COLUMNS: &str = "id, scheduled_post_id, cadence, time_of_day, until_at, timezone, \
                              last_run_at, next_run_at, is_active, created_at, updated_at";

/// SQLite adapter for the core scheduling port.
pub struct SqliteSchedulingStore {
    db: Arc<DbManager>,
}

impl SqliteSchedulingStore {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    async fn with_connection<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> Result<T> {
            let mut conn = db.get_connection()?;
            op(&mut conn)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl SchedulingStore for SqliteSchedulingStore {
    async fn insert_post(&self, post: NewScheduledPost) -> Result<i64> {
        self.with_connection(move |conn| insert_post(conn, &post, Utc::now().timestamp())).await
    }

    async fn insert_recurrence(&self, policy: NewRecurrencePolicy) -> Result<i64> {
        self.with_connection(move |conn| {
            let now = Utc::now().timestamp();
            conn.execute(
                "INSERT INTO recurrence_policies (scheduled_post_id, cadence, time_of_day, \
                 until_at, timezone, last_run_at, next_run_at, is_active, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, NULL, ?6, 1, ?7, ?7)",
                params![
                    policy.scheduled_post_id,
                    policy.cadence.as_str(),
                    policy.time_of_day.to_string(),
                    policy.until.map(|at| at.timestamp()),
                    policy.timezone,
                    policy.next_run_at.timestamp(),
                    now,
                ],
            )
            .map_err(map_sql_error)?;
            Ok(conn.last_insert_rowid())
        })
        .await
    }

    async fn get_post(&self, id: i64) -> Result<ScheduledPost> {
        self.with_connection(move |conn| {
            conn.query_row(
                &format!("SELECT {POST_COLUMNS} FROM scheduled_posts WHERE id = ?1"),
                params![id],
                map_post_row,
            )
            .map_err(|err| match err {
                rusqlite::Error::QueryReturnedNoRows => {
                    SyndicaError::NotFound(format!("scheduled post {id}"))
                }
                other => map_sql_error(other),
            })
        })
        .await
    }

    async fn find_pending(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ScheduledPost>> {
        self.with_connection(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {POST_COLUMNS} FROM scheduled_posts
                     WHERE status = 'pending' AND publish_at > ?1
                     ORDER BY publish_at ASC
                     LIMIT ?2"
                ))
                .map_err(map_sql_error)?;
            let posts = stmt
                .query_map(params![now.timestamp(), limit as i64], map_post_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error)?;
            Ok(posts)
        })
        .await
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledPost>> {
        self.with_connection(move |conn| {
            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {POST_COLUMNS} FROM scheduled_posts
                     WHERE status = 'pending' AND publish_at <= ?1
                     ORDER BY priority DESC, publish_at ASC"
                ))
                .map_err(map_sql_error)?;
            let posts = stmt
                .query_map(params![now.timestamp()], map_post_row)
                .map_err(map_sql_error)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(map_sql_error)?;
            Ok(posts)
        })
        .await
    }

    async fn mark_published(
        &self,
        id: i64,
        published_at: DateTime<Utc>,
        result: &DispatchReport,
    ) -> Result<()> {
        let result_json = serde_json::to_string(result)
            .map_err(|err| SyndicaError::Internal(format!("failed to encode result: {err}")))?;
        self.with_connection(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE scheduled_posts
                     SET status = 'published', published_at = ?2, result = ?3, updated_at = ?4
                     WHERE id = ?1 AND status = 'pending'",
                    params![id, published_at.timestamp(), result_json, Utc::now().timestamp()],
                )
                .map_err(map_sql_error)?;
            ensure_transitioned(conn, id, changed)
        })
        .await
    }

    async fn mark_failed(&self, id: i64, error: &str) -> Result<()> {
        let error = error.to_string();
        self.with_connection(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE scheduled_posts
                     SET status = 'failed', error = ?2, updated_at = ?3
                     WHERE id = ?1 AND status = 'pending'",
                    params![id, error, Utc::now().timestamp()],
                )
                .map_err(map_sql_error)?;
            ensure_transitioned(conn, id, changed)
        })
        .await
    }

    async fn cancel_post(&self, id: i64) -> Result<()> {
        self.with_connection(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE scheduled_posts
                     SET status = 'cancelled', updated_at = ?2
                     WHERE id = ?1 AND status = 'pending'",
                    params![id, Utc::now().timestamp()],
                )
                .map_err(map_sql_error)?;
            ensure_transitioned(conn, id, changed)
        })
        .await
    }

    async fn find_active_recurrence(&self, post_id: i64) -> Result<Option<RecurrencePolicy>> {
        self.with_connection(move |conn| {
            match conn.query_row(
                &format!(
                    "SELECT {POLICY_COLUMNS} FROM recurrence_policies
                     WHERE scheduled_post_id = ?1 AND is_active = 1"
                ),
                params![post_id],
                map_policy_row,
            ) {
                Ok(policy) => Ok(Some(policy)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(err) => Err(map_sql_error(err)),
            }
        })
        .await
    }

    async fn deactivate_recurrence(&self, policy_id: i64) -> Result<()> {
        self.with_connection(move |conn| {
            let changed = conn
                .execute(
                    "UPDATE recurrence_policies SET is_active = 0, updated_at = ?2 WHERE id = ?1",
                    params![policy_id, Utc::now().timestamp()],
                )
                .map_err(map_sql_error)?;
            if changed == 0 {
                return Err(SyndicaError::NotFound(format!("recurrence policy {policy_id}")));
            }
            Ok(())
        })
        .await
    }

    async fn roll_recurrence(
        &self,
        policy_id: i64,
        successor: NewScheduledPost,
        last_run: DateTime<Utc>,
        next_run: DateTime<Utc>,
    ) -> Result<i64> {
        self.with_connection(move |conn| {
            // Insert + repoint in one transaction so the policy never points
            // at a finished post while the successor is missing.
            let tx = conn.transaction().map_err(map_sql_error)?;
            let new_id = insert_post(&tx, &successor, Utc::now().timestamp())?;
            let changed = tx
                .execute(
                    "UPDATE recurrence_policies
                     SET scheduled_post_id = ?2, last_run_at = ?3, next_run_at = ?4, updated_at = ?5
                     WHERE id = ?1",
                    params![
                        policy_id,
                        new_id,
                        last_run.timestamp(),
                        next_run.timestamp(),
                        Utc::now().timestamp(),
                    ],
                )
                .map_err(map_sql_error)?;
            if changed == 0 {
                return Err(SyndicaError::NotFound(format!("recurrence policy {policy_id}")));
            }
            tx.commit().map_err(map_sql_error)?;
            Ok(new_id)
        })
        .await
    }
}

// ============================================================================
// Synchronous SQL operations (called inside spawn_blocking)
// ============================================================================

fn insert_post(conn: &Connection, post: &NewScheduledPost, now: i64) -> Result<i64> {
    let platforms = serde_json::to_string(&post.platforms)
        .map_err(|err| SyndicaError::Internal(format!("failed to encode platforms: {err}")))?;
    let metadata = post
        .metadata
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|err| SyndicaError::Internal(format!("failed to encode metadata: {err}")))?;

    conn.execute(
        "INSERT INTO scheduled_posts (platforms, content, media_url, media_type, publish_at, \
         timezone, priority, metadata, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'pending', ?9, ?9)",
        params![
            platforms,
            post.content,
            post.media_url,
            post.media_type.map(|kind| kind.as_str()),
            post.publish_at.timestamp(),
            post.timezone,
            i64::from(post.priority),
            metadata,
            now,
        ],
    )
    .map_err(map_sql_error)?;
    Ok(conn.last_insert_rowid())
}

/// Turn a zero-row status update into the right error: missing post or an
/// illegal transition away from a terminal status.
fn ensure_transitioned(conn: &Connection, id: i64, changed: usize) -> Result<()> {
    if changed > 0 {
        return Ok(());
    }
    match conn.query_row(
        "SELECT status FROM scheduled_posts WHERE id = ?1",
        params![id],
        |row| row.get::<_, String>(0),
    ) {
        Ok(status) => Err(SyndicaError::InvalidSchedule(format!(
            "post {id} is {status}, only pending posts can transition"
        ))),
        Err(rusqlite::Error::QueryReturnedNoRows) => {
            Err(SyndicaError::NotFound(format!("scheduled post {id}")))
        }
        Err(err) => Err(map_sql_error(err)),
    }
}

fn map_post_row(row: &Row<'_>) -> rusqlite::Result<ScheduledPost> {
    let platforms: String = row.get(1)?;
    let platforms: Vec<String> =
        serde_json::from_str(&platforms).map_err(|err| conversion_error(1, err))?;

    let media_type: Option<String> = row.get(4)?;
    let media_type = media_type
        .map(|kind| kind.parse::<MediaKind>())
        .transpose()
        .map_err(|err| conversion_error(4, err))?;

    let metadata: Option<String> = row.get(8)?;
    let metadata =
        metadata.map(|raw| serde_json::from_str(&raw)).transpose().map_err(|err| {
            conversion_error(8, err)
        })?;

    let status: String = row.get(9)?;
    let status = status.parse::<PostStatus>().map_err(|err| conversion_error(9, err))?;

    let result: Option<String> = row.get(11)?;
    let result: Option<DispatchReport> =
        result.map(|raw| serde_json::from_str(&raw)).transpose().map_err(|err| {
            conversion_error(11, err)
        })?;

    Ok(ScheduledPost {
        id: row.get(0)?,
        platforms,
        content: row.get(2)?,
        media_url: row.get(3)?,
        media_type,
        publish_at: timestamp(5, row.get(5)?)?,
        timezone: row.get(6)?,
        priority: row.get(7)?,
        metadata,
        status,
        published_at: row.get::<_, Option<i64>>(10)?.map(|secs| timestamp(10, secs)).transpose()?,
        result,
        error: row.get(12)?,
        created_at: timestamp(13, row.get(13)?)?,
        updated_at: timestamp(14, row.get(14)?)?,
    })
}

fn map_policy_row(row: &Row<'_>) -> rusqlite::Result<RecurrencePolicy> {
    let cadence: String = row.get(2)?;
    let cadence = cadence.parse::<Cadence>().map_err(|err| conversion_error(2, err))?;

    let time_of_day: String = row.get(3)?;
    let time_of_day = time_of_day.parse::<TimeOfDay>().map_err(|err| conversion_error(3, err))?;

    Ok(RecurrencePolicy {
        id: row.get(0)?,
        scheduled_post_id: row.get(1)?,
        cadence,
        time_of_day,
        until: row.get::<_, Option<i64>>(4)?.map(|secs| timestamp(4, secs)).transpose()?,
        timezone: row.get(5)?,
        last_run_at: row.get::<_, Option<i64>>(6)?.map(|secs| timestamp(6, secs)).transpose()?,
        next_run_at: timestamp(7, row.get(7)?)?,
        is_active: row.get::<_, i64>(8)? != 0,
        created_at: timestamp(9, row.get(9)?)?,
        updated_at: timestamp(10, row.get(10)?)?,
    })
}

fn timestamp(idx: usize, secs: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, secs))
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn map_join_error(err: task::JoinError) -> SyndicaError {
    if err.is_cancelled() {
        SyndicaError::Internal("blocking task cancelled".into())
    } else {
        SyndicaError::Internal(format!("blocking task failed: {err}"))
    }
}
