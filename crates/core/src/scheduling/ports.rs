//! Port interface for scheduled-post persistence

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use syndica_domain::{
    DispatchReport, NewRecurrencePolicy, NewScheduledPost, RecurrencePolicy, Result, ScheduledPost,
};

/// Persistence port consumed by the builder and the due-post processor.
///
/// Implemented by [`crate::scheduling::memory::InMemoryStore`] and by the
/// SQLite adapter in the infra crate. Status transitions are enforced by the
/// implementation: `pending` is the only state a post can leave.
#[async_trait]
pub trait SchedulingStore: Send + Sync {
    /// Persist a new pending post, returning its store-assigned id.
    async fn insert_post(&self, post: NewScheduledPost) -> Result<i64>;

    /// Persist a new recurrence policy, returning its id.
    async fn insert_recurrence(&self, policy: NewRecurrencePolicy) -> Result<i64>;

    /// Fetch a post by id.
    async fn get_post(&self, id: i64) -> Result<ScheduledPost>;

    /// Pending posts with a publish instant still in the future, soonest
    /// first. Used for the upcoming/dry-run listing.
    async fn find_pending(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ScheduledPost>>;

    /// Pending posts whose publish instant has passed, ordered by priority
    /// descending then publish instant ascending.
    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledPost>>;

    /// Transition a pending post to `published` with its dispatch result.
    async fn mark_published(
        &self,
        id: i64,
        published_at: DateTime<Utc>,
        result: &DispatchReport,
    ) -> Result<()>;

    /// Transition a pending post to `failed` with its error text.
    async fn mark_failed(&self, id: i64, error: &str) -> Result<()>;

    /// Transition a pending post to `cancelled`. Any other current status is
    /// an `InvalidSchedule` error; the post is never deleted.
    async fn cancel_post(&self, id: i64) -> Result<()>;

    /// Look up the active recurrence policy pointing at the given post.
    async fn find_active_recurrence(&self, post_id: i64) -> Result<Option<RecurrencePolicy>>;

    /// Mark a recurrence policy inactive. No further occurrences follow.
    async fn deactivate_recurrence(&self, policy_id: i64) -> Result<()>;

    /// Insert the successor occurrence and repoint the policy at it in one
    /// store transaction, setting `last_run_at` and `next_run_at`. Returns
    /// the successor post id.
    async fn roll_recurrence(
        &self,
        policy_id: i64,
        successor: NewScheduledPost,
        last_run: DateTime<Utc>,
        next_run: DateTime<Utc>,
    ) -> Result<i64>;
}
