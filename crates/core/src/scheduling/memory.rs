//! In-process scheduling store.
//!
//! Backs the core unit tests and embeddable callers that do not want a
//! database file. Mirrors the transition rules the SQLite adapter enforces,
//! so the processor behaves identically against either implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use syndica_domain::{
    DispatchReport, NewRecurrencePolicy, NewScheduledPost, PostStatus, RecurrencePolicy, Result,
    ScheduledPost, SyndicaError,
};
use tokio::sync::RwLock;

use crate::scheduling::ports::SchedulingStore;

#[derive(Default)]
struct Inner {
    posts: Vec<ScheduledPost>,
    policies: Vec<RecurrencePolicy>,
    next_post_id: i64,
    next_policy_id: i64,
}

impl Inner {
    fn insert_post(&mut self, post: NewScheduledPost, now: DateTime<Utc>) -> i64 {
        self.next_post_id += 1;
        let id = self.next_post_id;
        self.posts.push(ScheduledPost {
            id,
            platforms: post.platforms,
            content: post.content,
            media_url: post.media_url,
            media_type: post.media_type,
            publish_at: post.publish_at,
            timezone: post.timezone,
            priority: post.priority,
            metadata: post.metadata,
            status: PostStatus::Pending,
            published_at: None,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        });
        id
    }

    fn pending_post_mut(&mut self, id: i64) -> Result<&mut ScheduledPost> {
        let post = self
            .posts
            .iter_mut()
            .find(|post| post.id == id)
            .ok_or_else(|| SyndicaError::NotFound(format!("scheduled post {id}")))?;
        if post.status != PostStatus::Pending {
            return Err(SyndicaError::InvalidSchedule(format!(
                "post {id} is {}, only pending posts can transition",
                post.status
            )));
        }
        Ok(post)
    }
}

/// `RwLock`-guarded vector store implementing [`SchedulingStore`].
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SchedulingStore for InMemoryStore {
    async fn insert_post(&self, post: NewScheduledPost) -> Result<i64> {
        let mut inner = self.inner.write().await;
        Ok(inner.insert_post(post, Utc::now()))
    }

    async fn insert_recurrence(&self, policy: NewRecurrencePolicy) -> Result<i64> {
        let mut inner = self.inner.write().await;
        let now = Utc::now();
        inner.next_policy_id += 1;
        let id = inner.next_policy_id;
        inner.policies.push(RecurrencePolicy {
            id,
            scheduled_post_id: policy.scheduled_post_id,
            cadence: policy.cadence,
            time_of_day: policy.time_of_day,
            until: policy.until,
            timezone: policy.timezone,
            last_run_at: None,
            next_run_at: policy.next_run_at,
            is_active: true,
            created_at: now,
            updated_at: now,
        });
        Ok(id)
    }

    async fn get_post(&self, id: i64) -> Result<ScheduledPost> {
        let inner = self.inner.read().await;
        inner
            .posts
            .iter()
            .find(|post| post.id == id)
            .cloned()
            .ok_or_else(|| SyndicaError::NotFound(format!("scheduled post {id}")))
    }

    async fn find_pending(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ScheduledPost>> {
        let inner = self.inner.read().await;
        let mut pending: Vec<ScheduledPost> = inner
            .posts
            .iter()
            .filter(|post| post.status == PostStatus::Pending && post.publish_at > now)
            .cloned()
            .collect();
        pending.sort_by_key(|post| post.publish_at);
        pending.truncate(limit);
        Ok(pending)
    }

    async fn find_due(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledPost>> {
        let inner = self.inner.read().await;
        let mut due: Vec<ScheduledPost> = inner
            .posts
            .iter()
            .filter(|post| post.status == PostStatus::Pending && post.publish_at <= now)
            .cloned()
            .collect();
        due.sort_by(|a, b| {
            b.priority.cmp(&a.priority).then_with(|| a.publish_at.cmp(&b.publish_at))
        });
        Ok(due)
    }

    async fn mark_published(
        &self,
        id: i64,
        published_at: DateTime<Utc>,
        result: &DispatchReport,
    ) -> Result<()> {
        let mut inner = self.inner.write().await;
        let post = inner.pending_post_mut(id)?;
        post.status = PostStatus::Published;
        post.published_at = Some(published_at);
        post.result = Some(result.clone());
        post.updated_at = Utc::now();
        Ok(())
    }

    async fn mark_failed(&self, id: i64, error: &str) -> Result<()> {
        let mut inner = self.inner.write().await;
        let post = inner.pending_post_mut(id)?;
        post.status = PostStatus::Failed;
        post.error = Some(error.to_string());
        post.updated_at = Utc::now();
        Ok(())
    }

    async fn cancel_post(&self, id: i64) -> Result<()> {
        let mut inner = self.inner.write().await;
        let post = inner.pending_post_mut(id)?;
        post.status = PostStatus::Cancelled;
        post.updated_at = Utc::now();
        Ok(())
    }

    async fn find_active_recurrence(&self, post_id: i64) -> Result<Option<RecurrencePolicy>> {
        let inner = self.inner.read().await;
        Ok(inner
            .policies
            .iter()
            .find(|policy| policy.scheduled_post_id == post_id && policy.is_active)
            .cloned())
    }

    async fn deactivate_recurrence(&self, policy_id: i64) -> Result<()> {
        let mut inner = self.inner.write().await;
        let policy = inner
            .policies
            .iter_mut()
            .find(|policy| policy.id == policy_id)
            .ok_or_else(|| SyndicaError::NotFound(format!("recurrence policy {policy_id}")))?;
        policy.is_active = false;
        policy.updated_at = Utc::now();
        Ok(())
    }

    async fn roll_recurrence(
        &self,
        policy_id: i64,
        successor: NewScheduledPost,
        last_run: DateTime<Utc>,
        next_run: DateTime<Utc>,
    ) -> Result<i64> {
        // Single write lock covers the insert and the repoint, so a reader
        // never observes the policy pointing at a finished post.
        let mut inner = self.inner.write().await;
        inner
            .policies
            .iter()
            .position(|policy| policy.id == policy_id)
            .ok_or_else(|| SyndicaError::NotFound(format!("recurrence policy {policy_id}")))?;

        let new_id = inner.insert_post(successor, Utc::now());
        let policy = inner
            .policies
            .iter_mut()
            .find(|policy| policy.id == policy_id)
            .ok_or_else(|| SyndicaError::NotFound(format!("recurrence policy {policy_id}")))?;
        policy.scheduled_post_id = new_id;
        policy.last_run_at = Some(last_run);
        policy.next_run_at = next_run;
        policy.updated_at = Utc::now();
        Ok(new_id)
    }
}
