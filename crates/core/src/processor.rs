//! Due-post batch processing.
//!
//! One [`DuePostProcessor::process_due`] call fetches every pending post
//! whose publish instant has passed, dispatches each across its platforms
//! and rolls recurrences forward. The batch is strictly sequential in
//! priority-descending, publish-ascending order; the caller guarantees
//! at-most-one concurrent invocation (a single cron entry), so no claim
//! step or locking happens here.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use syndica_domain::{
    DispatchReport, NewScheduledPost, PostFailure, ProcessSummary, Result, ScheduledPost,
};
use tracing::{debug, info, instrument, warn};

use crate::clock::Clock;
use crate::dispatch::{PlatformDispatcher, ShareKind};
use crate::recurrence;
use crate::scheduling::ports::SchedulingStore;

/// Polls the store for due posts and publishes them.
pub struct DuePostProcessor {
    store: Arc<dyn SchedulingStore>,
    dispatcher: PlatformDispatcher,
    clock: Arc<dyn Clock>,
}

impl DuePostProcessor {
    pub fn new(
        store: Arc<dyn SchedulingStore>,
        dispatcher: PlatformDispatcher,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, dispatcher, clock }
    }

    /// Process every due post once and return the aggregate counters.
    ///
    /// A post counts as successful when at least one platform accepted the
    /// delivery and the recurrence rollover (if any) completed. A completed
    /// dispatch where every platform failed marks the post `failed` and is
    /// reported as a batch failure, but its recurrence still rolls forward
    /// so one bad occurrence cannot end the chain.
    #[instrument(skip(self))]
    pub async fn process_due(&self) -> Result<ProcessSummary> {
        let now = self.clock.now();
        let due = self.store.find_due(now).await?;

        if due.is_empty() {
            debug!("no due posts");
            return Ok(ProcessSummary::default());
        }

        info!(count = due.len(), "processing due posts");
        let mut summary = ProcessSummary::default();

        for post in due {
            summary.processed += 1;
            match self.process_one(&post, now).await {
                Ok(report) if report.success_count > 0 => {
                    summary.successful += 1;
                }
                Ok(report) => {
                    summary.failed += 1;
                    summary
                        .errors
                        .push(PostFailure { post_id: post.id, error: report.failure_summary() });
                }
                Err(err) => {
                    warn!(post_id = post.id, error = %err, "post processing failed");
                    summary.failed += 1;
                    summary.errors.push(PostFailure { post_id: post.id, error: err.to_string() });
                    // Best effort: the post may already have left pending,
                    // in which case the store rejects the transition.
                    if let Err(mark_err) = self.store.mark_failed(post.id, &err.to_string()).await {
                        debug!(post_id = post.id, error = %mark_err, "could not record failure status");
                    }
                }
            }
        }

        info!(
            processed = summary.processed,
            successful = summary.successful,
            failed = summary.failed,
            "batch complete"
        );
        Ok(summary)
    }

    /// Dispatch one post, record its outcome and roll its recurrence.
    async fn process_one(
        &self,
        post: &ScheduledPost,
        now: DateTime<Utc>,
    ) -> Result<DispatchReport> {
        let kind = ShareKind::for_media(post.media_type);
        let report = self
            .dispatcher
            .dispatch(&post.platforms, kind, &post.content, post.media_url.as_deref())
            .await;

        if report.success_count > 0 {
            self.store.mark_published(post.id, now, &report).await?;
        } else {
            self.store.mark_failed(post.id, &report.failure_summary()).await?;
        }

        self.roll_recurrence(post, now).await?;
        Ok(report)
    }

    /// Create the next occurrence for a recurring post.
    ///
    /// Advances one cadence unit from `now`, not from the stale next-run,
    /// then clones the post into a fresh pending occurrence and repoints
    /// the policy at it in a single store transaction.
    async fn roll_recurrence(&self, post: &ScheduledPost, now: DateTime<Utc>) -> Result<()> {
        let Some(policy) = self.store.find_active_recurrence(post.id).await? else {
            return Ok(());
        };

        if let Some(until) = policy.until {
            if until <= now {
                info!(policy_id = policy.id, "recurrence exhausted, deactivating");
                self.store.deactivate_recurrence(policy.id).await?;
                return Ok(());
            }
        }

        let timezone = recurrence::parse_timezone(&policy.timezone)?;
        let next_run = recurrence::advance_from(policy.cadence, policy.time_of_day, timezone, now)?;

        let successor = NewScheduledPost {
            platforms: post.platforms.clone(),
            content: post.content.clone(),
            media_url: post.media_url.clone(),
            media_type: post.media_type,
            publish_at: next_run,
            timezone: post.timezone.clone(),
            priority: post.priority,
            metadata: post.metadata.clone(),
        };

        let new_id = self.store.roll_recurrence(policy.id, successor, now, next_run).await?;
        info!(
            policy_id = policy.id,
            successor_id = new_id,
            next_run = %next_run,
            "recurrence rolled over"
        );
        Ok(())
    }
}
