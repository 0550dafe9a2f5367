//! Fluent specification for a scheduled post.
//!
//! A [`PostDraft`] accumulates targets, content, timing and an optional
//! recurrence through chained setters, then validates and persists
//! everything on [`PostDraft::save`]. Priority is range-checked at the
//! setter; the remaining rules are checked at save time.

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use syndica_domain::{
    Cadence, MediaKind, Metadata, NewRecurrencePolicy, NewScheduledPost, Result, ScheduleReceipt,
    SyndicaError, TimeOfDay,
};
use tracing::info;

use crate::clock::Clock;
use crate::recurrence;
use crate::scheduling::ports::SchedulingStore;

/// Mutable specification for a post awaiting persistence.
#[derive(Debug, Clone)]
pub struct PostDraft {
    platforms: Vec<String>,
    content: Option<String>,
    media_url: Option<String>,
    media_type: Option<MediaKind>,
    publish_at: Option<DateTime<Utc>>,
    timezone: Option<Tz>,
    recurring: Option<(Cadence, TimeOfDay)>,
    until: Option<DateTime<Utc>>,
    priority: u8,
    metadata: Metadata,
}

impl Default for PostDraft {
    fn default() -> Self {
        Self {
            platforms: Vec::new(),
            content: None,
            media_url: None,
            media_type: None,
            publish_at: None,
            timezone: None,
            recurring: None,
            until: None,
            priority: 5,
            metadata: Metadata::new(),
        }
    }
}

impl PostDraft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target platform names, replacing any previously set list.
    pub fn platforms<I, S>(mut self, platforms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.platforms = platforms.into_iter().map(Into::into).collect();
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn media(mut self, url: impl Into<String>, kind: MediaKind) -> Self {
        self.media_url = Some(url.into());
        self.media_type = Some(kind);
        self
    }

    /// Publish instant; stored in UTC regardless of the input offset.
    pub fn publish_at<T: TimeZone>(mut self, at: DateTime<T>) -> Self {
        self.publish_at = Some(at.with_timezone(&Utc));
        self
    }

    /// Originating timezone, used for display and recurrence math.
    pub fn timezone(mut self, timezone: Tz) -> Self {
        self.timezone = Some(timezone);
        self
    }

    /// Attach a recurrence at the given cadence and local time-of-day.
    pub fn recurring(mut self, cadence: Cadence, time_of_day: TimeOfDay) -> Self {
        self.recurring = Some((cadence, time_of_day));
        self
    }

    /// Cutoff instant after which the recurrence stops generating posts.
    pub fn until<T: TimeZone>(mut self, at: DateTime<T>) -> Self {
        self.until = Some(at.with_timezone(&Utc));
        self
    }

    /// Priority 1-10, higher served first. Rejected here, not at save time.
    pub fn priority(mut self, priority: u8) -> Result<Self> {
        if !(1..=10).contains(&priority) {
            return Err(SyndicaError::InvalidSchedule(format!(
                "priority must be between 1 and 10, got {priority}"
            )));
        }
        self.priority = priority;
        Ok(self)
    }

    /// Merge entries into the post's metadata map.
    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata.extend(metadata);
        self
    }

    /// Validate the draft and persist the post (and recurrence, if any).
    pub async fn save(
        self,
        store: &dyn SchedulingStore,
        clock: &dyn Clock,
    ) -> Result<ScheduleReceipt> {
        let now = clock.now();
        let (content, publish_at) = self.validate(now)?;

        let timezone = self.timezone.map_or_else(|| "UTC".to_string(), |tz| tz.name().to_string());
        let recurring = self.recurring.is_some();

        let id = store
            .insert_post(NewScheduledPost {
                platforms: self.platforms.clone(),
                content,
                media_url: self.media_url,
                media_type: self.media_type,
                publish_at,
                timezone: timezone.clone(),
                priority: self.priority,
                metadata: if self.metadata.is_empty() { None } else { Some(self.metadata) },
            })
            .await?;

        if let Some((cadence, time_of_day)) = self.recurring {
            let tz = self.timezone.unwrap_or(chrono_tz::UTC);
            let next_run = recurrence::next_occurrence(cadence, time_of_day, tz, now)?;
            store
                .insert_recurrence(NewRecurrencePolicy {
                    scheduled_post_id: id,
                    cadence,
                    time_of_day,
                    until: self.until,
                    timezone,
                    next_run_at: next_run,
                })
                .await?;
        }

        info!(post_id = id, publish_at = %publish_at, recurring, "scheduled post saved");

        Ok(ScheduleReceipt { id, publish_at, platforms: self.platforms, recurring })
    }

    fn validate(&self, now: DateTime<Utc>) -> Result<(String, DateTime<Utc>)> {
        if self.platforms.is_empty() {
            return Err(SyndicaError::InvalidSchedule(
                "at least one platform must be specified".to_string(),
            ));
        }
        let content = self
            .content
            .as_deref()
            .map(str::trim)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| SyndicaError::InvalidSchedule("content is required".to_string()))?;
        let publish_at = self.publish_at.ok_or_else(|| {
            SyndicaError::InvalidSchedule("publish date/time is required".to_string())
        })?;
        if publish_at <= now {
            return Err(SyndicaError::InvalidSchedule(
                "publish date/time must be in the future".to_string(),
            ));
        }
        Ok((content.to_string(), publish_at))
    }
}
