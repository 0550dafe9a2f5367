//! Scheduling data types shared across the workspace

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::SyndicaError;

/// Lifecycle status of a scheduled post.
///
/// Transitions are monotone: `pending` may move to `published`, `failed` or
/// `cancelled`; all three of those are terminal. A recurring post never
/// reopens a finished instance, a fresh pending one is created instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Pending,
    Published,
    Failed,
    Cancelled,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Pending => "pending",
            PostStatus::Published => "published",
            PostStatus::Failed => "failed",
            PostStatus::Cancelled => "cancelled",
        }
    }
}

impl FromStr for PostStatus {
    type Err = SyndicaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PostStatus::Pending),
            "published" => Ok(PostStatus::Published),
            "failed" => Ok(PostStatus::Failed),
            "cancelled" => Ok(PostStatus::Cancelled),
            other => Err(SyndicaError::Internal(format!("unknown post status '{other}'"))),
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of media attached to a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Document,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
            MediaKind::Document => "document",
        }
    }
}

impl FromStr for MediaKind {
    type Err = SyndicaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            "document" => Ok(MediaKind::Document),
            other => Err(SyndicaError::InvalidSchedule(format!(
                "invalid media type '{other}', expected one of: image, video, document"
            ))),
        }
    }
}

/// Recurrence cadence. A closed set; invalid cadence names fail at the
/// string boundary (`FromStr`), never inside the recurrence engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Daily,
    Weekly,
    Monthly,
}

impl Cadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Daily => "daily",
            Cadence::Weekly => "weekly",
            Cadence::Monthly => "monthly",
        }
    }
}

impl FromStr for Cadence {
    type Err = SyndicaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(Cadence::Daily),
            "weekly" => Ok(Cadence::Weekly),
            "monthly" => Ok(Cadence::Monthly),
            other => Err(SyndicaError::InvalidSchedule(format!(
                "invalid recurrence cadence '{other}', expected one of: daily, weekly, monthly"
            ))),
        }
    }
}

impl fmt::Display for Cadence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A local wall-clock time with minute precision, serialized as "HH:MM".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self, SyndicaError> {
        if hour > 23 || minute > 59 {
            return Err(SyndicaError::InvalidSchedule(format!(
                "invalid time of day {hour:02}:{minute:02}"
            )));
        }
        Ok(Self { hour, minute })
    }
}

impl FromStr for TimeOfDay {
    type Err = SyndicaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || {
            SyndicaError::InvalidSchedule(format!("invalid time of day '{s}', expected \"HH:MM\""))
        };
        let (hour, minute) = s.split_once(':').ok_or_else(invalid)?;
        let hour: u8 = hour.parse().map_err(|_| invalid())?;
        let minute: u8 = minute.parse().map_err(|_| invalid())?;
        TimeOfDay::new(hour, minute)
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = SyndicaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Free-form metadata attached to a post.
pub type Metadata = serde_json::Map<String, Value>;

/// A content item awaiting delivery to one or more platforms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduledPost {
    pub id: i64,
    pub platforms: Vec<String>,
    pub content: String,
    pub media_url: Option<String>,
    pub media_type: Option<MediaKind>,
    /// Publish instant, always UTC.
    pub publish_at: DateTime<Utc>,
    /// Originating timezone, kept for display and recurrence math.
    pub timezone: String,
    pub priority: u8,
    pub metadata: Option<Metadata>,
    pub status: PostStatus,
    pub published_at: Option<DateTime<Utc>>,
    /// Per-platform outcome snapshot, set when a dispatch completes.
    pub result: Option<DispatchReport>,
    /// Error text, set only when the post failed.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insertion spec for a scheduled post; ids and timestamps are
/// store-assigned.
#[derive(Debug, Clone)]
pub struct NewScheduledPost {
    pub platforms: Vec<String>,
    pub content: String,
    pub media_url: Option<String>,
    pub media_type: Option<MediaKind>,
    pub publish_at: DateTime<Utc>,
    pub timezone: String,
    pub priority: u8,
    pub metadata: Option<Metadata>,
}

/// Rule that regenerates a scheduled post at a fixed cadence.
///
/// `scheduled_post_id` always points at the current pending occurrence and
/// is repointed on every rollover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecurrencePolicy {
    pub id: i64,
    pub scheduled_post_id: i64,
    pub cadence: Cadence,
    pub time_of_day: TimeOfDay,
    pub until: Option<DateTime<Utc>>,
    pub timezone: String,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insertion spec for a recurrence policy.
#[derive(Debug, Clone)]
pub struct NewRecurrencePolicy {
    pub scheduled_post_id: i64,
    pub cadence: Cadence,
    pub time_of_day: TimeOfDay,
    pub until: Option<DateTime<Utc>>,
    pub timezone: String,
    pub next_run_at: DateTime<Utc>,
}

/// Outcome of one platform's delivery attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlatformOutcome {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlatformOutcome {
    pub fn success(data: Value) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(error.into()) }
    }
}

/// Aggregate result of fanning one publish request out across platforms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchReport {
    pub results: BTreeMap<String, PlatformOutcome>,
    pub success_count: usize,
    pub error_count: usize,
    pub total_count: usize,
}

impl DispatchReport {
    pub fn from_results(results: BTreeMap<String, PlatformOutcome>, total_count: usize) -> Self {
        let success_count = results.values().filter(|outcome| outcome.success).count();
        let error_count = results.values().filter(|outcome| !outcome.success).count();
        Self { results, success_count, error_count, total_count }
    }

    /// One-line summary of every failed platform, used as the post error
    /// text when no platform succeeded.
    pub fn failure_summary(&self) -> String {
        let failures: Vec<String> = self
            .results
            .iter()
            .filter(|(_, outcome)| !outcome.success)
            .map(|(platform, outcome)| {
                format!("{platform}: {}", outcome.error.as_deref().unwrap_or("unknown error"))
            })
            .collect();
        if failures.is_empty() {
            "no platforms targeted".to_string()
        } else {
            failures.join("; ")
        }
    }
}

/// Confirmation returned after a post has been persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleReceipt {
    pub id: i64,
    pub publish_at: DateTime<Utc>,
    pub platforms: Vec<String>,
    pub recurring: bool,
}

/// A post that failed at the batch level, with its error text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostFailure {
    pub post_id: i64,
    pub error: String,
}

/// Counters returned by one due-post batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessSummary {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<PostFailure>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cadence_round_trips_through_strings() {
        for cadence in [Cadence::Daily, Cadence::Weekly, Cadence::Monthly] {
            assert_eq!(cadence.as_str().parse::<Cadence>().unwrap(), cadence);
        }
    }

    #[test]
    fn invalid_cadence_name_is_a_validation_error() {
        let err = "hourly".parse::<Cadence>().unwrap_err();
        assert!(matches!(err, SyndicaError::InvalidSchedule(_)));
        assert!(err.to_string().contains("hourly"));
    }

    #[test]
    fn time_of_day_parses_and_formats() {
        let time: TimeOfDay = "09:30".parse().unwrap();
        assert_eq!(time, TimeOfDay::new(9, 30).unwrap());
        assert_eq!(time.to_string(), "09:30");
    }

    #[test]
    fn time_of_day_rejects_out_of_range_values() {
        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("12:60".parse::<TimeOfDay>().is_err());
        assert!("noon".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn dispatch_report_counts_outcomes() {
        let mut results = BTreeMap::new();
        results.insert("facebook".to_string(), PlatformOutcome::success(Value::Null));
        results.insert("twitter".to_string(), PlatformOutcome::failure("rate limited"));
        let report = DispatchReport::from_results(results, 2);

        assert_eq!(report.success_count, 1);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.total_count, 2);
        assert_eq!(report.failure_summary(), "twitter: rate limited");
    }
}
