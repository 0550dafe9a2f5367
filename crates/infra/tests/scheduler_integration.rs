//! End-to-end scheduling flow against the SQLite store.
//!
//! Builds a post through the fluent draft, advances a mock clock past the
//! publish instant, runs a batch and verifies the lifecycle transition plus
//! the recurrence rollover, all on an isolated temporary database.

#[path = "support.rs"]
mod support;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::{json, Value};
use support::TestDatabase;
use syndica_core::dispatch::{PlatformDispatcher, Publisher, PublisherRegistry};
use syndica_core::scheduling::ports::SchedulingStore;
use syndica_core::{DuePostProcessor, MockClock, PostDraft};
use syndica_domain::{Cadence, PostStatus, Result, SyndicaError, TimeOfDay};

struct FakePublisher {
    name: String,
    fail: bool,
}

impl FakePublisher {
    fn succeeding(name: &str) -> Arc<dyn Publisher> {
        Arc::new(Self { name: name.to_string(), fail: false })
    }

    fn failing(name: &str) -> Arc<dyn Publisher> {
        Arc::new(Self { name: name.to_string(), fail: true })
    }
}

#[async_trait]
impl Publisher for FakePublisher {
    fn name(&self) -> &str {
        &self.name
    }

    async fn share(&self, _caption: &str, _url: &str) -> Result<Value> {
        if self.fail {
            Err(SyndicaError::Delivery(format!("{} is unreachable", self.name)))
        } else {
            Ok(json!({ "id": format!("{}-post", self.name) }))
        }
    }

    async fn share_image(&self, caption: &str, url: &str) -> Result<Value> {
        self.share(caption, url).await
    }

    async fn share_video(&self, caption: &str, url: &str) -> Result<Value> {
        self.share(caption, url).await
    }
}

fn registry(publishers: Vec<Arc<dyn Publisher>>) -> PublisherRegistry {
    publishers.into_iter().map(|publisher| (publisher.name().to_string(), publisher)).collect()
}

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
}

#[tokio::test]
async fn due_recurring_post_is_published_and_rolled_over() {
    let db = TestDatabase::new();
    let clock = MockClock::at(start());

    let receipt = PostDraft::new()
        .platforms(["facebook", "twitter"])
        .content("hello")
        .publish_at(start() + Duration::hours(1))
        .recurring(Cadence::Daily, TimeOfDay::new(10, 0).unwrap())
        .save(db.store.as_ref(), &clock)
        .await
        .expect("draft saves");

    // Nothing is due before the publish instant.
    assert!(db.store.find_due(clock.now()).await.unwrap().is_empty());

    clock.advance(Duration::hours(2));
    let now = clock.now();

    let dispatcher = PlatformDispatcher::new(registry(vec![
        FakePublisher::succeeding("facebook"),
        FakePublisher::succeeding("twitter"),
    ]));
    let store: Arc<dyn SchedulingStore> = db.store.clone();
    let processor = DuePostProcessor::new(store, dispatcher, Arc::new(clock));

    let summary = processor.process_due().await.expect("batch runs");
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.failed, 0);

    let original = db.store.get_post(receipt.id).await.unwrap();
    assert_eq!(original.status, PostStatus::Published);
    assert_eq!(original.published_at, Some(now));
    assert_eq!(original.result.unwrap().success_count, 2);

    // The successor sits at tomorrow 10:00 UTC, cloned from the original.
    let expected_next = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
    let pending = db.store.find_pending(now, 10).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].publish_at, expected_next);
    assert_eq!(pending[0].platforms, original.platforms);
    assert_eq!(pending[0].content, original.content);
    assert_eq!(pending[0].priority, original.priority);

    let policy = db.store.find_active_recurrence(pending[0].id).await.unwrap().expect("active");
    assert_eq!(policy.last_run_at, Some(now));
    assert_eq!(policy.next_run_at, pending[0].publish_at);

    // A second batch at the same instant finds nothing to do.
    let repeat = processor.process_due().await.expect("batch runs");
    assert_eq!(repeat.processed, 0);
}

#[tokio::test]
async fn partial_platform_failure_is_visible_only_in_the_result_payload() {
    let db = TestDatabase::new();
    let clock = MockClock::at(start());

    let receipt = PostDraft::new()
        .platforms(["facebook", "twitter"])
        .content("hello")
        .publish_at(start() + Duration::minutes(5))
        .save(db.store.as_ref(), &clock)
        .await
        .expect("draft saves");

    clock.advance(Duration::minutes(10));
    let dispatcher = PlatformDispatcher::new(registry(vec![
        FakePublisher::succeeding("facebook"),
        FakePublisher::failing("twitter"),
    ]));
    let store: Arc<dyn SchedulingStore> = db.store.clone();
    let processor = DuePostProcessor::new(store, dispatcher, Arc::new(clock));

    let summary = processor.process_due().await.expect("batch runs");
    assert_eq!(summary.successful, 1);
    assert_eq!(summary.failed, 0);
    assert!(summary.errors.is_empty());

    let post = db.store.get_post(receipt.id).await.unwrap();
    assert_eq!(post.status, PostStatus::Published);
    let report = post.result.unwrap();
    assert!(report.results["facebook"].success);
    assert!(report.results["twitter"].error.as_deref().unwrap().contains("unreachable"));
}

#[tokio::test]
async fn total_delivery_failure_fails_the_post_and_reports_it() {
    let db = TestDatabase::new();
    let clock = MockClock::at(start());

    let receipt = PostDraft::new()
        .platforms(["facebook"])
        .content("hello")
        .publish_at(start() + Duration::minutes(5))
        .save(db.store.as_ref(), &clock)
        .await
        .expect("draft saves");

    clock.advance(Duration::minutes(10));
    let dispatcher =
        PlatformDispatcher::new(registry(vec![FakePublisher::failing("facebook")]));
    let store: Arc<dyn SchedulingStore> = db.store.clone();
    let processor = DuePostProcessor::new(store, dispatcher, Arc::new(clock));

    let summary = processor.process_due().await.expect("batch runs");
    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.errors[0].post_id, receipt.id);
    assert!(summary.errors[0].error.contains("facebook"));

    let post = db.store.get_post(receipt.id).await.unwrap();
    assert_eq!(post.status, PostStatus::Failed);
    assert!(post.error.is_some());
}
