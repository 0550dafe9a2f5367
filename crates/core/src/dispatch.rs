//! Platform fan-out with isolated failure domains.
//!
//! One publish request goes out to every named platform independently; a
//! platform that errors is recorded in its own outcome slot and never aborts
//! a sibling. The dispatcher itself never fails on partial delivery, only
//! the per-platform entries do.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use syndica_domain::{DispatchReport, MediaKind, PlatformOutcome, Result};
use tracing::{error, info};

/// Delivery capability one platform exposes to the scheduling core.
///
/// A platform that cannot perform an operation returns a `Delivery` error
/// rather than panicking; the dispatcher records it like any other failure.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Platform name as it appears in a post's target list.
    fn name(&self) -> &str;

    /// Share a text post, optionally carrying a link.
    async fn share(&self, caption: &str, url: &str) -> Result<Value>;

    /// Share an image by URL.
    async fn share_image(&self, caption: &str, media_url: &str) -> Result<Value>;

    /// Share a video by URL.
    async fn share_video(&self, caption: &str, media_url: &str) -> Result<Value>;
}

/// Named publishers injected at construction time.
pub type PublisherRegistry = BTreeMap<String, Arc<dyn Publisher>>;

/// Dispatch shape, derived from the post's media kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareKind {
    Text,
    Image,
    Video,
}

impl ShareKind {
    /// Media kind to operation: no media is a text share, video is a video
    /// share, every other populated kind goes out as an image share.
    pub fn for_media(media_type: Option<MediaKind>) -> Self {
        match media_type {
            None => ShareKind::Text,
            Some(MediaKind::Video) => ShareKind::Video,
            Some(_) => ShareKind::Image,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ShareKind::Text => "share",
            ShareKind::Image => "share_image",
            ShareKind::Video => "share_video",
        }
    }
}

/// Fans a publish request out across the registered publishers.
pub struct PlatformDispatcher {
    registry: PublisherRegistry,
}

impl PlatformDispatcher {
    pub fn new(registry: PublisherRegistry) -> Self {
        Self { registry }
    }

    /// Names of the platforms this dispatcher can deliver to.
    pub fn available_platforms(&self) -> Vec<String> {
        self.registry.keys().cloned().collect()
    }

    /// Deliver to every named platform, collecting one outcome per name.
    ///
    /// An unknown platform name becomes a per-platform error entry, not a
    /// dispatch failure. Partial failure never raises.
    pub async fn dispatch(
        &self,
        platforms: &[String],
        kind: ShareKind,
        caption: &str,
        media_url: Option<&str>,
    ) -> DispatchReport {
        let mut results = BTreeMap::new();
        let url = media_url.unwrap_or_default();

        for platform in platforms {
            let outcome = match self.registry.get(platform) {
                None => PlatformOutcome::failure(format!(
                    "platform '{platform}' is not configured"
                )),
                Some(publisher) => {
                    let attempt = match kind {
                        ShareKind::Text => publisher.share(caption, url).await,
                        ShareKind::Image => publisher.share_image(caption, url).await,
                        ShareKind::Video => publisher.share_video(caption, url).await,
                    };
                    match attempt {
                        Ok(data) => {
                            info!(platform = %platform, operation = kind.as_str(), "delivered");
                            PlatformOutcome::success(data)
                        }
                        Err(err) => {
                            error!(
                                platform = %platform,
                                operation = kind.as_str(),
                                error = %err,
                                "delivery failed"
                            );
                            PlatformOutcome::failure(err.to_string())
                        }
                    }
                }
            };
            results.insert(platform.clone(), outcome);
        }

        DispatchReport::from_results(results, platforms.len())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use syndica_domain::SyndicaError;

    use super::*;

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

        fn respond(&self, operation: &str) -> Result<Value> {
            if self.fail {
                Err(SyndicaError::Delivery(format!("{} rejected {operation}", self.name)))
            } else {
                Ok(json!({ "id": format!("{}-{operation}", self.name) }))
            }
        }
    }

    #[async_trait]
    impl Publisher for FakePublisher {
        fn name(&self) -> &str {
            &self.name
        }

        async fn share(&self, _caption: &str, _url: &str) -> Result<Value> {
            self.respond("share")
        }

        async fn share_image(&self, _caption: &str, _media_url: &str) -> Result<Value> {
            self.respond("share_image")
        }

        async fn share_video(&self, _caption: &str, _media_url: &str) -> Result<Value> {
            self.respond("share_video")
        }
    }

    fn registry(entries: Vec<Arc<dyn Publisher>>) -> PublisherRegistry {
        entries.into_iter().map(|publisher| (publisher.name().to_string(), publisher)).collect()
    }

    #[tokio::test]
    async fn one_failing_platform_does_not_affect_the_others() {
        let dispatcher = PlatformDispatcher::new(registry(vec![
            FakePublisher::succeeding("alpha"),
            FakePublisher::failing("beta"),
            FakePublisher::succeeding("gamma"),
        ]));

        let platforms: Vec<String> =
            ["alpha", "beta", "gamma"].iter().map(ToString::to_string).collect();
        let report = dispatcher.dispatch(&platforms, ShareKind::Text, "hi", None).await;

        assert_eq!(report.success_count, 2);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.total_count, 3);
        assert!(report.results["alpha"].success);
        assert!(report.results["gamma"].success);
        assert!(!report.results["beta"].success);
        assert!(report.results["beta"].error.as_deref().unwrap().contains("beta"));
    }

    #[tokio::test]
    async fn unknown_platform_is_a_per_platform_error() {
        let dispatcher =
            PlatformDispatcher::new(registry(vec![FakePublisher::succeeding("alpha")]));

        let platforms: Vec<String> = ["alpha", "unheard-of"].iter().map(ToString::to_string).collect();
        let report = dispatcher.dispatch(&platforms, ShareKind::Image, "hi", Some("http://x/y.png")).await;

        assert_eq!(report.success_count, 1);
        assert_eq!(report.error_count, 1);
        assert!(report.results["unheard-of"]
            .error
            .as_deref()
            .unwrap()
            .contains("not configured"));
    }

    #[test]
    fn media_kind_selects_the_dispatch_shape() {
        assert_eq!(ShareKind::for_media(None), ShareKind::Text);
        assert_eq!(ShareKind::for_media(Some(MediaKind::Video)), ShareKind::Video);
        assert_eq!(ShareKind::for_media(Some(MediaKind::Image)), ShareKind::Image);
        assert_eq!(ShareKind::for_media(Some(MediaKind::Document)), ShareKind::Image);
    }
}
