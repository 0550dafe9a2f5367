//! Shared helpers for the infra integration tests.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use syndica_domain::NewScheduledPost;
use syndica_infra::database::{DbManager, SqliteSchedulingStore};
use tempfile::TempDir;

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub store: Arc<SqliteSchedulingStore>,
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a new temporary database with migrations applied.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("syndica-test.db");

        let manager =
            Arc::new(DbManager::new(&db_path, 4).expect("db manager should be created"));
        manager.run_migrations().expect("migrations should run");

        let store = Arc::new(SqliteSchedulingStore::new(Arc::clone(&manager)));
        Self { store, manager, _temp_dir: temp_dir }
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}

/// Utility helper for constructing post specs inside tests.
pub fn make_post(publish_at: DateTime<Utc>, priority: u8) -> NewScheduledPost {
    NewScheduledPost {
        platforms: vec!["facebook".to_string(), "twitter".to_string()],
        content: "integration test content".to_string(),
        media_url: None,
        media_type: None,
        publish_at,
        timezone: "UTC".to_string(),
        priority,
        metadata: None,
    }
}
