//! Shared test utilities for creating test environments.
//!
//! This module is only compiled when running tests (`#[cfg(test)]`).

use crate::api::{DataService, MemoryService};
use crate::session::{self, MemorySessionStore, Session};
use crate::{Config, Settings};
use std::sync::Arc;
use tempfile::TempDir;

/// Test environment with an amil home directory, a seeded in-memory data service and an empty
/// session store. Holds TempDir to keep the directory alive for the duration of the test.
pub struct TestEnv {
    _temp_dir: TempDir,
    config: Config,
    service: Arc<MemoryService>,
    store: MemorySessionStore,
}

impl TestEnv {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let settings = Settings {
            data_url: "https://example.supabase.co".to_string(),
            data_key: "anon-key".to_string(),
            cloud_name: "demo".to_string(),
            upload_preset: "unsigned".to_string(),
        };
        let config = Config::create(temp_dir.path().join("amil"), settings)
            .await
            .unwrap();

        Self {
            _temp_dir: temp_dir,
            config,
            service: Arc::new(MemoryService::default()),
            store: MemorySessionStore::default(),
        }
    }

    /// Returns a clone of the Config.
    pub fn config(&self) -> Config {
        self.config.clone()
    }

    pub fn service(&self) -> Arc<dyn DataService> {
        self.service.clone()
    }

    pub fn store(&self) -> &MemorySessionStore {
        &self.store
    }

    /// Logs in as the seeded administrator.
    pub async fn login(&self) -> Session {
        session::login(&*self.service, &self.store, "admin", "admin123")
            .await
            .unwrap()
    }
}
