//! Clients for the hosted services: the row store, the change feed built on it, and the image host.
//!
//! The row store is reached through the `DataService` trait so that the whole program can run
//! against `MemoryService` in tests and in test mode.

mod feed;
mod filter;
mod media;
mod memory;
mod rest;

pub use feed::{ChangeEvent, ChangeKind, EventBus, TablePoller};
pub use filter::{Op, Predicate, Query};
pub use media::{variant_url, Crop, MediaHost, Transformation, UploadedImage};
pub use memory::MemoryService;
pub use rest::RestService;

use crate::model::scalar_string;
use crate::{Config, Result};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// One row of a backend table, as the backend returns it.
pub type Row = Map<String, Value>;

/// The name of the environment variable that, when set and non-empty, puts the program in test
/// mode.
pub const TEST_MODE_ENV: &str = "AMIL_IN_TEST_MODE";

/// The operations the program needs from the hosted row store.
#[async_trait::async_trait]
pub trait DataService: Send + Sync {
    /// Returns the rows of `table` that match `query`.
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>>;

    /// Inserts `row` into `table` and returns the stored row, including any generated fields.
    async fn insert(&self, table: &str, row: Row) -> Result<Row>;

    /// Overwrites the given fields of the row whose `id` is `id`, returning the stored row.
    async fn update(&self, table: &str, id: &str, row: Row) -> Result<Row>;

    /// Deletes the row whose `id` is `id`.
    async fn delete(&self, table: &str, id: &str) -> Result<()>;
}

/// Selects which `DataService` implementation the program talks to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Talk to the configured hosted backend.
    #[default]
    Remote,
    /// Use seeded in-memory data persisted under the home directory.
    Test,
}

impl Mode {
    /// Returns `Mode::Test` when `AMIL_IN_TEST_MODE` is set to a non-empty value.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(v) if !v.is_empty() => Mode::Test,
            _ => Mode::Remote,
        }
    }
}

/// Creates the `DataService` for `mode`.
pub async fn data_service(config: &Config, mode: Mode) -> Result<Arc<dyn DataService>> {
    debug!("Creating data service in {mode:?} mode");
    match mode {
        Mode::Remote => Ok(Arc::new(RestService::new(config)?)),
        Mode::Test => Ok(Arc::new(
            MemoryService::open(config.test_data_path()).await?,
        )),
    }
}

/// The `id` of a row as a string, whether the backend sent a number or a string.
pub fn row_id(row: &Row) -> Option<String> {
    row.get("id").and_then(scalar_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_row_id() {
        let numeric = json!({"id": 42});
        assert_eq!(row_id(numeric.as_object().unwrap()).as_deref(), Some("42"));
        let text = json!({"id": "abc"});
        assert_eq!(row_id(text.as_object().unwrap()).as_deref(), Some("abc"));
        let missing = json!({"nama": "x"});
        assert_eq!(row_id(missing.as_object().unwrap()), None);
    }
}
