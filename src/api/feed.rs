//! A change feed for backend tables.
//!
//! Every change to a watched table is published as one typed `ChangeEvent` on an `EventBus`.
//! Changes are found by `TablePoller`, which snapshots a table on an interval and diffs the rows
//! by `id`. Consumers decide for themselves what to refetch.

use crate::api::{row_id, DataService, Query, Row};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

const BUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

serde_plain::derive_display_from_serialize!(ChangeKind);

/// One row that appeared, changed or disappeared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub kind: ChangeKind,
    pub id: String,
    /// The row after the change. `None` for deletes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<Row>,
}

/// Fans change events out to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    /// Publishes `event` and returns the number of subscribers that will see it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribers(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Watches one table by polling it.
pub struct TablePoller {
    service: Arc<dyn DataService>,
    table: String,
    snapshot: Option<BTreeMap<String, Row>>,
}

impl TablePoller {
    pub fn new(service: Arc<dyn DataService>, table: impl Into<String>) -> Self {
        Self {
            service,
            table: table.into(),
            snapshot: None,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Fetches the table and returns what changed since the previous call, ordered by id. The
    /// first call only records the baseline and returns nothing. Rows without an id are ignored.
    pub async fn poll_once(&mut self) -> Result<Vec<ChangeEvent>> {
        let rows = self.service.select(&self.table, &Query::new()).await?;
        let current: BTreeMap<String, Row> = rows
            .into_iter()
            .filter_map(|row| row_id(&row).map(|id| (id, row)))
            .collect();

        let Some(previous) = self.snapshot.take() else {
            trace!("Baseline for {} recorded", self.table);
            self.snapshot = Some(current);
            return Ok(Vec::new());
        };

        let mut events = Vec::new();
        for (id, row) in &current {
            let kind = match previous.get(id) {
                None => ChangeKind::Insert,
                Some(old) if old != row => ChangeKind::Update,
                Some(_) => continue,
            };
            events.push(self.event(kind, id, Some(row.clone())));
        }
        for id in previous.keys().filter(|id| !current.contains_key(*id)) {
            events.push(self.event(ChangeKind::Delete, id, None));
        }
        self.snapshot = Some(current);
        events.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(events)
    }

    fn event(&self, kind: ChangeKind, id: &str, row: Option<Row>) -> ChangeEvent {
        ChangeEvent {
            table: self.table.clone(),
            kind,
            id: id.to_string(),
            row,
        }
    }

    /// Polls every `interval` on a spawned task and publishes each change on `bus`. Failed polls
    /// are logged and skipped. The task ends once the bus has no subscribers left.
    pub fn spawn(mut self, bus: EventBus, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                if bus.subscribers() == 0 {
                    debug!("No subscribers left for {}, stopping", self.table);
                    break;
                }
                match self.poll_once().await {
                    Ok(events) => {
                        for event in events {
                            bus.publish(event);
                        }
                    }
                    Err(e) => warn!("Polling {} failed: {e:#}", self.table),
                }
            }
        })
    }
}
