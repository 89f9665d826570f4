use crate::api::{ChangeEvent, DataService, EventBus, TablePoller};
use crate::commands::report::load_income;
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::model::{BucketRule, INCOME};
use crate::report::{self as aggregation, ReportFilter};
use crate::Result;
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Prints every change to `table` until interrupted, or until `count` changes were seen. Each
/// change to the income table is followed by freshly aggregated report totals.
pub async fn watch(
    service: Arc<dyn DataService>,
    table: &str,
    interval: Duration,
    rule: BucketRule,
    count: Option<usize>,
) -> Result<Out<usize>> {
    let mut poller = TablePoller::new(service.clone(), table);
    poller
        .poll_once()
        .await
        .with_context(|| format!("Unable to read {table}"))
        .pub_result(ErrorType::Fetch)?;

    let bus = EventBus::new();
    let mut events = bus.subscribe();
    let handle = poller.spawn(bus, interval);
    info!(
        "Watching {table} every {:.1}s, press Ctrl-C to stop",
        interval.as_secs_f32()
    );

    let mut seen = 0;
    while count.map_or(true, |n| seen < n) {
        tokio::select! {
            received = events.recv() => match received {
                Ok(event) => {
                    seen += 1;
                    info!("{}", describe(&event));
                    if table == INCOME {
                        match income_totals(&*service, rule).await {
                            Ok(totals) => info!("{totals}"),
                            Err(e) => warn!("{e:#}"),
                        }
                    }
                }
                Err(RecvError::Lagged(missed)) => warn!("Missed {missed} changes"),
                Err(RecvError::Closed) => break,
            },
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                break;
            }
        }
    }

    drop(events);
    handle.abort();
    Ok(Out::new(
        format!("Stopped watching {table} after {seen} changes"),
        seen,
    ))
}

fn describe(event: &ChangeEvent) -> String {
    format!("{} {}/{}", event.kind, event.table, event.id)
}

async fn income_totals(service: &dyn DataService, rule: BucketRule) -> Result<String> {
    let transactions = load_income(service).await?;
    let report = aggregation::build(&transactions, &ReportFilter::default(), rule);
    let t = &report.totals;
    Ok(format!(
        "Muzaki {} | Infaq Tetap {} | Infaq Tidak Tetap {} | Total {}",
        t.contributors, t.regular, t.irregular, t.total
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{ChangeKind, MemoryService, Row};
    use crate::model::CONTRIBUTORS;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().unwrap().clone()
    }

    #[tokio::test]
    async fn test_watch_stops_after_count() {
        let service = Arc::new(MemoryService::default());
        let watcher = tokio::spawn(watch(
            service.clone(),
            INCOME,
            Duration::from_millis(20),
            BucketRule::SubType,
            Some(2),
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        service
            .insert(INCOME, row(json!({"dusun": "Krajan", "jumlah": 5000})))
            .await
            .unwrap();
        service.delete(INCOME, "1").await.unwrap();

        let out = tokio::time::timeout(Duration::from_secs(5), watcher)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(out.structure(), Some(&2));
        assert_eq!(out.message(), "Stopped watching pemasukan after 2 changes");
    }

    #[tokio::test]
    async fn test_watch_missing_table_fails_fast() {
        let service: Arc<dyn DataService> = Arc::new(MemoryService::empty());
        let e = watch(
            service,
            CONTRIBUTORS,
            Duration::from_millis(20),
            BucketRule::SubType,
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(ErrorType::of(&e), Some(ErrorType::Fetch));
    }

    #[test]
    fn test_describe() {
        let event = ChangeEvent {
            table: INCOME.to_string(),
            kind: ChangeKind::Delete,
            id: "7".to_string(),
            row: None,
        };
        assert_eq!(describe(&event), "delete pemasukan/7");
    }
}
