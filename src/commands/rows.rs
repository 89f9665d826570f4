use crate::api::{row_id, DataService, Query, Row};
use crate::args::ListArgs;
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::model::{scalar_string, Amount, INCOME};
use crate::session::{require_session, SessionStore};
use crate::Result;
use anyhow::{anyhow, Context};
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value;
use tracing::debug;

/// Prints the rows of a table that match the given filters.
pub async fn list(service: &dyn DataService, args: &ListArgs) -> Result<Out<Vec<Row>>> {
    let table = args.table();
    let mut query = args
        .filters()
        .iter()
        .cloned()
        .fold(Query::new(), Query::filter);
    if let Some((column, descending)) = args.order() {
        query = query.order(column, descending);
    }
    if let Some(limit) = args.limit() {
        query = query.limit(limit);
    }

    let rows = service
        .select(table, &query)
        .await
        .with_context(|| format!("Unable to fetch rows from {table}"))
        .pub_result(ErrorType::Fetch)?;

    let message = if rows.is_empty() {
        format!("No rows found in {table}")
    } else {
        format!("{} rows from {table}\n\n{}", rows.len(), to_markdown(&rows))
    };
    Ok(Out::new(message, rows))
}

/// Inserts a row given as a JSON object. Requires a session.
pub async fn insert(
    service: &dyn DataService,
    store: &dyn SessionStore,
    table: &str,
    json: &str,
) -> Result<Out<Row>> {
    let session = require_session(store).await?;
    let mut row = parse_row(json)?;
    if table == INCOME {
        normalize_income(&mut row);
    }
    let stored = service
        .insert(table, row)
        .await
        .with_context(|| format!("Unable to insert into {table}"))
        .pub_result(ErrorType::Fetch)?;
    let id = row_id(&stored).unwrap_or_default();
    debug!("{} inserted {table}/{id}", session.profile.username);
    Ok(Out::new(format!("Inserted row {id} into {table}"), stored))
}

/// Overwrites the given fields of one row. Requires a session.
pub async fn update(
    service: &dyn DataService,
    store: &dyn SessionStore,
    table: &str,
    id: &str,
    json: &str,
) -> Result<Out<Row>> {
    let session = require_session(store).await?;
    let mut row = parse_row(json)?;
    if table == INCOME {
        normalize_income(&mut row);
    }
    let stored = service
        .update(table, id, row)
        .await
        .with_context(|| format!("Unable to update {table}/{id}"))
        .pub_result(ErrorType::Fetch)?;
    debug!("{} updated {table}/{id}", session.profile.username);
    Ok(Out::new(format!("Updated row {id} in {table}"), stored))
}

/// Deletes one row. Requires a session.
pub async fn delete(
    service: &dyn DataService,
    store: &dyn SessionStore,
    table: &str,
    id: &str,
) -> Result<Out<()>> {
    let session = require_session(store).await?;
    service
        .delete(table, id)
        .await
        .with_context(|| format!("Unable to delete {table}/{id}"))
        .pub_result(ErrorType::Fetch)?;
    debug!("{} deleted {table}/{id}", session.profile.username);
    Ok(format!("Deleted row {id} from {table}").into())
}

fn parse_row(json: &str) -> Result<Row> {
    let value: Value = serde_json::from_str(json)
        .context("The row is not valid JSON")
        .pub_result(ErrorType::Request)?;
    match value {
        Value::Object(row) => Ok(row),
        other => Err(anyhow!("The row must be a JSON object, got {other}"))
            .pub_result(ErrorType::Request),
    }
}

/// Stores `jumlah` as a whole number of rupiah, whatever form it was typed in.
fn normalize_income(row: &mut Row) {
    if let Some(value) = row.get_mut("jumlah") {
        let amount = Amount::from_json(value);
        if let Some(rupiah) = amount.value().round().to_i64() {
            *value = Value::from(rupiah);
        }
    }
}

/// Renders rows as a markdown table whose columns are every key seen, in order of appearance.
fn to_markdown(rows: &[Row]) -> String {
    let mut columns: Vec<&str> = Vec::new();
    for row in rows {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    let mut out = format!("| {} |\n", columns.join(" | "));
    out.push_str(&format!("|{}\n", " --- |".repeat(columns.len())));
    for row in rows {
        let cells: Vec<String> = columns
            .iter()
            .map(|c| match row.get(*c) {
                None | Some(Value::Null) => "-".to_string(),
                Some(v) => scalar_string(v)
                    .unwrap_or_else(|| v.to_string())
                    .replace('|', "\\|"),
            })
            .collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    out
}
