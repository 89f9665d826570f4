//! Implements the `DataService` trait over the PostgREST interface of the hosted backend.

use crate::api::{DataService, Query, Row};
use crate::{Config, Result};
use anyhow::{bail, Context};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use tracing::trace;

/// Talks to `{data_url}/rest/v1/{table}` with the configured API key. Every request is sent once;
/// failures are returned to the caller and never retried.
pub struct RestService {
    client: Client,
    base: String,
    key: String,
}

impl RestService {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Unable to create the HTTP client")?;
        Ok(Self {
            client,
            base: config.data_url().trim_end_matches('/').to_string(),
            key: config.data_key().to_string(),
        })
    }

    fn endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
    }

    fn write_request(&self, request: RequestBuilder) -> RequestBuilder {
        self.authorize(request)
            .header("Prefer", "return=representation")
    }
}

#[async_trait::async_trait]
impl DataService for RestService {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>> {
        trace!("select from {table}: {query:?}");
        let request = self
            .authorize(self.client.get(self.endpoint(table)))
            .query(&query.to_params());
        let response = send(request, table, "select").await?;
        rows(response, table).await
    }

    async fn insert(&self, table: &str, row: Row) -> Result<Row> {
        trace!("insert into {table}");
        let request = self
            .write_request(self.client.post(self.endpoint(table)))
            .json(&row);
        let response = send(request, table, "insert").await?;
        first_row(response, table, "insert").await
    }

    async fn update(&self, table: &str, id: &str, row: Row) -> Result<Row> {
        trace!("update {table} id {id}");
        let request = self
            .write_request(self.client.patch(self.endpoint(table)))
            .query(&[("id", format!("eq.{id}"))])
            .json(&row);
        let response = send(request, table, "update").await?;
        first_row(response, table, "update")
            .await
            .with_context(|| format!("No row with id '{id}' in {table}"))
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        trace!("delete from {table} id {id}");
        let request = self
            .authorize(self.client.delete(self.endpoint(table)))
            .query(&[("id", format!("eq.{id}"))]);
        send(request, table, "delete").await?;
        Ok(())
    }
}

/// Sends `request` and turns a non-success status into an error that carries the response body.
async fn send(request: RequestBuilder, table: &str, action: &str) -> Result<Response> {
    let response = request
        .send()
        .await
        .with_context(|| format!("Failed to send {action} request for {table}"))?;
    if !response.status().is_success() {
        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unable to read response body".to_string());
        bail!("The {action} request for {table} failed with status {status}: {body}");
    }
    Ok(response)
}

async fn rows(response: Response, table: &str) -> Result<Vec<Row>> {
    let value: Value = response
        .json()
        .await
        .with_context(|| format!("Failed to parse the rows of {table}"))?;
    match value {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::Object(row) => Some(row),
                _ => None,
            })
            .collect()),
        other => bail!("Expected an array of rows from {table}, got {other}"),
    }
}

async fn first_row(response: Response, table: &str, action: &str) -> Result<Row> {
    rows(response, table)
        .await?
        .into_iter()
        .next()
        .with_context(|| format!("The {action} request for {table} returned no row"))
}
