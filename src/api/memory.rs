//! Implements the `DataService` trait with in-memory tables for testing purposes.
//!
//! This is compiled into the released binary as well so that the whole program can be run,
//! top-to-bottom, without a hosted backend. In that case the tables are persisted to a JSON file so
//! that one command sees the writes of the previous one.

use crate::api::{row_id, DataService, Query, Row};
use crate::model::{CONTRIBUTORS, INCOME, RECIPIENTS, USERS};
use crate::{utils, Result};
use anyhow::Context;
use chrono::Utc;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

type Tables = BTreeMap<String, Vec<Row>>;

/// An implementation of `DataService` that holds every table in memory. By default it is seeded
/// with a small village's worth of data.
pub struct MemoryService {
    tables: Mutex<Tables>,
    path: Option<PathBuf>,
}

impl MemoryService {
    /// Creates a service holding `tables`, keyed by table name.
    pub fn new(tables: BTreeMap<String, Vec<Row>>) -> Self {
        Self {
            tables: Mutex::new(tables),
            path: None,
        }
    }

    /// Creates a service with no tables at all.
    pub fn empty() -> Self {
        Self::new(Tables::new())
    }

    /// Loads the tables persisted at `path`, seeding and writing them first if the file does not
    /// exist yet. Every later write is saved back to `path`.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let tables = if path.is_file() {
            debug!("Loading test data from {}", path.display());
            utils::deserialize::<Tables>(&path).await?
        } else {
            debug!("Seeding test data at {}", path.display());
            let tables = seed_tables()?;
            save(&path, &tables).await?;
            tables
        };
        Ok(Self {
            tables: Mutex::new(tables),
            path: Some(path),
        })
    }

    /// Replaces the rows of `table`.
    pub async fn put(&self, table: &str, rows: Vec<Row>) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.insert(table.to_string(), rows);
        self.persist(&tables).await
    }

    async fn persist(&self, tables: &Tables) -> Result<()> {
        match &self.path {
            Some(path) => save(path, tables).await,
            None => Ok(()),
        }
    }
}

impl Default for MemoryService {
    /// Seeds the service with the data in this module.
    fn default() -> Self {
        // The embedded seed data is well formed; an empty service is still usable if it were not.
        Self::new(seed_tables().unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl DataService for MemoryService {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Row>> {
        let tables = self.tables.lock().await;
        let rows = tables
            .get(table)
            .with_context(|| format!("Table '{table}' not found"))?;
        Ok(query.apply(rows.iter().cloned()))
    }

    async fn insert(&self, table: &str, mut row: Row) -> Result<Row> {
        let mut tables = self.tables.lock().await;
        let rows = tables
            .get_mut(table)
            .with_context(|| format!("Table '{table}' not found"))?;
        if row_id(&row).is_none() {
            row.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }
        if !matches!(row.get("created_at"), Some(v) if !v.is_null()) {
            row.insert(
                "created_at".to_string(),
                Value::String(Utc::now().to_rfc3339()),
            );
        }
        rows.push(row.clone());
        self.persist(&tables).await?;
        Ok(row)
    }

    async fn update(&self, table: &str, id: &str, row: Row) -> Result<Row> {
        let mut tables = self.tables.lock().await;
        let rows = tables
            .get_mut(table)
            .with_context(|| format!("Table '{table}' not found"))?;
        let existing = rows
            .iter_mut()
            .find(|r| row_id(r).as_deref() == Some(id))
            .with_context(|| format!("No row with id '{id}' in {table}"))?;
        for (key, value) in row {
            if key != "id" {
                existing.insert(key, value);
            }
        }
        let updated = existing.clone();
        self.persist(&tables).await?;
        Ok(updated)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        let mut tables = self.tables.lock().await;
        let rows = tables
            .get_mut(table)
            .with_context(|| format!("Table '{table}' not found"))?;
        rows.retain(|r| row_id(r).as_deref() != Some(id));
        self.persist(&tables).await
    }
}

async fn save(path: &Path, tables: &Tables) -> Result<()> {
    let data = serde_json::to_string_pretty(tables).context("Unable to serialize test data")?;
    utils::write(path, data).await
}

/// Provides the seed data from this module.
fn seed_tables() -> Result<Tables> {
    let mut map = Tables::new();
    map.insert(INCOME.to_string(), load_csv(INCOME_DATA)?);
    map.insert(CONTRIBUTORS.to_string(), load_csv(CONTRIBUTOR_DATA)?);
    map.insert(RECIPIENTS.to_string(), load_csv(RECIPIENT_DATA)?);
    map.insert(USERS.to_string(), load_csv(USER_DATA)?);
    Ok(map)
}

/// Loads rows from a CSV-formatted string with a header line. Empty cells become null and cells
/// made only of digits become numbers, the way the backend returns them. Digit strings with a
/// leading zero, such as phone numbers, stay strings.
fn load_csv(csv_data: &str) -> Result<Vec<Row>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(Cursor::new(csv_data.as_bytes()));
    let headers = rdr.headers()?.clone();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(header, field)| (header.to_string(), cell(field)))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

fn cell(field: &str) -> Value {
    if field.is_empty() {
        Value::Null
    } else if field.bytes().all(|b| b.is_ascii_digit()) && (field == "0" || !field.starts_with('0')) {
        field
            .parse::<u64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(field.to_string()))
    } else {
        Value::String(field.to_string())
    }
}

/// Seed income data. Amounts are a mix of plain numbers and display strings, as in the backend.
const INCOME_DATA: &str = r##"id,dusun,nama_muzaki,kategori,jenis_infaq,jumlah,created_at,keterangan
1,Krajan,Ahmad Fauzi,Zakat Fitrah,,45000,2025-03-28T07:15:00+07:00,3 jiwa
2,Krajan,Siti Aminah,Infaq,tetap,Rp100.000,2025-03-28T08:02:00+07:00,
3,Krajan,Ahmad Fauzi,Infaq,tidak tetap,50000,2025-03-29T16:40:00+07:00,
4,Sumberejo,Budi Santoso,Zakat Maal,,2500000,2025-03-30T09:30:00+07:00,
5,Sumberejo,Dewi Lestari,Infaq Tetap,,Rp 75.000,2025-03-30T10:12:00+07:00,
6,Sumberejo,Dewi Lestari,Infaq Tidak Tetap,,25000,2025-04-02T19:05:00+07:00,
7,Cepit,Hasan Basri,Infaq,tidak tetap,Rp20.000,2025-04-03T06:45:00+07:00,kotak masjid
8,Cepit,Nur Hidayah,Zakat Fitrah,,30000,2025-04-03T07:20:00+07:00,2 jiwa
9,,Hamba Allah,Infaq,tidak tetap,10000,2025-04-04T12:00:00+07:00,tanpa nama dusun
10,Émpang,Rahmat Hidayat,Infaq,tetap,150000,,
"##;

/// Seed contributor data.
const CONTRIBUTOR_DATA: &str = r##"id,nama,dusun,alamat,no_hp
1,Ahmad Fauzi,Krajan,RT 01 RW 02,081234567801
2,Siti Aminah,Krajan,RT 02 RW 02,081234567802
3,Budi Santoso,Sumberejo,RT 01 RW 05,081234567803
4,Dewi Lestari,Sumberejo,RT 03 RW 05,
5,Hasan Basri,Cepit,RT 02 RW 01,081234567805
"##;

/// Seed recipient data.
const RECIPIENT_DATA: &str = r##"id,nama,dusun,asnaf,alamat
1,Mbah Sarinah,Krajan,fakir,RT 01 RW 02
2,Paijo,Cepit,miskin,RT 02 RW 01
3,Yatimah,Sumberejo,miskin,RT 04 RW 05
"##;

/// Seed user data.
const USER_DATA: &str = r##"id,username,password,nama,role
1,admin,admin123,Pengurus Amil,admin
2,bendahara,kas2025,Bendahara,treasurer
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Amount, IncomeTransaction};
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_seed_income() {
        let service = MemoryService::default();
        let rows = service.select(INCOME, &Query::new()).await.unwrap();
        assert_eq!(rows.len(), 10);
        let transactions = IncomeTransaction::from_rows(&rows);
        assert_eq!(transactions.len(), 10);
        assert_eq!(transactions[1].amount, Amount::from_rupiah(100_000));
        assert_eq!(transactions[4].amount, Amount::from_rupiah(75_000));
        assert!(transactions[8].sub_region.is_none());
        assert!(transactions[9].created_at.is_none());
    }

    #[tokio::test]
    async fn test_insert_update_delete() {
        let service = MemoryService::default();
        let row = json!({"dusun": "Cepit", "nama_muzaki": "Ani", "kategori": "Infaq", "jumlah": 5000});
        let stored = service
            .insert(INCOME, row.as_object().unwrap().clone())
            .await
            .unwrap();
        let id = row_id(&stored).unwrap();
        assert!(stored.get("created_at").unwrap().is_string());

        let patch = json!({"jumlah": 7000, "id": "ignored"});
        let updated = service
            .update(INCOME, &id, patch.as_object().unwrap().clone())
            .await
            .unwrap();
        assert_eq!(updated["jumlah"], 7000);
        assert_eq!(row_id(&updated).unwrap(), id);

        service.delete(INCOME, &id).await.unwrap();
        let found = service
            .select(INCOME, &Query::new().eq("id", id.as_str()))
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_update_missing_row() {
        let service = MemoryService::default();
        let result = service.update(INCOME, "nope", Row::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unknown_table() {
        let service = MemoryService::empty();
        assert!(service.select("nothing", &Query::new()).await.is_err());
    }

    #[tokio::test]
    async fn test_open_persists_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test_data.json");
        let first = MemoryService::open(&path).await.unwrap();
        assert!(path.is_file());
        let row = json!({"username": "tamu", "password": "x"});
        first
            .insert(USERS, row.as_object().unwrap().clone())
            .await
            .unwrap();

        let second = MemoryService::open(&path).await.unwrap();
        let users = second
            .select(USERS, &Query::new().eq("username", "tamu"))
            .await
            .unwrap();
        assert_eq!(users.len(), 1);
    }
}
