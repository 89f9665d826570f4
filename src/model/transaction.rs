use crate::api::Row;
use crate::model::category::lenient_infaq_type;
use crate::model::{lenient_string, Amount, Category, InfaqType};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

/// Represents a single row from the `pemasukan` (income) table: one recorded act of giving.
///
/// Every field is read leniently. A row with a garbage amount, an unknown category or a missing
/// sub-region still loads so that it is counted somewhere rather than silently dropped.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomeTransaction {
    #[serde(default, deserialize_with = "id_string")]
    pub id: String,

    /// The sub-region (dusun) the transaction belongs to.
    #[serde(rename = "dusun", default, deserialize_with = "lenient_string")]
    pub sub_region: Option<String>,

    /// The name of the contributor (muzaki).
    #[serde(rename = "nama_muzaki", default, deserialize_with = "lenient_string")]
    pub contributor: Option<String>,

    #[serde(rename = "kategori", default)]
    pub category: Category,

    /// The voluntary sub-type, only meaningful for infaq.
    #[serde(
        rename = "jenis_infaq",
        default,
        deserialize_with = "lenient_infaq_type",
        skip_serializing_if = "Option::is_none"
    )]
    pub infaq_type: Option<InfaqType>,

    #[serde(rename = "jumlah", default)]
    pub amount: Amount,

    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(
        rename = "keterangan",
        default,
        deserialize_with = "lenient_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub note: Option<String>,
}

impl IncomeTransaction {
    /// Reads a transaction from a backend row.
    pub fn from_row(row: &Row) -> crate::Result<Self> {
        Ok(serde_json::from_value(Value::Object(row.clone()))?)
    }

    /// Reads every row that can be read. Rows that are not transactions at all are logged and
    /// skipped; the field-level leniency means this only happens for structurally broken rows.
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a Row>) -> Vec<Self> {
        rows.into_iter()
            .filter_map(|row| match Self::from_row(row) {
                Ok(t) => Some(t),
                Err(e) => {
                    warn!("Skipping unreadable income row {row:?}: {e}");
                    None
                }
            })
            .collect()
    }

    /// The contributor name, or `-` when it is missing.
    pub fn contributor_name(&self) -> &str {
        self.contributor.as_deref().unwrap_or("-")
    }
}

/// Reads an id that the backend may send as a number or a string.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Reads a timestamp leniently. Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` and `YYYY-MM-DD` (both
/// taken as UTC). Anything else is `None`.
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = lenient_string(deserializer)?;
    Ok(value.as_deref().and_then(parse_timestamp))
}

pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
