//! Types that represent the data model, such as `IncomeTransaction` and `Amount`.
mod amount;
mod category;
mod period;
mod transaction;
mod user;

pub use amount::Amount;
pub use category::{Bucket, BucketRule, Category, InfaqType};
pub use period::YearMonth;
pub use transaction::IncomeTransaction;
pub use user::{Profile, User};

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// The income transactions table.
pub const INCOME: &str = "pemasukan";
/// The contributors (muzaki) table.
pub const CONTRIBUTORS: &str = "muzaki";
/// The recipients (mustahiq) table.
pub const RECIPIENTS: &str = "mustahiq";
/// The users table that login checks credentials against.
pub const USERS: &str = "users";

/// Reads any scalar as an optional string: strings as they are, numbers and booleans in their JSON
/// form, null and compound values as `None`.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_string(&value))
}

/// The string form of a scalar JSON value, used for ids and filter comparisons.
pub(crate) fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
