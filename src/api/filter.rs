//! Row filters that render to PostgREST query parameters for the remote service and are also
//! evaluated in memory by `MemoryService`.

use crate::api::Row;
use crate::model::scalar_string;
use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::str::FromStr;

/// A comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Eq,
    Gte,
    Lt,
    /// Case-insensitive pattern match where `*` matches any run of characters.
    Ilike,
}

serde_plain::derive_display_from_serialize!(Op);
serde_plain::derive_fromstr_from_deserialize!(Op);

/// A single `column op value` condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    pub column: String,
    pub op: Op,
    pub value: String,
}

impl Predicate {
    pub fn new(column: impl Into<String>, op: Op, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            op,
            value: value.into(),
        }
    }

    fn matches(&self, row: &Row) -> bool {
        let actual = match row.get(&self.column).and_then(scalar_string) {
            Some(s) => s,
            None => return false,
        };
        match self.op {
            Op::Eq => actual == self.value,
            Op::Gte => compare_values(&actual, &self.value) != Ordering::Less,
            Op::Lt => compare_values(&actual, &self.value) == Ordering::Less,
            Op::Ilike => wildcard_match(&self.value.to_lowercase(), &actual.to_lowercase()),
        }
    }
}

/// Parses `column=value` as an equality predicate, or `column=op.value` for the other operators.
impl FromStr for Predicate {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (column, rest) = s
            .split_once('=')
            .with_context(|| format!("Expected a filter like column=value, got '{s}'"))?;
        let column = column.trim();
        if column.is_empty() {
            bail!("The filter '{s}' has no column name");
        }
        if let Some((op, value)) = rest.split_once('.') {
            if let Ok(op) = Op::from_str(op) {
                return Ok(Self::new(column, op, value));
            }
        }
        Ok(Self::new(column, Op::Eq, rest))
    }
}

/// A select query: conditions that must all hold, an optional ordering and an optional limit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    predicates: Vec<Predicate>,
    order: Option<(String, bool)>,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter(Predicate::new(column, Op::Eq, value))
    }

    pub fn gte(self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter(Predicate::new(column, Op::Gte, value))
    }

    pub fn lt(self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter(Predicate::new(column, Op::Lt, value))
    }

    pub fn ilike(self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.filter(Predicate::new(column, Op::Ilike, pattern))
    }

    /// Orders by `column`, newest or largest first when `descending` is true.
    pub fn order(mut self, column: impl Into<String>, descending: bool) -> Self {
        self.order = Some((column.into(), descending));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Renders the query as PostgREST query parameters, e.g. `dusun=eq.Krajan`,
    /// `order=created_at.desc`, `limit=10`.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), "*".to_string())];
        for p in &self.predicates {
            params.push((p.column.clone(), format!("{}.{}", p.op, p.value)));
        }
        if let Some((column, descending)) = &self.order {
            let direction = if *descending { "desc" } else { "asc" };
            params.push(("order".to_string(), format!("{column}.{direction}")));
        }
        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }
        params
    }

    /// True if every condition holds for `row`.
    pub fn matches(&self, row: &Row) -> bool {
        self.predicates.iter().all(|p| p.matches(row))
    }

    /// Evaluates the whole query in memory.
    pub fn apply(&self, rows: impl IntoIterator<Item = Row>) -> Vec<Row> {
        let mut out: Vec<Row> = rows.into_iter().filter(|r| self.matches(r)).collect();
        if let Some((column, descending)) = &self.order {
            out.sort_by(|a, b| {
                let ordering = compare_cells(a.get(column), b.get(column));
                if *descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            });
        }
        if let Some(limit) = self.limit {
            out.truncate(limit);
        }
        out
    }
}

/// Compares numerically when both sides are numbers, otherwise as strings. RFC 3339 timestamps
/// compare correctly as strings.
fn compare_values(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

/// Missing and null cells sort last.
fn compare_cells(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a.and_then(scalar_string), b.and_then(scalar_string)) {
        (Some(x), Some(y)) => compare_values(&x, &y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Matches `text` against `pattern` where `*` and `%` match any run of characters.
fn wildcard_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while ti < t.len() {
        if pi < p.len() && (p[pi] == '*' || p[pi] == '%') {
            star = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && (p[pi] == '*' || p[pi] == '%') {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows() -> Vec<Row> {
        vec![
            json!({"id": 1, "dusun": "Krajan", "jumlah": 50000, "created_at": "2025-03-02T08:00:00Z"}),
            json!({"id": 2, "dusun": "Cepit", "jumlah": "Rp75.000", "created_at": "2025-04-11T08:00:00Z"}),
            json!({"id": 3, "dusun": "Krajan Lor", "jumlah": 125000, "created_at": null}),
        ]
        .into_iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect()
    }

    #[test]
    fn test_to_params() {
        let q = Query::new()
            .eq("dusun", "Krajan")
            .gte("created_at", "2025-03-01")
            .order("created_at", true)
            .limit(10);
        assert_eq!(
            q.to_params(),
            vec![
                ("select".to_string(), "*".to_string()),
                ("dusun".to_string(), "eq.Krajan".to_string()),
                ("created_at".to_string(), "gte.2025-03-01".to_string()),
                ("order".to_string(), "created_at.desc".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn test_apply_eq_numeric_id() {
        let out = Query::new().eq("id", "2").apply(rows());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["dusun"], "Cepit");
    }

    #[test]
    fn test_apply_range_skips_nulls() {
        let out = Query::new()
            .gte("created_at", "2025-03-01")
            .lt("created_at", "2025-04-01")
            .apply(rows());
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["id"], 1);
    }

    #[test]
    fn test_apply_ilike_order_limit() {
        let out = Query::new()
            .ilike("dusun", "krajan*")
            .order("jumlah", true)
            .apply(rows());
        let ids: Vec<_> = out.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(ids, vec![json!(3), json!(1)]);

        let out = Query::new().order("id", false).limit(2).apply(rows());
        assert_eq!(out.len(), 2);
        assert_eq!(out[1]["id"], 2);
    }

    #[test]
    fn test_parse_predicate() {
        let p: Predicate = "dusun=Krajan".parse().unwrap();
        assert_eq!(p, Predicate::new("dusun", Op::Eq, "Krajan"));
        let p: Predicate = "jumlah=gte.1000".parse().unwrap();
        assert_eq!(p, Predicate::new("jumlah", Op::Gte, "1000"));
        let p: Predicate = "keterangan=a.b".parse().unwrap();
        assert_eq!(p, Predicate::new("keterangan", Op::Eq, "a.b"));
        assert!("novalue".parse::<Predicate>().is_err());
        assert!("=x".parse::<Predicate>().is_err());
    }

    #[test]
    fn test_wildcard() {
        assert!(wildcard_match("*jan", "krajan"));
        assert!(wildcard_match("k%n", "krajan"));
        assert!(!wildcard_match("cep*", "krajan"));
        assert!(wildcard_match("*", ""));
    }
}
