//! Document exports of transaction lists and income reports.
//!
//! Both kinds of export are first built into a format-neutral `Table`, which each renderer then
//! lays out in its own way. Files are written to a temporary sibling and renamed into place, so a
//! failed export never leaves a partial file behind.

mod delimited;
mod pdf;
mod xlsx;

use crate::model::{Amount, IncomeTransaction};
use crate::report::{Report, ReportFilter};
use crate::{utils, Result};
use anyhow::Context;
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// The document formats exports can be written in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Xlsx,
    Pdf,
    Csv,
}

serde_plain::derive_display_from_serialize!(ExportFormat);
serde_plain::derive_fromstr_from_deserialize!(ExportFormat);

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Pdf => "pdf",
            ExportFormat::Csv => "csv",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// A column of an exported table. `width` is relative to the other columns.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub title: String,
    pub align: Align,
    pub width: f32,
}

impl Column {
    fn new(title: &str, align: Align, width: f32) -> Self {
        Self {
            title: title.to_string(),
            align,
            width,
        }
    }
}

/// One value in an exported table. Renderers that understand numbers keep them numeric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cell {
    Text(String),
    Count(usize),
    Money(Amount),
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    /// The value as it is shown to a reader, e.g. `Rp150.000`.
    pub fn display(&self) -> String {
        match self {
            Cell::Text(s) => s.clone(),
            Cell::Count(n) => n.to_string(),
            Cell::Money(a) => a.to_string(),
        }
    }
}

/// A titled table with an optional totals row and a block of summary lines under it.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub title: String,
    pub subtitle: String,
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<Cell>>,
    pub totals: Option<Vec<Cell>>,
    pub summary: Vec<(String, Cell)>,
}

/// Lays out income transactions as `No, Nama, Kategori, Jumlah, Tanggal`, followed by the number
/// of transactions, their grand total and the total of each category.
pub fn transactions_table(transactions: &[IncomeTransaction], subtitle: &str) -> Table {
    let columns = vec![
        Column::new("No", Align::Right, 0.6),
        Column::new("Nama", Align::Left, 3.0),
        Column::new("Kategori", Align::Left, 2.2),
        Column::new("Jumlah", Align::Right, 1.8),
        Column::new("Tanggal", Align::Left, 1.4),
    ];

    let mut by_category: BTreeMap<String, Amount> = BTreeMap::new();
    let mut grand_total = Amount::ZERO;
    let rows = transactions
        .iter()
        .enumerate()
        .map(|(i, t)| {
            grand_total += t.amount;
            *by_category
                .entry(t.category.label().to_string())
                .or_default() += t.amount;
            vec![
                Cell::Count(i + 1),
                Cell::text(t.contributor_name()),
                Cell::text(t.category.label()),
                Cell::Money(t.amount),
                Cell::text(
                    t.created_at
                        .map(|c| c.with_timezone(&Local).format("%d/%m/%Y").to_string())
                        .unwrap_or_else(|| "-".to_string()),
                ),
            ]
        })
        .collect();

    let mut summary = vec![
        ("Jumlah Transaksi".to_string(), Cell::Count(transactions.len())),
        ("Total Pemasukan".to_string(), Cell::Money(grand_total)),
    ];
    summary.extend(
        by_category
            .into_iter()
            .map(|(label, amount)| (format!("Total {label}"), Cell::Money(amount))),
    );

    Table {
        title: "Data Pemasukan".to_string(),
        subtitle: subtitle.to_string(),
        columns,
        rows,
        totals: None,
        summary,
    }
}

/// Lays out a report as `No, Dusun, Jumlah Muzaki, Infaq Tetap, Infaq Tidak Tetap, Total` with a
/// totals row.
pub fn report_table(report: &Report, filter: &ReportFilter) -> Table {
    let columns = vec![
        Column::new("No", Align::Right, 0.6),
        Column::new("Dusun", Align::Left, 2.4),
        Column::new("Jumlah Muzaki", Align::Right, 1.6),
        Column::new("Infaq Tetap", Align::Right, 1.8),
        Column::new("Infaq Tidak Tetap", Align::Right, 1.9),
        Column::new("Total", Align::Right, 1.9),
    ];
    let rows = report
        .summaries
        .iter()
        .enumerate()
        .map(|(i, s)| {
            vec![
                Cell::Count(i + 1),
                Cell::text(s.name()),
                Cell::Count(s.contributors),
                Cell::Money(s.regular),
                Cell::Money(s.irregular),
                Cell::Money(s.total),
            ]
        })
        .collect();
    let t = &report.totals;
    let totals = vec![
        Cell::text(""),
        Cell::text("Total"),
        Cell::Count(t.contributors),
        Cell::Money(t.regular),
        Cell::Money(t.irregular),
        Cell::Money(t.total),
    ];
    let summary = report
        .by_category
        .iter()
        .map(|(label, amount)| (format!("Total {label}"), Cell::Money(*amount)))
        .collect();

    Table {
        title: "Laporan Pemasukan per Dusun".to_string(),
        subtitle: filter.describe(),
        columns,
        rows,
        totals: Some(totals),
        summary,
    }
}

/// Renders `table` as a markdown table for the terminal.
pub fn to_markdown(table: &Table) -> String {
    let mut out = String::new();
    let header: Vec<&str> = table.columns.iter().map(|c| c.title.as_str()).collect();
    out.push_str(&format!("| {} |\n", header.join(" | ")));
    let rule: Vec<&str> = table
        .columns
        .iter()
        .map(|c| match c.align {
            Align::Left => "---",
            Align::Right => "---:",
        })
        .collect();
    out.push_str(&format!("| {} |\n", rule.join(" | ")));
    for row in table.rows.iter().chain(table.totals.iter()) {
        let cells: Vec<String> = row
            .iter()
            .map(|c| c.display().replace('|', "\\|"))
            .collect();
        out.push_str(&format!("| {} |\n", cells.join(" | ")));
    }
    if !table.summary.is_empty() {
        out.push('\n');
        for (label, value) in &table.summary {
            out.push_str(&format!("- {label}: {}\n", value.display()));
        }
    }
    out
}

/// Renders `table` into the bytes of a document in `format`.
pub fn render(table: &Table, format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Xlsx => xlsx::render(table),
        ExportFormat::Pdf => pdf::render(table),
        ExportFormat::Csv => delimited::render(table),
    }
}

/// `{stem}-{YYYY-MM-DD}.{ext}` for today's local date.
pub fn default_file_name(stem: &str, format: ExportFormat) -> String {
    file_name_for(stem, format, Local::now().date_naive())
}

fn file_name_for(stem: &str, format: ExportFormat, date: NaiveDate) -> String {
    format!("{stem}-{}.{}", date.format("%Y-%m-%d"), format.extension())
}

/// Renders `table` and writes it to `path`. The document is written to a temporary file in the
/// same directory and renamed over `path` only once it is complete.
pub async fn write_export(table: &Table, format: ExportFormat, path: &Path) -> Result<PathBuf> {
    let bytes = render(table, format).with_context(|| format!("Unable to render the {format}"))?;

    let file_name = path
        .file_name()
        .with_context(|| format!("'{}' is not a file path", path.display()))?
        .to_string_lossy()
        .to_string();
    let temp = path.with_file_name(format!(".{file_name}.{}.tmp", uuid::Uuid::new_v4()));
    debug!("Writing {} bytes to {}", bytes.len(), temp.display());

    if let Err(e) = utils::write(&temp, &bytes).await {
        let _ = utils::remove(&temp).await;
        return Err(e);
    }
    if let Err(e) = utils::rename(&temp, path).await {
        let _ = utils::remove(&temp).await;
        return Err(e);
    }
    Ok(path.to_path_buf())
}
