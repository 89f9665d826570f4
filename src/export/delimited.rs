use crate::export::{Cell, Table};
use crate::Result;
use anyhow::Context;

/// Writes the header, rows and totals as CSV, then the summary as `label,value` lines. Money is
/// written as a plain number so that spreadsheets can sum it.
pub(super) fn render(table: &Table) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    writer.write_record(table.columns.iter().map(|c| c.title.as_str()))?;
    for row in table.rows.iter().chain(table.totals.iter()) {
        writer.write_record(row.iter().map(value))?;
    }
    if !table.summary.is_empty() {
        writer.write_record([""])?;
        for (label, cell) in &table.summary {
            writer.write_record([label.clone(), value(cell)])?;
        }
    }
    writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("{}", e.error()))
        .context("Unable to finish the CSV")
}

fn value(cell: &Cell) -> String {
    match cell {
        Cell::Money(amount) => amount.value().normalize().to_string(),
        other => other.display(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::transactions;
    use crate::export::transactions_table;

    #[test]
    fn test_render_csv() {
        let table = transactions_table(&transactions(), "");
        let text = String::from_utf8(render(&table).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "No,Nama,Kategori,Jumlah,Tanggal");
        assert!(lines[1].starts_with("1,Ahmad,Zakat Fitrah,45000,"));
        assert_eq!(lines[2], "2,-,Infaq Tetap,100000,-");
        assert!(lines.contains(&"Total Pemasukan,145000"));
    }
}
