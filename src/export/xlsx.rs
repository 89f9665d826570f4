use crate::export::{Align, Cell, Table};
use crate::Result;
use rust_xlsxwriter::{Format, FormatAlign, FormatBorder, Workbook, Worksheet};

const MONEY_FORMAT: &str = "\"Rp\"#,##0";
const SHEET_NAME_MAX: usize = 31;
const WIDTH_SCALE: f64 = 9.0;

/// Writes one worksheet: title and subtitle lines, a bold header row, the rows with money kept
/// numeric, a bold totals row and the summary lines.
pub(super) fn render(table: &Table) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    let name: String = table.title.chars().take(SHEET_NAME_MAX).collect();
    sheet.set_name(name)?;

    let formats = Formats::new();
    sheet.write_string_with_format(0, 0, &table.title, &formats.title)?;
    sheet.write_string(1, 0, &table.subtitle)?;

    let header_row = 3;
    for (col, column) in table.columns.iter().enumerate() {
        let col = col as u16;
        sheet.set_column_width(col, f64::from(column.width) * WIDTH_SCALE)?;
        let format = match column.align {
            Align::Left => &formats.header,
            Align::Right => &formats.header_right,
        };
        sheet.write_string_with_format(header_row, col, &column.title, format)?;
    }

    let mut row = header_row + 1;
    for cells in &table.rows {
        write_row(sheet, row, cells, &formats.money, &formats.plain)?;
        row += 1;
    }
    if let Some(totals) = &table.totals {
        write_row(sheet, row, totals, &formats.money_bold, &formats.bold)?;
        row += 1;
    }

    row += 1;
    for (label, cell) in &table.summary {
        sheet.write_string_with_format(row, 1, label, &formats.bold)?;
        write_cell(sheet, row, 2, cell, &formats.money, &formats.plain)?;
        row += 1;
    }

    Ok(workbook.save_to_buffer()?)
}

struct Formats {
    title: Format,
    header: Format,
    header_right: Format,
    plain: Format,
    bold: Format,
    money: Format,
    money_bold: Format,
}

impl Formats {
    fn new() -> Self {
        let header = Format::new()
            .set_bold()
            .set_background_color(0xD9E2F3)
            .set_border_bottom(FormatBorder::Thin);
        Self {
            title: Format::new().set_bold().set_font_size(14),
            header_right: header.clone().set_align(FormatAlign::Right),
            header,
            plain: Format::new(),
            bold: Format::new().set_bold(),
            money: Format::new().set_num_format(MONEY_FORMAT),
            money_bold: Format::new().set_bold().set_num_format(MONEY_FORMAT),
        }
    }
}

fn write_row(
    sheet: &mut Worksheet,
    row: u32,
    cells: &[Cell],
    money: &Format,
    text: &Format,
) -> Result<()> {
    for (col, cell) in cells.iter().enumerate() {
        write_cell(sheet, row, col as u16, cell, money, text)?;
    }
    Ok(())
}

fn write_cell(
    sheet: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &Cell,
    money: &Format,
    text: &Format,
) -> Result<()> {
    match cell {
        Cell::Text(s) => sheet.write_string_with_format(row, col, s, text)?,
        Cell::Count(n) => sheet.write_number_with_format(row, col, *n as f64, text)?,
        Cell::Money(amount) => sheet.write_number_with_format(row, col, amount.to_f64(), money)?,
    };
    Ok(())
}
