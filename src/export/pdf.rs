use crate::export::{Align, Cell, Table};
use crate::Result;
use anyhow::anyhow;
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference,
    PdfLayerIndex, PdfLayerReference, PdfPageIndex, Point, Rect, Rgb,
};
use std::io::BufWriter;

// A4 portrait (mm)
const PAGE_W: f32 = 210.0;
const PAGE_H: f32 = 297.0;
const MARGIN_TOP: f32 = 20.0;
const MARGIN_BOTTOM: f32 = 20.0;
const MARGIN_LEFT: f32 = 15.0;
const MARGIN_RIGHT: f32 = 15.0;
const CONTENT_W: f32 = PAGE_W - MARGIN_LEFT - MARGIN_RIGHT;
const ROW_H: f32 = 6.0;
const CELL_PAD: f32 = 1.5;
const FONT_SIZE: f32 = 9.0;
const TITLE_SIZE: f32 = 15.0;
const SUBTITLE_SIZE: f32 = 10.0;
const BAND_H: f32 = 22.0;

fn approx_text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.18
}

/// Shortens `text` until it fits in `width`.
fn fit(text: &str, width: f32, size: f32) -> String {
    if approx_text_width(text, size) <= width {
        return text.to_string();
    }
    let mut out: String = text.to_string();
    while !out.is_empty() && approx_text_width(&format!("{out}.."), size) > width {
        out.pop();
    }
    format!("{out}..")
}

fn rgb(r: f32, g: f32, b: f32) -> Color {
    Color::Rgb(Rgb::new(r, g, b, None))
}

struct Col {
    width: f32,
    align: Align,
}

struct PdfWriter {
    doc: PdfDocumentReference,
    font: IndirectFontRef,
    font_bold: IndirectFontRef,
    pages: Vec<(PdfPageIndex, PdfLayerIndex)>,
    y: f32,
}

impl PdfWriter {
    fn new(title: &str) -> Result<Self> {
        let (doc, page, layer) = PdfDocument::new(title, Mm(PAGE_W), Mm(PAGE_H), "Layer 1");
        let font = doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| anyhow!("Unable to load the PDF font: {e:?}"))?;
        let font_bold = doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| anyhow!("Unable to load the PDF font: {e:?}"))?;
        Ok(Self {
            doc,
            font,
            font_bold,
            pages: vec![(page, layer)],
            y: MARGIN_TOP,
        })
    }

    fn layer(&self) -> PdfLayerReference {
        let (page, layer) = self.pages[self.pages.len() - 1];
        self.doc.get_page(page).get_layer(layer)
    }

    fn pdf_y(&self) -> f32 {
        PAGE_H - self.y
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_W), Mm(PAGE_H), "Layer");
        self.pages.push((page, layer));
        self.y = MARGIN_TOP;
    }

    /// Starts a new page if `needed` does not fit. Returns true if it did.
    fn ensure_space(&mut self, needed: f32) -> bool {
        if self.y + needed > PAGE_H - MARGIN_BOTTOM {
            self.new_page();
            return true;
        }
        false
    }

    fn text(&self, s: &str, x: f32, size: f32, bold: bool) {
        let font = if bold { &self.font_bold } else { &self.font };
        self.layer().use_text(s, size, Mm(x), Mm(self.pdf_y()), font);
    }

    fn hline(&self, x1: f32, x2: f32) {
        let layer = self.layer();
        layer.set_outline_thickness(0.5);
        layer.add_line(Line {
            points: vec![
                (Point::new(Mm(x1), Mm(self.pdf_y())), false),
                (Point::new(Mm(x2), Mm(self.pdf_y())), false),
            ],
            is_closed: false,
        });
    }

    /// Fills the strip of height `h` whose top edge is the current position.
    fn band(&self, h: f32, color: Color) {
        let layer = self.layer();
        layer.set_fill_color(color);
        layer.add_rect(Rect::new(
            Mm(MARGIN_LEFT),
            Mm(self.pdf_y() - h),
            Mm(PAGE_W - MARGIN_RIGHT),
            Mm(self.pdf_y()),
        ));
        layer.set_fill_color(rgb(0.0, 0.0, 0.0));
    }

    /// A shaded band carrying the title, subtitle and generation time.
    fn header(&mut self, title: &str, subtitle: &str) {
        let top = self.y;
        self.band(BAND_H, rgb(0.11, 0.37, 0.25));
        let layer = self.layer();
        layer.set_fill_color(rgb(1.0, 1.0, 1.0));
        self.y += 8.0;
        self.text(title, MARGIN_LEFT + 4.0, TITLE_SIZE, true);
        self.y += 6.0;
        self.text(subtitle, MARGIN_LEFT + 4.0, SUBTITLE_SIZE, false);
        self.y += 5.0;
        let ts = chrono::Local::now()
            .format("Dibuat %d/%m/%Y %H:%M")
            .to_string();
        self.text(&ts, MARGIN_LEFT + 4.0, 7.5, false);
        layer.set_fill_color(rgb(0.0, 0.0, 0.0));
        self.y = top + BAND_H + 4.0;
    }

    fn table_header(&mut self, cols: &[Col], headers: &[&str]) {
        self.band(ROW_H, rgb(0.85, 0.89, 0.95));
        self.y += ROW_H - CELL_PAD;
        self.cells(cols, headers, true);
        self.y += CELL_PAD;
        self.hline(MARGIN_LEFT, PAGE_W - MARGIN_RIGHT);
    }

    /// Writes one row, shading it when `shaded`. The column header is repeated at the top of each
    /// new page.
    fn table_row(&mut self, cols: &[Col], headers: &[&str], values: &[&str], shaded: bool, bold: bool) {
        if self.ensure_space(ROW_H) {
            self.table_header(cols, headers);
        }
        if shaded {
            self.band(ROW_H, rgb(0.95, 0.95, 0.95));
        }
        self.y += ROW_H - CELL_PAD;
        self.cells(cols, values, bold);
        self.y += CELL_PAD;
    }

    fn cells(&self, cols: &[Col], values: &[&str], bold: bool) {
        let mut x = MARGIN_LEFT;
        for (col, value) in cols.iter().zip(values) {
            let inner = col.width - 2.0 * CELL_PAD;
            let value = fit(value, inner, FONT_SIZE);
            match col.align {
                Align::Left => self.text(&value, x + CELL_PAD, FONT_SIZE, bold),
                Align::Right => {
                    let tw = approx_text_width(&value, FONT_SIZE);
                    self.text(&value, x + col.width - CELL_PAD - tw, FONT_SIZE, bold);
                }
            }
            x += col.width;
        }
    }

    fn summary_line(&mut self, label: &str, value: &str) {
        self.ensure_space(ROW_H);
        self.y += ROW_H - CELL_PAD;
        self.text(label, MARGIN_LEFT + CELL_PAD, FONT_SIZE, true);
        let tw = approx_text_width(value, FONT_SIZE);
        self.text(value, MARGIN_LEFT + CONTENT_W * 0.6 - tw, FONT_SIZE, false);
        self.y += CELL_PAD;
    }

    /// Writes `Halaman i dari n` at the bottom of every page.
    fn page_numbers(&self) {
        let n = self.pages.len();
        for (i, (page, layer)) in self.pages.iter().enumerate() {
            let label = format!("Halaman {} dari {n}", i + 1);
            let tw = approx_text_width(&label, 8.0);
            self.doc.get_page(*page).get_layer(*layer).use_text(
                label,
                8.0,
                Mm(PAGE_W - MARGIN_RIGHT - tw),
                Mm(MARGIN_BOTTOM / 2.0),
                &self.font,
            );
        }
    }

    fn to_bytes(self) -> Result<Vec<u8>> {
        self.page_numbers();
        let mut buf = BufWriter::new(Vec::new());
        self.doc
            .save(&mut buf)
            .map_err(|e| anyhow!("Unable to write the PDF: {e:?}"))?;
        buf.into_inner()
            .map_err(|e| anyhow!("Unable to write the PDF: {}", e.error()))
    }
}

/// Lays `table` out on A4 pages: a header band, the column header, rows with alternating shading,
/// the totals row, the summary block and page numbers.
pub(super) fn render(table: &Table) -> Result<Vec<u8>> {
    let mut pdf = PdfWriter::new(&table.title)?;
    pdf.header(&table.title, &table.subtitle);

    let total_weight: f32 = table.columns.iter().map(|c| c.width).sum();
    let cols: Vec<Col> = table
        .columns
        .iter()
        .map(|c| Col {
            width: CONTENT_W * c.width / total_weight.max(f32::EPSILON),
            align: c.align,
        })
        .collect();
    let headers: Vec<&str> = table.columns.iter().map(|c| c.title.as_str()).collect();
    pdf.table_header(&cols, &headers);

    for (i, row) in table.rows.iter().enumerate() {
        let values: Vec<String> = row.iter().map(Cell::display).collect();
        let values: Vec<&str> = values.iter().map(String::as_str).collect();
        pdf.table_row(&cols, &headers, &values, i % 2 == 1, false);
    }

    if let Some(totals) = &table.totals {
        pdf.hline(MARGIN_LEFT, PAGE_W - MARGIN_RIGHT);
        let values: Vec<String> = totals.iter().map(Cell::display).collect();
        let values: Vec<&str> = values.iter().map(String::as_str).collect();
        pdf.table_row(&cols, &headers, &values, false, true);
    }

    if !table.summary.is_empty() {
        pdf.y += ROW_H;
        for (label, cell) in &table.summary {
            pdf.summary_line(label, &cell.display());
        }
    }

    pdf.to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::tests::transactions;
    use crate::export::transactions_table;

    #[test]
    fn test_render_pdf() {
        let table = transactions_table(&transactions(), "Semua periode");
        let bytes = render(&table).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[test]
    fn test_render_paginates() {
        let mut pdf = PdfWriter::new("x").unwrap();
        pdf.header("Data Pemasukan", "Semua periode");
        let cols = vec![Col {
            width: CONTENT_W,
            align: Align::Left,
        }];
        for i in 0..120 {
            pdf.table_row(&cols, &["No"], &[&i.to_string()], i % 2 == 1, false);
        }
        assert!(pdf.pages.len() > 1);
        assert!(pdf.to_bytes().unwrap().starts_with(b"%PDF"));
    }

    #[test]
    fn test_fit() {
        assert_eq!(fit("Krajan", 100.0, FONT_SIZE), "Krajan");
        let cut = fit("Sebuah nama yang sangat panjang sekali", 20.0, FONT_SIZE);
        assert!(cut.ends_with(".."));
        assert!(approx_text_width(&cut, FONT_SIZE) <= 20.0);
    }
}
