//! PDF layout of a dataset report.

use crate::types::Dataset;

use super::format::{format_timestamp, Precision};
use super::pdf::{truncate, Font, Page, PdfDocument, PAGE_HEIGHT, PAGE_WIDTH};

const MARGIN: f32 = 54.0;
const TOP: f32 = PAGE_HEIGHT - MARGIN;
/// Lowest baseline for body content; the footer sits below it.
const BOTTOM: f32 = MARGIN + 18.0;
const FOOTER_Y: f32 = MARGIN - 18.0;

const TABLE_SIZE: f32 = 9.0;
const ROW_HEIGHT: f32 = 13.0;

/// (header, x, max chars) for the record table.
const RECORD_COLUMNS: [(&str, f32, usize); 5] = [
    ("Equipment Name", MARGIN, 30),
    ("Type", MARGIN + 170.0, 22),
    ("Flowrate", MARGIN + 300.0, 14),
    ("Pressure", MARGIN + 380.0, 14),
    ("Temperature", MARGIN + 460.0, 12),
];
const TYPE_COLUMNS: [(&str, f32, usize); 2] = [("Type", MARGIN, 60), ("Count", MARGIN + 300.0, 14)];

/// Render `dataset` into PDF bytes. Deterministic for a given dataset and precision.
pub fn render_dataset_pdf(dataset: &Dataset, precision: Precision) -> Vec<u8> {
    let mut layout = Layout::new();
    let agg = &dataset.aggregates;

    layout.line(Font::Bold, 16.0, 22.0, "Equipment Analysis Report");
    layout.line(
        Font::Regular,
        11.0,
        15.0,
        &format!("File: {}", truncate(&dataset.file_name, 80)),
    );
    layout.line(
        Font::Regular,
        11.0,
        15.0,
        &format!("Uploaded at: {}", format_timestamp(&dataset.uploaded_at)),
    );
    layout.gap(12.0);

    layout.section("Summary Statistics");
    let stats = [
        format!("Total equipment count: {}", agg.total_count),
        format!("Average flowrate: {}", precision.format(agg.averages.flowrate)),
        format!("Average pressure: {}", precision.format(agg.averages.pressure)),
        format!("Average temperature: {}", precision.format(agg.averages.temperature)),
    ];
    for stat in &stats {
        layout.line(Font::Regular, 11.0, 15.0, stat);
    }
    layout.gap(12.0);

    layout.section("Equipment Type Distribution");
    let type_rows: Vec<Vec<String>> = agg
        .type_distribution
        .iter()
        .map(|tc| vec![tc.equipment_type.clone(), tc.count.to_string()])
        .collect();
    layout.table(&TYPE_COLUMNS, &type_rows);
    layout.gap(12.0);

    layout.section("Equipment Records");
    let record_rows: Vec<Vec<String>> = dataset
        .records
        .iter()
        .map(|r| {
            vec![
                r.name.clone(),
                r.equipment_type.clone(),
                r.flowrate.to_string(),
                r.pressure.to_string(),
                r.temperature.to_string(),
            ]
        })
        .collect();
    layout.table(&RECORD_COLUMNS, &record_rows);

    layout
        .finish(format!("Equipment Analysis Report: {}", dataset.file_name))
        .to_bytes()
}

struct Layout {
    pages: Vec<Page>,
    current: Page,
    y: f32,
}

impl Layout {
    fn new() -> Self {
        Self {
            pages: Vec::new(),
            current: Page::default(),
            y: TOP,
        }
    }

    fn break_page(&mut self) {
        let full = std::mem::take(&mut self.current);
        self.pages.push(full);
        self.y = TOP;
    }

    /// Break the page unless `height` more points fit above the bottom margin.
    /// Returns whether a break happened.
    fn ensure(&mut self, height: f32) -> bool {
        if self.y - height < BOTTOM {
            self.break_page();
            true
        } else {
            false
        }
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    fn line(&mut self, font: Font, size: f32, advance: f32, text: &str) {
        self.ensure(advance);
        self.y -= advance;
        self.current.text(font, size, MARGIN, self.y, text);
    }

    fn section(&mut self, title: &str) {
        // Keep a heading together with its table header and first row.
        self.ensure(18.0 + 3.0 * ROW_HEIGHT);
        self.line(Font::Bold, 12.0, 18.0, title);
    }

    fn table_header(&mut self, columns: &[(&str, f32, usize)]) {
        self.y -= ROW_HEIGHT;
        for (header, x, _) in columns {
            self.current.text(Font::Bold, TABLE_SIZE, *x, self.y, header);
        }
        self.current
            .rule(MARGIN, PAGE_WIDTH - MARGIN, self.y - 3.0);
        self.y -= 3.0;
    }

    fn table(&mut self, columns: &[(&str, f32, usize)], rows: &[Vec<String>]) {
        self.table_header(columns);
        if rows.is_empty() {
            self.y -= ROW_HEIGHT;
            self.current
                .text(Font::Regular, TABLE_SIZE, MARGIN, self.y, "(no rows)");
            return;
        }
        for row in rows {
            if self.ensure(ROW_HEIGHT) {
                self.table_header(columns);
            }
            self.y -= ROW_HEIGHT;
            for ((_, x, max_chars), cell) in columns.iter().zip(row) {
                self.current
                    .text(Font::Regular, TABLE_SIZE, *x, self.y, &truncate(cell, *max_chars));
            }
        }
    }

    fn finish(mut self, title: String) -> PdfDocument {
        self.break_page();
        let total = self.pages.len();
        let mut doc = PdfDocument::new(title);
        for (i, mut page) in self.pages.into_iter().enumerate() {
            page.text(
                Font::Regular,
                8.0,
                PAGE_WIDTH / 2.0 - 24.0,
                FOOTER_Y,
                &format!("Page {} of {}", i + 1, total),
            );
            doc.push_page(page);
        }
        doc
    }
}
