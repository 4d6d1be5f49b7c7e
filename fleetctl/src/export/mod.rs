//! Tabular exports.
//!
//! Anything that can be laid out as rows implements [`Tabular`]; the writers turn a slice of rows
//! into CSV, XLSX or PDF bytes. Rows are fetched by the caller, which also enforces
//! `exports.max_rows`.

mod delimited;
mod pdf;
pub mod tables;
mod workbook;

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::error;
use utoipa::{IntoParams, ToSchema};

use crate::errors::{Error, Result};

/// Query parameter selecting the export format
#[derive(Debug, Default, Deserialize, IntoParams)]
pub struct ExportParams {
    /// `csv` (default), `xlsx` or `pdf`
    #[param(value_type = Option<String>, example = "csv")]
    pub format: Option<String>,
}

impl ExportParams {
    pub fn format(&self) -> Result<ExportFormat> {
        self.format.as_deref().map_or(Ok(ExportFormat::Csv), str::parse)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
pub enum ExportFormat {
    Csv,
    Xlsx,
    Pdf,
}

impl ExportFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ExportFormat::Pdf => "application/pdf",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Pdf => "pdf",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" => Ok(ExportFormat::Xlsx),
            "pdf" => Ok(ExportFormat::Pdf),
            other => Err(Error::BadRequest {
                message: format!("Unsupported export format '{other}', expected csv, xlsx or pdf"),
            }),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A single value in an exported row.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Empty,
}

impl Cell {
    pub fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    /// `Empty` for `None`
    pub fn opt_text(value: Option<impl Into<String>>) -> Self {
        value.map_or(Cell::Empty, |v| Cell::Text(v.into()))
    }

    pub fn opt_number(value: Option<f64>) -> Self {
        value.map_or(Cell::Empty, Cell::Number)
    }

    pub fn opt_date(value: Option<NaiveDate>) -> Self {
        value.map_or(Cell::Empty, Cell::Date)
    }

    /// Plain-text rendering shared by the CSV and PDF writers
    pub fn display(&self) -> String {
        match self {
            Cell::Text(text) => text.clone(),
            Cell::Number(number) => number.to_string(),
            Cell::Date(date) => date.format("%Y-%m-%d").to_string(),
            Cell::Empty => String::new(),
        }
    }
}

/// A record that can be exported as one row of a table.
pub trait Tabular {
    /// File name stem, e.g. `drivers`
    const NAME: &'static str;

    /// Sheet name and PDF heading
    fn title() -> &'static str;

    fn headers() -> &'static [&'static str];

    /// One cell per header, in header order
    fn row(&self) -> Vec<Cell>;
}

/// A finished export, ready to be sent as an attachment.
#[derive(Debug)]
pub struct ExportFile {
    pub format: ExportFormat,
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl ExportFile {
    pub fn content_disposition(&self) -> String {
        format!("attachment; filename=\"{}\"", self.filename)
    }
}

/// `<name>-<yyyymmdd>.<ext>`
pub fn filename(name: &str, format: ExportFormat, day: NaiveDate) -> String {
    format!("{name}-{}.{}", day.format("%Y%m%d"), format.extension())
}

/// Render `rows` in `format`. `heading` is printed above PDF tables.
pub fn render<T: Tabular>(rows: &[T], format: ExportFormat, heading: &str, day: NaiveDate) -> Result<ExportFile> {
    let bytes = match format {
        ExportFormat::Csv => delimited::write(rows)?,
        ExportFormat::Xlsx => workbook::write(rows)?,
        ExportFormat::Pdf => pdf::write(rows, heading, day)?,
    };
    Ok(ExportFile {
        format,
        filename: filename(T::NAME, format, day),
        bytes,
    })
}

/// Log a writer failure and hide its details from the caller.
fn writer_error(operation: &str, err: impl fmt::Display) -> Error {
    error!(error = %err, "Export failed: {operation}");
    Error::Internal {
        operation: operation.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Sample {
        name: &'static str,
        amount: Option<f64>,
    }

    impl Tabular for Sample {
        const NAME: &'static str = "samples";

        fn title() -> &'static str {
            "Samples"
        }

        fn headers() -> &'static [&'static str] {
            &["Name", "Amount", "Day"]
        }

        fn row(&self) -> Vec<Cell> {
            vec![
                Cell::text(self.name),
                Cell::opt_number(self.amount),
                Cell::Date(NaiveDate::from_ymd_opt(2024, 5, 17).unwrap()),
            ]
        }
    }

    fn samples() -> Vec<Sample> {
        vec![
            Sample {
                name: "Plain",
                amount: Some(12.5),
            },
            Sample {
                name: "Comma, \"quoted\"",
                amount: None,
            },
        ]
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 17).unwrap()
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!(" Xlsx ".parse::<ExportFormat>().unwrap(), ExportFormat::Xlsx);
        assert_eq!("pdf".parse::<ExportFormat>().unwrap(), ExportFormat::Pdf);

        let err = "docx".parse::<ExportFormat>().unwrap_err();
        assert_eq!(err.status_code().as_u16(), 400);

        assert_eq!(ExportParams::default().format().unwrap(), ExportFormat::Csv);
    }

    #[test]
    fn test_filename() {
        let file = render(&samples(), ExportFormat::Csv, "Samples", day()).unwrap();
        assert_eq!(file.filename, "samples-20240517.csv");
        assert_eq!(file.content_disposition(), "attachment; filename=\"samples-20240517.csv\"");
    }

    #[test]
    fn test_csv_quotes_and_headers() {
        let file = render(&samples(), ExportFormat::Csv, "Samples", day()).unwrap();
        let text = String::from_utf8(file.bytes).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "Name,Amount,Day");
        assert_eq!(lines[1], "Plain,12.5,2024-05-17");
        assert_eq!(lines[2], "\"Comma, \"\"quoted\"\"\",,2024-05-17");
    }

    #[test]
    fn test_csv_header_without_rows() {
        let file = render::<Sample>(&[], ExportFormat::Csv, "Samples", day()).unwrap();
        assert_eq!(String::from_utf8(file.bytes).unwrap(), "Name,Amount,Day\n");
    }

    #[test]
    fn test_xlsx_is_a_zip() {
        let file = render(&samples(), ExportFormat::Xlsx, "Samples", day()).unwrap();
        assert!(file.bytes.starts_with(b"PK"));
    }

    #[test]
    fn test_pdf_signature_and_pages() {
        let many: Vec<_> = (0..200)
            .map(|_| Sample {
                name: "A rather long name that will not fit into its column on the page at all",
                amount: Some(1.0),
            })
            .collect();
        let file = render(&many, ExportFormat::Pdf, "Samples", day()).unwrap();
        assert!(file.bytes.starts_with(b"%PDF"));

        let document = lopdf::Document::load_mem(&file.bytes).unwrap();
        assert!(document.get_pages().len() > 1);
    }
}
