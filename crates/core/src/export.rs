//! Table export to CSV, spreadsheet and JSON.
//!
//! Exports reuse the table's column descriptors: exportable columns in declaration order,
//! verbose headers as the header row, and the same cell rendering as the paginated view.

use crate::constants::EXPORT_NAME;
use crate::models::PatientRecord;
use crate::table::{CellContext, Table};
use crate::{RosterError, RosterResult};
use rust_xlsxwriter::Workbook;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
    Json,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Csv, ExportFormat::Xlsx, ExportFormat::Json];

    /// Parses the `_export` parameter. Unknown formats yield `None`.
    pub fn from_param(raw: Option<&str>) -> Option<Self> {
        match raw.map(str::trim)? {
            "csv" => Some(ExportFormat::Csv),
            "xlsx" => Some(ExportFormat::Xlsx),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
            ExportFormat::Json => "json",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv; charset=utf-8",
            ExportFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            ExportFormat::Json => "application/json",
        }
    }
}

/// A rendered export, ready to be sent as an attachment.
#[derive(Clone, Debug)]
pub struct ExportFile {
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Renders `records` through `table` into `format`.
pub fn export_table(
    table: &Table,
    records: &[PatientRecord],
    ctx: &CellContext<'_>,
    format: ExportFormat,
) -> RosterResult<ExportFile> {
    let headers: Vec<&str> = table.export_columns().map(|c| c.header).collect();
    let rows: Vec<Vec<String>> = records
        .iter()
        .map(|r| table.export_columns().map(|c| c.render(r, ctx)).collect())
        .collect();

    let bytes = match format {
        ExportFormat::Csv => to_csv(&headers, &rows)?,
        ExportFormat::Xlsx => to_xlsx(&headers, &rows)?,
        ExportFormat::Json => to_json(&headers, &rows)?,
    };

    tracing::debug!(
        format = format.extension(),
        rows = rows.len(),
        bytes = bytes.len(),
        "exported table"
    );

    Ok(ExportFile {
        filename: format!("{EXPORT_NAME}.{}", format.extension()),
        content_type: format.content_type(),
        bytes,
    })
}

fn to_csv(headers: &[&str], rows: &[Vec<String>]) -> RosterResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(headers).map_err(RosterError::CsvExport)?;
    for row in rows {
        writer.write_record(row).map_err(RosterError::CsvExport)?;
    }
    writer
        .into_inner()
        .map_err(|e| RosterError::CsvFlush(e.to_string()))
}

fn to_xlsx(headers: &[&str], rows: &[Vec<String>]) -> RosterResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();

    for (col, header) in headers.iter().enumerate() {
        sheet
            .write_string(0, col_index(col)?, *header)
            .map_err(RosterError::XlsxExport)?;
    }
    for (row_idx, row) in rows.iter().enumerate() {
        let row_num = u32::try_from(row_idx + 1)
            .map_err(|_| RosterError::InvalidInput("too many rows for spreadsheet".into()))?;
        for (col, value) in row.iter().enumerate() {
            sheet
                .write_string(row_num, col_index(col)?, value)
                .map_err(RosterError::XlsxExport)?;
        }
    }

    workbook.save_to_buffer().map_err(RosterError::XlsxExport)
}

fn col_index(col: usize) -> RosterResult<u16> {
    u16::try_from(col)
        .map_err(|_| RosterError::InvalidInput("too many columns for spreadsheet".into()))
}

/// Array of `{header: value}` objects.
fn to_json(headers: &[&str], rows: &[Vec<String>]) -> RosterResult<Vec<u8>> {
    let objects: Vec<serde_json::Map<String, serde_json::Value>> = rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .zip(row)
                .map(|(h, v)| (h.to_string(), serde_json::Value::String(v.clone())))
                .collect()
        })
        .collect();
    serde_json::to_vec(&objects).map_err(RosterError::JsonExport)
}
