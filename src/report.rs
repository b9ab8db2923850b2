//! Spreadsheet input and output.
//!
//! The email list comes from the single visible sheet of a workbook; the
//! device report is written as one formatted sheet.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use calamine::{Reader, SheetVisible, open_workbook_auto};
use indexmap::{IndexMap, IndexSet};
use rust_xlsxwriter::{Color, Format, Workbook};
use tracing::{error, info};
use unicode_width::UnicodeWidthStr;

use crate::errors::{Error, Result};
use crate::types::DeviceRecord;

/// Sheet name of the device report
pub const DEVICE_SHEET: &str = "device_list";
/// Column holding the source email, always first
pub const EMAIL_COLUMN: &str = "Email";
/// Column checked against the OS exclusion list, after renaming
pub const OS_COLUMN: &str = "OS";

const HEADER_BACKGROUND: u32 = 0x5B9BD5;

/// Rectangular view of device records, ready to be written
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DeviceTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DeviceTable {
    /// Union of record keys in first-seen order, renamed through `mapping`,
    /// with the email column moved to the front. Rows whose OS value is in
    /// `os_to_exclude` are dropped.
    pub fn from_records(
        records: &[DeviceRecord],
        mapping: &BTreeMap<String, String>,
        os_to_exclude: &[String],
    ) -> Self {
        let rename = |key: &str| mapping.get(key).cloned().unwrap_or_else(|| key.to_string());

        let mut columns: IndexSet<String> = IndexSet::new();
        columns.insert(EMAIL_COLUMN.to_string());
        for record in records {
            for key in record.fields.keys() {
                columns.insert(rename(key));
            }
        }

        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let mut row: IndexMap<String, String> = IndexMap::new();
            for (key, value) in &record.fields {
                row.insert(rename(key), value.clone());
            }
            row.insert(EMAIL_COLUMN.to_string(), record.email.clone());

            let excluded = row
                .get(OS_COLUMN)
                .is_some_and(|os| os_to_exclude.iter().any(|skip| skip == os));
            if excluded {
                continue;
            }

            rows.push(
                columns
                    .iter()
                    .map(|column| row.get(column).cloned().unwrap_or_default())
                    .collect(),
            );
        }

        Self {
            columns: columns.into_iter().collect(),
            rows,
        }
    }

    /// Column widths: header width plus padding, optionally widened to the
    /// longest value
    pub fn column_widths(&self, width_by_value: bool) -> Vec<f64> {
        self.columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                let mut width = column.chars().count().max(column.width()) + 4;
                if width_by_value {
                    let longest = self
                        .rows
                        .iter()
                        .filter_map(|row| row.get(idx))
                        .map(|value| value.chars().count())
                        .max()
                        .unwrap_or(0);
                    width = width.max(longest);
                }
                width as f64
            })
            .collect()
    }
}

/// Write `table` as the device report at `path`, replacing any existing file
pub fn write_device_report(table: &DeviceTable, path: &Path, width_by_value: bool) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut workbook = Workbook::new();
    let header = Format::new()
        .set_bold()
        .set_background_color(Color::RGB(HEADER_BACKGROUND))
        .set_font_color(Color::White);

    let sheet = workbook.add_worksheet();
    sheet.set_name(DEVICE_SHEET)?;

    for (col, (name, width)) in table
        .columns
        .iter()
        .zip(table.column_widths(width_by_value))
        .enumerate()
    {
        let col = col as u16;
        sheet.set_column_width(col, width)?;
        sheet.write_string_with_format(0, col, name, &header)?;
    }

    for (row_idx, row) in table.rows.iter().enumerate() {
        let row_num = row_idx as u32 + 1;
        for (col, value) in row.iter().enumerate() {
            if !value.is_empty() {
                sheet.write_string(row_num, col as u16, value)?;
            }
        }
    }

    workbook.save(path)?;
    info!(
        "Wrote {} device row(s) to {}",
        table.rows.len(),
        path.display()
    );
    Ok(())
}

/// Read the header row and data rows of the only visible sheet
pub fn read_visible_sheet(path: &Path) -> Result<(Vec<String>, Vec<Vec<String>>)> {
    let mut workbook = open_workbook_auto(path)?;

    // Hidden and very hidden sheets are both skipped
    let visible: Vec<String> = workbook
        .sheets_metadata()
        .iter()
        .filter(|sheet| matches!(sheet.visible, SheetVisible::Visible))
        .map(|sheet| sheet.name.clone())
        .collect();
    if visible.len() != 1 {
        let err = Error::VisibleSheets {
            path: path.to_path_buf(),
            count: visible.len(),
        };
        error!("{}", err);
        return Err(err);
    }

    let range = workbook.worksheet_range(&visible[0])?;
    let mut rows = range
        .rows()
        .map(|row| row.iter().map(|cell| cell.to_string()).collect::<Vec<_>>());
    let header = rows.next().unwrap_or_default();
    Ok((header, rows.collect()))
}

/// Lower-cased, trimmed emails from the `Email` column; blanks are dropped
pub fn read_email_list(path: &Path) -> Result<Vec<String>> {
    let (header, rows) = read_visible_sheet(path)?;
    let idx = header
        .iter()
        .position(|name| name.trim() == EMAIL_COLUMN)
        .ok_or_else(|| Error::MissingColumn {
            path: path.to_path_buf(),
            column: EMAIL_COLUMN.to_string(),
        })?;

    let emails: Vec<String> = rows
        .iter()
        .filter_map(|row| row.get(idx))
        .map(|email| clean_email(email))
        .filter(|email| !email.is_empty())
        .collect();
    info!("Loaded {} email(s) from {}", emails.len(), path.display());
    Ok(emails)
}

/// Split a comma separated list the same way the workbook column is cleaned
pub fn parse_email_arg(list: &str) -> Vec<String> {
    list.split(',')
        .map(clean_email)
        .filter(|email| !email.is_empty())
        .collect()
}

fn clean_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
#[path = "report_test.rs"]
mod report_test;
