use anyhow::{Context, Result, anyhow};
use calamine::{Data, Reader, open_workbook_auto};
use polars::prelude::*;
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::models::columns::LINHA;

/// Reads legacy CSV exports and Excel workbooks into frames where every
/// column is text. Typing happens later, in the normalizer.
pub struct SheetReader {
    separator: u8,
    sheet: Option<String>,
}

impl SheetReader {
    pub fn new(separator: char, sheet: Option<String>) -> Self {
        Self {
            separator: separator as u8,
            sheet,
        }
    }

    pub fn read(&self, path: &Path) -> Result<DataFrame> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        let mut df = match extension.as_str() {
            "csv" | "txt" => self.read_csv(path)?,
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => self.read_workbook(path)?,
            other => return Err(anyhow!("Unsupported file type '{}': {}", other, path.display())),
        };

        sanitize_headers(&mut df)?;
        info!("Read {} rows x {} columns from {}", df.height(), df.width(), path.display());

        Ok(df)
    }

    fn read_csv(&self, path: &Path) -> Result<DataFrame> {
        // The header row is read as data so duplicate names go through
        // `unique_headers` like workbook headers do
        let raw = CsvReadOptions::default()
            .with_has_header(false)
            .with_infer_schema_length(Some(0))
            .map_parse_options(|opts| {
                opts.with_separator(self.separator)
                    .with_encoding(CsvEncoding::LossyUtf8)
                    .with_truncate_ragged_lines(true)
                    .with_missing_is_null(true)
            })
            .try_into_reader_with_file_path(Some(path.to_path_buf()))
            .with_context(|| format!("Failed to open CSV file: {}", path.display()))?
            .finish()
            .with_context(|| format!("Failed to parse CSV file: {}", path.display()))?;

        if raw.height() == 0 {
            return Ok(DataFrame::empty());
        }

        let headers: Vec<String> = raw
            .get_columns()
            .iter()
            .map(|column| {
                column
                    .str()
                    .ok()
                    .and_then(|values| values.get(0))
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();

        let mut df = raw.slice(1, raw.height() - 1);
        df.set_column_names(unique_headers(&headers))?;

        let mut filled = BooleanChunked::full("filled".into(), false, df.height());
        for column in df.get_columns() {
            filled = filled | column.is_not_null();
        }

        // Header is line 1
        let lines: Vec<String> = (0..df.height()).map(|i| (i + 2).to_string()).collect();
        df.with_column(Series::new(LINHA.into(), lines))?;

        let blank = (&filled).into_iter().filter(|kept| *kept != Some(true)).count();
        if blank > 0 {
            debug!("Skipping {} blank lines in {}", blank, path.display());
        }

        Ok(df.filter(&filled)?)
    }

    fn read_workbook(&self, path: &Path) -> Result<DataFrame> {
        let mut workbook = open_workbook_auto(path)
            .with_context(|| format!("Failed to open workbook: {}", path.display()))?;

        let sheet_name = match &self.sheet {
            Some(name) => name.clone(),
            None => workbook
                .sheet_names()
                .first()
                .cloned()
                .ok_or_else(|| anyhow!("Workbook has no sheets: {}", path.display()))?,
        };

        let range = workbook
            .worksheet_range(&sheet_name)
            .with_context(|| format!("Failed to read sheet '{}' of {}", sheet_name, path.display()))?;
        let first_row = range.start().map(|(row, _)| row).unwrap_or(0);

        let mut rows = range.rows();
        let Some(header_row) = rows.next() else {
            return Ok(DataFrame::empty());
        };
        let headers: Vec<String> = header_row
            .iter()
            .map(|cell| cell_to_string(cell).unwrap_or_default())
            .collect();

        let mut values: Vec<Vec<Option<String>>> = vec![Vec::new(); headers.len()];
        let mut lines: Vec<String> = Vec::new();

        for (index, row) in rows.enumerate() {
            if row.iter().all(|cell| matches!(cell, Data::Empty)) {
                continue;
            }
            // index 0 is the row right after the header
            lines.push((first_row as usize + index + 2).to_string());
            for (col, column_values) in values.iter_mut().enumerate() {
                column_values.push(row.get(col).and_then(cell_to_string));
            }
        }

        debug!("Sheet '{}' has {} data rows", sheet_name, lines.len());

        let names = unique_headers(&headers);
        let mut columns: Vec<Column> = names
            .into_iter()
            .zip(values)
            .map(|(name, column_values)| Series::new(name.into(), column_values).into())
            .collect();
        columns.push(Series::new(LINHA.into(), lines).into());

        Ok(DataFrame::new(columns)?)
    }
}

/// Renders a cell as text. Integral numbers lose the `.0` so CPFs and
/// document numbers stored as numbers survive; dates become Excel serials.
pub fn cell_to_string(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty => return None,
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        other => other.to_string(),
    };

    if text.is_empty() { None } else { Some(text) }
}

fn unique_headers(headers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let base = raw.trim().trim_start_matches('\u{feff}').to_string();
            let base = if base.is_empty() {
                format!("coluna_{}", i + 1)
            } else {
                base
            };

            let mut name = base.clone();
            let mut suffix = 2;
            while !seen.insert(name.clone()) {
                name = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            name
        })
        .collect()
}

fn sanitize_headers(df: &mut DataFrame) -> Result<()> {
    let current: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let cleaned = unique_headers(&current);
    if cleaned != current {
        df.set_column_names(cleaned)?;
    }
    Ok(())
}
