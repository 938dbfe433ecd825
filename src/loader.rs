use crate::config::ColumnConfig;
use crate::error::{LoadError, LoadResult};
use crate::types::{Record, Schema};
use crate::util::{clean_cell, parse_date_safe};
use csv::{ReaderBuilder, StringRecord};
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub blank_rows: usize,
    pub parse_errors: usize,
    pub unparsed_dates: usize,
}

/// Records of one load together with the column layout they were read with.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub schema: Schema,
    pub records: Vec<Record>,
    pub report: LoadReport,
}

pub fn load_and_clean(path: &Path, columns: &ColumnConfig) -> LoadResult<Dataset> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let dataset = load_from_reader(file, columns)?;
    info!(
        path = %path.display(),
        rows = dataset.report.loaded_rows,
        "Loaded complaint records"
    );
    Ok(dataset)
}

pub fn load_from_reader<R: Read>(reader: R, columns: &ColumnConfig) -> LoadResult<Dataset> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(LoadError::MissingHeader);
    }

    let schema = detect_schema(headers, columns);
    let missing = schema.missing();
    if !missing.is_empty() {
        warn!(
            "Columns not found, dependent features disabled: {}",
            missing
                .iter()
                .map(|f| f.label())
                .collect::<Vec<_>>()
                .join(", ")
        );
    }

    let mut report = LoadReport::default();
    let mut records: Vec<Record> = Vec::new();
    for result in rdr.records() {
        report.total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(_) => {
                report.parse_errors += 1;
                continue;
            }
        };
        if row.iter().all(|c| c.trim().is_empty()) {
            report.blank_rows += 1;
            continue;
        }
        let record = build_record(&schema, &row);
        let date_cell = schema.report_date.and_then(|i| clean_cell(row.get(i)));
        if date_cell.is_some() && record.report_date.is_none() {
            report.unparsed_dates += 1;
        }
        records.push(record);
    }
    report.loaded_rows = records.len();

    Ok(Dataset {
        schema,
        records,
        report,
    })
}

/// Match the header row against the configured names, once per load.
///
/// Names match case-insensitively; the first matching header wins. The
/// report date prefers an exact `report_date` name and only then falls
/// back to the first header containing one of the date tokens.
pub fn detect_schema(headers: Vec<String>, columns: &ColumnConfig) -> Schema {
    let lower: Vec<String> = headers.iter().map(|h| h.to_lowercase()).collect();
    let find = |names: &[String]| {
        names
            .iter()
            .find_map(|n| lower.iter().position(|h| *h == n.to_lowercase()))
    };
    let report_date = find(&columns.report_date).or_else(|| {
        lower.iter().position(|h| {
            columns
                .date_tokens
                .iter()
                .any(|t| h.contains(&t.to_lowercase()))
        })
    });

    Schema {
        id: find(&columns.id),
        entity: find(&columns.entity),
        category: find(&columns.category),
        status: find(&columns.status),
        report_date,
        location: find(&columns.location),
        handler: find(&columns.handler),
        headers,
    }
}

fn build_record(schema: &Schema, row: &StringRecord) -> Record {
    let cell = |idx: Option<usize>| idx.and_then(|i| clean_cell(row.get(i)));

    // Pad short rows so values stay aligned with the headers.
    let mut values: Vec<String> = row.iter().map(|c| c.trim().to_string()).collect();
    if values.len() < schema.headers.len() {
        values.resize(schema.headers.len(), String::new());
    }

    Record {
        id: cell(schema.id),
        entity: cell(schema.entity),
        category: cell(schema.category),
        status: cell(schema.status),
        report_date: parse_date_safe(cell(schema.report_date).as_deref()),
        location: cell(schema.location),
        handler: cell(schema.handler),
        values,
    }
}
