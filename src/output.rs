use crate::error::ExportError;
use crate::types::{Record, Schema};
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};

/// Serialized report rows, one CSV line per row with a header from the
/// serde field names.
pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), ExportError> {
    let mut wtr = csv::Writer::from_path(path)?;
    rows.iter().try_for_each(|r| wtr.serialize(r))?;
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ExportError> {
    let file = std::fs::File::create(path)?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, value)?;
    out.flush()?;
    Ok(())
}

/// Column indices for export: preferred headers that exist first, in the
/// preferred order, then every remaining column in source order.
pub fn export_column_order(headers: &[String], preferred: &[String]) -> Vec<usize> {
    let mut order: Vec<usize> = Vec::with_capacity(headers.len());
    for name in preferred {
        if let Some(idx) = headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name.trim()))
        {
            if !order.contains(&idx) {
                order.push(idx);
            }
        }
    }
    for idx in 0..headers.len() {
        if !order.contains(&idx) {
            order.push(idx);
        }
    }
    order
}

/// Write the filtered view as CSV with the export column order.
pub fn export_records<W: Write>(
    writer: W,
    schema: &Schema,
    records: &[&Record],
    preferred: &[String],
) -> Result<usize, ExportError> {
    let order = export_column_order(&schema.headers, preferred);
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(order.iter().map(|&i| schema.headers[i].as_str()))?;
    for r in records {
        wtr.write_record(
            order
                .iter()
                .map(|&i| r.values.get(i).map(String::as_str).unwrap_or("")),
        )?;
    }
    wtr.flush()?;
    Ok(records.len())
}

pub fn export_records_to_path(
    path: &Path,
    schema: &Schema,
    records: &[&Record],
    preferred: &[String],
) -> Result<usize, ExportError> {
    let file = std::fs::File::create(path)?;
    export_records(file, schema, records, preferred)
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("### {}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    preview_table_rows(rows, max_rows);
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    if rows.is_empty() || max_rows == 0 {
        println!("(no rows)\n");
        return;
    }
    let mut table = Table::new(rows.iter().take(max_rows).cloned());
    table.with(Style::markdown());
    println!("{}\n", table);
}

/// Placeholder shown instead of a chart whose column is missing.
pub fn print_unavailable(title: &str, column: &str) {
    println!("### {}", title);
    println!("(unavailable: column '{}' not found)\n", column);
}

/// Markdown preview of raw records with their source headers.
pub fn preview_records(schema: &Schema, records: &[&Record], max_rows: usize) {
    if records.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let mut builder = tabled::builder::Builder::default();
    builder.push_record(schema.headers.iter().cloned());
    for r in records.iter().take(max_rows) {
        builder.push_record(r.values.iter().cloned());
    }
    let table = builder.build().with(Style::markdown()).to_string();
    println!("{}\n", table);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnConfig, ExportConfig};
    use crate::loader::load_from_reader;

    fn headers(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_preferred_columns_first_rest_in_source_order() {
        let h = headers(&["Keterangan", "Status", "Extra", "Terlapor", "No"]);
        let preferred = headers(&["No", "Tanggal Laporan", "Terlapor", "Status"]);
        assert_eq!(export_column_order(&h, &preferred), vec![4, 3, 1, 0, 2]);
    }

    #[test]
    fn test_export_filtered_view() {
        let ds = load_from_reader(
            "Status,Catatan,Terlapor\nProses,a,BPN Bogor\nSelesai,\"b, c\",BPN Depok\n".as_bytes(),
            &ColumnConfig::default(),
        )
        .unwrap();
        let view: Vec<&Record> = ds.records.iter().skip(1).collect();
        let mut buf: Vec<u8> = Vec::new();
        let n = export_records(&mut buf, &ds.schema, &view, &ExportConfig::default().column_order)
            .unwrap();
        assert_eq!(n, 1);
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "Terlapor,Status,Catatan\nBPN Depok,Selesai,\"b, c\"\n");
    }

    #[test]
    fn test_write_json_and_csv_rows() {
        use crate::types::TrendRow;
        let dir = tempfile::TempDir::new().unwrap();
        let rows = vec![TrendRow {
            month: "2024-05".to_string(),
            count: 3,
        }];

        let csv_path = dir.path().join("trend.csv");
        write_csv(&csv_path, &rows).unwrap();
        assert_eq!(std::fs::read_to_string(&csv_path).unwrap(), "Month,Count\n2024-05,3\n");

        let json_path = dir.path().join("trend.json");
        write_json(&json_path, &rows).unwrap();
        let back: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(back[0]["Count"], 3);
    }

    #[test]
    fn test_export_empty_view_writes_header_only() {
        let ds = load_from_reader("Terlapor,Status\n".as_bytes(), &ColumnConfig::default()).unwrap();
        let mut buf: Vec<u8> = Vec::new();
        export_records(&mut buf, &ds.schema, &[], &[]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "Terlapor,Status\n");
    }
}
