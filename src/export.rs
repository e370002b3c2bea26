// Export - Write the currently filtered records back out as delimited text
use crate::record::Record;
use anyhow::{Context, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::info;

const DERIVED_COLUMNS: [&str; 2] = ["date_key", "analyzed_error"];

/// Header row: the original columns, then the derived ones
pub fn export_headers(headers: &[String]) -> Vec<String> {
    headers
        .iter()
        .cloned()
        .chain(
            DERIVED_COLUMNS
                .iter()
                .filter(|d| !headers.iter().any(|h| h == *d))
                .map(|d| d.to_string()),
        )
        .collect()
}

/// Write `records` with the given header to any writer.
///
/// Values are quoted only when they contain the delimiter, a quote or a newline.
pub fn write_records<W: Write>(
    writer: W,
    headers: &[String],
    records: &[&Record],
    delimiter: u8,
) -> Result<()> {
    let mut csv = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(writer);

    let out_headers = export_headers(headers);
    let derived = out_headers.len() - headers.len();
    csv.write_record(&out_headers)?;

    for record in records {
        let mut row: Vec<String> = record.cells().to_vec();
        row.resize(headers.len(), String::new());
        if derived > 0 {
            let extra = [
                record.date_key().unwrap_or_default(),
                record.analyzed_error().to_string(),
            ];
            row.extend(
                DERIVED_COLUMNS
                    .iter()
                    .zip(extra)
                    .filter(|(name, _)| !headers.iter().any(|h| h == *name))
                    .map(|(_, value)| value),
            );
        }
        csv.write_record(&row)?;
    }

    csv.flush()?;
    Ok(())
}

/// Export to a file, returning the number of rows written
pub fn export_to_file(
    path: &Path,
    headers: &[String],
    records: &[&Record],
    delimiter: u8,
) -> Result<usize> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    write_records(file, headers, records, delimiter)?;
    info!("Exported {} records to {}", records.len(), path.display());
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_bytes;
    use std::fs;
    use tempfile::tempdir;

    const CSV: &str = "model,test_item,fail_time,error_message\n\
A,T1,2026-01-05 10:00:00,\"plain, with comma\"\n\
B,T2,bad,\"say \"\"hi\"\"\nnext line\"\n";

    fn export(delimiter: u8) -> String {
        let dataset = load_bytes(CSV.as_bytes()).unwrap();
        let refs: Vec<&Record> = dataset.records.iter().collect();
        let mut out = Vec::new();
        write_records(&mut out, &dataset.headers, &refs, delimiter).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_quotes_only_when_needed() {
        let text = export(b',');
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("model,test_item,fail_time,error_message,date_key,analyzed_error")
        );
        assert_eq!(
            lines.next(),
            Some("A,T1,2026-01-05 10:00:00,\"plain, with comma\",2026-01-05,\"plain, with comma\"")
        );
        assert!(text.contains("\"say \"\"hi\"\"\nnext line\""));
    }

    #[test]
    fn test_other_delimiter() {
        let text = export(b';');
        assert!(text.contains("A;T1;2026-01-05 10:00:00;plain, with comma;2026-01-05;plain, with comma"));
    }

    #[test]
    fn test_export_to_file_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.csv");
        let dataset = load_bytes(CSV.as_bytes()).unwrap();
        let refs: Vec<&Record> = dataset.records.iter().take(1).collect();
        let written = export_to_file(&path, &dataset.headers, &refs, b',').unwrap();
        assert_eq!(written, 1);

        let reloaded = load_bytes(&fs::read(&path).unwrap()).unwrap();
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.records[0].model(), Some("A"));
    }

    #[test]
    fn test_existing_derived_columns_not_duplicated() {
        let headers = vec!["analyzed_error".to_string(), "model".to_string()];
        assert_eq!(
            export_headers(&headers),
            vec!["analyzed_error", "model", "date_key"]
        );
    }
}
