// Ticket table loader - CSV in, normalized records out
use crate::filter::{DateRange, Dropdown};
use crate::record::{columns, ColumnPresence, RawFields, Record};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("File not found: {0}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("Input has no header row")]
    Empty,
    #[error("Input has neither an 'error_message' nor an 'error_message_nor' column")]
    MissingErrorColumns,
}

/// A fully loaded table, ready to be installed in a dashboard
#[derive(Debug, Clone)]
pub struct Dataset {
    pub source: Option<PathBuf>,
    pub headers: Vec<String>,
    pub records: Vec<Record>,
    /// Observed date range across dated records
    pub bounds: Option<DateRange>,
    pub models: Vec<String>,
    pub results: Vec<String>,
    pub stages: Vec<String>,
    /// Rows whose `fail_time` could not be parsed
    pub unparsed_times: usize,
}

impl Dataset {
    fn assemble(
        headers: Vec<String>,
        presence: ColumnPresence,
        records: Vec<Record>,
        unparsed_times: usize,
    ) -> Self {
        let options = |present: bool, value: fn(&Record) -> Option<&str>| -> Vec<String> {
            if !present {
                return Vec::new();
            }
            records
                .iter()
                .filter_map(value)
                .map(str::to_string)
                .collect::<BTreeSet<_>>()
                .into_iter()
                .collect()
        };

        let models = options(presence.model, Record::model);
        let results = options(presence.result, Record::result);
        let stages = options(presence.stage, Record::stage);
        let bounds = DateRange::observed(&records);

        Self {
            source: None,
            headers,
            records,
            bounds,
            models,
            results,
            stages,
            unparsed_times,
        }
    }

    /// Sorted distinct values offered by a dropdown; empty when the column is absent
    pub fn options(&self, dropdown: Dropdown) -> &[String] {
        match dropdown {
            Dropdown::Model => &self.models,
            Dropdown::Result => &self.results,
            Dropdown::Stage => &self.stages,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

/// Load a ticket CSV from disk
pub fn load_file(path: &Path) -> Result<Dataset, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    info!("Loading tickets from {}", path.display());

    let bytes = fs::read(path)?;
    let mut dataset = load_bytes(&bytes)?;
    dataset.source = Some(path.to_path_buf());
    Ok(dataset)
}

/// Parse CSV bytes (UTF-8, falling back to Latin-1)
pub fn load_bytes(bytes: &[u8]) -> Result<Dataset, LoadError> {
    let text = decode_text(bytes);
    parse_table(&text)
}

fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            debug!("Input is not valid UTF-8, decoding as Latin-1");
            bytes.iter().map(|&b| b as char).collect()
        }
    }
}

fn parse_table(text: &str) -> Result<Dataset, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(LoadError::Empty);
    }

    let presence = ColumnPresence::from_headers(&headers);
    if !presence.error_message && !presence.error_message_nor {
        return Err(LoadError::MissingErrorColumns);
    }
    report_missing_columns(&presence);

    let column = |name: &str| headers.iter().position(|h| h == name);
    let model_col = column(columns::MODEL);
    let stage_col = column(columns::STAGE);
    let result_col = column(columns::RESULT);
    let test_item_col = column(columns::TEST_ITEM);
    let fail_time_col = column(columns::FAIL_TIME);
    let error_col = column(columns::ERROR_MESSAGE);
    let error_nor_col = column(columns::ERROR_MESSAGE_NOR);

    let mut records = Vec::new();
    let mut unparsed_times = 0usize;

    for row in reader.records() {
        let row = row?;
        // Ragged rows are padded so every record lines up with the header
        let mut cells: Vec<String> = row.iter().map(str::to_string).collect();
        if cells.len() > headers.len() {
            warn!(
                "Row {} has {} cells but the header has {}, dropping the extra cells",
                records.len() + 2,
                cells.len(),
                headers.len()
            );
        }
        cells.resize(headers.len(), String::new());

        let cell = |col: Option<usize>| col.map(|i| cells[i].clone()).filter(|v| !v.is_empty());

        let raw_time = cell(fail_time_col);
        let fail_time = raw_time.as_deref().and_then(parse_timestamp);
        if raw_time.is_some() && fail_time.is_none() {
            unparsed_times += 1;
        }

        let fields = RawFields {
            model: cell(model_col),
            stage: cell(stage_col),
            result: cell(result_col),
            test_item: cell(test_item_col),
            fail_time,
            error_message: cell(error_col),
            error_message_nor: cell(error_nor_col),
        };
        records.push(Record::new(fields, cells));
    }

    if unparsed_times > 0 {
        warn!("{} rows have an unparsable fail_time", unparsed_times);
    }
    info!("Loaded {} records", records.len());

    Ok(Dataset::assemble(headers, presence, records, unparsed_times))
}

fn report_missing_columns(presence: &ColumnPresence) {
    let checks = [
        (presence.model, columns::MODEL),
        (presence.stage, columns::STAGE),
        (presence.result, columns::RESULT),
        (presence.test_item, columns::TEST_ITEM),
        (presence.fail_time, columns::FAIL_TIME),
    ];
    for (present, name) in checks {
        if !present {
            warn!("Column '{}' is missing, grouping under 'Unknown'", name);
        }
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Parse a `fail_time` cell; `None` for anything unrecognized.
///
/// Offsets are dropped, keeping the wall-clock time the tester saw.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
