// Ticket records - one failed test event per row of the source table
use crate::normalizer;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

/// Label used wherever a categorical value is missing
pub const UNKNOWN: &str = "Unknown";

/// Format of `date_key` values, shared by the timeline and the date click filter
pub const DATE_KEY_FORMAT: &str = "%Y-%m-%d";

/// Column names the core knows about
pub mod columns {
    pub const MODEL: &str = "model";
    pub const STAGE: &str = "stage";
    pub const RESULT: &str = "result";
    pub const TEST_ITEM: &str = "test_item";
    pub const FAIL_TIME: &str = "fail_time";
    pub const ERROR_MESSAGE: &str = "error_message";
    pub const ERROR_MESSAGE_NOR: &str = "error_message_nor";
}

/// Which of the known columns the source table actually carried
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ColumnPresence {
    pub model: bool,
    pub stage: bool,
    pub result: bool,
    pub test_item: bool,
    pub fail_time: bool,
    pub error_message: bool,
    pub error_message_nor: bool,
}

impl ColumnPresence {
    pub fn from_headers(headers: &[String]) -> Self {
        let has = |name: &str| headers.iter().any(|h| h == name);
        Self {
            model: has(columns::MODEL),
            stage: has(columns::STAGE),
            result: has(columns::RESULT),
            test_item: has(columns::TEST_ITEM),
            fail_time: has(columns::FAIL_TIME),
            error_message: has(columns::ERROR_MESSAGE),
            error_message_nor: has(columns::ERROR_MESSAGE_NOR),
        }
    }
}

/// Raw field values of a record before derivation
#[derive(Debug, Clone, Default)]
pub struct RawFields {
    pub model: Option<String>,
    pub stage: Option<String>,
    pub result: Option<String>,
    pub test_item: Option<String>,
    pub fail_time: Option<NaiveDateTime>,
    pub error_message: Option<String>,
    pub error_message_nor: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Record {
    model: Option<String>,
    stage: Option<String>,
    result: Option<String>,
    test_item: Option<String>,
    analyzed_error: String,
    date_key: Option<NaiveDate>,
    /// The original row, verbatim, for export
    cells: Vec<String>,
}

impl Record {
    /// Build a record, deriving `analyzed_error` and `date_key` once
    pub fn new(fields: RawFields, cells: Vec<String>) -> Self {
        let analyzed_error = normalizer::normalize(
            fields.error_message_nor.as_deref(),
            fields.error_message.as_deref(),
        );
        let date_key = fields.fail_time.map(|t| t.date());

        Self {
            model: non_blank(fields.model),
            stage: non_blank(fields.stage),
            result: non_blank(fields.result),
            test_item: non_blank(fields.test_item.map(|t| t.trim().to_string())),
            analyzed_error,
            date_key,
            cells,
        }
    }

    /// Record without an originating CSV row
    #[cfg(test)]
    pub fn from_fields(fields: RawFields) -> Self {
        Self::new(fields, Vec::new())
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn stage(&self) -> Option<&str> {
        self.stage.as_deref()
    }

    pub fn result(&self) -> Option<&str> {
        self.result.as_deref()
    }

    pub fn test_item(&self) -> Option<&str> {
        self.test_item.as_deref()
    }

    pub fn analyzed_error(&self) -> &str {
        &self.analyzed_error
    }

    pub fn date(&self) -> Option<NaiveDate> {
        self.date_key
    }

    pub fn date_key(&self) -> Option<String> {
        self.date_key.map(|d| d.format(DATE_KEY_FORMAT).to_string())
    }

    pub fn cells(&self) -> &[String] {
        &self.cells
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse a date typed by a user (`YYYY-MM-DD`)
pub fn parse_date_key(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_KEY_FORMAT).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_fields() {
        let fail_time = NaiveDate::from_ymd_opt(2026, 1, 8)
            .and_then(|d| d.and_hms_opt(22, 10, 3));
        let record = Record::from_fields(RawFields {
            test_item: Some("  WIFI_TX  ".to_string()),
            fail_time,
            error_message: Some("2026-01-08 22:10:03 | ERROR | Fixture lost".to_string()),
            ..Default::default()
        });

        assert_eq!(record.test_item(), Some("WIFI_TX"));
        assert_eq!(record.date_key().as_deref(), Some("2026-01-08"));
        assert_eq!(record.analyzed_error(), "Fixture lost");
        assert_eq!(record.model(), None);
    }

    #[test]
    fn test_blank_values_are_missing() {
        let record = Record::from_fields(RawFields {
            model: Some("   ".to_string()),
            result: Some(String::new()),
            ..Default::default()
        });
        assert_eq!(record.model(), None);
        assert_eq!(record.result(), None);
        assert_eq!(record.analyzed_error(), UNKNOWN);
        assert_eq!(record.date_key(), None);
    }

    #[test]
    fn test_column_presence() {
        let headers = vec!["model".to_string(), "error_message".to_string()];
        let presence = ColumnPresence::from_headers(&headers);
        assert!(presence.model);
        assert!(presence.error_message);
        assert!(!presence.result);
        assert!(!presence.error_message_nor);
    }

    #[test]
    fn test_parse_date_key() {
        assert_eq!(
            parse_date_key("2026-01-05"),
            NaiveDate::from_ymd_opt(2026, 1, 5)
        );
        assert_eq!(parse_date_key("05/01/2026"), None);
    }
}
