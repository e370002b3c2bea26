// Error message normalizer - Collapse noisy error strings into canonical labels
use crate::record::UNKNOWN;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

lazy_static! {
    static ref LOG_PREFIX: Regex =
        Regex::new(r"^\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2} \| ERROR \| ").unwrap();

    /// Generic substitutions, applied in order when no specific rule matched
    static ref SUBSTITUTIONS: Vec<(Regex, &'static str)> = vec![
        // ctime-style timestamps: "Thu Jan  8 22:10:03 2026"
        (
            Regex::new(
                r"\b(?:Mon|Tue|Wed|Thu|Fri|Sat|Sun) (?:Jan|Feb|Mar|Apr|May|Jun|Jul|Aug|Sep|Oct|Nov|Dec) +\d{1,2} \d{2}:\d{2}:\d{2} \d{4}\b",
            )
            .unwrap(),
            "DATE",
        ),
        (
            Regex::new(r"\b\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}\b").unwrap(),
            "XXX.XXX.XXX.XXX",
        ),
        // Ping interval / burst arguments
        (Regex::new(r"\B-i\s+\d+\b").unwrap(), "-i XX"),
        (Regex::new(r"\B-b\s+\d+\b").unwrap(), "-b X"),
    ];
}

/// Shape of message a specific rule recognizes
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "kind", content = "pattern", rename_all = "snake_case")]
pub enum Matcher {
    Contains(&'static str),
    StartsWith(&'static str),
    EndsWith(&'static str),
    ContainsAll(&'static [&'static str]),
}

impl Matcher {
    pub fn matches(&self, text: &str) -> bool {
        match self {
            Self::Contains(needle) => text.contains(needle),
            Self::StartsWith(prefix) => text.starts_with(prefix),
            Self::EndsWith(suffix) => text.ends_with(suffix),
            Self::ContainsAll(needles) => needles.iter().all(|n| text.contains(n)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Contains(needle) => format!("contains {:?}", needle),
            Self::StartsWith(prefix) => format!("starts with {:?}", prefix),
            Self::EndsWith(suffix) => format!("ends with {:?}", suffix),
            Self::ContainsAll(needles) => format!("contains all of {:?}", needles),
        }
    }
}

/// A known noisy message family and the one label it collapses to
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Rule {
    pub matcher: Matcher,
    pub canonical: &'static str,
}

const fn rule(matcher: Matcher, canonical: &'static str) -> Rule {
    Rule { matcher, canonical }
}

pub const HTTP_CONNECT_TIMEOUT: &str =
    "HTTPConnectionPool(host='XXX.XXX.XXX.XXX', port=XXXX): Max retries exceeded (connect timeout)";

/// Evaluated top to bottom, first match wins.
const RULES: &[Rule] = &[
    rule(Matcher::Contains("(connect timeout="), HTTP_CONNECT_TIMEOUT),
    rule(
        Matcher::Contains("Read timed out. (read timeout="),
        "HTTPConnectionPool(host='XXX.XXX.XXX.XXX', port=XXXX): Read timed out (read timeout)",
    ),
    rule(
        Matcher::Contains("[Errno 111] Connection refused"),
        "HTTPConnectionPool(host='XXX.XXX.XXX.XXX', port=XXXX): Failed to establish a new connection: [Errno 111] Connection refused",
    ),
    rule(
        Matcher::Contains("Remote end closed connection without response"),
        "RemoteDisconnected: Remote end closed connection without response",
    ),
    // urllib3 embeds the connection object address
    rule(
        Matcher::ContainsAll(&["object at 0x", "Failed to establish a new connection"]),
        "NewConnectionError: <connection object at 0xXXXXXXXX>: Failed to establish a new connection",
    ),
    rule(
        Matcher::StartsWith("Serial number mismatch"),
        "Serial number mismatch: expected SN XXXXXXXX, read SN XXXXXXXX",
    ),
    rule(
        Matcher::Contains("not found in MES"),
        "Unit SN XXXXXXXX not found in MES",
    ),
    rule(
        Matcher::StartsWith("DUT not detected on port"),
        "DUT not detected on port XX",
    ),
    rule(
        Matcher::Contains("[Errno 98] Address already in use"),
        "Socket bind failed: [Errno 98] Address already in use (port XXXXX)",
    ),
    rule(
        Matcher::ContainsAll(&["ssh: connect to host", "Connection timed out"]),
        "ssh: connect to host XXX.XXX.XXX.XXX port 22: Connection timed out",
    ),
    rule(
        Matcher::Contains("Permission denied (publickey"),
        "SSH authentication failed: Permission denied (publickey)",
    ),
    rule(
        Matcher::EndsWith("No space left on device"),
        "[Errno 28] No space left on device",
    ),
    rule(
        Matcher::Contains("CRC mismatch"),
        "Firmware image CRC mismatch",
    ),
    rule(
        Matcher::ContainsAll(&["Fixture", "not responding"]),
        "Fixture controller not responding",
    ),
    rule(
        Matcher::StartsWith("Traceback (most recent call last)"),
        "Python traceback (unhandled exception)",
    ),
    rule(
        Matcher::Contains("Temperature out of range"),
        "Temperature out of range",
    ),
];

/// The specific-case rule table, in evaluation order
pub fn rules() -> &'static [Rule] {
    RULES
}

/// Map a raw error message to its canonical label.
///
/// `primary` (error_message_nor) is preferred when non-blank, then `fallback`
/// (error_message). Never returns an empty string.
pub fn normalize(primary: Option<&str>, fallback: Option<&str>) -> String {
    classify(primary, fallback).0
}

/// Canonical label plus the specific rule that produced it, if any
pub fn classify(
    primary: Option<&str>,
    fallback: Option<&str>,
) -> (String, Option<&'static Rule>) {
    let source = [primary, fallback]
        .into_iter()
        .flatten()
        .find(|text| !text.trim().is_empty())
        .unwrap_or(UNKNOWN);

    let text = LOG_PREFIX.replace(source, "");

    if let Some(rule) = match_rule(&text) {
        return (rule.canonical.to_string(), Some(rule));
    }

    let mut label = text.into_owned();
    for (pattern, replacement) in SUBSTITUTIONS.iter() {
        label = pattern.replace_all(&label, *replacement).into_owned();
    }

    let label = label.trim();
    if label.is_empty() {
        (UNKNOWN.to_string(), None)
    } else {
        (label.to_string(), None)
    }
}

/// First specific rule matching `text`, if any
fn match_rule(text: &str) -> Option<&'static Rule> {
    RULES.iter().find(|rule| rule.matcher.matches(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_specific_rule_beats_ip_substitution() {
        let raw = "2026-01-08 22:10:03 | ERROR | 172.17.6.32 timed out. (connect timeout=30)'))";
        assert_eq!(normalize(Some(raw), None), HTTP_CONNECT_TIMEOUT);

        let other_ip = "2026-01-09 01:00:00 | ERROR | 10.0.0.7 timed out. (connect timeout=30)'))";
        assert_eq!(normalize(None, Some(other_ip)), HTTP_CONNECT_TIMEOUT);
    }

    #[test]
    fn test_classify_reports_rule_after_prefix() {
        let raw = "2026-01-08 22:10:03 | ERROR | Serial number mismatch: expected SN A1, read SN B2";
        let (label, rule) = classify(Some(raw), None);
        assert_eq!(
            label,
            "Serial number mismatch: expected SN XXXXXXXX, read SN XXXXXXXX"
        );
        assert_eq!(rule.map(|r| r.canonical), Some(label.as_str()));

        let (label, rule) = classify(Some("  "), Some("Failed to ping -i 3 -b 2 host"));
        assert_eq!(label, "Failed to ping -i XX -b X host");
        assert!(rule.is_none());
    }

    #[test]
    fn test_generic_substitutions_combine() {
        assert_eq!(
            normalize(Some("Failed to ping -i 35 -b 1 host"), None),
            "Failed to ping -i XX -b X host"
        );
        assert_eq!(
            normalize(None, Some("Link down at Thu Jan  8 22:10:03 2026 on 192.168.1.20")),
            "Link down at DATE on XXX.XXX.XXX.XXX"
        );
    }

    #[test]
    fn test_flags_inside_words_untouched() {
        assert_eq!(normalize(Some("multi-i 35 retry"), None), "multi-i 35 retry");
    }

    #[test]
    fn test_source_selection() {
        assert_eq!(normalize(Some("primary"), Some("fallback")), "primary");
        assert_eq!(normalize(Some("   "), Some("fallback")), "fallback");
        assert_eq!(normalize(None, None), UNKNOWN);
        assert_eq!(normalize(Some(""), Some("")), UNKNOWN);
    }

    #[test]
    fn test_prefix_only_stripped_at_start() {
        assert_eq!(
            normalize(Some("2026-01-08 22:10:03 | ERROR | Fixture lost"), None),
            "Fixture lost"
        );
        assert_eq!(
            normalize(Some("retry 2026-01-08 22:10:03 | ERROR | x"), None),
            "retry 2026-01-08 22:10:03 | ERROR | x"
        );
        assert_eq!(
            normalize(Some("2026-01-08 22:10:03 | ERROR | "), None),
            UNKNOWN
        );
    }

    #[test]
    fn test_first_matching_rule_wins() {
        // Matches both the connect-timeout rule and the ssh rule; the earlier one wins
        let raw = "ssh: connect to host 1.2.3.4 Connection timed out (connect timeout=5)";
        assert_eq!(normalize(Some(raw), None), HTTP_CONNECT_TIMEOUT);

        let raw = "Serial number mismatch: expected SN C02X1234, read SN C02Y9876";
        assert_eq!(
            normalize(Some(raw), None),
            "Serial number mismatch: expected SN XXXXXXXX, read SN XXXXXXXX"
        );
    }

    #[test]
    fn test_deterministic() {
        let inputs = [
            "Failed to ping -i 35 -b 1 host",
            "<urllib3.connection.HTTPConnection object at 0x7f3a>: Failed to establish a new connection",
            "something entirely new",
        ];
        for input in inputs {
            assert_eq!(normalize(Some(input), None), normalize(Some(input), None));
        }
    }

    #[test]
    fn test_rule_table_shape() {
        assert_eq!(rules().len(), 16);
        for rule in rules() {
            assert!(!rule.canonical.is_empty());
        }
    }
}
