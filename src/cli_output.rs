// Mode-aware CLI output - colored for terminals, plain for pipes, JSON for tools
use anyhow::Result;
use colored::Colorize;
use serde::Serialize;
use std::io::{self, IsTerminal};
use std::str::FromStr;

/// Output mode for CLI commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-friendly output with colors
    Human,
    /// Machine-readable JSON output
    Json,
    /// Plain text without colors (for pipes/logs)
    Plain,
}

impl OutputMode {
    /// Auto-detect output mode based on environment
    pub fn auto() -> Self {
        if std::env::var("FAILBOARD_JSON").is_ok() {
            Self::Json
        } else if !io::stdout().is_terminal() {
            Self::Plain
        } else {
            Self::Human
        }
    }
}

impl FromStr for OutputMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::auto()),
            "human" | "text" => Ok(Self::Human),
            "plain" => Ok(Self::Plain),
            "json" => Ok(Self::Json),
            _ => Err(anyhow::anyhow!(
                "Unknown format: {}. Supported: auto, human, plain, json",
                s
            )),
        }
    }
}

/// CLI output writer with mode awareness
pub struct OutputWriter {
    mode: OutputMode,
}

impl OutputWriter {
    pub fn new(mode: OutputMode) -> Self {
        if mode != OutputMode::Human {
            colored::control::set_override(false);
        }
        Self { mode }
    }

    /// Print a section header
    pub fn section(&self, title: &str) {
        match self.mode {
            OutputMode::Human => {
                println!();
                println!("{}", title.cyan().bold());
                println!("{}", "═".repeat(title.chars().count()).cyan());
            }
            OutputMode::Plain => {
                println!();
                println!("{}", title);
                println!("{}", "=".repeat(title.chars().count()));
            }
            OutputMode::Json => {}
        }
    }

    pub fn success(&self, message: &str) {
        match self.mode {
            OutputMode::Human => println!("  {} {}", "✓".green(), message),
            OutputMode::Plain => println!("  [OK] {}", message),
            OutputMode::Json => {}
        }
    }

    pub fn warning(&self, message: &str) {
        match self.mode {
            OutputMode::Human => println!("  {} {}", "⚠".yellow(), message),
            OutputMode::Plain => println!("  [WARN] {}", message),
            OutputMode::Json => {}
        }
    }

    pub fn info(&self, message: &str) {
        match self.mode {
            OutputMode::Human | OutputMode::Plain => println!("  {}", message),
            OutputMode::Json => {}
        }
    }

    /// Print a key-value table
    pub fn table(&self, rows: &[(&str, String)]) {
        let max_key_len = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        match self.mode {
            OutputMode::Human => {
                for (key, value) in rows {
                    println!("  {:width$} │ {}", key.yellow(), value, width = max_key_len);
                }
            }
            OutputMode::Plain => {
                for (key, value) in rows {
                    println!("  {:width$} : {}", key, value, width = max_key_len);
                }
            }
            OutputMode::Json => {}
        }
    }

    /// Print one horizontal bar of a bar chart
    pub fn bar(&self, label: &str, label_width: usize, value: u64, max: u64, text: &str) {
        let width = 30;
        let filled = if max == 0 {
            0
        } else {
            ((value as f64 / max as f64 * width as f64) as usize).min(width)
        };
        let label = truncate(label, label_width);
        match self.mode {
            OutputMode::Human => println!(
                "  {:lw$} │{}{} {}",
                label,
                "█".repeat(filled).cyan(),
                "░".repeat(width - filled).bright_black(),
                text,
                lw = label_width
            ),
            OutputMode::Plain => println!(
                "  {:lw$} |{}{} {}",
                label,
                "#".repeat(filled),
                "-".repeat(width - filled),
                text,
                lw = label_width
            ),
            OutputMode::Json => {}
        }
    }

    /// Print a pre-rendered block (tables, sparklines)
    pub fn block(&self, text: &str) {
        if self.mode != OutputMode::Json {
            println!("{}", text);
        }
    }

    /// Emit a structured value (JSON mode only)
    pub fn emit_json<T: Serialize>(&self, value: &T) -> Result<()> {
        if self.mode == OutputMode::Json {
            println!("{}", serde_json::to_string_pretty(value)?);
        }
        Ok(())
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }
}

/// Shorten `s` to at most `max_len` characters, marking the cut with "…"
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}

/// Sparkline over a series of counts
pub fn sparkline(values: &[u64]) -> String {
    const SPARK_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    let max = values.iter().copied().max().unwrap_or(0);
    values
        .iter()
        .map(|&v| {
            if max == 0 {
                SPARK_CHARS[0]
            } else {
                SPARK_CHARS[((v as f64 / max as f64) * 7.0).round() as usize]
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("json".parse::<OutputMode>().unwrap(), OutputMode::Json);
        assert_eq!("PLAIN".parse::<OutputMode>().unwrap(), OutputMode::Plain);
        assert_eq!("text".parse::<OutputMode>().unwrap(), OutputMode::Human);
        assert!("xml".parse::<OutputMode>().is_err());
    }

    #[test]
    fn test_auto_mode() {
        let mode = OutputMode::auto();
        // Plain under cargo test (no TTY) unless FAILBOARD_JSON is set
        assert!(matches!(
            mode,
            OutputMode::Plain | OutputMode::Human | OutputMode::Json
        ));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
        assert_eq!(truncate("°°°°°°", 3), "°°…");
    }

    #[test]
    fn test_sparkline() {
        assert_eq!(sparkline(&[0, 7, 14]), "▁▅█");
        assert_eq!(sparkline(&[0, 0]), "▁▁");
        assert_eq!(sparkline(&[]), "");
    }
}
