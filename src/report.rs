// Terminal report - Print one dashboard refresh as text, tables or JSON
use crate::cli_output::{sparkline, truncate, OutputMode, OutputWriter};
use crate::normalizer::Rule;
use crate::session::DashboardView;
use crate::view::{percent, Series};
use anyhow::Result;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};

const LABEL_WIDTH: usize = 36;

pub fn print_report(out: &OutputWriter, view: &DashboardView) -> Result<()> {
    if out.mode() == OutputMode::Json {
        return out.emit_json(view);
    }

    out.section("Failure Overview");
    out.table(&[
        ("Records", view.filtered_records.to_string()),
        ("Loaded", view.total_records.to_string()),
        (
            "Share",
            format!(
                "{:.1}%",
                percent(view.filtered_records as u64, view.total_records as u64)
            ),
        ),
    ]);
    if view.filters.is_default() {
        out.info("No active filters");
    } else {
        out.info(&format!("Active filters: {}", view.active_filters.join(" | ")));
    }

    let charts = &view.charts;

    out.section("Trend Failure");
    if charts.timeline.is_empty() {
        out.warning("No timeline data (fail_time missing or unparsable)");
    } else {
        let first = charts.timeline.labels.first().cloned().unwrap_or_default();
        let last = charts.timeline.labels.last().cloned().unwrap_or_default();
        out.block(&format!("  {}", sparkline(&charts.timeline.values)));
        out.info(&format!(
            "{} → {} ({} days, {} dated records, peak {})",
            first,
            last,
            charts.timeline.len(),
            charts.timeline.total(),
            charts.timeline.max()
        ));
    }

    print_bars(out, "Top Test Items (Fails)", &charts.test_items, charts.total);

    out.section("Top Errors");
    if charts.top_errors.is_empty() {
        out.info("No data");
    } else {
        out.block(&errors_table(&charts.top_errors).to_string());
    }

    print_bars(out, "Result Distribution", &charts.result_pie, charts.total);

    out.section("Model → Test Item Drill-down");
    out.block(&hierarchy_table(view).to_string());

    Ok(())
}

fn print_bars(out: &OutputWriter, title: &str, series: &Series, total: u64) {
    out.section(title);
    if series.is_empty() {
        out.info("No data");
        return;
    }
    let max = series.max();
    for (label, value) in series.points() {
        let text = format!("{} ({:.1}%)", value, percent(value, total));
        out.bar(label, LABEL_WIDTH, value, max, &text);
    }
}

fn errors_table(series: &Series) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Error", "Count"]);

    for (i, (label, _)) in series.points().enumerate() {
        let text = series.texts.get(i).cloned().unwrap_or_default();
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(label),
            Cell::new(text),
        ]);
    }
    table
}

/// Models and their test items; errors stay in the tree series for the TUI
fn hierarchy_table(view: &DashboardView) -> Table {
    let series = &view.charts.hierarchy;
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Model / Test Item", "Count", "%"]);

    for i in 0..series.ids.len() {
        let depth = series.depths[i];
        if depth == 0 || depth > 2 {
            continue;
        }
        let indent = "  ".repeat(depth - 1);
        table.add_row(vec![
            format!("{}{}", indent, truncate(&series.labels[i], LABEL_WIDTH)),
            series.values[i].to_string(),
            format!("{:.1}", percent(series.values[i], view.charts.total)),
        ]);
    }
    table
}

/// The specific-case normalization rules, in evaluation order
pub fn rules_table(rules: &[Rule]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Matches", "Canonical label"]);
    for (i, rule) in rules.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(rule.matcher.describe()),
            Cell::new(rule.canonical),
        ]);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_bytes;
    use crate::normalizer;
    use crate::session::Dashboard;
    use crate::view::ViewLimits;

    fn view() -> DashboardView {
        let csv = "model,test_item,result,fail_time,error_message\n\
A,T1,FAIL,2026-01-05 08:00:00,E1\n\
A,T2,FAIL,2026-01-06 08:00:00,E2\n\
B,T1,PASS,2026-01-06 09:00:00,E1\n";
        Dashboard::new(load_bytes(csv.as_bytes()).unwrap(), ViewLimits::default()).refresh()
    }

    #[test]
    fn test_hierarchy_table_lists_models_and_items() {
        let rendered = hierarchy_table(&view()).to_string();
        assert!(rendered.contains("Model / Test Item"));
        assert!(rendered.contains("A"));
        assert!(rendered.contains("  T2"));
        assert!(!rendered.contains("E2"));
    }

    #[test]
    fn test_errors_table() {
        let rendered = errors_table(&view().charts.top_errors).to_string();
        assert!(rendered.contains("E1"));
        assert!(rendered.contains("2 (66.7%)"));
    }

    #[test]
    fn test_rules_table() {
        let rendered = rules_table(normalizer::rules()).to_string();
        assert!(rendered.contains("Canonical label"));
        assert!(rendered.contains("No space left on device"));
    }

    #[test]
    fn test_print_report_plain() {
        let out = OutputWriter::new(OutputMode::Plain);
        assert!(print_report(&out, &view()).is_ok());
    }
}
