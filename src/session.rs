// Dashboard session - Owns the dataset and filter state, recomputes on every change
use crate::filter::{ClickDimension, Dropdown, FilterState};
use crate::loader::Dataset;
use crate::record::Record;
use crate::view::{ChartEvent, Charts, ViewLimits};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info};

/// A discrete user action
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SetRange(NaiveDate, NaiveDate),
    SetRangeStart(NaiveDate),
    SetRangeEnd(NaiveDate),
    SetDropdown(Dropdown, Option<String>),
    Click(ChartEvent),
    ClearFilter(ClickDimension),
    ClearClicks,
    ResetAll,
}

/// Everything one refresh produces
#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub total_records: usize,
    pub filtered_records: usize,
    pub filters: FilterState,
    pub active_filters: Vec<String>,
    pub charts: Charts,
}

pub struct Dashboard {
    dataset: Dataset,
    filter: FilterState,
    limits: ViewLimits,
}

impl Dashboard {
    pub fn new(dataset: Dataset, limits: ViewLimits) -> Self {
        let filter = FilterState::new(dataset.bounds);
        Self {
            dataset,
            filter,
            limits,
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    /// Swap in a new dataset and start over with a clean filter state
    pub fn install(&mut self, dataset: Dataset) {
        info!(
            "Installing dataset with {} records ({} date range)",
            dataset.len(),
            dataset
                .bounds
                .map(|b| b.to_string())
                .unwrap_or_else(|| "no".to_string())
        );
        let bounds = dataset.bounds;
        self.dataset = dataset;
        self.filter.reset_for_dataset(bounds);
    }

    pub fn dispatch(&mut self, action: Action) {
        debug!("Dispatch {:?}", action);
        match action {
            Action::SetRange(start, end) => self.filter.set_range(start, end),
            Action::SetRangeStart(start) => self.filter.set_range_start(start),
            Action::SetRangeEnd(end) => self.filter.set_range_end(end),
            Action::SetDropdown(dropdown, value) => {
                // A column the table does not carry offers nothing to filter on
                if self.dataset.options(dropdown).is_empty() {
                    debug!("Ignoring {:?} dropdown: no values in dataset", dropdown);
                } else {
                    self.filter.set_dropdown(dropdown, value);
                }
            }
            Action::Click(event) => {
                let (source, payload) = event.decode();
                self.filter.click_point(source, &payload);
            }
            Action::ClearFilter(dimension) => self.filter.clear_filter(dimension),
            Action::ClearClicks => self.filter.clear_clicks(),
            Action::ResetAll => self.filter.reset_all(),
        }
    }

    /// Records passing the current filters, in load order
    pub fn filtered(&self) -> Vec<&Record> {
        self.filter.apply(&self.dataset.records)
    }

    /// Full forward pass: filter, aggregate, bind
    pub fn refresh(&self) -> DashboardView {
        let filtered = self.filtered();
        DashboardView {
            total_records: self.dataset.len(),
            filtered_records: filtered.len(),
            filters: self.filter.clone(),
            active_filters: self.filter.describe(),
            charts: Charts::build(&filtered, self.limits),
        }
    }

    /// Shift one end of the date range by whole days, clamped to the observed bounds
    pub fn nudge_range(&mut self, start_days: i64, end_days: i64) {
        let Some(bounds) = self.filter.bounds() else {
            return;
        };
        let current = self.filter.range().unwrap_or(bounds);
        let clamp = |d: NaiveDate| d.clamp(bounds.start, bounds.end);
        let start = clamp(current.start + chrono::Duration::days(start_days));
        let end = clamp(current.end + chrono::Duration::days(end_days));
        self.dispatch(Action::SetRange(start, end));
    }

    /// Move a dropdown to the next option, wrapping through "all"
    pub fn cycle_dropdown(&mut self, dropdown: Dropdown) {
        let options = self.dataset.options(dropdown);
        let next = match self.filter.dropdown(dropdown) {
            None => options.first().cloned(),
            Some(current) => options
                .iter()
                .position(|o| o == current)
                .and_then(|i| options.get(i + 1))
                .cloned(),
        };
        self.dispatch(Action::SetDropdown(dropdown, next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_bytes;

    const CSV: &str = "\
model,stage,result,test_item,fail_time,error_message
A,FT,FAIL,T1,2026-01-04 08:00:00,E1
A,FT,FAIL,T1,2026-01-05 08:00:00,E1
B,FT,PASS,T2,2026-01-06 08:00:00,E2
B,ST,FAIL,T3,garbage,E3
";

    fn dashboard() -> Dashboard {
        Dashboard::new(load_bytes(CSV.as_bytes()).unwrap(), ViewLimits::default())
    }

    #[test]
    fn test_refresh_default() {
        let dash = dashboard();
        let view = dash.refresh();
        assert_eq!(view.total_records, 4);
        assert_eq!(view.filtered_records, 4);
        assert!(view.active_filters.is_empty());
        assert_eq!(view.charts.hierarchy.values[0], 4);
        assert_eq!(view.charts.timeline.len(), 3);
    }

    #[test]
    fn test_click_round_trip() {
        let mut dash = dashboard();
        let view = dash.refresh();
        let first_error = view.charts.top_errors.labels[0].clone();
        dash.dispatch(Action::Click(ChartEvent::ErrorBar { y: first_error }));
        assert_eq!(dash.refresh().filtered_records, 2);

        // Drill into model B: the error selection is replaced
        dash.dispatch(Action::Click(ChartEvent::SunburstNode { id: "B".into() }));
        let view = dash.refresh();
        assert_eq!(view.filtered_records, 2);
        assert_eq!(view.active_filters, vec!["Model: B"]);

        dash.dispatch(Action::ClearClicks);
        assert_eq!(dash.refresh().filtered_records, 4);
    }

    #[test]
    fn test_install_resets_everything() {
        let mut dash = dashboard();
        dash.dispatch(Action::SetDropdown(Dropdown::Model, Some("A".into())));
        dash.dispatch(Action::Click(ChartEvent::TimelinePoint {
            x: "2026-01-05".into(),
        }));
        assert_eq!(dash.refresh().filtered_records, 1);

        let replacement = load_bytes(b"model,error_message\nC,boom\n").unwrap();
        dash.install(replacement);
        assert!(dash.filter().is_default());
        assert_eq!(dash.filter().bounds(), None);
        assert_eq!(dash.refresh().filtered_records, 1);
    }

    #[test]
    fn test_nudge_range_clamps() {
        let mut dash = dashboard();
        dash.nudge_range(1, 0);
        let range = dash.filter().range().unwrap();
        assert_eq!(range.start, NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        // The undated record drops out once the range is narrowed
        assert_eq!(dash.refresh().filtered_records, 2);

        dash.nudge_range(-10, 10);
        assert_eq!(dash.filter().range(), dash.filter().bounds());
        assert_eq!(dash.refresh().filtered_records, 4);
    }

    #[test]
    fn test_cycle_dropdown_wraps_to_all() {
        let mut dash = dashboard();
        dash.cycle_dropdown(Dropdown::Model);
        assert_eq!(dash.filter().dropdown(Dropdown::Model), Some("A"));
        dash.cycle_dropdown(Dropdown::Model);
        assert_eq!(dash.filter().dropdown(Dropdown::Model), Some("B"));
        dash.cycle_dropdown(Dropdown::Model);
        assert_eq!(dash.filter().dropdown(Dropdown::Model), None);
    }

    #[test]
    fn test_dropdown_on_missing_column_is_ignored() {
        let dataset = load_bytes(b"result,error_message\nFAIL,boom\nPASS,bang\n").unwrap();
        let mut dash = Dashboard::new(dataset, ViewLimits::default());
        dash.dispatch(Action::SetDropdown(Dropdown::Model, Some("A".into())));
        let view = dash.refresh();
        assert_eq!(view.filtered_records, 2);
        assert!(view.active_filters.is_empty());

        dash.dispatch(Action::SetDropdown(Dropdown::Result, Some("FAIL".into())));
        assert_eq!(dash.refresh().filtered_records, 1);
    }

    #[test]
    fn test_reset_all_keeps_dropdowns() {
        let mut dash = dashboard();
        dash.dispatch(Action::SetDropdown(Dropdown::Result, Some("FAIL".into())));
        dash.dispatch(Action::SetRangeEnd(NaiveDate::from_ymd_opt(2026, 1, 4).unwrap()));
        dash.dispatch(Action::Click(ChartEvent::TestItemBar { x: "T1".into() }));
        assert_eq!(dash.refresh().filtered_records, 1);

        dash.dispatch(Action::ResetAll);
        let view = dash.refresh();
        assert_eq!(view.filtered_records, 3);
        assert_eq!(view.active_filters, vec!["Result: FAIL"]);
    }
}
