// Linked filter state - One selection model shared by every view
use crate::aggregate::{Dimension, TreePath};
use crate::record::{Record, DATE_KEY_FORMAT};
use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

/// Dropdown value meaning "no restriction"
pub const ALL_VALUES: &str = "All";

/// Inclusive day range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Smallest range covering every dated record
    pub fn observed<'a, I>(records: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        records
            .into_iter()
            .filter_map(Record::date)
            .fold(None, |range: Option<Self>, date| match range {
                None => Some(Self::new(date, date)),
                Some(r) => Some(Self::new(r.start.min(date), r.end.max(date))),
            })
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} → {}",
            self.start.format(DATE_KEY_FORMAT),
            self.end.format(DATE_KEY_FORMAT)
        )
    }
}

/// Filters set from the control bar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dropdown {
    Model,
    Result,
    Stage,
}

impl Dropdown {
    pub const ALL: [Dropdown; 3] = [Dropdown::Model, Dropdown::Result, Dropdown::Stage];

    pub fn dimension(&self) -> Dimension {
        match self {
            Self::Model => Dimension::Model,
            Self::Result => Dimension::Result,
            Self::Stage => Dimension::Stage,
        }
    }
}

/// Filters set only by clicking a chart
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickDimension {
    Date,
    CategoryPrimary,
    CategorySecondary,
    CategoryError,
    Result,
}

impl ClickDimension {
    pub const ALL: [ClickDimension; 5] = [
        ClickDimension::Date,
        ClickDimension::CategoryPrimary,
        ClickDimension::CategorySecondary,
        ClickDimension::CategoryError,
        ClickDimension::Result,
    ];

    pub fn dimension(&self) -> Dimension {
        match self {
            Self::Date => Dimension::Date,
            Self::CategoryPrimary => Dimension::Model,
            Self::CategorySecondary => Dimension::TestItem,
            Self::CategoryError => Dimension::AnalyzedError,
            Self::Result => Dimension::Result,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Date => "Date",
            Self::CategoryPrimary => "Model",
            Self::CategorySecondary => "Test Item",
            Self::CategoryError => "Error",
            Self::Result => "Result",
        }
    }
}

/// The view a click came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClickSource {
    Timeline,
    TestItemBar,
    ErrorBar,
    ErrorPie,
    ResultPie,
    Hierarchy,
}

impl ClickSource {
    /// The single dimension a flat source sets; `None` for the hierarchy
    pub fn flat_dimension(&self) -> Option<ClickDimension> {
        match self {
            Self::Timeline => Some(ClickDimension::Date),
            Self::TestItemBar => Some(ClickDimension::CategorySecondary),
            Self::ErrorBar | Self::ErrorPie => Some(ClickDimension::CategoryError),
            Self::ResultPie => Some(ClickDimension::Result),
            Self::Hierarchy => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClickFilters {
    pub date: Option<String>,
    pub category_primary: Option<String>,
    pub category_secondary: Option<String>,
    pub category_error: Option<String>,
    pub result: Option<String>,
}

impl ClickFilters {
    fn slot(&mut self, dimension: ClickDimension) -> &mut Option<String> {
        match dimension {
            ClickDimension::Date => &mut self.date,
            ClickDimension::CategoryPrimary => &mut self.category_primary,
            ClickDimension::CategorySecondary => &mut self.category_secondary,
            ClickDimension::CategoryError => &mut self.category_error,
            ClickDimension::Result => &mut self.result,
        }
    }

    pub fn get(&self, dimension: ClickDimension) -> Option<&str> {
        match dimension {
            ClickDimension::Date => self.date.as_deref(),
            ClickDimension::CategoryPrimary => self.category_primary.as_deref(),
            ClickDimension::CategorySecondary => self.category_secondary.as_deref(),
            ClickDimension::CategoryError => self.category_error.as_deref(),
            ClickDimension::Result => self.result.as_deref(),
        }
    }

    pub fn is_empty(&self) -> bool {
        ClickDimension::ALL.iter().all(|d| self.get(*d).is_none())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FilterState {
    /// Full observed date range of the dataset
    bounds: Option<DateRange>,
    range: Option<DateRange>,
    model: Option<String>,
    result: Option<String>,
    stage: Option<String>,
    clicks: ClickFilters,
}

impl FilterState {
    /// Fresh state for a dataset spanning `bounds`
    pub fn new(bounds: Option<DateRange>) -> Self {
        Self {
            bounds,
            range: bounds,
            ..Default::default()
        }
    }

    pub fn bounds(&self) -> Option<DateRange> {
        self.bounds
    }

    pub fn range(&self) -> Option<DateRange> {
        self.range
    }

    /// A range narrower than the observed bounds filters out undated records
    pub fn range_is_active(&self) -> bool {
        self.range.is_some() && self.range != self.bounds
    }

    pub fn dropdown(&self, dropdown: Dropdown) -> Option<&str> {
        match dropdown {
            Dropdown::Model => self.model.as_deref(),
            Dropdown::Result => self.result.as_deref(),
            Dropdown::Stage => self.stage.as_deref(),
        }
    }

    pub fn set_range(&mut self, start: NaiveDate, end: NaiveDate) {
        debug!("Date range set to {} .. {}", start, end);
        self.range = Some(DateRange::new(start, end));
    }

    pub fn set_range_start(&mut self, start: NaiveDate) {
        let end = self.range.or(self.bounds).map_or(start, |r| r.end);
        self.set_range(start, end);
    }

    pub fn set_range_end(&mut self, end: NaiveDate) {
        let start = self.range.or(self.bounds).map_or(end, |r| r.start);
        self.set_range(start, end);
    }

    /// `None`, an empty string or the exact sentinel "All" select every value
    pub fn set_dropdown(&mut self, dropdown: Dropdown, value: Option<String>) {
        let value = value.filter(|v| !v.is_empty() && v != ALL_VALUES);
        debug!("Dropdown {:?} set to {:?}", dropdown, value);
        match dropdown {
            Dropdown::Model => self.model = value,
            Dropdown::Result => self.result = value,
            Dropdown::Stage => self.stage = value,
        }
    }

    /// Apply a decoded chart click.
    ///
    /// Flat sources replace exactly one click filter. A hierarchy click clears the
    /// three hierarchy filters, then sets the components present on the node path.
    pub fn click_point(&mut self, source: ClickSource, payload: &str) {
        debug!("Click from {:?}: {:?}", source, payload);
        match source.flat_dimension() {
            Some(dimension) => *self.clicks.slot(dimension) = Some(payload.to_string()),
            None => {
                let path = TreePath::parse(payload);
                self.clicks.category_primary = path.primary;
                self.clicks.category_secondary = path.secondary;
                self.clicks.category_error = path.error;
            }
        }
    }

    pub fn clear_filter(&mut self, dimension: ClickDimension) {
        *self.clicks.slot(dimension) = None;
    }

    pub fn clear_clicks(&mut self) {
        self.clicks = ClickFilters::default();
    }

    /// Clear chart selections and restore the full date range; dropdowns stay
    pub fn reset_all(&mut self) {
        self.clear_clicks();
        self.range = self.bounds;
    }

    /// Start over for a newly loaded dataset, dropdowns included
    pub fn reset_for_dataset(&mut self, bounds: Option<DateRange>) {
        *self = Self::new(bounds);
    }

    pub fn is_default(&self) -> bool {
        !self.range_is_active()
            && Dropdown::ALL.iter().all(|d| self.dropdown(*d).is_none())
            && self.clicks.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        if self.range_is_active() {
            match (self.range, record.date()) {
                (Some(range), Some(date)) if range.contains(date) => {}
                _ => return false,
            }
        }

        let dropdowns = Dropdown::ALL
            .iter()
            .map(|d| (d.dimension(), self.dropdown(*d)));
        let clicks = ClickDimension::ALL
            .iter()
            .map(|d| (d.dimension(), self.clicks.get(*d)));

        dropdowns.chain(clicks).all(|(dimension, wanted)| match wanted {
            None => true,
            Some(value) => dimension.key(record).as_deref() == Some(value),
        })
    }

    /// Records passing every active filter, in input order
    pub fn apply<'a, I>(&self, records: I) -> Vec<&'a Record>
    where
        I: IntoIterator<Item = &'a Record>,
    {
        records.into_iter().filter(|r| self.matches(r)).collect()
    }

    /// Human-readable list of the active filters
    pub fn describe(&self) -> Vec<String> {
        let mut parts = Vec::new();
        if self.range_is_active() {
            if let Some(range) = self.range {
                parts.push(format!("Range: {}", range));
            }
        }
        for dropdown in Dropdown::ALL {
            if let Some(value) = self.dropdown(dropdown) {
                parts.push(format!("{}: {}", dropdown.dimension().name(), value));
            }
        }
        for dimension in ClickDimension::ALL {
            if let Some(value) = self.clicks.get(dimension) {
                parts.push(format!("{}: {}", dimension.label(), value));
            }
        }
        parts
    }
}
