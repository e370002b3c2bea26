// View binder - Chart-ready series out, decoded chart clicks back in
use crate::aggregate::{self, AggregationTree, Dimension, ROOT_ID};
use crate::filter::ClickSource;
use crate::record::Record;
use serde::Serialize;

/// Label/value pairs for bar, line and pie charts
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Series {
    pub labels: Vec<String>,
    pub values: Vec<u64>,
    /// Optional per-point annotation (e.g. "12 (4.1%)")
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub texts: Vec<String>,
}

impl Series {
    fn from_counts(counts: &[(String, u64)]) -> Self {
        Self {
            labels: counts.iter().map(|(k, _)| k.clone()).collect(),
            values: counts.iter().map(|(_, v)| *v).collect(),
            texts: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn max(&self) -> u64 {
        self.values.iter().copied().max().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.values.iter().sum()
    }

    pub fn points(&self) -> impl Iterator<Item = (&str, u64)> {
        self.labels
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }
}

/// id/parent/value triples for a sunburst or treemap
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SunburstSeries {
    pub ids: Vec<String>,
    pub labels: Vec<String>,
    pub parents: Vec<String>,
    pub values: Vec<u64>,
    pub depths: Vec<usize>,
}

/// Limits applied at the view boundary
#[derive(Debug, Clone, Copy)]
pub struct ViewLimits {
    pub top_test_items: usize,
    pub top_errors: usize,
}

impl Default for ViewLimits {
    fn default() -> Self {
        Self {
            top_test_items: 15,
            top_errors: 10,
        }
    }
}

/// Every series the dashboard draws for one filtered record set
#[derive(Debug, Clone, Default, Serialize)]
pub struct Charts {
    pub total: u64,
    pub timeline: Series,
    pub test_items: Series,
    pub top_errors: Series,
    pub error_pie: Series,
    pub result_pie: Series,
    pub hierarchy: SunburstSeries,
}

impl Charts {
    pub fn build(records: &[&Record], limits: ViewLimits) -> Self {
        let total = records.len() as u64;
        let errors = aggregate::aggregate(records.iter().copied(), Dimension::AnalyzedError);
        let tree = aggregate::build_tree(records.iter().copied(), aggregate::DEFAULT_LEVELS);

        Self {
            total,
            timeline: timeline(&aggregate::aggregate(
                records.iter().copied(),
                Dimension::Date,
            )),
            test_items: top_n(
                &aggregate::aggregate(records.iter().copied(), Dimension::TestItem),
                limits.top_test_items,
            ),
            top_errors: with_percentages(top_n(&errors, limits.top_errors), total),
            error_pie: Series::from_counts(&errors),
            result_pie: Series::from_counts(&aggregate::aggregate(
                records.iter().copied(),
                Dimension::Result,
            )),
            hierarchy: sunburst(&tree),
        }
    }
}

/// Date buckets in chronological order
pub fn timeline(counts: &[(String, u64)]) -> Series {
    let mut sorted = counts.to_vec();
    // date keys are YYYY-MM-DD, so lexical order is chronological
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    Series::from_counts(&sorted)
}

/// The `n` largest buckets
pub fn top_n(counts: &[(String, u64)], n: usize) -> Series {
    Series::from_counts(&counts[..counts.len().min(n)])
}

/// Annotate each value with its share of `total`
pub fn with_percentages(mut series: Series, total: u64) -> Series {
    series.texts = series
        .values
        .iter()
        .map(|v| format!("{} ({:.1}%)", v, percent(*v, total)))
        .collect();
    series
}

pub fn percent(value: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        value as f64 / total as f64 * 100.0
    }
}

/// Flatten the tree root-first; the root carries the total count
pub fn sunburst(tree: &AggregationTree) -> SunburstSeries {
    let mut series = SunburstSeries::default();
    for node in tree.nodes() {
        let parent = if node.id == ROOT_ID {
            String::new()
        } else {
            let path = aggregate::TreePath::parse(&node.id);
            parent_id(&path)
        };
        series.ids.push(node.id.clone());
        series.labels.push(node.label.clone());
        series.parents.push(parent);
        series.values.push(node.count);
        series.depths.push(node.depth());
    }
    series
}

fn parent_id(path: &aggregate::TreePath) -> String {
    let mut parent = path.clone();
    if parent.error.is_some() {
        parent.error = None;
    } else if parent.secondary.is_some() {
        parent.secondary = None;
    } else {
        parent.primary = None;
    }
    parent.id()
}

/// Raw click payload, one variant per view
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChartEvent {
    /// Point on the trend line (x = date key)
    TimelinePoint { x: String },
    /// Vertical test-item bar (x = test item)
    TestItemBar { x: String },
    /// Horizontal top-errors bar (y = canonical error)
    ErrorBar { y: String },
    /// Slice of the error distribution pie
    ErrorSlice { label: String },
    /// Slice of the result pie
    ResultSlice { label: String },
    /// Sunburst node (id = delimiter-joined path, root = "")
    SunburstNode { id: String },
}

impl ChartEvent {
    /// Turn a raw chart event into the `(source, payload)` pair the filter consumes
    pub fn decode(self) -> (ClickSource, String) {
        match self {
            Self::TimelinePoint { x } => (ClickSource::Timeline, x),
            Self::TestItemBar { x } => (ClickSource::TestItemBar, x),
            Self::ErrorBar { y } => (ClickSource::ErrorBar, y),
            Self::ErrorSlice { label } => (ClickSource::ErrorPie, label),
            Self::ResultSlice { label } => (ClickSource::ResultPie, label),
            Self::SunburstNode { id } => (ClickSource::Hierarchy, id),
        }
    }
}
