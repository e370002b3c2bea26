// Aggregation - Count distributions and the model → test item → error tree
use crate::record::{Record, UNKNOWN};
use serde::Serialize;
use std::collections::HashMap;

/// Separator between components of a tree node id
pub const PATH_SEPARATOR: char = '\u{241E}';

/// Id of the synthetic root node
pub const ROOT_ID: &str = "";

/// A record field that can be grouped on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Model,
    Stage,
    Result,
    TestItem,
    AnalyzedError,
    Date,
}

impl Dimension {
    /// Grouping key of `record` for this dimension.
    ///
    /// Missing categorical values read as `Unknown`; a missing date has no key.
    pub fn key(&self, record: &Record) -> Option<String> {
        let value = match self {
            Self::Model => record.model(),
            Self::Stage => record.stage(),
            Self::Result => record.result(),
            Self::TestItem => record.test_item(),
            Self::AnalyzedError => Some(record.analyzed_error()),
            Self::Date => return record.date_key(),
        };
        Some(value.unwrap_or(UNKNOWN).to_string())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Model => "Model",
            Self::Stage => "Stage",
            Self::Result => "Result",
            Self::TestItem => "Test Item",
            Self::AnalyzedError => "Error",
            Self::Date => "Date",
        }
    }
}

/// Count records per key, largest first, ties in first-seen order.
///
/// Always the complete distribution; truncation belongs to the views.
pub fn aggregate<'a, I>(records: I, dimension: Dimension) -> Vec<(String, u64)>
where
    I: IntoIterator<Item = &'a Record>,
{
    count_keys(records.into_iter().filter_map(|r| dimension.key(r)))
}

fn count_keys<I: Iterator<Item = String>>(keys: I) -> Vec<(String, u64)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut counts: Vec<(String, u64)> = Vec::new();

    for key in keys {
        match index.get(&key) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(key.clone(), counts.len());
                counts.push((key, 1));
            }
        }
    }

    // Stable sort keeps first-seen order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Path of a node in the aggregation tree (up to three components)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TreePath {
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub error: Option<String>,
}

impl TreePath {
    /// Decode a node id; the root id decodes to the empty path
    pub fn parse(id: &str) -> Self {
        if id == ROOT_ID {
            return Self::default();
        }
        let mut parts = id.splitn(3, PATH_SEPARATOR).map(str::to_string);
        Self {
            primary: parts.next(),
            secondary: parts.next(),
            error: parts.next(),
        }
    }

    pub fn id(&self) -> String {
        join_path(
            [&self.primary, &self.secondary, &self.error]
                .into_iter()
                .map_while(|c| c.as_deref()),
        )
    }

    pub fn depth(&self) -> usize {
        [&self.primary, &self.secondary, &self.error]
            .into_iter()
            .take_while(|c| c.is_some())
            .count()
    }
}

fn join_path<'a, I: Iterator<Item = &'a str>>(components: I) -> String {
    let mut id = String::new();
    for (i, component) in components.enumerate() {
        if i > 0 {
            id.push(PATH_SEPARATOR);
        }
        id.push_str(component);
    }
    id
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeNode {
    pub id: String,
    pub label: String,
    pub count: u64,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn new(id: String, label: String) -> Self {
        Self {
            id,
            label,
            count: 0,
            children: Vec::new(),
        }
    }

    fn child_mut(&mut self, label: &str) -> &mut TreeNode {
        let pos = match self.children.iter().position(|c| c.label == label) {
            Some(pos) => pos,
            None => {
                let id = if self.id == ROOT_ID {
                    label.to_string()
                } else {
                    format!("{}{}{}", self.id, PATH_SEPARATOR, label)
                };
                self.children.push(TreeNode::new(id, label.to_string()));
                self.children.len() - 1
            }
        };
        &mut self.children[pos]
    }

    /// Recompute counts bottom-up from the leaves and order children
    fn roll_up(&mut self) -> u64 {
        if !self.children.is_empty() {
            self.count = self.children.iter_mut().map(TreeNode::roll_up).sum();
            self.children.sort_by(|a, b| b.count.cmp(&a.count));
        }
        self.count
    }

    pub fn depth(&self) -> usize {
        TreePath::parse(&self.id).depth()
    }
}

/// Three-level count hierarchy under a synthetic root
#[derive(Debug, Clone, Serialize)]
pub struct AggregationTree {
    pub levels: [Dimension; 3],
    pub root: TreeNode,
}

impl AggregationTree {
    /// Depth-first walk, root first
    pub fn nodes(&self) -> Vec<&TreeNode> {
        let mut out = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }
}

pub const DEFAULT_LEVELS: [Dimension; 3] =
    [Dimension::Model, Dimension::TestItem, Dimension::AnalyzedError];

/// Build the hierarchy from scratch; parent counts are strict roll-ups
pub fn build_tree<'a, I>(records: I, levels: [Dimension; 3]) -> AggregationTree
where
    I: IntoIterator<Item = &'a Record>,
{
    let mut root = TreeNode::new(ROOT_ID.to_string(), "All".to_string());

    for record in records {
        let mut node = &mut root;
        for level in &levels {
            let key = level.key(record).unwrap_or_else(|| UNKNOWN.to_string());
            node = node.child_mut(&key);
        }
        node.count += 1;
    }

    root.roll_up();
    AggregationTree { levels, root }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RawFields;
    use chrono::NaiveDate;

    fn record(model: &str, test_item: &str, error: &str) -> Record {
        Record::from_fields(RawFields {
            model: Some(model.to_string()),
            test_item: Some(test_item.to_string()),
            error_message: Some(error.to_string()),
            ..Default::default()
        })
    }

    fn sample() -> Vec<Record> {
        vec![
            record("A", "T1", "E1"),
            record("A", "T1", "E1"),
            record("B", "T2", "E2"),
        ]
    }

    fn find<'t>(tree: &'t AggregationTree, id: &str) -> Option<&'t TreeNode> {
        let path = TreePath::parse(id);
        let mut node = &tree.root;
        for component in [&path.primary, &path.secondary, &path.error]
            .into_iter()
            .map_while(|c| c.as_deref())
        {
            node = node.children.iter().find(|c| c.label == component)?;
        }
        Some(node)
    }

    fn assert_rolled_up(node: &TreeNode) {
        if !node.children.is_empty() {
            let sum: u64 = node.children.iter().map(|c| c.count).sum();
            assert_eq!(node.count, sum, "node {:?}", node.id);
            node.children.iter().for_each(assert_rolled_up);
        }
    }

    #[test]
    fn test_flat_and_tree_example() {
        let records = sample();
        assert_eq!(
            aggregate(&records, Dimension::AnalyzedError),
            vec![("E1".to_string(), 2), ("E2".to_string(), 1)]
        );

        let tree = build_tree(&records, DEFAULT_LEVELS);
        assert_eq!(tree.root.count, 3);
        assert_eq!(find(&tree, "A").map(|n| n.count), Some(2));
        assert_eq!(find(&tree, "B\u{241E}T2\u{241E}E2").map(|n| n.count), Some(1));
        assert_rolled_up(&tree.root);
    }

    #[test]
    fn test_tie_order_is_first_seen() {
        let records = vec![
            record("A", "T3", "x"),
            record("A", "T1", "x"),
            record("A", "T2", "x"),
            record("A", "T1", "x"),
            record("A", "T2", "x"),
        ];
        let counts = aggregate(&records, Dimension::TestItem);
        let keys: Vec<_> = counts.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["T1", "T2", "T3"]);
        assert_eq!(aggregate(&records, Dimension::TestItem), counts);
    }

    #[test]
    fn test_missing_keys() {
        let mut records = sample();
        records.push(Record::from_fields(RawFields::default()));
        let models = aggregate(&records, Dimension::Model);
        assert!(models.contains(&(UNKNOWN.to_string(), 1)));

        // Null dates are excluded from the date distribution only
        assert!(aggregate(&records, Dimension::Date).is_empty());
        let results: u64 = aggregate(&records, Dimension::Result)
            .iter()
            .map(|(_, c)| c)
            .sum();
        assert_eq!(results, 4);

        let tree = build_tree(&records, DEFAULT_LEVELS);
        assert_eq!(tree.root.count, 4);
        assert!(find(&tree, "Unknown\u{241E}Unknown\u{241E}Unknown").is_some());
    }

    #[test]
    fn test_leaf_sum_equals_record_count() {
        let mut records = Vec::new();
        for i in 0..40 {
            records.push(record(
                ["A", "B", "C"][i % 3],
                ["T1", "T2"][i % 2],
                ["E1", "E2", "E3", "E4"][i % 4],
            ));
        }
        let tree = build_tree(&records, DEFAULT_LEVELS);
        let leaves: u64 = tree
            .nodes()
            .iter()
            .filter(|n| n.children.is_empty())
            .map(|n| n.count)
            .sum();
        assert_eq!(leaves, records.len() as u64);
        assert_rolled_up(&tree.root);
    }

    #[test]
    fn test_date_distribution() {
        let day = |d: u32| NaiveDate::from_ymd_opt(2026, 1, d).and_then(|d| d.and_hms_opt(8, 0, 0));
        let records: Vec<Record> = [day(5), day(4), day(5), None]
            .into_iter()
            .map(|fail_time| {
                Record::from_fields(RawFields {
                    fail_time,
                    ..Default::default()
                })
            })
            .collect();
        assert_eq!(
            aggregate(&records, Dimension::Date),
            vec![("2026-01-05".to_string(), 2), ("2026-01-04".to_string(), 1)]
        );
    }

    #[test]
    fn test_tree_path_round_trip() {
        let path = TreePath::parse("A\u{241E}T1");
        assert_eq!(path.primary.as_deref(), Some("A"));
        assert_eq!(path.secondary.as_deref(), Some("T1"));
        assert_eq!(path.error, None);
        assert_eq!(path.depth(), 2);
        assert_eq!(path.id(), "A\u{241E}T1");

        let root = TreePath::parse(ROOT_ID);
        assert_eq!(root, TreePath::default());
        assert_eq!(root.id(), ROOT_ID);
    }

    #[test]
    fn test_nodes_walk_root_first() {
        let tree = build_tree(&sample(), DEFAULT_LEVELS);
        let ids: Vec<_> = tree.nodes().iter().map(|n| n.id.clone()).collect();
        assert_eq!(ids[0], ROOT_ID);
        assert_eq!(ids[1], "A");
        assert_eq!(ids.len(), 1 + 2 + 2 + 2);
    }
}
