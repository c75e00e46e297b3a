//! Timeline records and tree reconstruction.
//!
//! Azure Pipelines reports a run's execution as a flat list of records, each
//! pointing at its parent by id. [`build_tree`] turns that list into an ordered
//! forest and [`preorder`] walks it back out as indented rows for the navigator.
//!
//! The server's list is not trusted to be well formed: a record whose parent id is
//! unknown becomes a root, and records that only reach each other through a parent
//! cycle are promoted to roots one at a time. Every input record ends up in exactly
//! one node.

use crate::app::{format_duration, UNKNOWN_DURATION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum RecordType {
    Stage,
    Phase,
    Job,
    Task,
    Checkpoint,
    #[serde(other)]
    Other,
}

impl RecordType {
    pub fn label(self) -> &'static str {
        match self {
            RecordType::Stage => "Stage",
            RecordType::Phase => "Phase",
            RecordType::Job => "Job",
            RecordType::Task => "Task",
            RecordType::Checkpoint => "Checkpoint",
            RecordType::Other => "Record",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordState {
    Pending,
    InProgress,
    Completed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RecordResult {
    Succeeded,
    SucceededWithIssues,
    Failed,
    Canceled,
    Skipped,
    Abandoned,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LogReference {
    pub id: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineRecord {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub name: String,
    pub state: RecordState,
    #[serde(default)]
    pub result: Option<RecordResult>,
    /// Position among siblings. The service sends `null` for some checkpoint records.
    #[serde(default, deserialize_with = "null_order_as_zero")]
    pub order: i32,
    #[serde(default)]
    pub log: Option<LogReference>,
    #[serde(default)]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub finish_time: Option<DateTime<Utc>>,
}

fn null_order_as_zero<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<i32>::deserialize(deserializer)?.unwrap_or(0))
}

/// Display category for a record's status glyph. The renderer picks glyph and color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconKind {
    Succeeded,
    Warning,
    Failed,
    Canceled,
    Skipped,
    Running,
    Pending,
    Unknown,
}

impl TimelineRecord {
    pub fn log_id(&self) -> Option<u64> {
        self.log.map(|l| l.id)
    }

    pub fn icon_kind(&self) -> IconKind {
        match (self.state, self.result) {
            (RecordState::Completed, Some(RecordResult::Succeeded)) => IconKind::Succeeded,
            (_, Some(RecordResult::SucceededWithIssues)) => IconKind::Warning,
            (_, Some(RecordResult::Failed)) => IconKind::Failed,
            (_, Some(RecordResult::Canceled | RecordResult::Abandoned)) => IconKind::Canceled,
            (_, Some(RecordResult::Skipped)) => IconKind::Skipped,
            (RecordState::InProgress, _) => IconKind::Running,
            (RecordState::Pending, _) => IconKind::Pending,
            _ => IconKind::Unknown,
        }
    }

    /// `finish - start` as `MmSSs` / `Ss`, or [`UNKNOWN_DURATION`] when either end is missing.
    pub fn duration(&self) -> String {
        match (self.start_time, self.finish_time) {
            (Some(start), Some(finish)) if finish >= start => {
                format_duration(finish.signed_duration_since(start).num_seconds())
            }
            _ => UNKNOWN_DURATION.to_string(),
        }
    }
}

/// One record plus its children, sorted by `order`.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode {
    pub record: TimelineRecord,
    pub children: Vec<TreeNode>,
}

// Dropping a deep chain field by field would recurse once per level.
impl Drop for TreeNode {
    fn drop(&mut self) {
        let mut doomed = std::mem::take(&mut self.children);
        while let Some(mut node) = doomed.pop() {
            doomed.append(&mut node.children);
        }
    }
}

/// A node seen through pre-order flattening. Borrowed from the tree it came from.
#[derive(Debug, Clone, Copy)]
pub struct FlatRow<'a> {
    pub node: &'a TreeNode,
    pub depth: usize,
}

impl<'a> FlatRow<'a> {
    pub fn record(&self) -> &'a TimelineRecord {
        &self.node.record
    }
}

/// Rebuild the record hierarchy. Never fails; see the module docs for how
/// dangling parents and cycles are handled.
pub fn build_tree(records: Vec<TimelineRecord>) -> Vec<TreeNode> {
    let known: HashSet<String> = records.iter().map(|r| r.id.clone()).collect();
    let mut roots = Vec::new();
    let mut groups: HashMap<String, Vec<TimelineRecord>> = HashMap::new();

    for record in records {
        match record.parent_id.as_deref() {
            Some(parent) if known.contains(parent) => {
                groups.entry(parent.to_string()).or_default().push(record);
            }
            Some(parent) => {
                tracing::warn!(
                    record = %record.id,
                    parent,
                    "timeline record references unknown parent, treating it as a root"
                );
                roots.push(record);
            }
            None => roots.push(record),
        }
    }

    for group in groups.values_mut() {
        group.sort_by_key(|r| r.order);
    }
    roots.sort_by_key(|r| r.order);

    let mut tree: Vec<TreeNode> = roots
        .into_iter()
        .map(|record| attach(record, &mut groups))
        .collect();

    // Anything still grouped is unreachable from a root: its parent chain loops.
    if !groups.is_empty() {
        while let Some(record) = take_lowest_order(&mut groups) {
            tracing::warn!(record = %record.id, "timeline parent cycle, promoting record to root");
            tree.push(attach(record, &mut groups));
        }
        tree.sort_by_key(|n| n.record.order);
    }

    tree
}

/// Children still to be attached under `record`, plus the ones already built.
struct Pending {
    record: TimelineRecord,
    queue: std::vec::IntoIter<TimelineRecord>,
    children: Vec<TreeNode>,
}

impl Pending {
    fn open(record: TimelineRecord, groups: &mut HashMap<String, Vec<TimelineRecord>>) -> Self {
        let queue = groups.remove(&record.id).unwrap_or_default().into_iter();
        Self {
            record,
            queue,
            children: Vec::new(),
        }
    }

    fn close(self) -> TreeNode {
        TreeNode {
            record: self.record,
            children: self.children,
        }
    }
}

/// Builds the subtree under `record` with an explicit stack, so a long parent
/// chain costs heap rather than call depth. Each group is removed as it is
/// opened, so a record is placed at most once.
fn attach(record: TimelineRecord, groups: &mut HashMap<String, Vec<TimelineRecord>>) -> TreeNode {
    let mut current = Pending::open(record, groups);
    let mut ancestors: Vec<Pending> = Vec::new();
    loop {
        if let Some(child) = current.queue.next() {
            let next = Pending::open(child, groups);
            ancestors.push(std::mem::replace(&mut current, next));
            continue;
        }
        let node = current.close();
        match ancestors.pop() {
            Some(mut parent) => {
                parent.children.push(node);
                current = parent;
            }
            None => return node,
        }
    }
}

fn take_lowest_order(groups: &mut HashMap<String, Vec<TimelineRecord>>) -> Option<TimelineRecord> {
    let (key, idx) = groups
        .iter()
        .flat_map(|(key, group)| group.iter().enumerate().map(move |(i, r)| (key, i, r)))
        .min_by(|a, b| a.2.order.cmp(&b.2.order).then_with(|| a.2.id.cmp(&b.2.id)))
        .map(|(key, i, _)| (key.clone(), i))?;
    let group = groups.get_mut(&key)?;
    let record = group.remove(idx);
    if group.is_empty() {
        groups.remove(&key);
    }
    Some(record)
}

/// Pre-order walk: each node is followed by its whole subtree before any sibling.
pub struct Preorder<'a> {
    stack: Vec<(&'a TreeNode, usize)>,
}

pub fn preorder(tree: &[TreeNode]) -> Preorder<'_> {
    Preorder {
        stack: tree.iter().rev().map(|n| (n, 0)).collect(),
    }
}

impl<'a> Iterator for Preorder<'a> {
    type Item = FlatRow<'a>;

    fn next(&mut self) -> Option<FlatRow<'a>> {
        let (node, depth) = self.stack.pop()?;
        self.stack
            .extend(node.children.iter().rev().map(|c| (c, depth + 1)));
        Some(FlatRow { node, depth })
    }
}

pub fn flatten(tree: &[TreeNode]) -> Vec<FlatRow<'_>> {
    preorder(tree).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(id: &str, parent: Option<&str>, record_type: RecordType, order: i32) -> TimelineRecord {
        TimelineRecord {
            id: id.to_string(),
            parent_id: parent.map(str::to_string),
            record_type,
            name: id.to_uppercase(),
            state: RecordState::Completed,
            result: Some(RecordResult::Succeeded),
            order,
            log: None,
            start_time: None,
            finish_time: None,
        }
    }

    fn ids_and_depths(tree: &[TreeNode]) -> Vec<(String, usize)> {
        flatten(tree)
            .iter()
            .map(|row| (row.record().id.clone(), row.depth))
            .collect()
    }

    fn pairs(expected: &[(&str, usize)]) -> Vec<(String, usize)> {
        expected.iter().map(|(id, d)| ((*id).to_string(), *d)).collect()
    }

    #[test]
    fn stage_job_task_scenario() {
        let records = vec![
            record("s1", None, RecordType::Stage, 1),
            record("j1", Some("s1"), RecordType::Job, 1),
            record("t1", Some("j1"), RecordType::Task, 1),
            record("t2", Some("j1"), RecordType::Task, 2),
            record("s2", None, RecordType::Stage, 2),
        ];
        let tree = build_tree(records);
        assert_eq!(
            ids_and_depths(&tree),
            pairs(&[("s1", 0), ("j1", 1), ("t1", 2), ("t2", 2), ("s2", 0)])
        );
    }

    #[test]
    fn children_sorted_by_order_regardless_of_input_order() {
        let records = vec![
            record("t3", Some("j"), RecordType::Task, 3),
            record("t1", Some("j"), RecordType::Task, 1),
            record("j", None, RecordType::Job, 1),
            record("t2", Some("j"), RecordType::Task, 2),
        ];
        let tree = build_tree(records);
        assert_eq!(
            ids_and_depths(&tree),
            pairs(&[("j", 0), ("t1", 1), ("t2", 1), ("t3", 1)])
        );
    }

    #[test]
    fn roots_sorted_by_order() {
        let records = vec![
            record("late", None, RecordType::Stage, 9),
            record("early", None, RecordType::Stage, -1),
            record("mid", None, RecordType::Stage, 4),
        ];
        let tree = build_tree(records);
        let names: Vec<_> = tree.iter().map(|n| n.record.id.as_str()).collect();
        assert_eq!(names, vec!["early", "mid", "late"]);
    }

    #[test]
    fn equal_order_keeps_input_order() {
        let records = vec![
            record("b", None, RecordType::Task, 1),
            record("a", None, RecordType::Task, 1),
        ];
        let tree = build_tree(records);
        let names: Vec<_> = tree.iter().map(|n| n.record.id.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn unknown_parent_becomes_root() {
        let records = vec![
            record("s1", None, RecordType::Stage, 2),
            record("orphan", Some("missing"), RecordType::Job, 1),
        ];
        let tree = build_tree(records);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree[0].record.id, "orphan");
        assert!(tree[0].children.is_empty());
    }

    #[test]
    fn orphan_keeps_its_own_children() {
        let records = vec![
            record("orphan", Some("gone"), RecordType::Job, 1),
            record("t", Some("orphan"), RecordType::Task, 1),
        ];
        let tree = build_tree(records);
        assert_eq!(ids_and_depths(&tree), pairs(&[("orphan", 0), ("t", 1)]));
    }

    #[test]
    fn empty_input_builds_empty_tree() {
        assert!(build_tree(Vec::new()).is_empty());
        assert!(flatten(&[]).is_empty());
    }

    #[test]
    fn parent_cycle_keeps_every_record() {
        let records = vec![
            record("a", Some("b"), RecordType::Job, 2),
            record("b", Some("a"), RecordType::Job, 1),
            record("root", None, RecordType::Stage, 0),
        ];
        let tree = build_tree(records);
        // "b" has the lowest order among the cycle members, so it is promoted.
        assert_eq!(ids_and_depths(&tree), pairs(&[("root", 0), ("b", 0), ("a", 1)]));
    }

    #[test]
    fn self_parent_is_promoted() {
        let records = vec![record("loop", Some("loop"), RecordType::Task, 1)];
        let tree = build_tree(records);
        assert_eq!(ids_and_depths(&tree), pairs(&[("loop", 0)]));
    }

    #[test]
    fn deep_parent_chain_builds_and_drops() {
        const DEPTH: usize = 10_000;
        let records: Vec<TimelineRecord> = (0..DEPTH)
            .map(|i| {
                let parent = (i > 0).then(|| format!("r{}", i - 1));
                record(&format!("r{i}"), parent.as_deref(), RecordType::Task, 1)
            })
            .rev()
            .collect();
        let tree = build_tree(records);
        assert_eq!(tree.len(), 1);

        let rows = flatten(&tree);
        assert_eq!(rows.len(), DEPTH);
        assert_eq!(rows[DEPTH - 1].record().id, format!("r{}", DEPTH - 1));
        assert_eq!(rows[DEPTH - 1].depth, DEPTH - 1);
        drop(rows);
        drop(tree);
    }

    #[test]
    fn flatten_is_restartable() {
        let tree = build_tree(vec![
            record("s", None, RecordType::Stage, 1),
            record("j", Some("s"), RecordType::Job, 1),
        ]);
        assert_eq!(ids_and_depths(&tree), ids_and_depths(&tree));
        assert_eq!(preorder(&tree).count(), 2);
    }

    /// Deterministic pseudo-random forests: every record appears once, siblings are
    /// ordered, and each subtree is contiguous right after its root.
    #[test]
    fn generated_forests_flatten_to_a_permutation() {
        let mut seed: u64 = 0x5eed;
        let mut next = move |bound: u64| {
            seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            (seed >> 33) % bound
        };

        for case in 0..40 {
            let n = 1 + next(30) as usize;
            let mut records = Vec::new();
            for i in 0..n {
                let parent = match next(4) {
                    0 => None,
                    1 => Some(format!("ghost{case}")),
                    _ if i > 0 => Some(format!("r{}", next(i as u64))),
                    _ => None,
                };
                records.push(record(
                    &format!("r{i}"),
                    parent.as_deref(),
                    RecordType::Task,
                    next(5) as i32,
                ));
            }

            let tree = build_tree(records.clone());
            let rows = flatten(&tree);

            let mut seen: Vec<&str> = rows.iter().map(|r| r.record().id.as_str()).collect();
            let mut expected: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
            seen.sort_unstable();
            expected.sort_unstable();
            assert_eq!(seen, expected, "case {case}");

            check_sorted(&tree);
            for (i, row) in rows.iter().enumerate() {
                let size = preorder(std::slice::from_ref(row.node)).count();
                for later in &rows[i + 1..i + size] {
                    assert!(later.depth > row.depth, "case {case}: subtree not contiguous");
                }
            }
        }
    }

    fn check_sorted(nodes: &[TreeNode]) {
        for pair in nodes.windows(2) {
            assert!(pair[0].record.order <= pair[1].record.order);
        }
        for node in nodes {
            check_sorted(&node.children);
        }
    }

    #[test]
    fn duration_formats_minutes_and_seconds() {
        let mut r = record("t", None, RecordType::Task, 1);
        r.start_time = Some("2024-06-01T10:00:00Z".parse().unwrap());
        r.finish_time = Some("2024-06-01T10:02:05Z".parse().unwrap());
        assert_eq!(r.duration(), "2m05s");
        r.finish_time = Some("2024-06-01T10:00:42Z".parse().unwrap());
        assert_eq!(r.duration(), "42s");
    }

    #[test]
    fn duration_unknown_without_both_ends() {
        let mut r = record("t", None, RecordType::Task, 1);
        assert_eq!(r.duration(), UNKNOWN_DURATION);
        r.start_time = Some("2024-06-01T10:00:00Z".parse().unwrap());
        assert_eq!(r.duration(), UNKNOWN_DURATION);
        r.finish_time = Some("2024-06-01T09:59:00Z".parse().unwrap());
        assert_eq!(r.duration(), UNKNOWN_DURATION);
    }

    #[test]
    fn icon_kind_follows_state_and_result() {
        let mut r = record("t", None, RecordType::Task, 1);
        assert_eq!(r.icon_kind(), IconKind::Succeeded);
        r.result = Some(RecordResult::Failed);
        assert_eq!(r.icon_kind(), IconKind::Failed);
        r.result = Some(RecordResult::SucceededWithIssues);
        assert_eq!(r.icon_kind(), IconKind::Warning);
        r.result = Some(RecordResult::Abandoned);
        assert_eq!(r.icon_kind(), IconKind::Canceled);
        r.state = RecordState::InProgress;
        r.result = None;
        assert_eq!(r.icon_kind(), IconKind::Running);
        r.state = RecordState::Pending;
        assert_eq!(r.icon_kind(), IconKind::Pending);
    }

    #[test]
    fn deserialize_record_with_nulls() {
        let json = r#"{
            "id": "abc",
            "parentId": null,
            "type": "Checkpoint",
            "name": "Checkpoint",
            "state": "completed",
            "result": "succeeded",
            "order": null,
            "log": null,
            "startTime": null,
            "finishTime": null
        }"#;
        let r: TimelineRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.record_type, RecordType::Checkpoint);
        assert_eq!(r.order, 0);
        assert_eq!(r.log_id(), None);
    }

    #[test]
    fn deserialize_unknown_type_and_log() {
        let json = r#"{
            "id": "t1",
            "parentId": "j1",
            "type": "Gate",
            "name": "Approval",
            "state": "inProgress",
            "order": 3,
            "log": {"id": 17, "type": "Container", "url": "https://example/logs/17"}
        }"#;
        let r: TimelineRecord = serde_json::from_str(json).unwrap();
        assert_eq!(r.record_type, RecordType::Other);
        assert_eq!(r.state, RecordState::InProgress);
        assert_eq!(r.result, None);
        assert_eq!(r.log_id(), Some(17));
    }
}
