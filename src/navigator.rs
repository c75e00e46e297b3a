//! Keyboard navigation over a run's flattened timeline.
//!
//! The navigator owns the tree and walks it in pre-order on demand instead of
//! caching borrowed rows; timelines are a few hundred records at most. Selection is
//! always a valid row index when there are rows. The viewport `[top, top + height)`
//! follows the selection with the smallest shift that keeps it visible, never
//! re-centering.

use crate::timeline::{preorder, FlatRow, RecordState, RecordType, TreeNode};

#[derive(Debug, Default)]
pub struct DetailNavigator {
    tree: Vec<TreeNode>,
    len: usize,
    selected: usize,
    top: usize,
    width: u16,
    height: u16,
}

impl DetailNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Body size in cells. Height drives paging and the follow rule.
    pub fn set_size(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        self.follow_selection();
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    /// Swap in a freshly built tree. Selection and viewport are re-clamped, so a
    /// refresh of the same run keeps the operator roughly where they were.
    pub fn set_timeline(&mut self, tree: Vec<TreeNode>) {
        self.len = preorder(&tree).count();
        self.tree = tree;
        self.selected = self.selected.min(self.len.saturating_sub(1));
        self.top = self.top.min(self.len.saturating_sub(self.page()));
        self.follow_selection();
    }

    pub fn clear(&mut self) {
        self.tree.clear();
        self.len = 0;
        self.selected = 0;
        self.top = 0;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn top(&self) -> usize {
        self.top
    }

    /// Rows per page; an unsized viewport still moves one row at a time.
    fn page(&self) -> usize {
        usize::from(self.height).max(1)
    }

    pub fn move_down(&mut self) {
        self.select(self.selected.saturating_add(1));
    }

    pub fn move_up(&mut self) {
        self.select(self.selected.saturating_sub(1));
    }

    pub fn page_down(&mut self) {
        self.select(self.selected.saturating_add(self.page()));
    }

    pub fn page_up(&mut self) {
        self.select(self.selected.saturating_sub(self.page()));
    }

    pub fn select_first(&mut self) {
        self.select(0);
    }

    pub fn select_last(&mut self) {
        self.select(self.len.saturating_sub(1));
    }

    fn select(&mut self, index: usize) {
        if self.len == 0 {
            return;
        }
        self.selected = index.min(self.len - 1);
        self.follow_selection();
    }

    fn follow_selection(&mut self) {
        let page = self.page();
        if self.selected < self.top {
            self.top = self.selected;
        } else if self.selected >= self.top + page {
            self.top = self.selected + 1 - page;
        }
    }

    pub fn selected_item(&self) -> Option<FlatRow<'_>> {
        if self.len == 0 {
            return None;
        }
        debug_assert!(self.selected < self.len, "selection {} outside {} rows", self.selected, self.len);
        preorder(&self.tree).nth(self.selected)
    }

    pub fn can_view_logs(&self) -> bool {
        self.selected_item()
            .is_some_and(|row| row.record().log.is_some())
    }

    /// Hint for a selection that has no log; `None` when logs are available or
    /// nothing is selected.
    pub fn status_message(&self) -> Option<String> {
        let row = self.selected_item()?;
        let record = row.record();
        if record.log.is_some() {
            return None;
        }
        let msg = match (record.record_type, record.state) {
            (RecordType::Task, RecordState::Pending | RecordState::InProgress) => {
                format!("No log for \"{}\" yet", record.name)
            }
            (RecordType::Task, _) => format!("\"{}\" produced no log", record.name),
            (kind, _) if !row.node.children.is_empty() => format!(
                "{} \"{}\" has no log of its own, select one of its steps",
                kind.label(),
                record.name
            ),
            (kind, _) => format!("{} \"{}\" has no log", kind.label(), record.name),
        };
        Some(msg)
    }

    /// Selection position as 0..=100. A single row counts as 0.
    pub fn scroll_percent(&self) -> f64 {
        if self.len <= 1 {
            return 0.0;
        }
        self.selected as f64 * 100.0 / (self.len - 1) as f64
    }

    /// Rows inside the viewport, for rendering.
    pub fn visible_rows(&self) -> Vec<FlatRow<'_>> {
        preorder(&self.tree)
            .skip(self.top)
            .take(self.page())
            .collect()
    }
}
