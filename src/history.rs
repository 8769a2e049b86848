use tracing::trace;

use crate::model::{NodeId, Value};
use crate::tree::Tree;

/// One node's structural + value state at a point in time.
///
/// `children` is captured by `NodeId`, never by clone. Restoring a state
/// relinks the same nodes, so replay never allocates and the cost of a
/// snapshot is proportional to the node's own child list, not the
/// document.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedState {
    pub parent: Option<NodeId>,
    pub index_in_parent: Option<usize>,
    pub allows_children: bool,
    pub value: Value,
    pub collapsed: bool,
    pub children: Vec<NodeId>,
}

impl CapturedState {
    pub fn of(tree: &Tree, target: NodeId) -> Self {
        let node = tree.get(target).expect("captured node must exist");
        Self {
            parent: tree.parent(target),
            index_in_parent: tree.index_in_parent(target),
            allows_children: node.allows_children,
            value: node.value.clone(),
            collapsed: node.collapsed,
            children: tree.children(target).collect(),
        }
    }

    fn apply(&self, tree: &mut Tree, target: NodeId) {
        tree.unlink(target);
        if let Some(node) = tree.get_mut(target) {
            node.allows_children = self.allows_children;
            node.value = self.value.clone();
            node.collapsed = self.collapsed;
        }

        let current: Vec<NodeId> = tree.children(target).collect();
        for child in current {
            tree.unlink(child);
        }
        for (index, &child) in self.children.iter().enumerate() {
            tree.unlink(child);
            tree.link(child, target, index);
        }

        if let Some(parent) = self.parent {
            let index = self.index_in_parent.unwrap_or(0);
            tree.link(target, parent, index.min(tree.child_count(parent)));
        }
    }
}

/// Before/after capture of a single node, the building block of an undo
/// entry. Created open (before only) and sealed once the edit has run.
#[derive(Debug, Clone)]
pub struct Snapshot {
    target: NodeId,
    before: CapturedState,
    after: Option<CapturedState>,
}

impl Snapshot {
    /// Opens a snapshot of the target's current state.
    pub fn capture(tree: &Tree, target: NodeId) -> Self {
        Self {
            target,
            before: CapturedState::of(tree, target),
            after: None,
        }
    }

    /// Records the post-edit state. Sealing twice keeps the first seal.
    pub fn seal(&mut self, tree: &Tree) {
        if self.after.is_none() {
            self.after = Some(CapturedState::of(tree, self.target));
        }
    }

    pub fn is_sealed(&self) -> bool {
        self.after.is_some()
    }

    pub fn target(&self) -> NodeId {
        self.target
    }

    /// Sealed snapshot for a node that was just attached: before = the
    /// same state minus the attachment.
    pub(crate) fn for_insert(tree: &Tree, node: NodeId) -> Self {
        let after = CapturedState::of(tree, node);
        let before = CapturedState {
            parent: None,
            index_in_parent: None,
            ..after.clone()
        };
        Self {
            target: node,
            before,
            after: Some(after),
        }
    }

    /// Sealed snapshot for a node that was just detached from
    /// (`former_parent`, `former_index`).
    pub(crate) fn for_remove(
        tree: &Tree,
        node: NodeId,
        former_parent: NodeId,
        former_index: usize,
    ) -> Self {
        let after = CapturedState::of(tree, node);
        let before = CapturedState {
            parent: Some(former_parent),
            index_in_parent: Some(former_index),
            ..after.clone()
        };
        Self {
            target: node,
            before,
            after: Some(after),
        }
    }

    /// Sealed snapshot for a node that was just moved away from
    /// (`from_parent`, `from_index`).
    pub(crate) fn for_move(
        tree: &Tree,
        node: NodeId,
        from_parent: NodeId,
        from_index: usize,
    ) -> Self {
        let after = CapturedState::of(tree, node);
        let before = CapturedState {
            parent: Some(from_parent),
            index_in_parent: Some(from_index),
            ..after.clone()
        };
        Self {
            target: node,
            before,
            after: Some(after),
        }
    }

    fn undo(&self, tree: &mut Tree) {
        trace!(target = ?self.target, "snapshot undo");
        self.before.apply(tree, self.target);
    }

    fn redo(&self, tree: &mut Tree) {
        if let Some(after) = &self.after {
            trace!(target = ?self.target, "snapshot redo");
            after.apply(tree, self.target);
        }
    }
}

/// One undoable unit: the snapshots of every node a logical operation
/// touched, in operation order, plus the selection on both sides. The
/// label is presentation metadata only.
#[derive(Debug, Clone)]
pub struct StateEdit {
    label: String,
    snapshots: Vec<Snapshot>,
    selection_before: Vec<NodeId>,
    selection_after: Vec<NodeId>,
}

impl StateEdit {
    pub fn begin(label: impl Into<String>, selection: Vec<NodeId>) -> Self {
        Self {
            label: label.into(),
            snapshots: Vec::new(),
            selection_before: selection.clone(),
            selection_after: selection,
        }
    }

    pub fn set_label(&mut self, label: impl Into<String>) {
        self.label = label.into();
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }

    /// Closes the edit with the selection as it stands afterwards.
    pub fn end(&mut self, selection: Vec<NodeId>) {
        self.selection_after = selection;
    }

    /// An edit that captured nothing and left the selection alone carries
    /// no information and is not worth a history slot.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty() && self.selection_before == self.selection_after
    }

    /// Re-applies every `before` in reverse operation order. Returns the
    /// selection to restore.
    pub fn undo(&self, tree: &mut Tree) -> Vec<NodeId> {
        for snapshot in self.snapshots.iter().rev() {
            snapshot.undo(tree);
        }
        self.selection_before.clone()
    }

    /// Re-applies every `after` in operation order.
    pub fn redo(&self, tree: &mut Tree) -> Vec<NodeId> {
        for snapshot in &self.snapshots {
            snapshot.redo(tree);
        }
        self.selection_after.clone()
    }
}

/// Linear undo/redo history with a cursor. Pushing while part-way through
/// the history discards the redoable tail; the history length is capped
/// and the oldest entry falls off first.
pub struct UndoManager {
    history: Vec<StateEdit>,
    cursor: usize,
    limit: usize,
}

impl UndoManager {
    pub fn new(limit: usize) -> Self {
        Self {
            history: Vec::new(),
            cursor: 0,
            limit: limit.max(1),
        }
    }

    pub fn push(&mut self, edit: StateEdit) {
        self.history.truncate(self.cursor);
        self.history.push(edit);
        self.cursor = self.history.len();

        if self.history.len() > self.limit {
            self.history.remove(0);
            self.cursor -= 1;
        }
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor < self.history.len()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.cursor
            .checked_sub(1)
            .and_then(|i| self.history.get(i))
            .map(|e| e.label())
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.history.get(self.cursor).map(|e| e.label())
    }

    /// Replays one step back. `None` at the bottom of the history.
    pub fn undo(&mut self, tree: &mut Tree) -> Option<Vec<NodeId>> {
        if self.cursor == 0 {
            return None;
        }
        self.cursor -= 1;
        Some(self.history[self.cursor].undo(tree))
    }

    /// Replays one step forward. `None` at the top of the history.
    pub fn redo(&mut self, tree: &mut Tree) -> Option<Vec<NodeId>> {
        if self.cursor == self.history.len() {
            return None;
        }
        let selection = self.history[self.cursor].redo(tree);
        self.cursor += 1;
        Some(selection)
    }
}
