use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::editor::{self, EditSession, Validator};
use crate::errors::{EditError, TransferError, TreeError};
use crate::history::{Snapshot, StateEdit, UndoManager};
use crate::model::{Node, NodeId, Value};
use crate::transfer::{self, Destination, TransferMode, TransferPayload};
use crate::tree::{Tree, TreeEvent};

const DEFAULT_MAX_UNDO: usize = 24;

const LABEL_ADDED: &str = "Node(s) added";
const LABEL_REMOVED: &str = "Node(s) removed";
const LABEL_MOVED: &str = "Node(s) moved";
const LABEL_EDITED: &str = "Edit node";
const LABEL_SELECTION: &str = "Change selection";
const LABEL_EXPANDED: &str = "Expand row(s)";
const LABEL_COLLAPSED: &str = "Collapse row(s)";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkbenchConfig {
    pub max_undo_steps: usize,
    /// When set (and no validator is installed), committing a blank
    /// value is rejected with `empty_value_text`.
    pub warn_on_empty_value: bool,
    pub empty_value_text: String,
}

impl Default for WorkbenchConfig {
    fn default() -> Self {
        Self {
            max_undo_steps: DEFAULT_MAX_UNDO,
            warn_on_empty_value: false,
            empty_value_text: "Value is blank. This may have unintended consequences.".to_string(),
        }
    }
}

struct Clipboard {
    payload: TransferPayload,
    mode: TransferMode,
}

/// The coordinator: owns the document, the undo history, the selection
/// and the open edit session, and turns every user-level operation into
/// exactly one undoable entry.
///
/// All mutation funnels through here. Tree notifications are drained
/// after each operation and re-exposed through `drain_events` for the
/// host renderer; the per-operation snapshots the tree records are
/// folded into a labelled `StateEdit` — unless the workbench is itself
/// replaying history, which is the re-entrancy guard that keeps undo
/// from feeding the history it is unwinding.
pub struct Workbench {
    tree: Tree,
    history: UndoManager,
    selection: Vec<NodeId>,
    edit: EditSession,
    validator: Option<Validator>,
    clipboard: Option<Clipboard>,
    config: WorkbenchConfig,
    replaying: bool,
    pending_events: Vec<TreeEvent>,
}

impl Workbench {
    pub fn new(tree: Tree, config: WorkbenchConfig) -> Self {
        let mut workbench = Self {
            history: UndoManager::new(config.max_undo_steps),
            tree,
            selection: Vec::new(),
            edit: EditSession::Idle,
            validator: None,
            clipboard: None,
            config,
            replaying: false,
            pending_events: Vec::new(),
        };
        // whatever happened while the host built the tree is the
        // baseline, not an undoable edit
        workbench.tree.drain_events();
        workbench.tree.drain_captures();
        workbench
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.tree.get(id)
    }

    pub fn config(&self) -> &WorkbenchConfig {
        &self.config
    }

    pub fn selection(&self) -> &[NodeId] {
        &self.selection
    }

    /// Installs the commit gate. `None` falls back to the configured
    /// blank-value policy.
    pub fn set_validator(&mut self, validator: Option<Validator>) {
        self.validator = validator;
    }

    /// Notifications accumulated since the last call, oldest first.
    pub fn drain_events(&mut self) -> Vec<TreeEvent> {
        std::mem::take(&mut self.pending_events)
    }

    // --- structural operations -------------------------------------

    /// Allocates `data` and splices it in as a child of `parent`.
    pub fn insert_new_node(
        &mut self,
        data: Node,
        parent: NodeId,
        index: usize,
    ) -> Result<NodeId, TreeError> {
        let selection_before = self.selection.clone();
        let node = self.tree.new_node(data);
        self.tree.insert(node, parent, index)?;
        self.finish_op(LABEL_ADDED, selection_before);
        Ok(node)
    }

    /// Moves an attached node to a new position.
    pub fn move_node(
        &mut self,
        node: NodeId,
        new_parent: NodeId,
        index: usize,
    ) -> Result<(), TreeError> {
        let selection_before = self.selection.clone();
        self.tree.reparent(node, new_parent, index)?;
        self.finish_op(LABEL_MOVED, selection_before);
        Ok(())
    }

    /// Removes every selected node. Refused outright when the selection
    /// is empty or includes the root.
    pub fn delete_selection(&mut self) -> Result<(), TreeError> {
        if self.selection.is_empty() {
            return Err(TreeError::InvalidOperation("selection is empty".to_string()));
        }
        if self.selection.contains(&self.tree.root()) {
            return Err(TreeError::InvalidOperation(
                "the root cannot be removed".to_string(),
            ));
        }
        let selection_before = self.selection.clone();
        for node in selection_before.clone() {
            let (former_parent, _) = self.tree.remove(node)?;
            self.tree.reload(Some(former_parent));
        }
        self.selection.clear();
        self.finish_op(LABEL_REMOVED, selection_before);
        Ok(())
    }

    /// Deep-copies every selected node into the selection's common
    /// ancestor, at the first selected node's position. Each copy lands
    /// at the same index, so the batch ends up in reverse selection
    /// order ahead of the first original.
    pub fn clone_selection(&mut self) -> Result<(), TreeError> {
        let first = *self
            .selection
            .first()
            .ok_or_else(|| TreeError::InvalidOperation("selection is empty".to_string()))?;
        let mut common = self.tree.parent(first).ok_or_else(|| {
            TreeError::InvalidOperation("the root cannot be cloned in place".to_string())
        })?;
        for &node in &self.selection[1..] {
            common = self
                .tree
                .shared_ancestor(common, node)
                .ok_or_else(|| TreeError::InvalidOperation("unknown node".to_string()))?;
        }
        let index = self
            .tree
            .children(common)
            .position(|c| c == first)
            .unwrap_or_else(|| self.tree.child_count(common));

        let selection_before = self.selection.clone();
        for node in selection_before.clone() {
            let copy = transfer::deep_clone(&mut self.tree, node);
            self.tree.insert(copy, common, index)?;
        }
        self.tree.reload(Some(common));
        self.finish_op(LABEL_ADDED, selection_before);
        Ok(())
    }

    // --- cut / copy / paste and drag-and-drop ----------------------

    /// Exports the selection to the internal clipboard. Originals stay
    /// where they are.
    pub fn copy_selection(&mut self) -> Result<(), TransferError> {
        let selection = self.selection.clone();
        let payload = transfer::export_selection(&mut self.tree, &selection)?;
        self.clipboard = Some(Clipboard {
            payload,
            mode: TransferMode::Copy,
        });
        Ok(())
    }

    /// Exports the selection with move semantics: the next paste
    /// completes the cut by removing the originals.
    pub fn cut_selection(&mut self) -> Result<(), TransferError> {
        let selection = self.selection.clone();
        let payload = transfer::export_selection(&mut self.tree, &selection)?;
        self.clipboard = Some(Clipboard {
            payload,
            mode: TransferMode::Move,
        });
        Ok(())
    }

    /// Imports the clipboard at the destination. A completed cut
    /// downgrades the clipboard to copy semantics, so pasting again
    /// duplicates instead of failing on the already-removed originals.
    pub fn paste(&mut self, destination: Destination) -> Result<(), TransferError> {
        let (payload, mode) = match &self.clipboard {
            Some(clipboard) => (clipboard.payload.clone(), clipboard.mode),
            None => {
                return Err(
                    TreeError::InvalidOperation("clipboard is empty".to_string()).into(),
                )
            }
        };
        let selection_before = self.selection.clone();
        transfer::import_payload(&mut self.tree, &payload, destination, mode)?;
        if mode == TransferMode::Move {
            if let Some(clipboard) = &mut self.clipboard {
                clipboard.mode = TransferMode::Copy;
            }
        }
        let label = match mode {
            TransferMode::Move => LABEL_MOVED,
            TransferMode::Copy => LABEL_ADDED,
        };
        self.finish_op(label, selection_before);
        Ok(())
    }

    /// One-shot drag of the current selection onto the destination.
    pub fn drag_and_drop(
        &mut self,
        destination: Destination,
        mode: TransferMode,
    ) -> Result<(), TransferError> {
        let selection_before = self.selection.clone();
        let payload = transfer::export_selection(&mut self.tree, &selection_before)?;
        transfer::import_payload(&mut self.tree, &payload, destination, mode)?;
        let label = match mode {
            TransferMode::Move => LABEL_MOVED,
            TransferMode::Copy => LABEL_ADDED,
        };
        self.finish_op(label, selection_before);
        Ok(())
    }

    // --- selection and expansion -----------------------------------

    pub fn set_selection(&mut self, rows: Vec<NodeId>) {
        if rows == self.selection {
            return;
        }
        if self.replaying {
            self.selection = rows;
            return;
        }
        let mut edit = StateEdit::begin(LABEL_SELECTION, self.selection.clone());
        self.selection = rows;
        edit.end(self.selection.clone());
        self.history.push(edit);
    }

    pub fn set_collapsed(&mut self, node: NodeId, collapsed: bool) -> Result<(), TreeError> {
        let current = self
            .tree
            .get(node)
            .ok_or_else(|| TreeError::InvalidOperation("unknown node".to_string()))?
            .collapsed;
        if current == collapsed {
            return Ok(());
        }

        let snapshot = if self.replaying {
            None
        } else {
            Some(Snapshot::capture(&self.tree, node))
        };
        if let Some(data) = self.tree.get_mut(node) {
            data.collapsed = collapsed;
        }
        self.tree.reload(Some(node));
        self.forward_events();

        if let Some(mut snapshot) = snapshot {
            snapshot.seal(&self.tree);
            let label = if collapsed {
                LABEL_COLLAPSED
            } else {
                LABEL_EXPANDED
            };
            let mut edit = StateEdit::begin(label, self.selection.clone());
            edit.push(snapshot);
            edit.end(self.selection.clone());
            self.history.push(edit);
        }
        Ok(())
    }

    // --- value edit session ----------------------------------------

    /// Opens an edit session on `node`, cancelling any session already
    /// open on another node.
    pub fn begin_edit(&mut self, node: NodeId) -> Result<(), TreeError> {
        if self.tree.get(node).is_none() {
            return Err(TreeError::InvalidOperation("unknown node".to_string()));
        }
        if self.edit.is_editing() {
            self.cancel_edit();
        }
        self.edit = EditSession::Editing {
            node,
            snapshot: Snapshot::capture(&self.tree, node),
        };
        Ok(())
    }

    pub fn editing_node(&self) -> Option<NodeId> {
        self.edit.node()
    }

    /// Validates and applies the proposed value, closing the session.
    /// A rejected value leaves the session open and the node untouched.
    pub fn commit_edit(&mut self, proposed: Value) -> Result<(), EditError> {
        let (node, snapshot) = match &self.edit {
            EditSession::Editing { node, snapshot } => (*node, snapshot.clone()),
            EditSession::Idle => return Err(EditError::NotEditing),
        };
        self.validate(&proposed)
            .map_err(EditError::ValidationRejected)?;

        if let Some(data) = self.tree.get_mut(node) {
            data.value = proposed;
        }
        self.tree.reload(Some(node));
        self.forward_events();

        if !self.replaying {
            let mut snapshot = snapshot;
            snapshot.seal(&self.tree);
            let mut edit = StateEdit::begin(LABEL_EDITED, self.selection.clone());
            edit.push(snapshot);
            edit.end(self.selection.clone());
            self.history.push(edit);
        }
        self.edit = EditSession::Idle;
        Ok(())
    }

    /// Commits raw editor text, coerced by the tag of the value being
    /// edited (boolean nodes stay boolean, blank input clears).
    pub fn commit_edit_text(&mut self, input: &str) -> Result<(), EditError> {
        let node = self.edit.node().ok_or(EditError::NotEditing)?;
        let current = self
            .tree
            .get(node)
            .map(|n| n.value.clone())
            .unwrap_or(Value::Empty);
        self.commit_edit(editor::coerce_input(&current, input))
    }

    /// Discards the open session. No mutation, nothing recorded.
    pub fn cancel_edit(&mut self) {
        self.edit = EditSession::Idle;
    }

    fn validate(&self, proposed: &Value) -> Result<(), String> {
        if let Some(validator) = &self.validator {
            return validator(proposed);
        }
        if self.config.warn_on_empty_value && proposed.is_blank() {
            return Err(self.config.empty_value_text.clone());
        }
        Ok(())
    }

    // --- undo / redo -----------------------------------------------

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn undo_label(&self) -> Option<&str> {
        self.history.undo_label()
    }

    pub fn redo_label(&self) -> Option<&str> {
        self.history.redo_label()
    }

    /// Steps the history back once. `false` at the bottom.
    pub fn undo(&mut self) -> bool {
        if !self.history.can_undo() {
            return false;
        }
        self.cancel_edit();
        debug!(label = ?self.history.undo_label(), "undo");
        self.replaying = true;
        if let Some(selection) = self.history.undo(&mut self.tree) {
            self.selection = selection;
        }
        self.tree.reload(None);
        self.forward_events();
        self.replaying = false;
        true
    }

    /// Steps the history forward once. `false` at the top.
    pub fn redo(&mut self) -> bool {
        if !self.history.can_redo() {
            return false;
        }
        self.cancel_edit();
        debug!(label = ?self.history.redo_label(), "redo");
        self.replaying = true;
        if let Some(selection) = self.history.redo(&mut self.tree) {
            self.selection = selection;
        }
        self.tree.reload(None);
        self.forward_events();
        self.replaying = false;
        true
    }

    /// Asks renderers to re-read the whole document. Never recorded.
    pub fn refresh(&mut self) {
        self.tree.reload(None);
        self.forward_events();
    }

    // --- plumbing ---------------------------------------------------

    /// Closes one logical operation: folds the tree's per-op snapshots
    /// into a labelled history entry (unless replaying) and forwards the
    /// notifications to the host queue.
    fn finish_op(&mut self, label: &str, selection_before: Vec<NodeId>) {
        let events = self.tree.drain_events();
        let captures = self.tree.drain_captures();
        if !self.replaying {
            let mut edit = StateEdit::begin(label, selection_before);
            for snapshot in captures {
                edit.push(snapshot);
            }
            edit.end(self.selection.clone());
            if !edit.is_empty() {
                debug!(label, "edit recorded");
                self.history.push(edit);
            }
        }
        self.pending_events.extend(events);
    }

    /// Forwards notifications without recording anything.
    fn forward_events(&mut self) {
        let events = self.tree.drain_events();
        self.tree.drain_captures();
        self.pending_events.extend(events);
    }
}
