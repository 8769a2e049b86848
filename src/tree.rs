use indextree::Arena;
use tracing::debug;

use crate::errors::TreeError;
use crate::history::Snapshot;
use crate::model::{Node, NodeId};

/// Structural-change notification. Carries enough context for a renderer
/// to update incrementally without walking the whole document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEvent {
    Inserted {
        node: NodeId,
        parent: NodeId,
        index: usize,
    },
    Removed {
        node: NodeId,
        former_parent: NodeId,
        former_index: usize,
    },
    Moved {
        node: NodeId,
        from_parent: NodeId,
        from_index: usize,
        to_parent: NodeId,
        to_index: usize,
    },
    /// The subtree (whole document when `None`) should be treated as
    /// refreshed wholesale.
    StructureChanged { subtree_root: Option<NodeId> },
}

/// The mutable document: an arena of nodes plus the root handle.
///
/// All structural change goes through the operations here so that exactly
/// one notification fires per logical mutation. Detached subtrees stay in
/// the arena; undo/redo relinks them instead of ever rebuilding nodes, so
/// a `NodeId` stays valid for the lifetime of the tree.
pub struct Tree {
    arena: Arena<Node>,
    root: NodeId,
    events: Vec<TreeEvent>,
    captures: Vec<Snapshot>,
}

impl Tree {
    pub fn new(root: Node) -> Self {
        let mut arena = Arena::new();
        let root = arena.new_node(root);
        Self {
            arena,
            root,
            events: Vec::new(),
            captures: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Allocates a detached node. It joins the document through `insert`.
    pub fn new_node(&mut self, node: Node) -> NodeId {
        self.arena.new_node(node)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.arena.get(id).map(|n| n.get())
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.arena.get_mut(id).map(|n| n.get_mut())
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get(id).and_then(|n| n.parent())
    }

    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    pub fn child_count(&self, id: NodeId) -> usize {
        id.children(&self.arena).count()
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        parent.children(&self.arena).position(|c| c == id)
    }

    /// Root is depth 0. For a detached node, relative to its subtree root.
    pub fn depth(&self, id: NodeId) -> usize {
        id.ancestors(&self.arena).count() - 1
    }

    /// Preorder walk of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.descendants(&self.arena)
    }

    /// True when `id` is `root` itself or lies below it.
    pub fn in_subtree(&self, root: NodeId, id: NodeId) -> bool {
        id.ancestors(&self.arena).any(|a| a == root)
    }

    /// Deepest node that is an ancestor-or-self of both `a` and `b`.
    pub fn shared_ancestor(&self, a: NodeId, b: NodeId) -> Option<NodeId> {
        a.ancestors(&self.arena)
            .find(|&candidate| self.in_subtree(candidate, b))
    }

    pub fn count(&self) -> usize {
        self.arena.count()
    }

    /// Splices a detached node into `parent.children` at `index`.
    pub fn insert(&mut self, node: NodeId, parent: NodeId, index: usize) -> Result<(), TreeError> {
        if node == self.root {
            return Err(TreeError::InvalidOperation(
                "the root cannot be inserted".to_string(),
            ));
        }
        if self.get(node).is_none() {
            return Err(TreeError::InvalidOperation("unknown node".to_string()));
        }
        if self.parent(node).is_some() {
            return Err(TreeError::InvalidOperation(
                "node is already attached".to_string(),
            ));
        }
        self.check_destination(node, parent, index)?;

        self.link(node, parent, index);
        debug!(?node, ?parent, index, "node inserted");
        self.events.push(TreeEvent::Inserted {
            node,
            parent,
            index,
        });
        let capture = Snapshot::for_insert(self, node);
        self.captures.push(capture);
        Ok(())
    }

    /// Detaches `node` (with its subtree) from its parent. The subtree
    /// stays alive in the arena. Returns the former (parent, index).
    pub fn remove(&mut self, node: NodeId) -> Result<(NodeId, usize), TreeError> {
        if node == self.root {
            return Err(TreeError::InvalidOperation(
                "the root cannot be removed".to_string(),
            ));
        }
        let former_parent = self.parent(node).ok_or_else(|| {
            TreeError::InvalidOperation("node is not attached".to_string())
        })?;
        let former_index = former_parent
            .children(&self.arena)
            .position(|c| c == node)
            .ok_or_else(|| TreeError::InvalidOperation("node is not attached".to_string()))?;

        node.detach(&mut self.arena);
        debug!(?node, ?former_parent, former_index, "node removed");
        self.events.push(TreeEvent::Removed {
            node,
            former_parent,
            former_index,
        });
        let capture = Snapshot::for_remove(self, node, former_parent, former_index);
        self.captures.push(capture);
        Ok((former_parent, former_index))
    }

    /// Atomic remove + insert. Fires a single `Moved` notification so the
    /// operation reads as one edit downstream. `index` addresses the
    /// destination child list after the node has come out of it.
    pub fn reparent(
        &mut self,
        node: NodeId,
        new_parent: NodeId,
        index: usize,
    ) -> Result<(), TreeError> {
        if node == self.root {
            return Err(TreeError::InvalidOperation(
                "the root cannot be moved".to_string(),
            ));
        }
        let from_parent = self.parent(node).ok_or_else(|| {
            TreeError::InvalidOperation("node is not attached".to_string())
        })?;
        let from_index = from_parent
            .children(&self.arena)
            .position(|c| c == node)
            .ok_or_else(|| TreeError::InvalidOperation("node is not attached".to_string()))?;

        let mut capacity = self.child_count(new_parent);
        if from_parent == new_parent {
            capacity -= 1;
        }
        self.check_destination_with_capacity(node, new_parent, index, capacity)?;

        node.detach(&mut self.arena);
        self.link(node, new_parent, index);
        debug!(?node, ?from_parent, ?new_parent, index, "node moved");
        self.events.push(TreeEvent::Moved {
            node,
            from_parent,
            from_index,
            to_parent: new_parent,
            to_index: index,
        });
        let capture = Snapshot::for_move(self, node, from_parent, from_index);
        self.captures.push(capture);
        Ok(())
    }

    /// Signals that a subtree's structure should be re-read wholesale.
    pub fn reload(&mut self, subtree_root: Option<NodeId>) {
        self.events.push(TreeEvent::StructureChanged { subtree_root });
    }

    /// Hands out every notification fired since the last drain, in order.
    pub fn drain_events(&mut self) -> Vec<TreeEvent> {
        std::mem::take(&mut self.events)
    }

    /// Per-operation snapshots recorded alongside the notifications.
    /// Each structural operation captures its target the instant it runs,
    /// so index bookkeeping stays exact no matter how the batch shifts
    /// siblings afterwards. The coordinator drains these into an undo
    /// entry, or throws them away while replaying history.
    pub(crate) fn drain_captures(&mut self) -> Vec<Snapshot> {
        std::mem::take(&mut self.captures)
    }

    fn check_destination(
        &self,
        node: NodeId,
        parent: NodeId,
        index: usize,
    ) -> Result<(), TreeError> {
        self.check_destination_with_capacity(node, parent, index, self.child_count(parent))
    }

    fn check_destination_with_capacity(
        &self,
        node: NodeId,
        parent: NodeId,
        index: usize,
        capacity: usize,
    ) -> Result<(), TreeError> {
        let parent_node = self
            .get(parent)
            .ok_or_else(|| TreeError::InvalidOperation("unknown parent".to_string()))?;
        if !parent_node.allows_children {
            return Err(TreeError::InvalidOperation(
                "parent does not allow children".to_string(),
            ));
        }
        if index > capacity {
            return Err(TreeError::InvalidOperation(format!(
                "index {} out of range 0..={}",
                index, capacity
            )));
        }
        if self.in_subtree(node, parent) {
            return Err(TreeError::CycleDetected(node));
        }
        Ok(())
    }

    /// Structural link without validation or notification. Only history
    /// replay and clone staging use this; both re-create states that were
    /// valid when captured.
    pub(crate) fn link(&mut self, node: NodeId, parent: NodeId, index: usize) {
        let sibling = parent.children(&self.arena).nth(index);
        match sibling {
            Some(sibling) => sibling.insert_before(node, &mut self.arena),
            None => parent.append(node, &mut self.arena),
        }
    }

    /// Counterpart of `link`: detach without notification.
    pub(crate) fn unlink(&mut self, node: NodeId) {
        node.detach(&mut self.arena);
    }
}
