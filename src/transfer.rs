use std::collections::HashSet;

use tracing::debug;

use crate::errors::{TransferError, TreeError};
use crate::model::NodeId;
use crate::tree::Tree;

/// Whether an import completes by removing the originals (drag-move, cut)
/// or leaves them in place (drag-copy, copy/paste).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    Copy,
    Move,
}

/// Where an import lands: `index` is the explicit gap for an
/// insert-between drop, `None` drops "onto" the parent and appends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    pub parent: NodeId,
    pub index: Option<usize>,
}

impl Destination {
    pub fn onto(parent: NodeId) -> Self {
        Self {
            parent,
            index: None,
        }
    }

    pub fn between(parent: NodeId, index: usize) -> Self {
        Self {
            parent,
            index: Some(index),
        }
    }
}

/// The product of an export: deep clones of the selected subtree roots,
/// plus the bookkeeping the import side needs. The clones live detached
/// in the tree's arena until an import links copies of them in.
#[derive(Debug, Clone)]
pub struct TransferPayload {
    /// Top-level clone roots, in classification order.
    pub clones: Vec<NodeId>,
    /// Original top-level nodes whose removal completes a move. Empty
    /// effect for copy imports.
    pub originals_to_remove: Vec<NodeId>,
    /// The original behind each top-level clone, for cycle checking.
    sources: Vec<NodeId>,
    /// The full selection at export time, for drop-target checking.
    selection: Vec<NodeId>,
}

impl TransferPayload {
    pub fn sources(&self) -> &[NodeId] {
        &self.sources
    }
}

/// Classifies a multi-node selection and deep-clones it.
///
/// The first selected node fixes the reference depth. Walking the rest in
/// selection order: nodes already covered by an earlier clone are
/// skipped; a node shallower than the reference stops the walk and
/// everything after it is discarded; a deeper node is grafted under the
/// first clone and its subtree marked covered; an equal-depth node
/// becomes a sibling top-level clone and a removal candidate. The
/// shallower-node truncation is long-standing observable behavior and is
/// kept as-is.
pub fn export_selection(
    tree: &mut Tree,
    selection: &[NodeId],
) -> Result<TransferPayload, TransferError> {
    let first = *selection.first().ok_or(TransferError::EmptySelection)?;
    let reference_depth = tree.depth(first);

    let mut clones = Vec::new();
    let mut sources = vec![first];
    let mut originals_to_remove = Vec::new();
    if tree.parent(first).is_some() {
        originals_to_remove.push(first);
    }

    let mut covered = HashSet::with_capacity(selection.len());
    let first_clone = clone_subtree(tree, first, &mut covered);
    clones.push(first_clone);

    for &next in &selection[1..] {
        if covered.contains(&next) {
            continue;
        }
        let depth = tree.depth(next);
        if depth < reference_depth {
            break;
        }
        if depth > reference_depth {
            // covered by nothing selected so far: graft under the first
            // clone rather than promoting it to a top-level entry
            let graft = clone_subtree(tree, next, &mut covered);
            let at = tree.child_count(first_clone);
            tree.link(graft, first_clone, at);
        } else {
            let clone = clone_subtree(tree, next, &mut covered);
            clones.push(clone);
            sources.push(next);
            originals_to_remove.push(next);
        }
    }

    debug!(
        clones = clones.len(),
        removals = originals_to_remove.len(),
        "selection exported"
    );
    Ok(TransferPayload {
        clones,
        originals_to_remove,
        sources,
        selection: selection.to_vec(),
    })
}

/// Inserts the payload at the destination, then completes a move by
/// removing the originals. All checks run before the first mutation;
/// on any error the tree is untouched.
pub fn import_payload(
    tree: &mut Tree,
    payload: &TransferPayload,
    destination: Destination,
    mode: TransferMode,
) -> Result<(), TransferError> {
    // A drop inside the subtree of a node being cloned would nest the
    // node under itself once the originals go away.
    for &source in &payload.sources {
        if tree.in_subtree(source, destination.parent) {
            return Err(TreeError::CycleDetected(source).into());
        }
    }
    // A drop on any selected row, or a descendant of one, is refused
    // outright even when it would not cycle.
    for &row in &payload.selection {
        if tree.in_subtree(row, destination.parent) {
            return Err(TreeError::InvalidOperation(
                "drop target is inside the dragged selection".to_string(),
            )
            .into());
        }
    }

    let parent_node = tree
        .get(destination.parent)
        .ok_or_else(|| TreeError::InvalidOperation("unknown destination".to_string()))?;
    if !parent_node.allows_children {
        return Err(
            TreeError::InvalidOperation("destination does not allow children".to_string()).into(),
        );
    }
    let capacity = tree.child_count(destination.parent);
    let mut index = destination.index.unwrap_or(capacity);
    if index > capacity {
        return Err(TreeError::InvalidOperation(format!(
            "insertion index {} out of range 0..={}",
            index, capacity
        ))
        .into());
    }
    if mode == TransferMode::Move {
        for &original in &payload.originals_to_remove {
            if original == tree.root() || tree.parent(original).is_none() {
                return Err(TreeError::InvalidOperation(
                    "move source is no longer attached".to_string(),
                )
                .into());
            }
        }
    }

    // Fresh copies every time, so a payload can be pasted repeatedly
    // without the inserted subtrees sharing nodes.
    for &clone in &payload.clones {
        let copy = deep_clone(tree, clone);
        tree.insert(copy, destination.parent, index)?;
        index += 1;
    }
    tree.reload(Some(destination.parent));

    if mode == TransferMode::Move {
        let mut former_parents = Vec::new();
        for &original in &payload.originals_to_remove {
            let (former_parent, _) = tree.remove(original)?;
            if !former_parents.contains(&former_parent) {
                former_parents.push(former_parent);
            }
        }
        for parent in former_parents {
            tree.reload(Some(parent));
        }
    }
    Ok(())
}

/// Recursive deep copy: fresh arena identity for every node in the
/// subtree, value and presentation data cloned.
pub fn deep_clone(tree: &mut Tree, original: NodeId) -> NodeId {
    let mut covered = HashSet::new();
    clone_subtree(tree, original, &mut covered)
}

fn clone_subtree(tree: &mut Tree, original: NodeId, covered: &mut HashSet<NodeId>) -> NodeId {
    covered.insert(original);
    let data = tree
        .get(original)
        .expect("cloned node must exist")
        .clone();
    let copy = tree.new_node(data);
    let children: Vec<NodeId> = tree.children(original).collect();
    for (index, child) in children.into_iter().enumerate() {
        let child_copy = clone_subtree(tree, child, covered);
        tree.link(child_copy, copy, index);
    }
    copy
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Node, Value};

    /// Root
    ///   A
    ///     A1
    ///     A2
    ///   B
    ///     B1
    fn sample_tree() -> (Tree, NodeId, NodeId, NodeId, NodeId, NodeId) {
        let mut tree = Tree::new(Node::new("Root"));
        let a = tree.new_node(Node::new("A"));
        let b = tree.new_node(Node::new("B"));
        let a1 = tree.new_node(Node::new("A1"));
        let a2 = tree.new_node(Node::new("A2"));
        let b1 = tree.new_node(Node::new("B1"));
        tree.insert(a, tree.root(), 0).unwrap();
        tree.insert(b, tree.root(), 1).unwrap();
        tree.insert(a1, a, 0).unwrap();
        tree.insert(a2, a, 1).unwrap();
        tree.insert(b1, b, 0).unwrap();
        tree.drain_events();
        (tree, a, b, a1, a2, b1)
    }

    #[test]
    fn test_export_clones_do_not_alias_originals() {
        let (mut tree, a, ..) = sample_tree();
        let payload = export_selection(&mut tree, &[a]).unwrap();

        let clone = payload.clones[0];
        let originals: HashSet<NodeId> = tree.descendants(a).collect();
        let cloned: Vec<NodeId> = tree.descendants(clone).collect();
        assert_eq!(cloned.len(), 3);
        for id in cloned {
            assert!(!originals.contains(&id));
        }
        assert_eq!(tree.get(clone).unwrap().value, Value::text("A"));
    }

    #[test]
    fn test_export_sibling_selection() {
        let (mut tree, a, b, ..) = sample_tree();
        let payload = export_selection(&mut tree, &[a, b]).unwrap();

        assert_eq!(payload.clones.len(), 2);
        assert_eq!(payload.originals_to_remove, vec![a, b]);
    }

    #[test]
    fn test_export_descendant_already_covered() {
        let (mut tree, a, _, a1, ..) = sample_tree();
        let payload = export_selection(&mut tree, &[a, a1]).unwrap();

        // a1 is inside a's deep clone, not a top-level entry
        assert_eq!(payload.clones.len(), 1);
        assert_eq!(payload.originals_to_remove, vec![a]);
    }

    #[test]
    fn test_export_truncates_after_shallower_node() {
        let (mut tree, a, b, a1, _, b1) = sample_tree();
        // a1 is the reference (depth 2); b is shallower, so b1 after it
        // is discarded even though its depth matches the reference
        let payload = export_selection(&mut tree, &[a1, b, b1]).unwrap();

        assert_eq!(payload.clones.len(), 1);
        assert_eq!(payload.originals_to_remove, vec![a1]);
        assert_eq!(tree.get(payload.clones[0]).unwrap().value, Value::text("A1"));
        let _ = (a, b1);
    }

    #[test]
    fn test_export_grafts_uncovered_deeper_node_under_first_clone() {
        let (mut tree, a, _, _, _, b1) = sample_tree();
        // b1 is deeper than a and not covered by a's clone: it rides
        // along as an extra child of the first clone
        let payload = export_selection(&mut tree, &[a, b1]).unwrap();

        assert_eq!(payload.clones.len(), 1);
        let clone = payload.clones[0];
        let clone_children: Vec<String> = tree
            .children(clone)
            .map(|c| tree.get(c).unwrap().value.to_string())
            .collect();
        assert_eq!(clone_children, vec!["A1", "A2", "B1"]);
        assert_eq!(payload.originals_to_remove, vec![a]);
    }

    #[test]
    fn test_export_empty_selection_fails() {
        let (mut tree, ..) = sample_tree();
        assert!(matches!(
            export_selection(&mut tree, &[]),
            Err(TransferError::EmptySelection)
        ));
    }

    #[test]
    fn test_export_root_is_not_marked_for_removal() {
        let (mut tree, ..) = sample_tree();
        let root = tree.root();
        let payload = export_selection(&mut tree, &[root]).unwrap();
        assert!(payload.originals_to_remove.is_empty());
        assert_eq!(payload.clones.len(), 1);
    }

    #[test]
    fn test_import_onto_appends() {
        let (mut tree, a, b, ..) = sample_tree();
        let payload = export_selection(&mut tree, &[a]).unwrap();
        import_payload(&mut tree, &payload, Destination::onto(b), TransferMode::Copy).unwrap();

        let b_children: Vec<String> = tree
            .children(b)
            .map(|c| tree.get(c).unwrap().value.to_string())
            .collect();
        assert_eq!(b_children, vec!["B1", "A"]);
        // copy never removes the original
        assert_eq!(tree.parent(a), Some(tree.root()));
    }

    #[test]
    fn test_import_between_uses_gap_index() {
        let (mut tree, a, b, _, _, b1) = sample_tree();
        let payload = export_selection(&mut tree, &[a]).unwrap();
        import_payload(
            &mut tree,
            &payload,
            Destination::between(b, 0),
            TransferMode::Copy,
        )
        .unwrap();

        let b_children: Vec<String> = tree
            .children(b)
            .map(|c| tree.get(c).unwrap().value.to_string())
            .collect();
        assert_eq!(b_children, vec!["A", "B1"]);
        let _ = b1;
    }

    #[test]
    fn test_import_move_removes_originals() {
        let (mut tree, a, b, ..) = sample_tree();
        let payload = export_selection(&mut tree, &[a]).unwrap();
        import_payload(
            &mut tree,
            &payload,
            Destination::between(b, 0),
            TransferMode::Move,
        )
        .unwrap();

        assert_eq!(tree.parent(a), None);
        let root_children: Vec<NodeId> = tree.children(tree.root()).collect();
        assert_eq!(root_children, vec![b]);
    }

    #[test]
    fn test_import_into_own_subtree_is_a_cycle() {
        let (mut tree, a, _, a1, ..) = sample_tree();
        let payload = export_selection(&mut tree, &[a]).unwrap();

        let err = import_payload(
            &mut tree,
            &payload,
            Destination::onto(a1),
            TransferMode::Move,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TransferError::Tree(TreeError::CycleDetected(_))
        ));
        // nothing moved
        assert_eq!(tree.parent(a), Some(tree.root()));
        assert_eq!(tree.child_count(a1), 0);
    }

    #[test]
    fn test_import_onto_selected_row_is_invalid() {
        let (mut tree, a, _, a1, ..) = sample_tree();
        // a1 is selected but classification only clones a; the drop on
        // a1 is still refused because it is a selected row
        let payload = export_selection(&mut tree, &[a, a1]).unwrap();
        let before: Vec<NodeId> = tree.children(tree.root()).collect();

        let err = import_payload(
            &mut tree,
            &payload,
            Destination::onto(a1),
            TransferMode::Copy,
        )
        .unwrap_err();
        assert!(matches!(err, TransferError::Tree(_)));
        let after: Vec<NodeId> = tree.children(tree.root()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_import_bad_index_leaves_tree_unchanged() {
        let (mut tree, a, b, ..) = sample_tree();
        let payload = export_selection(&mut tree, &[a]).unwrap();
        let err = import_payload(
            &mut tree,
            &payload,
            Destination::between(b, 9),
            TransferMode::Move,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            TransferError::Tree(TreeError::InvalidOperation(_))
        ));
        assert_eq!(tree.parent(a), Some(tree.root()));
        assert_eq!(tree.child_count(b), 1);
    }

    #[test]
    fn test_repeated_paste_never_aliases() {
        let (mut tree, a, b, ..) = sample_tree();
        let payload = export_selection(&mut tree, &[a]).unwrap();
        import_payload(&mut tree, &payload, Destination::onto(b), TransferMode::Copy).unwrap();
        import_payload(&mut tree, &payload, Destination::onto(b), TransferMode::Copy).unwrap();

        let pasted: Vec<NodeId> = tree.children(b).skip(1).collect();
        assert_eq!(pasted.len(), 2);
        assert_ne!(pasted[0], pasted[1]);
        let first: HashSet<NodeId> = tree.descendants(pasted[0]).collect();
        for id in tree.descendants(pasted[1]) {
            assert!(!first.contains(&id));
        }
    }
}
