use orchard::{Node, NodeId, Tree, Value, Workbench, WorkbenchConfig};

/// Standard fixture:
///
/// Root
///   Fruit
///     Apple
///     Pear
///   Spices
///     Cinnamon
pub fn sample_tree() -> Tree {
    let mut tree = Tree::new(Node::new("Root"));
    let fruit = tree.new_node(Node::new("Fruit"));
    let spices = tree.new_node(Node::new("Spices"));
    let apple = tree.new_node(Node::new("Apple"));
    let pear = tree.new_node(Node::new("Pear"));
    let cinnamon = tree.new_node(Node::new("Cinnamon"));
    tree.insert(fruit, tree.root(), 0).unwrap();
    tree.insert(spices, tree.root(), 1).unwrap();
    tree.insert(apple, fruit, 0).unwrap();
    tree.insert(pear, fruit, 1).unwrap();
    tree.insert(cinnamon, spices, 0).unwrap();
    tree
}

pub fn sample_workbench() -> Workbench {
    Workbench::new(sample_tree(), WorkbenchConfig::default())
}

/// Renders the structure as an indented list for comparisons.
pub fn tree_to_string(tree: &Tree, root: NodeId) -> String {
    fn build(tree: &Tree, node: NodeId, depth: usize, out: &mut String) {
        let indent = "  ".repeat(depth);
        let text = tree.get(node).unwrap().display_text();
        out.push_str(&format!("{}{}\n", indent, text));
        let children: Vec<NodeId> = tree.children(node).collect();
        for child in children {
            build(tree, child, depth + 1, out);
        }
    }

    let mut out = String::new();
    build(tree, root, 0, &mut out);
    out
}

/// First attached node whose display text matches, in preorder from the
/// root.
pub fn find_by_text(tree: &Tree, text: &str) -> Option<NodeId> {
    tree.descendants(tree.root())
        .find(|&id| tree.get(id).map(|n| n.display_text()) == Some(text.to_string()))
}

#[allow(dead_code)]
pub fn values_of_children(tree: &Tree, parent: NodeId) -> Vec<String> {
    tree.children(parent)
        .map(|c| tree.get(c).unwrap().value.to_string())
        .collect()
}

#[allow(dead_code)]
pub fn text_node(text: &str) -> Node {
    Node::new(Value::text(text))
}
