use std::fmt;

use indextree::NodeId as TreeNodeId;

pub type NodeId = TreeNodeId;

/// User payload carried by a node. The variant is chosen when the node is
/// created and the editor switches on it instead of guessing at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Text(String),
    Bool(bool),
    Empty,
}

impl Value {
    pub fn text(text: impl Into<String>) -> Self {
        Value::Text(text.into())
    }

    /// Blank means "nothing worth showing": `Empty`, or text that trims away.
    pub fn is_blank(&self) -> bool {
        match self {
            Value::Text(text) => text.trim().is_empty(),
            Value::Bool(_) => false,
            Value::Empty => true,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(text) => f.write_str(text),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Empty => Ok(()),
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Value::Text(text.to_string())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Value::Text(text)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Per-node data stored in the tree arena. Child links and the parent
/// back-reference live in the arena, not here, so holding a `&mut Node`
/// can never corrupt the structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub value: Value,
    /// Overrides the value for textual presentation.
    pub display_name: Option<String>,
    /// `false` forces a leaf; such a node never accepts children.
    pub allows_children: bool,
    pub collapsed: bool,
    /// Presentation hint identifiers resolved by the host renderer.
    pub leaf_hint: Option<String>,
    pub branch_hint: Option<String>,
}

impl Node {
    /// A container node.
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
            display_name: None,
            allows_children: true,
            collapsed: false,
            leaf_hint: None,
            branch_hint: None,
        }
    }

    /// A node that never accepts children.
    pub fn leaf(value: impl Into<Value>) -> Self {
        Self {
            allows_children: false,
            ..Self::new(value)
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Text shown for this node: the display name when set, otherwise the
    /// rendered value.
    pub fn display_text(&self) -> String {
        match &self.display_name {
            Some(name) => name.clone(),
            None => self.value.to_string(),
        }
    }
}
