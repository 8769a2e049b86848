use crate::history::Snapshot;
use crate::model::{NodeId, Value};

/// Host-installed gate run against a proposed value before a commit is
/// applied. Returning `Err` keeps the session open and the node
/// untouched.
pub type Validator = Box<dyn Fn(&Value) -> Result<(), String>>;

/// One value-edit session. Exactly one may be open at a time; opening a
/// second cancels the first.
#[derive(Debug)]
pub(crate) enum EditSession {
    Idle,
    Editing { node: NodeId, snapshot: Snapshot },
}

impl EditSession {
    pub(crate) fn is_editing(&self) -> bool {
        matches!(self, EditSession::Editing { .. })
    }

    pub(crate) fn node(&self) -> Option<NodeId> {
        match self {
            EditSession::Editing { node, .. } => Some(*node),
            EditSession::Idle => None,
        }
    }
}

/// Maps raw editor text to a `Value` by the tag of the value being
/// edited: boolean nodes stay boolean, blank input clears the value,
/// anything else is text.
pub fn coerce_input(current: &Value, input: &str) -> Value {
    match current {
        Value::Bool(previous) => match input.trim().to_ascii_lowercase().as_str() {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => Value::Bool(*previous),
        },
        _ if input.trim().is_empty() => Value::Empty,
        _ => Value::Text(input.to_string()),
    }
}

/// The stock policy behind the "warn on empty value" toggle: refuse
/// blank values with the configured message.
pub fn reject_blank(message: impl Into<String>) -> Validator {
    let message = message.into();
    Box::new(move |value: &Value| {
        if value.is_blank() {
            Err(message.clone())
        } else {
            Ok(())
        }
    })
}
