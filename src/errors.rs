use thiserror::Error;

use crate::model::NodeId;

/// Failures of the structural primitives. Nothing is mutated when one of
/// these is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TreeError {
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("operation would place {0:?} inside its own subtree")]
    CycleDetected(NodeId),
}

/// Failures of selection export or payload import.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("selection is empty")]
    EmptySelection,

    #[error(transparent)]
    Tree(#[from] TreeError),
}

/// Failures of the value-edit session.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("no edit session is open")]
    NotEditing,

    #[error("proposed value rejected: {0}")]
    ValidationRejected(String),
}
