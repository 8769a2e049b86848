pub mod editor;
pub mod errors;
pub mod history;
pub mod model;
pub mod transfer;
pub mod tree;
pub mod workbench;

// Re-export commonly used types
pub use errors::{EditError, TransferError, TreeError};
pub use model::{Node, NodeId, Value};
pub use transfer::{Destination, TransferMode, TransferPayload};
pub use tree::{Tree, TreeEvent};
pub use workbench::{Workbench, WorkbenchConfig};
