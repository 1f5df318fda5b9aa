//! Collapse groups of nodes in a topology graph into a single node, restore them
//! later, and position what remains visible.

pub mod config;
pub mod error;
pub mod events;
pub mod graph;
pub mod groups;
pub mod layout;
pub mod select;
pub mod topology;
mod util;
pub mod visibility;

pub use config::Settings;
pub use error::{GroupError, LayoutError, RestoreSkip};
pub use events::GraphEvent;
pub use graph::{Edge, GraphIndex, GraphSnapshot, Node, Position};
pub use groups::{GroupKind, GroupRegistry, GroupSnapshot, RestoreReport, TypeToggle};
pub use layout::orchestrator::{LayoutOrchestrator, RunStatus};
pub use layout::{LayoutJob, LayoutKind, LayoutProvider};
pub use topology::{SharedTopology, Topology};
