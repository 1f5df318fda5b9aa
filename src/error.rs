use crate::graph::{EdgeId, NodeId};

/// Rejections from group create/delete/toggle.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum GroupError {
    #[error("a group needs at least 2 members, got {0}")]
    InsufficientMembers(usize),
    #[error("no graph is loaded yet")]
    NotReady,
    #[error("unknown group: {0}")]
    UnknownGroup(String),
    #[error("unknown or non-groupable node: {0}")]
    UnknownNode(NodeId),
    #[error("node {node} already belongs to group {group}")]
    AlreadyGrouped { node: NodeId, group: String },
    #[error("another group operation is in flight")]
    Busy,
}

impl GroupError {
    /// Caller contract violations that must reach the user rather than only the log.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::InsufficientMembers(_) | Self::AlreadyGrouped { .. } | Self::UnknownNode(_)
        )
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("no eligible root node for a hierarchical layout")]
    RootNotFound,
    #[error("layout did not complete within {0} ms")]
    Timeout(u128),
    #[error("layout kind {0} is not supported by this provider")]
    Unsupported(&'static str),
    #[error("layout provider failed: {0}")]
    Provider(String),
    #[error("layout provider dropped its completion callback")]
    Disconnected,
    #[error("no graph is loaded yet")]
    NotReady,
}

/// An archived edge that could not be put back during a restore.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RestoreSkip {
    #[error("edge {edge} references missing node {node}")]
    DanglingEdgeReference { edge: EdgeId, node: NodeId },
    #[error("edge {0} is already present")]
    DuplicateEdge(EdgeId),
}
