use std::collections::BTreeMap;

use serde::Serialize;

use crate::graph::{NodeId, Position};
use crate::groups::GroupId;

/// Notifications for presentation layers, drained by the host after each operation.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum GraphEvent {
    GroupCreated {
        group_id: GroupId,
        name: String,
        members: usize,
    },
    GroupDeleted {
        group_id: GroupId,
        restored: usize,
        skipped: usize,
    },
    ExpansionToggled {
        group_id: GroupId,
        expanded: bool,
    },
    LayoutCompleted {
        kind: &'static str,
        positions: BTreeMap<NodeId, Position>,
    },
    LayoutFailed {
        kind: &'static str,
        reason: String,
    },
}
