//! Wire-serializable snapshot of the full document state, sent to a peer
//! joining an in-progress session.

use serde::{Deserialize, Serialize};

use crate::crdt::node::Node;
use crate::crdt::types::OpId;

/// One node of a [`Snapshot`], mirroring [`Node`] field-for-field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: OpId,
    pub after: OpId,
    pub text: char,
    pub deleted: bool,
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        NodeRecord {
            id: node.id.clone(),
            after: node.after.clone(),
            text: node.text,
            deleted: node.deleted,
        }
    }
}

impl From<NodeRecord> for Node {
    fn from(record: NodeRecord) -> Self {
        Node {
            id: record.id,
            after: record.after,
            text: record.text,
            deleted: record.deleted,
        }
    }
}

/// The full RGA state as shipped over the wire. Order of `nodes` is not
/// significant; [`crate::crdt::rga::RgaStore::load_snapshot`] rebuilds the
/// children lists from each record's `after` pointer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub nodes: Vec<NodeRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crdt::types::{ClientId, HEAD};

    #[test]
    fn node_record_round_trips_through_node() {
        let node = Node::new(OpId::new(1, ClientId::from_raw("AAAA")), HEAD.clone(), 'x');
        let record = NodeRecord::from(&node);
        let back: Node = record.into();
        assert_eq!(node, back);
    }

    #[test]
    fn snapshot_serializes_as_an_array_of_records() {
        let snapshot = Snapshot {
            nodes: vec![NodeRecord {
                id: OpId::new(1, ClientId::from_raw("AAAA")),
                after: HEAD.clone(),
                text: 'x',
                deleted: false,
            }],
        };
        let json = serde_json::to_value(&snapshot).unwrap();
        assert!(json["nodes"].is_array());
        assert_eq!(json["nodes"][0]["text"], "x");
    }
}
