//! Node definition for the RGA CRDT.
//!
//! This module contains the `Node` struct which represents a single character
//! inserted into the document, anchored to its causal predecessor.

use crate::crdt::types::OpId;

/// A single character within the RGA insertion tree.
///
/// Each node knows the node it was inserted after (`after`), carries exactly
/// one character (`text`), and can be tombstoned (`deleted`) but never
/// removed — tombstones stay forever so that later inserts anchored to
/// them remain valid.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub id: OpId,
    pub after: OpId,
    pub text: char,
    pub deleted: bool,
}

impl Node {
    pub fn new(id: OpId, after: OpId, text: char) -> Self {
        Node {
            id,
            after,
            text,
            deleted: false,
        }
    }

    pub fn mark_deleted(&mut self) {
        self.deleted = true;
    }
}
