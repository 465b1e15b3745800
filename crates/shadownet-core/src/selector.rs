//! Node selection.

use crate::node::Node;

/// Return the node with the lowest ping, or `None` for an empty list.
///
/// Ties go to the earliest node in input order.
pub fn select_fastest(nodes: &[Node]) -> Option<&Node> {
    // min_by_key keeps the first of several equal minima.
    nodes.iter().min_by_key(|node| node.ping)
}
