use groupflow_core::graph::{GraphSnapshot, NodeRecord, Rect, Region};

/// Assumed box for nodes serialized without an explicit size.
pub const DEFAULT_NODE_SIZE: (f32, f32) = (140.0, 80.0);

/// The node's bounding box on the canvas.
pub fn node_bounds(node: &NodeRecord) -> Rect {
    let (w, h) = node.size.unwrap_or(DEFAULT_NODE_SIZE);
    Rect::new(node.pos.0, node.pos.1, w, h)
}

/// Membership by bounding-box overlap, not containment. Touching a
/// region's boundary is enough, matching the editor's group semantics.
pub fn nodes_in_region<'a>(snapshot: &'a GraphSnapshot, region: &Region) -> Vec<&'a NodeRecord> {
    snapshot
        .nodes
        .iter()
        .filter(|n| node_bounds(n).intersects(&region.bounds))
        .collect()
}
