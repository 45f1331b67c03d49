use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use groupflow_core::graph::{GraphSnapshot, LinkRecord, NodeRecord};
use groupflow_core::traits::NodeCatalog;
use groupflow_core::types::{InputBinding, NodeId, NodeSchema, WorkItem, WorkItemNode};

/// Resolve the minimal upstream closure of `targets` into a submittable
/// work item.
///
/// The walk follows links backward from each target with a visited-set
/// guard, so it terminates on any topology, cycles included. Targets that
/// do not exist in the snapshot yield an empty work item; callers must
/// check `is_empty()` before submission.
pub fn resolve(snapshot: &GraphSnapshot, targets: &[NodeId], catalog: &dyn NodeCatalog) -> WorkItem {
    let nodes: HashMap<NodeId, &NodeRecord> = snapshot.nodes.iter().map(|n| (n.id, n)).collect();

    let mut incoming: HashMap<NodeId, Vec<&LinkRecord>> = HashMap::new();
    for link in &snapshot.links {
        incoming.entry(link.to_node).or_default().push(link);
    }

    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut stack: Vec<NodeId> = targets
        .iter()
        .copied()
        .filter(|id| nodes.contains_key(id))
        .collect();

    while let Some(id) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        if let Some(links) = incoming.get(&id) {
            for link in links {
                if nodes.contains_key(&link.from_node) {
                    stack.push(link.from_node);
                } else {
                    warn!(
                        node_id = link.to_node,
                        producer = link.from_node,
                        "Link references a node missing from the snapshot"
                    );
                }
            }
        }
    }

    let mut item = WorkItem::default();
    for id in &visited {
        let record = nodes[id];
        let links = incoming.get(id).map(Vec::as_slice).unwrap_or(&[]);
        item.insert(*id, bind_node(record, links, catalog));
    }

    debug!(
        targets = targets.len(),
        resolved = item.len(),
        "Upstream closure resolved"
    );
    item
}

/// Build one node's input bindings: links first, then literal widget values.
///
/// A node whose class has no schema degrades to link bindings only; a
/// single malformed node never aborts the whole resolution.
fn bind_node(record: &NodeRecord, links: &[&LinkRecord], catalog: &dyn NodeCatalog) -> WorkItemNode {
    let mut node = WorkItemNode {
        class_type: record.class.clone(),
        inputs: Default::default(),
    };

    let mut linked: HashSet<&str> = HashSet::new();
    for link in links {
        match record.inputs.get(link.to_slot as usize) {
            Some(port) => {
                linked.insert(port.name.as_str());
                node.inputs.insert(
                    port.name.clone(),
                    InputBinding::Link(link.from_node.to_string(), link.from_slot),
                );
            }
            None => warn!(
                node_id = record.id,
                slot = link.to_slot,
                "Link targets a slot outside the node's input list"
            ),
        }
    }

    match catalog.schema(&record.class) {
        Some(schema) => {
            for (name, value) in literal_bindings(&schema, &record.widget_values, &linked) {
                node.inputs.insert(name, InputBinding::Literal(value));
            }
        }
        None => warn!(
            node_id = record.id,
            class = %record.class,
            "No schema for class, binding links only"
        ),
    }

    node
}

/// Translate the positional widget-value array into named literal bindings.
///
/// Schema parameters are consumed in declaration order, skipping any name
/// already bound by a link. A parameter flagged with an auxiliary
/// regenerate control owns two widget slots; the control value is
/// discarded. This is the only place that sees the raw positional array.
fn literal_bindings(
    schema: &NodeSchema,
    widget_values: &[serde_json::Value],
    linked: &HashSet<&str>,
) -> Vec<(String, serde_json::Value)> {
    let mut values = widget_values.iter();
    let mut out = Vec::new();

    for param in &schema.params {
        if linked.contains(param.name.as_str()) {
            continue;
        }
        let Some(value) = values.next() else {
            break;
        };
        out.push((param.name.clone(), value.clone()));
        if param.control_after_generate {
            let _ = values.next();
        }
    }

    out
}
