use rand::Rng;
use tracing::debug;

use groupflow_core::error::{GroupflowError, Result};
use groupflow_core::graph::GraphSnapshot;
use groupflow_core::traits::NodeCatalog;
use groupflow_core::types::{InputBinding, NodeId, WorkItem};

/// Build a submittable work item for the named group.
///
/// Duplicate group titles are rejected outright instead of resolving to the
/// first match. All remaining failure modes are entry-scoped: the caller
/// logs them, counts them and moves on to the next iteration.
pub fn build_request(
    snapshot: &GraphSnapshot,
    group_name: &str,
    catalog: &dyn NodeCatalog,
) -> Result<WorkItem> {
    let mut matches = snapshot.regions_titled(group_name);
    let region = matches
        .next()
        .ok_or_else(|| GroupflowError::RegionNotFound(group_name.to_string()))?;
    if matches.next().is_some() {
        return Err(GroupflowError::DuplicateRegion(group_name.to_string()));
    }

    let targets: Vec<NodeId> = crate::region::nodes_in_region(snapshot, region)
        .into_iter()
        .filter(|n| !n.muted && catalog.is_output_node(&n.class))
        .map(|n| n.id)
        .collect();

    if targets.is_empty() {
        return Err(GroupflowError::NoOutputNodes(group_name.to_string()));
    }

    debug!(
        group = group_name,
        output_nodes = targets.len(),
        "Resolving group request"
    );

    let mut item = crate::resolve::resolve(snapshot, &targets, catalog);
    if item.is_empty() {
        return Err(GroupflowError::EmptyResolution(group_name.to_string()));
    }

    randomize_seeds(&mut item);
    Ok(item)
}

/// Replace every literal input named "seed" with an independently drawn
/// random integer in [0, 2^64). Each built work item gets fresh values;
/// repeats never share a seed.
pub fn randomize_seeds(item: &mut WorkItem) {
    let mut rng = rand::thread_rng();
    for node in item.0.values_mut() {
        for (name, binding) in node.inputs.iter_mut() {
            if name == "seed" && matches!(binding, InputBinding::Literal(_)) {
                *binding = InputBinding::Literal(serde_json::Value::from(rng.gen::<u64>()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use groupflow_core::graph::{InputPort, LinkRecord, NodeRecord, Rect, Region};
    use groupflow_core::types::{NodeSchema, ParamSpec, WorkItemNode};
    use serde_json::json;
    use std::collections::HashMap;

    struct TestCatalog {
        output_classes: Vec<String>,
        schemas: HashMap<String, NodeSchema>,
    }

    impl NodeCatalog for TestCatalog {
        fn is_output_node(&self, class: &str) -> bool {
            self.output_classes.iter().any(|c| c == class)
        }

        fn schema(&self, class: &str) -> Option<NodeSchema> {
            self.schemas.get(class).cloned()
        }
    }

    fn catalog() -> TestCatalog {
        TestCatalog {
            output_classes: vec!["SaveImage".into()],
            schemas: HashMap::from([
                (
                    "Sampler".to_string(),
                    NodeSchema::new(vec![ParamSpec::new("seed").with_control()]),
                ),
                ("SaveImage".to_string(), NodeSchema::new(vec![])),
            ]),
        }
    }

    fn snapshot() -> GraphSnapshot {
        GraphSnapshot {
            nodes: vec![
                NodeRecord {
                    id: 1,
                    class: "Sampler".into(),
                    pos: (10.0, 10.0),
                    size: Some((50.0, 50.0)),
                    inputs: vec![],
                    widget_values: vec![json!(1234), json!("randomize")],
                    muted: false,
                },
                NodeRecord {
                    id: 2,
                    class: "SaveImage".into(),
                    pos: (80.0, 10.0),
                    size: Some((50.0, 50.0)),
                    inputs: vec![InputPort::named("images")],
                    widget_values: vec![],
                    muted: false,
                },
            ],
            links: vec![LinkRecord {
                from_node: 1,
                from_slot: 0,
                to_node: 2,
                to_slot: 0,
            }],
            regions: vec![Region {
                title: "render".into(),
                bounds: Rect::new(0.0, 0.0, 200.0, 200.0),
            }],
        }
    }

    #[test]
    fn builds_closure_of_region_outputs() {
        let item = build_request(&snapshot(), "render", &catalog()).unwrap();
        assert_eq!(item.len(), 2);
        let save = item.get(2).unwrap();
        assert_eq!(
            save.inputs.get("images"),
            Some(&InputBinding::Link("1".into(), 0))
        );
    }

    #[test]
    fn missing_region_reported() {
        let err = build_request(&snapshot(), "nope", &catalog()).unwrap_err();
        assert!(matches!(err, GroupflowError::RegionNotFound(_)));
    }

    #[test]
    fn duplicate_titles_rejected() {
        let mut snap = snapshot();
        snap.regions.push(Region {
            title: "render".into(),
            bounds: Rect::new(500.0, 500.0, 10.0, 10.0),
        });
        let err = build_request(&snap, "render", &catalog()).unwrap_err();
        assert!(matches!(err, GroupflowError::DuplicateRegion(_)));
    }

    #[test]
    fn region_without_outputs_skipped() {
        let mut snap = snapshot();
        snap.regions.push(Region {
            title: "inputs-only".into(),
            bounds: Rect::new(0.0, 0.0, 60.0, 60.0),
        });
        // Only the Sampler (not an output class) sits fully inside
        snap.nodes[1].pos = (500.0, 500.0);
        let err = build_request(&snap, "inputs-only", &catalog()).unwrap_err();
        assert!(matches!(err, GroupflowError::NoOutputNodes(_)));
    }

    #[test]
    fn muted_output_nodes_are_ignored() {
        let mut snap = snapshot();
        snap.nodes[1].muted = true;
        let err = build_request(&snap, "render", &catalog()).unwrap_err();
        assert!(matches!(err, GroupflowError::NoOutputNodes(_)));
    }

    #[test]
    fn seed_inputs_are_redrawn_independently() {
        // Two builds never produce the same seed value (2^-64 collision odds)
        let a = build_request(&snapshot(), "render", &catalog()).unwrap();
        let b = build_request(&snapshot(), "render", &catalog()).unwrap();

        let seed = |item: &WorkItem| match item.get(1).unwrap().inputs.get("seed") {
            Some(InputBinding::Literal(v)) => v.as_u64().unwrap(),
            other => panic!("expected literal seed, got {:?}", other),
        };

        assert_ne!(seed(&a), 1234, "seed must not keep its declared value");
        assert_ne!(seed(&a), seed(&b));
    }

    #[test]
    fn link_bound_seed_is_left_alone() {
        let mut item = WorkItem::default();
        let mut node = WorkItemNode {
            class_type: "Sampler".into(),
            inputs: Default::default(),
        };
        node.inputs
            .insert("seed".into(), InputBinding::Link("9".into(), 0));
        item.insert(1, node);

        randomize_seeds(&mut item);
        assert_eq!(
            item.get(1).unwrap().inputs.get("seed"),
            Some(&InputBinding::Link("9".into(), 0))
        );
    }
}
