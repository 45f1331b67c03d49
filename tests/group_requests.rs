//! End-to-end request building: a realistic snapshot resolved against a
//! catalog parsed from the host registry payload.

use groupflow_core::graph::{GraphSnapshot, InputPort, LinkRecord, NodeRecord, Rect, Region};
use groupflow_core::types::InputBinding;
use groupflow_graph::build_request;
use groupflow_host::Catalog;
use serde_json::json;

fn catalog() -> Catalog {
    Catalog::from_object_info(&json!({
        "CheckpointLoader": {
            "input": {
                "required": { "ckpt_name": ["STRING", {"default": ""}] }
            },
            "input_order": { "required": ["ckpt_name"] },
            "output_node": false
        },
        "KSampler": {
            "input": {
                "required": {
                    "model": ["MODEL"],
                    "seed": ["INT", {"default": 0, "control_after_generate": true}],
                    "steps": ["INT", {"default": 20}]
                }
            },
            "input_order": { "required": ["model", "seed", "steps"] },
            "output_node": false
        },
        "SaveImage": {
            "input": {
                "required": {
                    "images": ["IMAGE"],
                    "filename_prefix": ["STRING", {"default": "output"}]
                }
            },
            "input_order": { "required": ["images", "filename_prefix"] },
            "output_node": true
        }
    }))
}

/// loader (1) → sampler (2) → save (3); sampler and save sit in "final",
/// the loader is upstream outside the group.
fn snapshot() -> GraphSnapshot {
    GraphSnapshot {
        nodes: vec![
            NodeRecord {
                id: 1,
                class: "CheckpointLoader".into(),
                pos: (0.0, 0.0),
                size: Some((100.0, 60.0)),
                inputs: vec![],
                widget_values: vec![json!("photon.safetensors")],
                muted: false,
            },
            NodeRecord {
                id: 2,
                class: "KSampler".into(),
                pos: (300.0, 0.0),
                size: Some((100.0, 60.0)),
                inputs: vec![InputPort::named("model")],
                widget_values: vec![json!(99), json!("randomize"), json!(25)],
                muted: false,
            },
            NodeRecord {
                id: 3,
                class: "SaveImage".into(),
                pos: (450.0, 0.0),
                size: Some((100.0, 60.0)),
                inputs: vec![InputPort::named("images")],
                widget_values: vec![json!("run")],
                muted: false,
            },
        ],
        links: vec![
            LinkRecord {
                from_node: 1,
                from_slot: 0,
                to_node: 2,
                to_slot: 0,
            },
            LinkRecord {
                from_node: 2,
                from_slot: 0,
                to_node: 3,
                to_slot: 0,
            },
        ],
        regions: vec![Region {
            title: "final".into(),
            bounds: Rect::new(280.0, -20.0, 300.0, 100.0),
        }],
    }
}

#[test]
fn request_pulls_upstream_nodes_from_outside_the_group() {
    let item = build_request(&snapshot(), "final", &catalog()).unwrap();

    // The loader is outside "final" but upstream of its output node
    assert_eq!(item.len(), 3);
    assert_eq!(
        item.get(1).unwrap().inputs.get("ckpt_name"),
        Some(&InputBinding::Literal(json!("photon.safetensors")))
    );
    assert_eq!(
        item.get(2).unwrap().inputs.get("model"),
        Some(&InputBinding::Link("1".into(), 0))
    );
    assert_eq!(
        item.get(3).unwrap().inputs.get("images"),
        Some(&InputBinding::Link("2".into(), 0))
    );
    assert_eq!(
        item.get(3).unwrap().inputs.get("filename_prefix"),
        Some(&InputBinding::Literal(json!("run")))
    );
}

#[test]
fn request_randomizes_declared_seed() {
    let item = build_request(&snapshot(), "final", &catalog()).unwrap();
    let sampler = item.get(2).unwrap();

    // The regenerate-control slot ("randomize") is consumed, steps binds
    // the third widget value, and the declared seed is replaced.
    assert_eq!(
        sampler.inputs.get("steps"),
        Some(&InputBinding::Literal(json!(25)))
    );
    match sampler.inputs.get("seed") {
        Some(InputBinding::Literal(v)) => assert_ne!(v, &json!(99)),
        other => panic!("expected literal seed, got {:?}", other),
    }
}

#[test]
fn work_item_serializes_to_host_wire_format() {
    let item = build_request(&snapshot(), "final", &catalog()).unwrap();
    let wire = serde_json::to_value(&item).unwrap();

    assert_eq!(wire["2"]["class_type"], json!("KSampler"));
    assert_eq!(wire["2"]["inputs"]["model"], json!(["1", 0]));
    assert_eq!(wire["3"]["inputs"]["images"], json!(["2", 0]));
}
