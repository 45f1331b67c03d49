use serde::{Deserialize, Serialize};

use crate::types::NodeId;

/// Axis-aligned rectangle in editor canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Closed-interval overlap test; touching edges count. This mirrors the
    /// editor's group-membership semantics: a node merely touching a group's
    /// drawn boundary is a member.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x <= other.x + other.w
            && other.x <= self.x + self.w
            && self.y <= other.y + other.h
            && other.y <= self.y + self.h
    }
}

/// A named input connector on a node, in ordinal slot order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputPort {
    pub name: String,
}

impl InputPort {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// One node as serialized by the graph editor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: NodeId,
    /// Class tag, resolved against the host's node-type registry.
    pub class: String,
    pub pos: (f32, f32),
    #[serde(default)]
    pub size: Option<(f32, f32)>,
    /// Ordinal input list; a link's target slot indexes into this.
    #[serde(default)]
    pub inputs: Vec<InputPort>,
    /// Declared widget values, positional against the class schema.
    #[serde(default)]
    pub widget_values: Vec<serde_json::Value>,
    /// Disabled in the editor; never collected as an output node.
    #[serde(default)]
    pub muted: bool,
}

/// A directed connection between two node slots.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub from_node: NodeId,
    pub from_slot: u32,
    pub to_node: NodeId,
    pub to_slot: u32,
}

/// A named rectangular annotation over the canvas, used purely as a
/// selection mechanism. Titles are not guaranteed unique by the editor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub title: String,
    pub bounds: Rect,
}

/// Immutable serialized graph: nodes, links and group annotations.
/// Supplied once per execution request, never mutated here.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<NodeRecord>,
    #[serde(default)]
    pub links: Vec<LinkRecord>,
    #[serde(default)]
    pub regions: Vec<Region>,
}

impl GraphSnapshot {
    pub fn node(&self, id: NodeId) -> Option<&NodeRecord> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// All regions carrying the given title, in declaration order.
    pub fn regions_titled<'a>(&'a self, title: &'a str) -> impl Iterator<Item = &'a Region> {
        self.regions.iter().filter(move |r| r.title == title)
    }
}
