use std::collections::HashMap;

use tracing::debug;

use groupflow_core::traits::NodeCatalog;
use groupflow_core::types::{NodeSchema, ParamSpec};

/// In-memory snapshot of the host's node-type registry: which classes
/// produce output, and each class's parameter schema in declaration order.
pub struct Catalog {
    classes: HashMap<String, ClassInfo>,
}

struct ClassInfo {
    output_node: bool,
    schema: NodeSchema,
}

impl Catalog {
    /// Parse the registry payload (`/object_info`). Parameter order comes
    /// from the `input_order` arrays; a class without them keeps an empty
    /// schema and degrades to link-bindings-only during resolution.
    pub fn from_object_info(info: &serde_json::Value) -> Self {
        let mut classes = HashMap::new();
        if let Some(map) = info.as_object() {
            for (class, spec) in map {
                classes.insert(class.clone(), parse_class(spec));
            }
        }
        Self { classes }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

impl NodeCatalog for Catalog {
    fn is_output_node(&self, class: &str) -> bool {
        self.classes
            .get(class)
            .map(|c| c.output_node)
            .unwrap_or(false)
    }

    fn schema(&self, class: &str) -> Option<NodeSchema> {
        self.classes.get(class).map(|c| c.schema.clone())
    }
}

fn parse_class(spec: &serde_json::Value) -> ClassInfo {
    let output_node = spec
        .get("output_node")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);

    let mut params = Vec::new();
    for section in ["required", "optional"] {
        let Some(names) = spec
            .pointer(&format!("/input_order/{}", section))
            .and_then(serde_json::Value::as_array)
        else {
            continue;
        };
        for name in names.iter().filter_map(serde_json::Value::as_str) {
            // A parameter's spec is [type, options?]; the regenerate-control
            // convention is flagged in the options object.
            let control = spec
                .pointer(&format!("/input/{}/{}/1/control_after_generate", section, name))
                .and_then(serde_json::Value::as_bool)
                .unwrap_or(false);
            let mut param = ParamSpec::new(name);
            if control {
                param = param.with_control();
            }
            params.push(param);
        }
    }

    if params.is_empty() {
        debug!("Class without input_order, schema left empty");
    }

    ClassInfo {
        output_node,
        schema: NodeSchema::new(params),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object_info() -> serde_json::Value {
        json!({
            "KSampler": {
                "input": {
                    "required": {
                        "model": ["MODEL"],
                        "seed": ["INT", {"default": 0, "control_after_generate": true}],
                        "steps": ["INT", {"default": 20}]
                    },
                    "optional": {
                        "latent": ["LATENT"]
                    }
                },
                "input_order": {
                    "required": ["model", "seed", "steps"],
                    "optional": ["latent"]
                },
                "output_node": false
            },
            "SaveImage": {
                "input": {
                    "required": {
                        "images": ["IMAGE"],
                        "filename_prefix": ["STRING", {"default": "output"}]
                    }
                },
                "input_order": {
                    "required": ["images", "filename_prefix"]
                },
                "output_node": true
            }
        })
    }

    #[test]
    fn output_flag_parsed() {
        let catalog = Catalog::from_object_info(&object_info());
        assert!(catalog.is_output_node("SaveImage"));
        assert!(!catalog.is_output_node("KSampler"));
        assert!(!catalog.is_output_node("Missing"));
    }

    #[test]
    fn params_in_declaration_order_with_control_flag() {
        let catalog = Catalog::from_object_info(&object_info());
        let schema = catalog.schema("KSampler").unwrap();

        let names: Vec<&str> = schema.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["model", "seed", "steps", "latent"]);
        assert!(schema.params[1].control_after_generate);
        assert!(!schema.params[2].control_after_generate);
    }

    #[test]
    fn unknown_class_has_no_schema() {
        let catalog = Catalog::from_object_info(&object_info());
        assert!(catalog.schema("Missing").is_none());
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn class_without_input_order_gets_empty_schema() {
        let catalog = Catalog::from_object_info(&json!({
            "Legacy": {"input": {"required": {"x": ["INT"]}}, "output_node": true}
        }));
        let schema = catalog.schema("Legacy").unwrap();
        assert!(schema.params.is_empty());
        assert!(catalog.is_output_node("Legacy"));
    }
}
