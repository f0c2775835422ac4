//! Short printable representations.
//!
//! Both forms show current values without evaluating anything and truncate
//! long listings after `printMaxElements` entries with a `+N...` marker.
//! `repr` leaves out default-valued and read-only properties; `display`
//! leaves out default-valued ones only.

use serde_json::Value;
use skema_core::{InstanceId, SkemaError};

use crate::property::Node;
use crate::store::ObjectStore;

impl ObjectStore {
    /// `Point(x=3, y=4)`.
    pub fn repr(&self, id: InstanceId) -> Result<String, SkemaError> {
        let inst = self.instance(id)?;
        let fields = self.fields(id, true)?;
        let max = self.builder.config().print_max_elements;
        let parts: Vec<String> = fields
            .into_iter()
            .map(|(k, node)| format!("{k}={}", self.node_text(&node, true)))
            .collect();
        Ok(format!("{}({})", inst.ty.name(), truncate(parts, max)))
    }

    /// `{x: 3, y: 4}`.
    pub fn display(&self, id: InstanceId) -> Result<String, SkemaError> {
        let fields = self.fields(id, false)?;
        let max = self.builder.config().print_max_elements;
        let parts: Vec<String> = fields
            .into_iter()
            .map(|(k, node)| format!("{k}: {}", self.node_text(&node, false)))
            .collect();
        Ok(format!("{{{}}}", truncate(parts, max)))
    }

    fn fields(&self, id: InstanceId, skip_read_only: bool) -> Result<Vec<(String, Node)>, SkemaError> {
        let inst = self.instance(id)?;
        let mut out = Vec::new();
        for k in inst.slot_keys() {
            let Some(slot) = inst.slots.get(&k) else { continue };
            if skip_read_only && inst.ty.is_read_only(&k) {
                continue;
            }
            if inst.ty.default_of(&k) == Some(&slot.raw) {
                continue;
            }
            out.push((k, slot.current()));
        }
        Ok(out)
    }

    fn node_text(&self, node: &Node, repr: bool) -> String {
        let max = self.builder.config().print_max_elements;
        match node {
            Node::Literal(v) => literal_text(v, max),
            Node::Object(child) => {
                let text = if repr { self.repr(*child) } else { self.display(*child) };
                text.unwrap_or_else(|_| format!("<freed {child}>"))
            }
            Node::Array(items) => {
                let parts = items.iter().map(|n| self.node_text(n, repr)).collect();
                format!("[{}]", truncate(parts, max))
            }
        }
    }
}

fn literal_text(value: &Value, max: usize) -> String {
    match value {
        Value::Array(items) => {
            let parts = items.iter().map(|v| literal_text(v, max)).collect();
            format!("[{}]", truncate(parts, max))
        }
        other => other.to_string(),
    }
}

fn truncate(parts: Vec<String>, max: usize) -> String {
    if parts.len() <= max {
        return parts.join(", ");
    }
    let rest = parts.len() - max;
    let mut shown: Vec<String> = parts.into_iter().take(max).collect();
    shown.push(format!("+{rest}..."));
    shown.join(", ")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use skema_core::SchemaId;
    use skema_schema::SchemaStore;

    use super::*;
    use crate::builder::TypeBuilder;
    use crate::config::{ObjectOptions, SkemaConfig};
    use crate::descriptor::TypeOverrides;

    #[test]
    fn test_truncate() {
        let parts: Vec<String> = (0..5).map(|i| i.to_string()).collect();
        assert_eq!(truncate(parts.clone(), 5), "0, 1, 2, 3, 4");
        assert_eq!(truncate(parts, 2), "0, 1, +3...");
    }

    #[test]
    fn test_repr_and_display() {
        let mut schemas = SchemaStore::new();
        schemas
            .register(json!({"$id": "point", "type": "object", "properties": {
                "x": {"type": "integer", "default": 0},
                "y": {"type": "integer", "default": 0},
                "unit": {"type": "string"},
                "values": {"type": "array", "items": {"type": "integer"}}
            }}))
            .unwrap();
        let config = SkemaConfig {
            print_max_elements: 3,
            ..SkemaConfig::default()
        };
        let builder = TypeBuilder::with_config(Arc::new(schemas), config);
        builder.register_overrides("point", TypeOverrides::new().default_value("unit", json!("m")));
        let mut s = ObjectStore::new(Arc::new(builder));
        let id = s
            .create(
                &SchemaId::new("point"),
                json!({"x": 3, "values": [1, 2, 3, 4, 5]}),
                ObjectOptions::default(),
            )
            .unwrap();
        assert_eq!(s.repr(id).unwrap(), "Point(x=3, values=[1, 2, 3, +2...])");
        assert_eq!(s.display(id).unwrap(), "{x: 3, values: [1, 2, 3, +2...]}");
        s.set(id, "y", json!(-1)).unwrap();
        assert_eq!(s.display(id).unwrap(), "{x: 3, y: -1, values: [1, 2, 3, +2...]}");
    }
}
