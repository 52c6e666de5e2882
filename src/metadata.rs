//! Container inspection as a JSON tree
//!
//! Container-level mappings are emitted in the reverse of their declaration
//! order while a variable's own attributes keep declaration order.

use crate::attributes::Attribute;
use crate::container::{Dimension, Group, Variable};
use crate::errors::Result;
use crate::types::FormatMode;
use serde_json::{Map, Value as JsonValue};

/// Describe a group (and any nested groups) as
/// `{"dimensions": {..}, "variables": {..}, "attributes": {..}}`.
pub fn describe(group: &Group, mode: FormatMode) -> Result<JsonValue> {
    let mut tree = Map::new();

    let dimensions: Map<String, JsonValue> = group
        .dimensions
        .iter()
        .rev()
        .map(|d| (d.name.clone(), describe_dimension(d)))
        .collect();
    tree.insert("dimensions".to_string(), JsonValue::Object(dimensions));

    let mut variables = Map::new();
    for var in group.variables.iter().rev() {
        variables.insert(var.name.clone(), describe_variable(var, mode)?);
    }
    tree.insert("variables".to_string(), JsonValue::Object(variables));

    tree.insert(
        "attributes".to_string(),
        JsonValue::Object(attribute_map(group.attributes.iter().rev(), mode)?),
    );

    if !group.groups.is_empty() {
        let mut groups = Map::new();
        for child in group.groups.iter().rev() {
            groups.insert(child.name.clone(), describe(child, mode)?);
        }
        tree.insert("groups".to_string(), JsonValue::Object(groups));
    }

    Ok(JsonValue::Object(tree))
}

/// An unlimited dimension reports `"<unlimited>"` instead of its current size.
pub fn describe_dimension(dim: &Dimension) -> JsonValue {
    if dim.is_unlimited {
        JsonValue::String("<unlimited>".to_string())
    } else {
        JsonValue::from(dim.size)
    }
}

/// Describe a variable as `{"dimensions": [names..], "attributes": {..}}`.
pub fn describe_variable(var: &Variable, mode: FormatMode) -> Result<JsonValue> {
    let mut tree = Map::new();
    let names: Vec<JsonValue> = var
        .dimensions
        .iter()
        .map(|d| JsonValue::String(d.name.clone()))
        .collect();
    tree.insert("dimensions".to_string(), JsonValue::Array(names));
    tree.insert(
        "attributes".to_string(),
        JsonValue::Object(attribute_map(var.attributes.iter(), mode)?),
    );
    Ok(JsonValue::Object(tree))
}

fn attribute_map<'a>(
    attributes: impl Iterator<Item = &'a Attribute>,
    mode: FormatMode,
) -> Result<Map<String, JsonValue>> {
    let mut map = Map::new();
    for attr in attributes {
        map.insert(attr.name.clone(), attr.decode(mode)?.into());
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeTag;

    fn keys(value: &JsonValue) -> Vec<&str> {
        value
            .as_object()
            .unwrap()
            .keys()
            .map(|k| k.as_str())
            .collect()
    }

    fn sample() -> Group {
        let mut group = Group::new("/");
        group.dimensions.push(Dimension::unlimited("time", 3));
        group.dimensions.push(Dimension::new("x", 5));
        for name in ["A", "B", "C"] {
            group.attributes.push(Attribute::text(name, name));
        }
        let mut var = Variable {
            name: "v".to_string(),
            tag: TypeTag::Double,
            dimensions: group.dimensions.clone(),
            attributes: Vec::new(),
        };
        for name in ["A", "B", "C"] {
            var.add_attribute(Attribute::double(name, 1.0));
        }
        group.variables.push(var);
        group
    }

    #[test]
    fn test_container_order_is_reversed() {
        let tree = describe(&sample(), FormatMode::Modern).unwrap();
        assert_eq!(keys(&tree), vec!["dimensions", "variables", "attributes"]);
        assert_eq!(keys(&tree["attributes"]), vec!["C", "B", "A"]);
        assert_eq!(keys(&tree["dimensions"]), vec!["x", "time"]);
    }

    #[test]
    fn test_variable_attribute_order_is_declared() {
        let tree = describe(&sample(), FormatMode::Modern).unwrap();
        assert_eq!(keys(&tree["variables"]["v"]["attributes"]), vec!["A", "B", "C"]);
        assert_eq!(tree["variables"]["v"]["dimensions"], serde_json::json!(["time", "x"]));
    }

    #[test]
    fn test_dimension_values() {
        let tree = describe(&sample(), FormatMode::Modern).unwrap();
        assert_eq!(tree["dimensions"]["time"], serde_json::json!("<unlimited>"));
        assert_eq!(tree["dimensions"]["x"], serde_json::json!(5));
    }

    #[test]
    fn test_nested_groups() {
        let mut root = sample();
        assert!(describe(&root, FormatMode::Modern).unwrap().get("groups").is_none());

        let mut first = Group::new("first");
        first.attributes.push(Attribute::text("a", "1"));
        first.attributes.push(Attribute::text("b", "2"));
        root.groups.push(first);
        root.groups.push(Group::new("second"));

        let tree = describe(&root, FormatMode::Modern).unwrap();
        assert_eq!(keys(&tree["groups"]), vec!["second", "first"]);
        assert_eq!(keys(&tree["groups"]["first"]["attributes"]), vec!["b", "a"]);
    }
}
