use crate::kv::KeyValueCollection;
use crate::value::Value;

use super::model::{AttrValue, BoundInstance, Element, Node};

/// Flattens a bound template instance into a key/value record.
///
/// Keys are formed by joining ancestor element names with `_`, skipping the
/// first two ancestors (`Event` and `System`/`EventData`); `<Data Name="X">`
/// children are keyed by `X` instead, and a `Name` attribute on `Data` is not
/// itself emitted as a key. Nested template instances produced while binding
/// BINXML-typed descriptors are flattened too and merged in through the same
/// auto-renaming insert as every other key.
pub fn flatten_instance(instance: &BoundInstance) -> KeyValueCollection {
    let mut kv = KeyValueCollection::new();
    let mut path = Vec::new();
    walk_element(&instance.template.root, instance, &mut path, &mut kv);

    for child in &instance.child_instances {
        kv.extend(flatten_instance(child));
    }
    kv
}

fn walk_element(
    el: &Element,
    instance: &BoundInstance,
    path: &mut Vec<String>,
    kv: &mut KeyValueCollection,
) {
    path.push(el.name.clone());

    if path.len() > 1 {
        for (attr_name, attr_val) in &el.attributes {
            if el.name == "Data" && attr_name == "Name" {
                continue;
            }
            let key = format!("{}_{}", el.name, attr_name);
            kv.insert(key, resolve_attr(attr_val, instance));
        }
    }

    for child in &el.children {
        match child {
            Node::Element(child_el) => walk_element(child_el, instance, path, kv),
            Node::Text(v) => insert_leaf(el, path, instance, kv, v.clone()),
            Node::Placeholder(id) => {
                let value = instance.value_for(*id).cloned().unwrap_or(Value::Null);
                insert_leaf(el, path, instance, kv, value);
            }
            Node::Literal(s) => insert_leaf(el, path, instance, kv, Value::String(s.clone())),
        }
    }

    path.pop();
}

fn insert_leaf(
    el: &Element,
    path: &[String],
    instance: &BoundInstance,
    kv: &mut KeyValueCollection,
    value: Value,
) {
    if el.name == "UserData" {
        return;
    }
    let key = if el.name == "Data" {
        data_name_key(el, instance).unwrap_or_else(|| join_path(path))
    } else {
        join_path(path)
    };
    kv.insert(key, value);
}

fn data_name_key(el: &Element, instance: &BoundInstance) -> Option<String> {
    el.attr("Name")
        .map(|attr| resolve_attr(attr, instance).to_string())
}

fn join_path(path: &[String]) -> String {
    if path.len() > 2 {
        path[2..].join("_")
    } else {
        String::new()
    }
}

fn resolve_attr(attr: &AttrValue, instance: &BoundInstance) -> Value {
    match attr {
        AttrValue::Value(v) => v.clone(),
        AttrValue::Literal(s) => Value::String(s.clone()),
        AttrValue::Placeholder(id) => instance.value_for(*id).cloned().unwrap_or(Value::Null),
    }
}

/// Renders a decoded element tree back to XML text, for the BINXML descriptor
/// case where the recursive fragment was a bare element rather than a further
/// template instance. Such fragments carry no unresolved placeholders.
pub fn render_element_xml(el: &Element) -> String {
    let mut out = String::new();
    render_element_into(el, &mut out);
    out
}

fn render_element_into(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.name);
    for (name, value) in &el.attributes {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&render_attr_text(value));
        out.push('"');
    }
    if el.children.is_empty() {
        out.push_str("/>");
        return;
    }
    out.push('>');
    for child in &el.children {
        match child {
            Node::Element(c) => render_element_into(c, out),
            Node::Text(v) => out.push_str(&v.to_string()),
            Node::Literal(s) => out.push_str(s),
            Node::Placeholder(_) => {}
        }
    }
    out.push_str("</");
    out.push_str(&el.name);
    out.push('>');
}

fn render_attr_text(attr: &AttrValue) -> String {
    match attr {
        AttrValue::Value(v) => v.to_string(),
        AttrValue::Literal(s) => s.clone(),
        AttrValue::Placeholder(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binxml::model::{Element, TemplateDef};
    use std::rc::Rc;

    fn data_element(name: &str, sub_id: u16) -> Element {
        let mut el = Element::new("Data");
        el.attributes.push(("Name".into(), AttrValue::Literal(name.into())));
        el.children.push(Node::Placeholder(sub_id));
        el
    }

    #[test]
    fn flattens_data_name_children_by_their_name_attribute() {
        let mut root = Element::new("Event");
        root.children.push(Node::Element(Element::new("System")));
        let mut event_data = Element::new("EventData");
        event_data.children.push(Node::Element(data_element("ProcessId", 0)));
        event_data.children.push(Node::Element(data_element("ImageName", 1)));
        root.children.push(Node::Element(event_data));

        let instance = BoundInstance {
            template: Rc::new(TemplateDef::new(root)),
            values: vec![Value::U32(4242), Value::String("svchost.exe".to_string())],
            child_instances: vec![],
        };

        let kv = flatten_instance(&instance);
        assert_eq!(kv.get("ProcessId"), Some(&Value::U32(4242)));
        assert_eq!(kv.get("ImageName"), Some(&Value::String("svchost.exe".to_string())));
        assert!(!kv.contains_key("Data_Name"));
    }

    #[test]
    fn unbound_placeholder_renders_as_null() {
        let mut root = Element::new("Event");
        let sys = Element::new("System");
        root.children.push(Node::Element(sys));
        let mut ed = Element::new("EventData");
        ed.children.push(Node::Element(data_element("Missing", 7)));
        root.children.push(Node::Element(ed));

        let instance = BoundInstance {
            template: Rc::new(TemplateDef::new(root)),
            values: vec![],
            child_instances: vec![],
        };
        let kv = flatten_instance(&instance);
        assert_eq!(kv.get("Missing"), Some(&Value::Null));
    }
}
