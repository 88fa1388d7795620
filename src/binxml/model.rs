use hashbrown::HashMap;
use std::rc::Rc;

use crate::value::Value;

/// One child of an element: a nested element, a decoded scalar, a numbered
/// substitution placeholder, or an already-rendered entity/char reference string.
#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(Value),
    /// Index into the instance's bound value array (see `BoundInstance::values`).
    Placeholder(u16),
    Literal(String),
}

#[derive(Debug, Clone)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<(String, AttrValue)>,
    pub children: Vec<Node>,
}

#[derive(Debug, Clone)]
pub enum AttrValue {
    Value(Value),
    Placeholder(u16),
    Literal(String),
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn attr(&self, name: &str) -> Option<&AttrValue> {
        self.attributes.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// A parsed template: an element tree plus identity (offset within its chunk).
/// Templates are cached per chunk and reused across every instance that
/// references the same offset.
#[derive(Debug, Clone)]
pub struct TemplateDef {
    pub root: Element,
}

impl TemplateDef {
    pub fn new(root: Element) -> Self {
        TemplateDef { root }
    }
}

/// One use of a template: the cached definition, the values bound to this
/// instance's placeholders, and any nested template instances encountered
/// while decoding BINXML-typed value descriptors.
#[derive(Debug, Clone)]
pub struct BoundInstance {
    pub template: Rc<TemplateDef>,
    pub values: Vec<Value>,
    pub child_instances: Vec<BoundInstance>,
}

impl BoundInstance {
    /// The value bound to placeholder `id`, or `None` if unbound (renders as null).
    pub fn value_for(&self, id: u16) -> Option<&Value> {
        self.values.get(id as usize)
    }
}

/// Cache of parsed templates within one chunk, keyed by their chunk-relative
/// byte offset. A cache miss on a non-defining reference is a hard error.
#[derive(Debug, Default)]
pub struct TemplateCache {
    templates: HashMap<u32, Rc<TemplateDef>>,
}

impl TemplateCache {
    pub fn get(&self, offset: u32) -> Option<Rc<TemplateDef>> {
        self.templates.get(&offset).cloned()
    }

    pub fn insert(&mut self, offset: u32, def: Rc<TemplateDef>) {
        self.templates.insert(offset, def);
    }
}
