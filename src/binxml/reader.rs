use byteorder::{LittleEndian, ReadBytesExt};
use std::cell::RefCell;
use std::io::{Cursor, Read};
use std::rc::Rc;

use crate::error::{EventLogError, Result};
use crate::value::{read_value, Value, ValueType};

use super::model::{AttrValue, BoundInstance, Element, TemplateCache, TemplateDef};
use super::name::NameResolver;
use super::token::{self, Token};

enum FragmentResult {
    Instance(BoundInstance),
    Element(Element),
}

struct Descriptor {
    size: u16,
    value_type: u8,
}

/// Pulls BXML tokens off a record substream, looking names up either inline
/// or against a sibling chunk stream, and drives template caching/binding.
pub struct BxmlReader<'a, R: NameResolver> {
    record: Cursor<&'a [u8]>,
    chunk: Option<Cursor<&'a [u8]>>,
    record_absolute_offset: u64,
    resolver: R,
    cache: Rc<RefCell<TemplateCache>>,
}

impl<'a, R: NameResolver> BxmlReader<'a, R> {
    pub fn new(
        record: Cursor<&'a [u8]>,
        chunk: Option<Cursor<&'a [u8]>>,
        record_absolute_offset: u64,
        resolver: R,
        cache: Rc<RefCell<TemplateCache>>,
    ) -> Self {
        BxmlReader {
            record,
            chunk,
            record_absolute_offset,
            resolver,
            cache,
        }
    }

    fn invalid_token(&self, tag: u8) -> EventLogError {
        EventLogError::InvalidToken {
            tag,
            offset: self.record_absolute_offset + self.record.position(),
        }
    }

    pub fn read_fragment_header(&mut self) -> Result<()> {
        let byte = self.record.read_u8()?;
        let tok = Token::split(byte);
        if tok.tag != token::FRAGMENT_HEADER {
            return Err(self.invalid_token(tok.tag));
        }
        let _major = self.record.read_u8()?;
        let _minor = self.record.read_u8()?;
        let _flags = self.record.read_u8()?;
        Ok(())
    }

    /// Entry point used for a full EVTX record: fragment header then a
    /// template-instance token.
    pub fn read_record_fragment(&mut self) -> Result<BoundInstance> {
        self.read_fragment_header()?;
        let byte = self.record.read_u8()?;
        let tok = Token::split(byte);
        match tok.tag {
            token::TEMPLATE_INSTANCE => self.read_template_instance(),
            other => Err(self.invalid_token(other)),
        }
    }

    pub fn read_element(&mut self) -> Result<Element> {
        let byte = self.record.read_u8()?;
        let tok = Token::split(byte);
        if tok.tag != token::OPEN_START_ELEMENT {
            return Err(self.invalid_token(tok.tag));
        }
        self.read_element_body(tok)
    }

    fn read_element_body(&mut self, tok: Token) -> Result<Element> {
        let _dependency_id = self.record.read_u16::<LittleEndian>()?;
        let _data_size = self.record.read_u32::<LittleEndian>()?;
        let name = self.resolver.read_name(
            &mut self.record,
            self.chunk.as_mut(),
            self.record_absolute_offset,
        )?;

        let mut element = Element::new(name);

        if tok.more {
            let attr_list_size = self.record.read_u32::<LittleEndian>()? as u64;
            let end = self.record.position() + attr_list_size;
            while self.record.position() < end {
                let b = self.record.read_u8()?;
                let t = Token::split(b);
                if t.tag != token::ATTRIBUTE {
                    return Err(self.invalid_token(t.tag));
                }
                let attr_name = self.resolver.read_name(
                    &mut self.record,
                    self.chunk.as_mut(),
                    self.record_absolute_offset,
                )?;
                let value = self.read_attr_value()?;
                element.attributes.push((attr_name, value));
            }
        }

        let b = self.record.read_u8()?;
        let t = Token::split(b);
        match t.tag {
            token::CLOSE_EMPTY_ELEMENT => {}
            token::CLOSE_START_ELEMENT => {
                loop {
                    let cb = self.record.read_u8()?;
                    let ct = Token::split(cb);
                    if ct.tag == token::END_ELEMENT {
                        break;
                    }
                    element.children.push(self.read_child_node(ct)?);
                }
            }
            other => return Err(self.invalid_token(other)),
        }

        Ok(element)
    }

    fn read_child_node(&mut self, tok: Token) -> Result<super::model::Node> {
        use super::model::Node;
        match tok.tag {
            token::OPEN_START_ELEMENT => Ok(Node::Element(self.read_element_body(tok)?)),
            token::VALUE => Ok(Node::Text(Value::String(self.read_value_string_token(tok.more)?))),
            token::NORMAL_SUBSTITUTION | token::OPTIONAL_SUBSTITUTION => {
                let sub_id = self.record.read_u16::<LittleEndian>()?;
                let _value_type = self.record.read_u8()?;
                Ok(Node::Placeholder(sub_id))
            }
            token::CHAR_REF => {
                let code = self.record.read_u16::<LittleEndian>()?;
                Ok(Node::Literal(format!("&x{:x};", code)))
            }
            token::ENTITY_REF => {
                let name = self.resolver.read_name(
                    &mut self.record,
                    self.chunk.as_mut(),
                    self.record_absolute_offset,
                )?;
                let mut out = format!("&{};", name);
                if tok.more {
                    let cb = self.record.read_u8()?;
                    let ct = Token::split(cb);
                    if let super::model::Node::Literal(more) = self.read_child_node(ct)? {
                        out.push_str(&more);
                    }
                }
                Ok(Node::Literal(out))
            }
            other => Err(self.invalid_token(other)),
        }
    }

    fn read_attr_value(&mut self) -> Result<AttrValue> {
        let b = self.record.read_u8()?;
        let tok = Token::split(b);
        match tok.tag {
            token::VALUE => Ok(AttrValue::Literal(self.read_value_string_token(tok.more)?)),
            token::NORMAL_SUBSTITUTION | token::OPTIONAL_SUBSTITUTION => {
                let sub_id = self.record.read_u16::<LittleEndian>()?;
                let _value_type = self.record.read_u8()?;
                Ok(AttrValue::Placeholder(sub_id))
            }
            token::CHAR_REF => {
                let code = self.record.read_u16::<LittleEndian>()?;
                Ok(AttrValue::Literal(format!("&x{:x};", code)))
            }
            token::ENTITY_REF => {
                let name = self.resolver.read_name(
                    &mut self.record,
                    self.chunk.as_mut(),
                    self.record_absolute_offset,
                )?;
                Ok(AttrValue::Literal(format!("&{};", name)))
            }
            other => Err(self.invalid_token(other)),
        }
    }

    fn read_value_string_token(&mut self, more: bool) -> Result<String> {
        let value_type = self.record.read_u8()?;
        if value_type != ValueType::STRING {
            return Err(EventLogError::InvalidValueType(value_type));
        }
        let len = self.record.read_u16::<LittleEndian>()?;
        let mut units = vec![0u16; len as usize];
        for slot in units.iter_mut() {
            *slot = self.record.read_u16::<LittleEndian>()?;
        }
        let mut s = String::from_utf16_lossy(&units);

        if more {
            let b = self.record.read_u8()?;
            let t = Token::split(b);
            if t.tag != token::VALUE {
                return Err(self.invalid_token(t.tag));
            }
            s.push_str(&self.read_value_string_token(t.more)?);
        }
        Ok(s)
    }

    fn read_template_definition(&mut self) -> Result<TemplateDef> {
        let _next_template_offset = self.record.read_u32::<LittleEndian>()?;
        let mut guid = [0u8; 16];
        self.record.read_exact(&mut guid)?;
        let _data_size = self.record.read_u32::<LittleEndian>()?;

        self.read_fragment_header()?;
        let root = self.read_element()?;

        let b = self.record.read_u8()?;
        let t = Token::split(b);
        if t.tag != token::END {
            return Err(self.invalid_token(t.tag));
        }
        Ok(TemplateDef::new(root))
    }

    fn read_binxml_fragment(&mut self) -> Result<FragmentResult> {
        let save = self.record.position();
        let b = self.record.read_u8()?;
        let t = Token::split(b);
        if t.tag == token::FRAGMENT_HEADER {
            let _major = self.record.read_u8()?;
            let _minor = self.record.read_u8()?;
            let _flags = self.record.read_u8()?;
        } else {
            self.record.set_position(save);
        }

        let b2 = self.record.read_u8()?;
        let t2 = Token::split(b2);
        match t2.tag {
            token::TEMPLATE_INSTANCE => Ok(FragmentResult::Instance(self.read_template_instance()?)),
            token::OPEN_START_ELEMENT => Ok(FragmentResult::Element(self.read_element_body(t2)?)),
            other => Err(self.invalid_token(other)),
        }
    }

    pub fn read_template_instance(&mut self) -> Result<BoundInstance> {
        let _unused = self.record.read_u8()?;
        let _template_id = self.record.read_u32::<LittleEndian>()?;
        let offset = self.record.read_u32::<LittleEndian>()?;
        let current_absolute = self.record_absolute_offset + self.record.position();

        let template = if offset as u64 == current_absolute {
            let def = Rc::new(self.read_template_definition()?);
            self.cache.borrow_mut().insert(offset, def.clone());
            def
        } else {
            self.cache
                .borrow()
                .get(offset)
                .ok_or(EventLogError::TemplateCacheMiss(offset))?
        };

        let count = self.record.read_u32::<LittleEndian>()?;
        let mut descriptors = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let size = self.record.read_u16::<LittleEndian>()?;
            let value_type = self.record.read_u8()?;
            let _reserved = self.record.read_u8()?;
            descriptors.push(Descriptor { size, value_type });
        }

        let mut values = Vec::with_capacity(descriptors.len());
        let mut child_instances = Vec::new();

        for descriptor in descriptors {
            let start = self.record.position();
            let end = start + descriptor.size as u64;

            if descriptor.value_type == ValueType::BINXML {
                let outcome = self.read_binxml_fragment();
                self.record.set_position(end);
                match outcome {
                    Ok(FragmentResult::Instance(child)) => {
                        child_instances.push(child);
                        values.push(Value::Null);
                    }
                    Ok(FragmentResult::Element(el)) => {
                        values.push(Value::BinXml(super::flatten::render_element_xml(&el)));
                    }
                    Err(_) => values.push(Value::BinXml("<CORRUPT DATA>".to_string())),
                }
                continue;
            }

            let bytes = &self.record.get_ref()[start as usize..end as usize];
            let value = read_value(ValueType(descriptor.value_type), bytes, false)
                .unwrap_or_else(|_| Value::String("<CORRUPT DATA>".to_string()));
            values.push(value);
            self.record.set_position(end);
        }

        Ok(BoundInstance {
            template,
            values,
            child_instances,
        })
    }
}
