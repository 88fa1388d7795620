//! Binary XML: the token-driven, template/substitution encoding used by both
//! the modern EVTX chunk format and the WEVT_TEMPLATE provider-resource format.

pub mod flatten;
pub mod model;
pub mod name;
pub mod reader;
pub mod token;

pub use flatten::flatten_instance;
pub use model::{BoundInstance, TemplateCache, TemplateDef};
pub use name::{ChunkRelativeNameResolver, InlineNameResolver, NameResolver};
pub use reader::BxmlReader;

use crate::error::Result;
use crate::kv::KeyValueCollection;
use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

/// Decode one EVTX record's BinXML payload against the chunk's shared name
/// pool and template cache, returning its fully flattened key/value record.
pub fn decode_record(
    record_bytes: &[u8],
    chunk_bytes: &[u8],
    record_absolute_offset: u64,
    cache: &Rc<RefCell<TemplateCache>>,
) -> Result<KeyValueCollection> {
    let resolver = ChunkRelativeNameResolver;
    let mut reader = BxmlReader::new(
        Cursor::new(record_bytes),
        Some(Cursor::new(chunk_bytes)),
        record_absolute_offset,
        resolver,
        cache.clone(),
    );
    let instance = reader.read_record_fragment()?;
    Ok(flatten_instance(&instance))
}

/// Decode a standalone BinXML fragment (no chunk, no back-references) such as
/// a WEVT_TEMPLATE `TEMP` block's embedded template.
pub fn decode_template_fragment(bytes: &[u8]) -> Result<TemplateDef> {
    let resolver = InlineNameResolver;
    let cache = Rc::new(RefCell::new(TemplateCache::default()));
    let mut reader = BxmlReader::new(Cursor::new(bytes), None, 0, resolver, cache);
    reader.read_fragment_header()?;
    let root = reader.read_element()?;
    Ok(TemplateDef::new(root))
}
