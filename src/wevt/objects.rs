use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

use crate::binxml::decode_template_fragment;
use crate::error::{EventLogError, Result};
use crate::guid::Guid;

fn read_utf16_at(buf: &[u8], offset: u32) -> Result<String> {
    let offset = offset as usize;
    if offset + 4 > buf.len() {
        return Err(EventLogError::malformed("string offset out of bounds"));
    }
    let mut cur = Cursor::new(&buf[offset..]);
    let _unknown = cur.read_u32::<LittleEndian>()?;
    let byte_len = cur.read_u32::<LittleEndian>()? as usize;
    let mut units = vec![0u16; byte_len / 2];
    for slot in units.iter_mut() {
        *slot = cur.read_u16::<LittleEndian>()?;
    }
    Ok(String::from_utf16_lossy(&units).trim_end_matches('\0').to_string())
}

/// A fixed-width named entry shared by `CHAN`, `PRVA`, `TASK`, `KEYW`, `LEVL`, `OPCO`.
#[derive(Debug, Clone)]
pub struct NamedEntry {
    pub name: String,
    pub value: u32,
    pub message_id: u32,
}

fn read_named_entries(buf: &[u8], block_bytes: &[u8], count: u32) -> Result<Vec<NamedEntry>> {
    let mut cur = Cursor::new(block_bytes);
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let name_offset = cur.read_u32::<LittleEndian>()?;
        let value = cur.read_u32::<LittleEndian>()?;
        let message_id = cur.read_u32::<LittleEndian>()?;
        let name = read_utf16_at(buf, name_offset).unwrap_or_default();
        out.push(NamedEntry {
            name,
            value,
            message_id,
        });
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct EventEntry {
    pub event_id: u32,
    pub version: u8,
    pub channel: u8,
    pub level: u8,
    pub opcode: u8,
    pub task: u16,
    pub keywords: u64,
    pub template_offset: u32,
}

fn read_event_entries(block_bytes: &[u8], count: u32) -> Result<Vec<EventEntry>> {
    let mut cur = Cursor::new(block_bytes);
    let mut out = Vec::with_capacity(count as usize);
    for _ in 0..count {
        out.push(EventEntry {
            event_id: cur.read_u32::<LittleEndian>()?,
            version: cur.read_u8()?,
            channel: cur.read_u8()?,
            level: cur.read_u8()?,
            opcode: cur.read_u8()?,
            task: cur.read_u16::<LittleEndian>()?,
            keywords: {
                let _pad = cur.read_u16::<LittleEndian>()?;
                cur.read_u64::<LittleEndian>()?
            },
            template_offset: cur.read_u32::<LittleEndian>()?,
        });
    }
    Ok(out)
}

/// One `TEMP` block: an embedded BinXML template fragment plus the names and
/// types of its substitutions.
#[derive(Debug, Clone)]
pub struct TemplateEntry {
    pub template_id: Guid,
    pub number_of_substitutions: u32,
    pub xml: String,
}

fn read_temp_block(buf: &[u8], offset: u32) -> Result<TemplateEntry> {
    let start = offset as usize;
    if start + 24 > buf.len() {
        return Err(EventLogError::malformed("TEMP block out of bounds"));
    }
    let mut cur = Cursor::new(&buf[start..]);
    let mut magic = [0u8; 4];
    cur.read_exact(&mut magic)?;
    if &magic != b"TEMP" {
        return Err(EventLogError::BadMagic {
            expected: b"TEMP",
            found: magic.to_vec(),
        });
    }
    let size = cur.read_u32::<LittleEndian>()? as usize;
    let number_of_substitutions = cur.read_u32::<LittleEndian>()?;
    let mut guid_bytes = [0u8; 16];
    cur.read_exact(&mut guid_bytes)?;
    let template_id = Guid::from_bytes(&guid_bytes);

    let fragment_start = start + 28;
    let fragment_end = (start + size).min(buf.len());
    let fragment = &buf[fragment_start..fragment_end];
    let def = decode_template_fragment(fragment)?;
    let xml = crate::binxml::flatten::render_element_xml(&def.root);

    Ok(TemplateEntry {
        template_id,
        number_of_substitutions,
        xml,
    })
}

/// The decoded content of one typed `WEVT` sub-block, dispatched by its
/// 4-byte signature.
#[derive(Debug, Clone)]
pub enum WevtBlock {
    Channels(Vec<NamedEntry>),
    Providers(Vec<NamedEntry>),
    Tasks(Vec<NamedEntry>),
    Keywords(Vec<NamedEntry>),
    Levels(Vec<NamedEntry>),
    Opcodes(Vec<NamedEntry>),
    Events(Vec<EventEntry>),
    /// Absolute offsets to out-of-line `VMAP`/`BMAP` blocks; not expanded further.
    Maps(Vec<u32>),
    Templates(Vec<TemplateEntry>),
    Unknown(String),
}

pub fn parse_block(buf: &[u8], offset: u32) -> Result<WevtBlock> {
    let start = offset as usize;
    if start + 8 > buf.len() {
        return Err(EventLogError::malformed("WEVT sub-block out of bounds"));
    }
    let mut cur = Cursor::new(&buf[start..]);
    let mut magic = [0u8; 4];
    cur.read_exact(&mut magic)?;
    let _size = cur.read_u32::<LittleEndian>()?;
    let count = cur.read_u32::<LittleEndian>()?;
    let body = &buf[start + 12..];

    match &magic {
        b"CHAN" => Ok(WevtBlock::Channels(read_named_entries(buf, body, count)?)),
        b"PRVA" => Ok(WevtBlock::Providers(read_named_entries(buf, body, count)?)),
        b"TASK" => Ok(WevtBlock::Tasks(read_named_entries(buf, body, count)?)),
        b"KEYW" => Ok(WevtBlock::Keywords(read_named_entries(buf, body, count)?)),
        b"LEVL" => Ok(WevtBlock::Levels(read_named_entries(buf, body, count)?)),
        b"OPCO" => Ok(WevtBlock::Opcodes(read_named_entries(buf, body, count)?)),
        b"EVNT" => Ok(WevtBlock::Events(read_event_entries(body, count)?)),
        b"MAPS" => {
            let mut cur = Cursor::new(body);
            let mut offsets = Vec::with_capacity(count as usize);
            for _ in 0..count {
                offsets.push(cur.read_u32::<LittleEndian>()?);
            }
            Ok(WevtBlock::Maps(offsets))
        }
        b"TTBL" => {
            let mut cur = Cursor::new(body);
            let mut templates = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let off = cur.read_u32::<LittleEndian>()?;
                templates.push(read_temp_block(buf, off)?);
            }
            Ok(WevtBlock::Templates(templates))
        }
        other => Ok(WevtBlock::Unknown(
            String::from_utf8_lossy(other).to_string(),
        )),
    }
}
