use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::error::{EventLogError, Result};

/// Strategy for resolving an element/attribute name: either a back-reference
/// into the enclosing chunk's name pool, or an inline definition with no
/// back-references (used by WEVT_TEMPLATE fragments).
pub trait NameResolver {
    fn read_name(
        &self,
        record: &mut Cursor<&[u8]>,
        chunk: Option<&mut Cursor<&[u8]>>,
        record_absolute_offset: u64,
    ) -> Result<String>;
}

fn read_name_structure<R: Read>(r: &mut R) -> Result<String> {
    let _reserved = r.read_u32::<LittleEndian>()?;
    let _hash = r.read_u16::<LittleEndian>()?;
    let length = r.read_u16::<LittleEndian>()?;
    let mut units = vec![0u16; length as usize];
    for slot in units.iter_mut() {
        *slot = r.read_u16::<LittleEndian>()?;
    }
    let nul = r.read_u16::<LittleEndian>()?;
    if nul != 0 {
        return Err(EventLogError::malformed("name structure missing NUL padding"));
    }
    Ok(String::from_utf16_lossy(&units))
}

/// Reads a u32 offset from the record substream; if it equals the current
/// absolute position the name is defined here, otherwise it is a look-aside
/// into the chunk's name pool at that absolute offset.
pub struct ChunkRelativeNameResolver;

impl NameResolver for ChunkRelativeNameResolver {
    fn read_name(
        &self,
        record: &mut Cursor<&[u8]>,
        chunk: Option<&mut Cursor<&[u8]>>,
        record_absolute_offset: u64,
    ) -> Result<String> {
        let offset = record.read_u32::<LittleEndian>()?;
        let current_absolute = record_absolute_offset + record.position();

        if offset as u64 == current_absolute {
            return read_name_structure(record);
        }

        let chunk = chunk.ok_or_else(|| {
            crate::error::EventLogError::malformed(
                "chunk-relative name reference used without a chunk stream",
            )
        })?;
        let saved = chunk.position();
        chunk.seek(SeekFrom::Start(offset as u64))?;
        let name = read_name_structure(chunk);
        chunk.seek(SeekFrom::Start(saved))?;
        name
    }
}

/// Reads (hash, length, utf16, nul-padding) with no back-references, as used
/// inside a WEVT_TEMPLATE `TEMP` block's embedded BinXML fragment.
pub struct InlineNameResolver;

impl NameResolver for InlineNameResolver {
    fn read_name(
        &self,
        record: &mut Cursor<&[u8]>,
        _chunk: Option<&mut Cursor<&[u8]>>,
        _record_absolute_offset: u64,
    ) -> Result<String> {
        let _hash = record.read_u16::<LittleEndian>()?;
        let length = record.read_u16::<LittleEndian>()?;
        let mut units = vec![0u16; length as usize];
        for slot in units.iter_mut() {
            *slot = record.read_u16::<LittleEndian>()?;
        }
        let _nul = record.read_u16::<LittleEndian>()?;
        Ok(String::from_utf16_lossy(&units))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_bytes(s: &str) -> Vec<u8> {
        let mut out = vec![];
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        let units: Vec<u16> = s.encode_utf16().collect();
        out.extend_from_slice(&(units.len() as u16).to_le_bytes());
        for u in units {
            out.extend_from_slice(&u.to_le_bytes());
        }
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }

    #[test]
    fn inline_self_reference_reads_name_without_chunk() {
        let mut bytes = 4u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&name_bytes("Event")[4..]);
        let mut record = Cursor::new(bytes.as_slice());
        let resolver = ChunkRelativeNameResolver;
        let name = resolver.read_name(&mut record, None, 0).unwrap();
        assert_eq!(name, "Event");
    }

    #[test]
    fn chunk_lookaside_restores_cursor() {
        let mut chunk_bytes = vec![0u8; 64];
        let name = name_bytes("Provider");
        chunk_bytes[32..32 + name.len()].copy_from_slice(&name);
        let mut record_bytes = 32u32.to_le_bytes().to_vec();
        record_bytes.extend_from_slice(&[0xaa; 4]);

        let mut record = Cursor::new(record_bytes.as_slice());
        let mut chunk = Cursor::new(chunk_bytes.as_slice());
        chunk.set_position(10);

        let resolver = ChunkRelativeNameResolver;
        let resolved = resolver
            .read_name(&mut record, Some(&mut chunk), 1000)
            .unwrap();
        assert_eq!(resolved, "Provider");
        assert_eq!(chunk.position(), 10);
    }
}
