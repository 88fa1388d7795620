use byteorder::{LittleEndian, ReadBytesExt};
use log::{debug, warn};
use std::cell::RefCell;
use std::io::Cursor;
use std::rc::Rc;

use crate::binxml::{decode_record, TemplateCache};
use crate::error::{EventLogError, Result};
use crate::kv::KeyValueCollection;

pub const CHUNK_SIZE: usize = 65536;
pub const CHUNK_HEADER_FULL_SIZE: usize = 512;
const RECORD_MAGIC: u32 = 0x0000_2a2a;

#[derive(Debug)]
pub struct ElfChunkHeader {
    pub first_event_record_number: u64,
    pub last_event_record_number: u64,
    pub first_event_record_id: u64,
    pub last_event_record_id: u64,
    pub header_size: u32,
    pub last_record_data_offset: u32,
    pub free_space_offset: u32,
    pub events_checksum: u32,
}

/// A 64 KiB chunk: one header, one name pool (its own bytes, addressed by
/// absolute offset), one template cache, and a run of record payloads.
pub struct ElfChunk<'a> {
    bytes: &'a [u8],
    pub header: ElfChunkHeader,
    cache: Rc<RefCell<TemplateCache>>,
}

impl<'a> ElfChunk<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self> {
        if bytes.len() < CHUNK_HEADER_FULL_SIZE {
            return Err(EventLogError::malformed("chunk shorter than header size"));
        }
        let mut cur = Cursor::new(bytes);
        let mut magic = [0u8; 8];
        cur.read_exact(&mut magic)?;
        if &magic != b"ElfChnk\x00" {
            return Err(EventLogError::BadMagic {
                expected: b"ElfChnk\x00",
                found: magic.to_vec(),
            });
        }

        let header = ElfChunkHeader {
            first_event_record_number: cur.read_u64::<LittleEndian>()?,
            last_event_record_number: cur.read_u64::<LittleEndian>()?,
            first_event_record_id: cur.read_u64::<LittleEndian>()?,
            last_event_record_id: cur.read_u64::<LittleEndian>()?,
            header_size: cur.read_u32::<LittleEndian>()?,
            last_record_data_offset: cur.read_u32::<LittleEndian>()?,
            free_space_offset: cur.read_u32::<LittleEndian>()?,
            events_checksum: cur.read_u32::<LittleEndian>()?,
        };

        if bytes.len() >= 128 {
            let expected = crc32fast::hash(&bytes[0..120]);
            let stored = u32::from_le_bytes(bytes[124..128].try_into().unwrap());
            if expected != stored {
                warn!(
                    "chunk header checksum mismatch (expected {:#x}, stored {:#x}); continuing anyway",
                    expected, stored
                );
            }
        }

        Ok(ElfChunk {
            bytes,
            header,
            cache: Rc::new(RefCell::new(TemplateCache::default())),
        })
    }

    /// Carves and decodes every record in this chunk. Corruption in one
    /// record is isolated: it is logged and skipped, not propagated.
    pub fn decode_records(&self) -> Vec<KeyValueCollection> {
        let mut out = Vec::new();
        let mut offset = CHUNK_HEADER_FULL_SIZE;

        while offset + 24 <= self.bytes.len() {
            let header = &self.bytes[offset..offset + 24];
            let mut hcur = Cursor::new(header);
            let magic = match hcur.read_u32::<LittleEndian>() {
                Ok(m) => m,
                Err(_) => break,
            };
            if magic != RECORD_MAGIC {
                break;
            }
            let size = match hcur.read_u32::<LittleEndian>() {
                Ok(s) => s as usize,
                Err(_) => break,
            };
            if size < 28 || offset + size > self.bytes.len() {
                warn!("record at offset {offset} has implausible size {size}, stopping chunk scan");
                break;
            }

            let record_bytes = &self.bytes[offset + 24..offset + size - 4];
            let absolute_offset = offset as u64 + 24;

            match decode_record(record_bytes, self.bytes, absolute_offset, &self.cache) {
                Ok(kv) => {
                    if kv.contains_key("TimeCreated_SystemTime") {
                        out.push(kv);
                    } else {
                        warn!("record at offset {offset} missing TimeCreated_SystemTime, dropping");
                    }
                }
                Err(e) => {
                    warn!("failed to decode record at offset {offset}: {e}");
                }
            }

            debug!("decoded record at chunk offset {offset}, size {size}");
            offset += size;
        }

        out
    }
}
