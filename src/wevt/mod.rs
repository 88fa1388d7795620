//! Provider template database (`WEVT_TEMPLATE` resource): a `CRIM` header
//! enumerating providers, each pointing at a `WEVT` block of typed sub-blocks.

pub mod objects;

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Cursor, Read};

pub use objects::WevtBlock;

use crate::error::{EventLogError, Result};
use crate::guid::Guid;

pub struct Provider {
    pub id: Guid,
    pub offset: u32,
}

pub struct Crim {
    pub providers: Vec<Provider>,
}

impl Crim {
    pub fn parse(buf: &[u8]) -> Result<Crim> {
        let mut cur = Cursor::new(buf);
        let mut magic = [0u8; 4];
        cur.read_exact(&mut magic)?;
        if &magic != b"CRIM" {
            return Err(EventLogError::BadMagic {
                expected: b"CRIM",
                found: magic.to_vec(),
            });
        }
        let _size = cur.read_u32::<LittleEndian>()?;
        let _major = cur.read_u16::<LittleEndian>()?;
        let _minor = cur.read_u16::<LittleEndian>()?;
        let count = cur.read_u32::<LittleEndian>()?;

        let mut providers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let mut guid_bytes = [0u8; 16];
            cur.read_exact(&mut guid_bytes)?;
            let offset = cur.read_u32::<LittleEndian>()?;
            providers.push(Provider {
                id: Guid::from_bytes(&guid_bytes),
                offset,
            });
        }
        Ok(Crim { providers })
    }
}

pub struct Wevt {
    pub message_table_id: u32,
    pub blocks: Vec<WevtBlock>,
}

impl Wevt {
    pub fn parse(buf: &[u8], offset: u32) -> Result<Wevt> {
        let start = offset as usize;
        let mut cur = Cursor::new(&buf[start..]);
        let mut magic = [0u8; 4];
        cur.read_exact(&mut magic)?;
        if &magic != b"WEVT" {
            return Err(EventLogError::BadMagic {
                expected: b"WEVT",
                found: magic.to_vec(),
            });
        }
        let _size = cur.read_u32::<LittleEndian>()?;
        let message_table_id = cur.read_u32::<LittleEndian>()?;
        let descriptor_count = cur.read_u32::<LittleEndian>()?;

        let mut blocks = Vec::with_capacity(descriptor_count as usize);
        for _ in 0..descriptor_count {
            let _type = cur.read_u32::<LittleEndian>()?;
            let block_offset = cur.read_u32::<LittleEndian>()?;
            match objects::parse_block(buf, block_offset) {
                Ok(block) => blocks.push(block),
                Err(e) => {
                    log::warn!("failed to parse WEVT sub-block at offset {block_offset}: {e}");
                }
            }
        }

        Ok(Wevt {
            message_table_id,
            blocks,
        })
    }
}
