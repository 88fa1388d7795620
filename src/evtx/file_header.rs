use byteorder::{LittleEndian, ReadBytesExt};
use std::io::{Read, Seek, SeekFrom};

use crate::error::{EventLogError, Result};

pub const FILE_HEADER_SIZE: u64 = 4096;

#[derive(Debug, PartialEq)]
pub enum HeaderFlags {
    Empty,
    Dirty,
    Full,
}

#[derive(Debug, PartialEq)]
pub struct EvtxFileHeader {
    pub first_chunk_number: u64,
    pub last_chunk_number: u64,
    pub next_record_id: u64,
    pub header_size: u32,
    pub minor_version: u16,
    pub major_version: u16,
    pub header_block_size: u16,
    pub chunk_count: u16,
    pub flags: HeaderFlags,
    pub checksum: u32,
}

impl EvtxFileHeader {
    pub fn from_reader<T: Read + Seek>(stream: &mut T) -> Result<EvtxFileHeader> {
        let mut magic = [0u8; 8];
        stream.read_exact(&mut magic)?;
        if &magic != b"ElfFile\x00" {
            return Err(EventLogError::BadMagic {
                expected: b"ElfFile\x00",
                found: magic.to_vec(),
            });
        }

        let first_chunk_number = stream.read_u64::<LittleEndian>()?;
        let last_chunk_number = stream.read_u64::<LittleEndian>()?;
        let next_record_id = stream.read_u64::<LittleEndian>()?;
        let header_size = stream.read_u32::<LittleEndian>()?;
        let minor_version = stream.read_u16::<LittleEndian>()?;
        let major_version = stream.read_u16::<LittleEndian>()?;
        let header_block_size = stream.read_u16::<LittleEndian>()?;
        let chunk_count = stream.read_u16::<LittleEndian>()?;

        stream.seek(SeekFrom::Current(76))?;
        let flags = match stream.read_u32::<LittleEndian>()? {
            0 => HeaderFlags::Empty,
            1 => HeaderFlags::Dirty,
            2 => HeaderFlags::Full,
            other => return Err(EventLogError::UnknownFlagValue(other)),
        };
        let checksum = stream.read_u32::<LittleEndian>()?;

        stream.seek(SeekFrom::Start(FILE_HEADER_SIZE))?;
        Ok(EvtxFileHeader {
            first_chunk_number,
            last_chunk_number,
            next_record_id,
            header_size,
            minor_version,
            major_version,
            header_block_size,
            chunk_count,
            flags,
            checksum,
        })
    }
}
