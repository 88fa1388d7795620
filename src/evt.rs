//! Legacy pre-Vista `LfLe` event log: no BinXML, fixed-width headers and
//! inline UTF-16 string/binary fields addressed relative to each record.

use byteorder::{LittleEndian, ReadBytesExt};
use log::warn;
use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::error::{EventLogError, Result};
use crate::kv::KeyValueCollection;
use crate::ntsid::Sid;
use crate::time::filetime_to_timestamp;
use crate::value::Value;

const HEADER_MAGIC: u32 = 0x654c_664c; // "LfLe" little-endian
#[allow(dead_code)]
const HEADER_SIZE: u64 = 0x30;

pub const DIRTY_NEEDLE: [u8; 28] = [
    0x28, 0x00, 0x00, 0x00, 0x11, 0x11, 0x11, 0x11, 0x22, 0x22, 0x22, 0x22, 0x33, 0x33, 0x33,
    0x33, 0x44, 0x44, 0x44, 0x44, 0x00, 0x00, 0x00, 0x00, 0x28, 0x00, 0x00, 0x00,
];
const DEFAULT_BLOCK_SIZE: usize = 4096;

bitflags::bitflags! {
    /// The `ELF_LOGFILE_HEADER_*` bits, directly combinable in the header's
    /// `Flags` field (unlike the mutually-exclusive modern `HeaderFlags`).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EvtHeaderFlags: u32 {
        const DIRTY = 0x1;
        const WRAP = 0x2;
        const LOGFULL_WRITTEN = 0x4;
        const ARCHIVE_SET = 0x8;
    }
}

#[derive(Debug, PartialEq)]
pub struct EvtHeader {
    pub header_size: u32,
    pub start_offset: u32,
    pub end_offset: u32,
    pub current_record_number: u32,
    pub oldest_record_number: u32,
    pub max_size: u32,
    pub flags: EvtHeaderFlags,
    pub retention: u32,
}

impl EvtHeader {
    pub fn is_dirty(&self) -> bool {
        self.flags.contains(EvtHeaderFlags::DIRTY)
    }

    pub fn from_reader<R: Read>(r: &mut R) -> Result<EvtHeader> {
        let header_size = r.read_u32::<LittleEndian>()?;
        let magic = r.read_u32::<LittleEndian>()?;
        if magic != HEADER_MAGIC {
            return Err(EventLogError::BadMagic {
                expected: b"LfLe",
                found: magic.to_le_bytes().to_vec(),
            });
        }
        let _one = r.read_u32::<LittleEndian>()?;
        let _one2 = r.read_u32::<LittleEndian>()?;
        let start_offset = r.read_u32::<LittleEndian>()?;
        let end_offset = r.read_u32::<LittleEndian>()?;
        let current_record_number = r.read_u32::<LittleEndian>()?;
        let oldest_record_number = r.read_u32::<LittleEndian>()?;
        let max_size = r.read_u32::<LittleEndian>()?;
        let flags = EvtHeaderFlags::from_bits_retain(r.read_u32::<LittleEndian>()?);
        let retention = r.read_u32::<LittleEndian>()?;
        let _header_size2 = r.read_u32::<LittleEndian>()?;
        Ok(EvtHeader {
            header_size,
            start_offset,
            end_offset,
            current_record_number,
            oldest_record_number,
            max_size,
            flags,
            retention,
        })
    }
}

/// Parses one `EVENTLOGRECORD` starting at the cursor's current position into
/// a flattened key/value record, or `None` if this is the 40-byte EOF marker.
pub fn parse_record(bytes: &[u8]) -> Result<Option<KeyValueCollection>> {
    if is_eof_record(bytes) {
        return Ok(None);
    }

    let mut cur = Cursor::new(bytes);
    let length = cur.read_u32::<LittleEndian>()?;
    let _reserved = cur.read_u32::<LittleEndian>()?;

    let record_number = cur.read_u32::<LittleEndian>()?;
    let time_generated = cur.read_u32::<LittleEndian>()?;
    let time_written = cur.read_u32::<LittleEndian>()?;
    let event_id = cur.read_u32::<LittleEndian>()?;
    let event_type = cur.read_u16::<LittleEndian>()?;
    let num_strings = cur.read_u16::<LittleEndian>()?;
    let event_category = cur.read_u16::<LittleEndian>()?;
    let _reserved_flags = cur.read_u16::<LittleEndian>()?;
    let _closing_record_number = cur.read_u32::<LittleEndian>()?;
    let string_offset = cur.read_u32::<LittleEndian>()?;
    let sid_length = cur.read_u32::<LittleEndian>()?;
    let sid_offset = cur.read_u32::<LittleEndian>()?;
    let data_length = cur.read_u32::<LittleEndian>()?;
    let data_offset = cur.read_u32::<LittleEndian>()?;

    let source_name = read_cstr_utf16(&mut cur)?;
    let computer_name = read_cstr_utf16(&mut cur)?;

    let mut kv = KeyValueCollection::new();
    kv.insert("RecordNumber", Value::U32(record_number));
    kv.insert(
        "TimeGenerated",
        Value::FileTime(filetime_to_timestamp(unix_secs_to_filetime_ticks(time_generated))),
    );
    kv.insert(
        "TimeWritten",
        Value::FileTime(filetime_to_timestamp(unix_secs_to_filetime_ticks(time_written))),
    );
    kv.insert("EventID", Value::U32(event_id & 0xffff));
    kv.insert("EventType", Value::U16(event_type));
    kv.insert("EventCategory", Value::U16(event_category));
    kv.insert("SourceName", Value::String(source_name));
    kv.insert("ComputerName", Value::String(computer_name));

    if sid_length > 0 {
        cur.seek(SeekFrom::Start(sid_offset as u64))?;
        match Sid::from_reader(&mut cur) {
            Ok(sid) => kv.insert("Sid", Value::String(sid.to_string())),
            Err(e) => warn!("failed to decode SID: {e}"),
        }
    }

    cur.seek(SeekFrom::Start(string_offset as u64))?;
    for i in 0..num_strings {
        let s = read_cstr_utf16(&mut cur)?;
        kv.insert(format!("Strings_{}", i), Value::String(s));
    }

    if data_length > 0 {
        cur.seek(SeekFrom::Start(data_offset as u64))?;
        let mut data = vec![0u8; data_length as usize];
        cur.read_exact(&mut data)?;
        kv.insert("Data", Value::Binary(data));
    }

    let _ = length;
    Ok(Some(kv))
}

fn read_cstr_utf16(cur: &mut Cursor<&[u8]>) -> Result<String> {
    let mut units = Vec::new();
    loop {
        let u = cur.read_u16::<LittleEndian>()?;
        if u == 0 {
            break;
        }
        units.push(u);
    }
    Ok(String::from_utf16_lossy(&units))
}

fn unix_secs_to_filetime_ticks(unix_secs: u32) -> u64 {
    const FILETIME_EPOCH_DIFF_SECS: u64 = 11_644_473_600;
    (unix_secs as u64 + FILETIME_EPOCH_DIFF_SECS) * 10_000_000
}

pub fn is_eof_record(bytes: &[u8]) -> bool {
    bytes.len() >= 4 + DIRTY_NEEDLE.len() && bytes[4..4 + DIRTY_NEEDLE.len()] == DIRTY_NEEDLE[..]
}

pub fn is_header_record(bytes: &[u8]) -> bool {
    bytes.len() >= 8 && u32::from_le_bytes(bytes[4..8].try_into().unwrap()) == HEADER_MAGIC
}

/// Scans a dirty legacy log for the floating 28-byte EOF needle in
/// overlapping blocks, so a match spanning a block boundary is still found.
pub fn find_needle<R: Read + Seek>(reader: &mut R, block_size: usize) -> Result<Option<u64>> {
    let block_size = if block_size == 0 { DEFAULT_BLOCK_SIZE } else { block_size };
    let overlap = DIRTY_NEEDLE.len() - 1;
    let start = reader.stream_position()?;
    let mut buf = vec![0u8; block_size];
    let mut base = start;

    loop {
        let read = reader.read(&mut buf)?;
        if read == 0 {
            return Ok(None);
        }
        if let Some(pos) = find_subslice(&buf[..read], &DIRTY_NEEDLE) {
            return Ok(Some(base + pos as u64));
        }
        if read < overlap {
            return Ok(None);
        }
        let back = (overlap as i64).min(read as i64) as u64;
        base += read as u64 - back;
        reader.seek(SeekFrom::Start(base))?;
    }
}

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}
