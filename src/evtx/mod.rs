//! The modern, XML-based event log: an `ElfFile` header followed by
//! successive 64 KiB `ElfChnk` chunks.

pub mod chunk;
pub mod file_header;

pub use chunk::ElfChunk;
pub use file_header::EvtxFileHeader;

use std::io::{Read, Seek, SeekFrom};

use crate::error::Result;
use crate::kv::KeyValueCollection;

/// Reads an entire `.evtx` file and decodes every record in every chunk, in
/// chunk then record order. Chunk-level errors are skipped, not propagated.
pub fn read_all<R: Read + Seek>(reader: &mut R) -> Result<Vec<KeyValueCollection>> {
    let header = EvtxFileHeader::from_reader(reader)?;
    let mut records = Vec::new();

    for i in 0..header.chunk_count as u64 {
        let offset = file_header::FILE_HEADER_SIZE + i * chunk::CHUNK_SIZE as u64;
        reader.seek(SeekFrom::Start(offset))?;
        let mut buf = vec![0u8; chunk::CHUNK_SIZE];
        if reader.read_exact(&mut buf).is_err() {
            break;
        }
        match ElfChunk::parse(&buf) {
            Ok(chunk) => records.extend(chunk.decode_records()),
            Err(e) => log::warn!("skipping malformed chunk {i}: {e}"),
        }
    }

    Ok(records)
}
