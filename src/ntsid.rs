use byteorder::{LittleEndian, ReadBytesExt};
use std::fmt::{self, Debug, Display, Write as _};
use std::io::{self, Read};

/// A Windows `SID`, rendered as `S-<revision>-<authority>-<sub>-<sub>-...`.
///
/// The authority is the last byte of the 6-byte identifier-authority field,
/// not the XOR of its two halves; this matches how `dissect.eventlog` reprs it.
#[derive(PartialOrd, PartialEq, Clone)]
pub struct Sid {
    revision: u8,
    sub_authority_count: u8,
    authority: [u8; 6],
    sub_authorities: Vec<u32>,
}

impl Sid {
    pub fn from_reader<R: Read>(stream: &mut R) -> io::Result<Sid> {
        let revision = stream.read_u8()?;
        let sub_authority_count = stream.read_u8()?;
        let mut authority = [0u8; 6];
        stream.read_exact(&mut authority)?;

        let mut sub_authorities = Vec::with_capacity(sub_authority_count as usize);
        for _ in 0..sub_authority_count {
            sub_authorities.push(stream.read_u32::<LittleEndian>()?);
        }

        Ok(Sid {
            revision,
            sub_authority_count,
            authority,
            sub_authorities,
        })
    }

    /// Byte size this SID occupies in its source stream.
    pub fn byte_len(&self) -> usize {
        8 + self.sub_authorities.len() * 4
    }
}

impl Display for Sid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut repr = String::new();
        write!(repr, "S-{}-{}", self.revision, self.authority[5]).unwrap();
        for sub in &self.sub_authorities {
            write!(repr, "-{}", sub).unwrap();
        }
        f.write_str(&repr)
    }
}

impl Debug for Sid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(self, f)
    }
}
