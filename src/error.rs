use thiserror::Error;

pub type Result<T> = std::result::Result<T, EventLogError>;

/// All failure modes surfaced by this crate.
///
/// Value-level decode failures never reach this type; they are absorbed by the
/// binding driver and rendered as `<CORRUPT DATA>` instead (see `binxml::flatten`).
#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("expected magic {expected:?}, got {found:?}")]
    BadMagic {
        expected: &'static [u8],
        found: Vec<u8>,
    },

    #[error("unknown header flag value: {0}")]
    UnknownFlagValue(u32),

    #[error("invalid binxml token 0x{tag:02x} at offset {offset}")]
    InvalidToken { tag: u8, offset: u64 },

    #[error("invalid binxml value type 0x{0:02x}")]
    InvalidValueType(u8),

    #[error("template cache miss for offset {0}")]
    TemplateCacheMiss(u32),

    #[error("malformed chunk: {0}")]
    MalformedChunk(String),

    #[error("value decode error: {0}")]
    ValueDecode(String),

    #[error("unexpected end of binxml stream while {0}")]
    UnexpectedEof(&'static str),

    #[error("{0}")]
    Other(String),
}

impl EventLogError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        EventLogError::MalformedChunk(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        EventLogError::Other(msg.into())
    }
}
