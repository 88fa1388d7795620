//! Decoder for Windows event-log artifacts: the legacy `LfLe` format, the
//! modern chunked `ElfFile`/`ElfChnk` XML format, and the `WEVT_TEMPLATE`
//! provider-template database that backs event metadata. All three sit on
//! top of the Binary XML template/substitution engine in [`binxml`].

pub mod binxml;
pub mod error;
pub mod evt;
pub mod evtx;
pub mod guid;
pub mod kv;
pub mod ntsid;
pub mod time;
pub mod value;
pub mod wevt;

pub use error::{EventLogError, Result};
pub use kv::KeyValueCollection;
pub use value::Value;

use std::env;
use std::sync::Once;

static LOGGER_INIT: Once = Once::new();

/// Reads `DISSECT_LOG_EVTX` and installs `env_logger` at that level, once.
/// Intended for tests, examples and embedding applications; a library must
/// not force a global logger on consumers that don't opt in.
pub fn init_logging_from_env() {
    LOGGER_INIT.call_once(|| {
        let level = env::var("DISSECT_LOG_EVTX").unwrap_or_else(|_| "error".to_string());
        let _ = env_logger::Builder::new().parse_filters(&level).try_init();
    });
}
