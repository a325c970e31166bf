//! CLI command implementations.

pub mod consume;
pub mod dump;
pub mod inspect;
pub mod produce;
pub mod truncate;
pub mod verify;

use seglog_core::{Config, Log};
use std::path::Path;

/// Opens an existing log directory, refusing to create one.
pub fn open_existing(path: &Path, config: Config) -> Result<Log, Box<dyn std::error::Error>> {
    if !path.is_dir() {
        return Err(format!("No log found at {}", path.display()).into());
    }
    Ok(Log::open(path, config.create_if_missing(false))?)
}

/// Renders a payload as text if it is printable UTF-8, hex otherwise.
pub fn display_payload(payload: &[u8]) -> String {
    match std::str::from_utf8(payload) {
        Ok(text) if !text.chars().any(char::is_control) => text.to_string(),
        _ => payload.iter().map(|b| format!("{b:02x}")).collect(),
    }
}
