//! Dump command implementation.

use super::{display_payload, open_existing};
use seglog_core::{Config, Record, LEN_WIDTH};
use serde::Serialize;
use std::io::Read;
use std::path::Path;

/// One decoded frame of the log.
#[derive(Debug, Serialize)]
pub struct FrameInfo {
    /// Byte position of the frame in the concatenated stores.
    pub position: u64,
    /// Length prefix value.
    pub length: u64,
    /// Record offset, if the frame decoded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    /// Payload rendered as text or hex.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    /// Decode error, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Runs the dump command.
pub fn run(path: &Path, config: Config, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let log = open_existing(path, config)?;

    let mut bytes = Vec::new();
    log.reader()?.read_to_end(&mut bytes)?;
    let frames = decode_frames(&bytes);

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&frames)?);
        }
        _ => {
            print_text_output(&frames);
        }
    }

    log.close()?;
    Ok(())
}

/// Splits concatenated store bytes into frames and decodes each record.
///
/// A trailing partial frame is reported as an error entry.
pub fn decode_frames(bytes: &[u8]) -> Vec<FrameInfo> {
    let prefix = LEN_WIDTH as usize;
    let mut frames = Vec::new();
    let mut pos = 0usize;

    while pos < bytes.len() {
        let Some(len_bytes) = bytes.get(pos..pos + prefix) else {
            frames.push(FrameInfo {
                position: pos as u64,
                length: 0,
                offset: None,
                payload: None,
                error: Some("truncated length prefix".to_string()),
            });
            break;
        };
        let mut raw = [0u8; 8];
        raw.copy_from_slice(len_bytes);
        let length = u64::from_be_bytes(raw);

        let start = pos + prefix;
        let body = usize::try_from(length)
            .ok()
            .and_then(|len| start.checked_add(len))
            .and_then(|end| bytes.get(start..end));
        let Some(body) = body else {
            frames.push(FrameInfo {
                position: pos as u64,
                length,
                offset: None,
                payload: None,
                error: Some("frame runs past end of data".to_string()),
            });
            break;
        };

        let info = match Record::decode(body) {
            Ok(record) => FrameInfo {
                position: pos as u64,
                length,
                offset: Some(record.offset),
                payload: Some(display_payload(&record.payload)),
                error: None,
            },
            Err(e) => FrameInfo {
                position: pos as u64,
                length,
                offset: None,
                payload: None,
                error: Some(e.to_string()),
            },
        };
        frames.push(info);
        pos = start + body.len();
    }

    frames
}

fn print_text_output(frames: &[FrameInfo]) {
    for frame in frames {
        match (&frame.offset, &frame.error) {
            (Some(offset), _) => println!(
                "@{:<10} offset={} len={} payload={}",
                frame.position,
                offset,
                frame.length,
                frame.payload.as_deref().unwrap_or("")
            ),
            (None, Some(error)) => println!(
                "@{:<10} len={} ERROR: {}",
                frame.position, frame.length, error
            ),
            (None, None) => {}
        }
    }
    println!();
    println!("{} frames", frames.len());
}
