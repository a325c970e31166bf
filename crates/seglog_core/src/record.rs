//! Log records and their serialized form.
//!
//! A record is what a store frame carries:
//!
//! ```text
//! | offset (8, BE) | crc32 (4, BE) | payload (N) |
//! ```
//!
//! The checksum covers the offset bytes and the payload. The payload itself
//! is opaque and never inspected.

use crate::error::{CoreError, CoreResult};

/// A single entry of the log.
///
/// The offset is assigned by the log on append; whatever the caller puts
/// there is overwritten.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Record {
    /// Absolute position of the record in the log.
    pub offset: u64,
    /// Opaque record bytes.
    pub payload: Vec<u8>,
}

impl Record {
    /// Header size: offset (8) + crc (4).
    pub const HEADER_SIZE: usize = 12;

    /// Creates a record carrying `payload`, with its offset still unassigned.
    #[must_use]
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            offset: 0,
            payload: payload.into(),
        }
    }

    /// Encodes the record to bytes.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_size());
        let offset = self.offset.to_be_bytes();
        buf.extend_from_slice(&offset);
        buf.extend_from_slice(&checksum(&offset, &self.payload).to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Decodes a record from bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Serialization`] if `data` is shorter than the
    /// header and [`CoreError::ChecksumMismatch`] if the stored checksum does
    /// not match the contents.
    pub fn decode(data: &[u8]) -> CoreResult<Self> {
        if data.len() < Self::HEADER_SIZE {
            return Err(CoreError::serialization(format!(
                "record too short: {} bytes",
                data.len()
            )));
        }

        let offset_bytes: [u8; 8] = data[0..8]
            .try_into()
            .map_err(|_| CoreError::serialization("invalid offset field"))?;
        let stored = u32::from_be_bytes([data[8], data[9], data[10], data[11]]);
        let payload = &data[Self::HEADER_SIZE..];

        let computed = checksum(&offset_bytes, payload);
        if stored != computed {
            return Err(CoreError::ChecksumMismatch {
                expected: stored,
                actual: computed,
            });
        }

        Ok(Self {
            offset: u64::from_be_bytes(offset_bytes),
            payload: payload.to_vec(),
        })
    }

    /// Returns the encoded size of this record.
    #[must_use]
    pub fn encoded_size(&self) -> usize {
        Self::HEADER_SIZE + self.payload.len()
    }
}

impl From<Vec<u8>> for Record {
    fn from(payload: Vec<u8>) -> Self {
        Self::new(payload)
    }
}

impl From<&[u8]> for Record {
    fn from(payload: &[u8]) -> Self {
        Self::new(payload)
    }
}

fn checksum(offset: &[u8; 8], payload: &[u8]) -> u32 {
    let crc = crc32_update(0xFFFF_FFFF, offset);
    !crc32_update(crc, payload)
}

/// Computes the CRC-32 (IEEE) of `data`.
#[must_use]
pub fn compute_crc32(data: &[u8]) -> u32 {
    !crc32_update(0xFFFF_FFFF, data)
}

fn crc32_update(mut crc: u32, data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                if crc & 1 != 0 {
                    crc = (crc >> 1) ^ 0xEDB8_8320;
                } else {
                    crc >>= 1;
                }
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    for &byte in data {
        let index = ((crc ^ u32::from(byte)) & 0xFF) as usize;
        crc = (crc >> 8) ^ CRC32_TABLE[index];
    }
    crc
}
