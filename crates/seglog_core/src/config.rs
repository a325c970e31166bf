//! Log configuration.

use crate::error::{CoreError, CoreResult};
use crate::index::ENTRY_WIDTH;

/// Store size used when `max_store_bytes` is left at zero.
pub const DEFAULT_MAX_STORE_BYTES: u64 = 1024;

/// Index size used when `max_index_bytes` is left at zero.
pub const DEFAULT_MAX_INDEX_BYTES: u64 = 1024;

/// Configuration for opening a log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Whether to create the log directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Store size at which the active segment is rotated.
    pub max_store_bytes: u64,

    /// Mapped capacity of each segment index. Also the rotation threshold
    /// on index size, which caps entries per segment at
    /// `max_index_bytes / 12`.
    pub max_index_bytes: u64,

    /// Base offset of the first segment of a log with no existing segments.
    pub initial_offset: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            max_store_bytes: DEFAULT_MAX_STORE_BYTES,
            max_index_bytes: DEFAULT_MAX_INDEX_BYTES,
            initial_offset: 0,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the log directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the store rotation threshold.
    #[must_use]
    pub const fn max_store_bytes(mut self, size: u64) -> Self {
        self.max_store_bytes = size;
        self
    }

    /// Sets the index capacity.
    #[must_use]
    pub const fn max_index_bytes(mut self, size: u64) -> Self {
        self.max_index_bytes = size;
        self
    }

    /// Sets the base offset for a brand-new log.
    #[must_use]
    pub const fn initial_offset(mut self, offset: u64) -> Self {
        self.initial_offset = offset;
        self
    }

    /// Replaces zero byte limits with their defaults.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        if self.max_store_bytes == 0 {
            self.max_store_bytes = DEFAULT_MAX_STORE_BYTES;
        }
        if self.max_index_bytes == 0 {
            self.max_index_bytes = DEFAULT_MAX_INDEX_BYTES;
        }
        self
    }

    /// Checks that the configuration can back a segment.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidConfig`] if the index cannot hold a
    /// single entry or its capacity does not fit in memory.
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_index_bytes < ENTRY_WIDTH {
            return Err(CoreError::invalid_config(format!(
                "max_index_bytes must hold at least one {ENTRY_WIDTH}-byte entry, got {}",
                self.max_index_bytes
            )));
        }
        if usize::try_from(self.max_index_bytes).is_err() {
            return Err(CoreError::invalid_config(format!(
                "max_index_bytes {} exceeds the addressable size",
                self.max_index_bytes
            )));
        }
        if self.max_store_bytes == 0 {
            return Err(CoreError::invalid_config("max_store_bytes must be non-zero"));
        }
        Ok(())
    }

    /// Number of index entries a segment can hold.
    #[must_use]
    pub const fn entries_per_segment(&self) -> u64 {
        self.max_index_bytes / ENTRY_WIDTH
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert_eq!(config.max_store_bytes, 1024);
        assert_eq!(config.max_index_bytes, 1024);
        assert_eq!(config.initial_offset, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(false)
            .max_store_bytes(32)
            .max_index_bytes(ENTRY_WIDTH * 3)
            .initial_offset(16);

        assert!(!config.create_if_missing);
        assert_eq!(config.max_store_bytes, 32);
        assert_eq!(config.entries_per_segment(), 3);
        assert_eq!(config.initial_offset, 16);
    }

    #[test]
    fn zero_limits_fall_back_to_defaults() {
        let config = Config::new().max_store_bytes(0).max_index_bytes(0).normalized();
        assert_eq!(config.max_store_bytes, DEFAULT_MAX_STORE_BYTES);
        assert_eq!(config.max_index_bytes, DEFAULT_MAX_INDEX_BYTES);
    }

    #[test]
    fn index_smaller_than_one_entry_is_rejected() {
        let config = Config::new().max_index_bytes(ENTRY_WIDTH - 1);
        assert!(matches!(
            config.validate(),
            Err(CoreError::InvalidConfig { .. })
        ));
    }
}
