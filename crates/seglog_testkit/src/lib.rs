//! # seglog testkit
//!
//! Test utilities for seglog.
//!
//! This crate provides:
//! - Test fixtures and temporary log helpers
//! - Property-based test generators using proptest
//! - Crash simulation helpers
//! - Stress testing utilities for concurrent producers and consumers
//!
//! ## Usage
//!
//! ```rust
//! use seglog_testkit::prelude::*;
//!
//! with_temp_log(|log| {
//!     let offset = log.append(b"payload").unwrap();
//!     assert_eq!(log.read(offset).unwrap().payload, b"payload");
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod stress;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::stress::*;
}

pub use crash::*;
pub use fixtures::*;
pub use generators::*;
pub use stress::*;
