//! # ssotkit Testkit
//!
//! Test utilities for ssotkit.
//!
//! This crate provides:
//! - A network source-of-truth schema, seed rows and model declarations
//! - Property-based test generators using proptest
//! - A sync/store integration harness
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ssotkit_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_session() {
//!     let mut harness = SyncHarness::new();
//!     harness.create("device", params([("name", "sw1")]), params([("status__name", "Active")]))?;
//!     harness.verify_all();
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod integration;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::integration::*;
}

pub use fixtures::*;
pub use generators::*;
pub use integration::*;
