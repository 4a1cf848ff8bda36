//! # strata-common
//!
//! Shared foundation for the StrataDB engine crates:
//! - Type-safe identifier newtypes
//! - The logical type system and dynamically-typed values
//! - Engine-wide constants
//! - Engine configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

/// System-wide constants
pub mod constants;

/// Engine configuration
pub mod config;

/// Core types: identifiers, logical types, values
pub mod types;
