//! # Gate Common
//!
//! Shared types, errors, and constants used across Chiral Gate components.
//!
//! ## Modules
//! - `types` - Session and group records, region packing, platform entities
//! - `error` - Error taxonomy for the verification core
//! - `constants` - Binary layouts, store key prefixes, defaults

pub mod constants;
pub mod error;
pub mod types;

pub use error::{ApiError, GateError};
pub use types::*;
