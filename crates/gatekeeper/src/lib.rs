//! # Gatekeeper - Chiral Gate verification core
//!
//! Admits join requests only after the requester points out the chiral
//! centres of a drawn molecule.
//!
//! ## Architecture
//! ```text
//! Platform events → VerificationEngine → SessionRepository → Redis / memory
//!                        ↓        ↓
//!              CompoundLibrary   Chemistry toolkit (render, detect)
//! ```
//!
//! ## Modules
//! - `engine` - Session state machine, challenges, buttons, commands
//! - `protocol` - 8-byte button payload and challenge keyboard
//! - `compounds` - Candidate list, 40-byte index, plain/BGZF record store
//! - `store` - Per-bot key-value persistence of sessions and group configs
//! - `preapproval` - Per-group sorted user id lists
//! - `collaborators` - Messaging, chemistry and audit ports

pub mod cascade;
pub mod collaborators;
pub mod compounds;
pub mod config;
pub mod engine;
pub mod preapproval;
pub mod protocol;
pub mod ratelimit;
pub mod state;
pub mod store;
pub mod texts;
