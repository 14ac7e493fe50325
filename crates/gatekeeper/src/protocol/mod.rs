//! Challenge button protocol.
//!
//! Button state lives entirely in the 8-byte payloads the platform echoes
//! back, so a challenge survives process restarts without server-side UI
//! objects.

mod codec;
mod keyboard;

pub use codec::{ButtonCommand, ButtonPayload, FLAG_SELECTED};
pub use keyboard::challenge_keyboard;
