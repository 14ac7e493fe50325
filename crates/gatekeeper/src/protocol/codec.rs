//! Fixed-width button payload codec.
//!
//! Every interactive button carries 8 opaque bytes that the platform echoes
//! back on click:
//!
//! ```text
//! +--------------------+----------+-------+---------+-----+
//! | challenge_id i32le | reserved | flags | command | arg |
//! +--------------------+----------+-------+---------+-----+
//!   0..4                 4          5       6         7
//! ```
//!
//! The codec is stateless. `command` and `arg` are interpreted by the engine.

use base64::{Engine, engine::general_purpose::STANDARD};
use gate_common::constants::BUTTON_PAYLOAD_SIZE;
use gate_common::{GateError, Region};

/// Bit 0 of `flags`: the button was rendered as selected
pub const FLAG_SELECTED: u8 = 0x01;

/// Button command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonCommand {
    /// Toggle one grid cell, `arg` is the packed region
    Region,
    /// Re-roll the challenge
    Change,
    /// Deselect everything
    Clear,
    /// Submit the selection
    Submit,
    /// Anything else, rejected by the engine
    Unknown(u8),
}

impl From<u8> for ButtonCommand {
    fn from(value: u8) -> Self {
        match value {
            0 => Self::Region,
            1 => Self::Change,
            2 => Self::Clear,
            3 => Self::Submit,
            other => Self::Unknown(other),
        }
    }
}

impl From<ButtonCommand> for u8 {
    fn from(value: ButtonCommand) -> Self {
        match value {
            ButtonCommand::Region => 0,
            ButtonCommand::Change => 1,
            ButtonCommand::Clear => 2,
            ButtonCommand::Submit => 3,
            ButtonCommand::Unknown(other) => other,
        }
    }
}

/// Decoded button payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonPayload {
    pub challenge_id: i32,
    pub flags: u8,
    pub command: u8,
    pub arg: u8,
}

impl ButtonPayload {
    pub fn new(challenge_id: i32, selected: bool, command: ButtonCommand, arg: u8) -> Self {
        Self {
            challenge_id,
            flags: if selected { FLAG_SELECTED } else { 0 },
            command: command.into(),
            arg,
        }
    }

    /// Payload of a grid cell button
    pub fn for_region(challenge_id: i32, region: Region, selected: bool) -> Self {
        Self::new(challenge_id, selected, ButtonCommand::Region, region.pack())
    }

    pub fn encode(&self) -> [u8; BUTTON_PAYLOAD_SIZE] {
        let mut bytes = [0u8; BUTTON_PAYLOAD_SIZE];
        bytes[0..4].copy_from_slice(&self.challenge_id.to_le_bytes());
        bytes[4] = 0;
        bytes[5] = self.flags;
        bytes[6] = self.command;
        bytes[7] = self.arg;
        bytes
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, GateError> {
        let bytes: &[u8; BUTTON_PAYLOAD_SIZE] = bytes.try_into().map_err(|_| {
            GateError::InvalidPayload(format!(
                "expected {} bytes, got {}",
                BUTTON_PAYLOAD_SIZE,
                bytes.len()
            ))
        })?;

        Ok(Self {
            challenge_id: i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            flags: bytes[5],
            command: bytes[6],
            arg: bytes[7],
        })
    }

    pub fn is_selected(&self) -> bool {
        self.flags & FLAG_SELECTED != 0
    }

    pub fn command(&self) -> ButtonCommand {
        ButtonCommand::from(self.command)
    }

    /// Grid cell addressed by a region button
    pub fn target_region(&self) -> Region {
        Region::unpack(self.arg)
    }

    /// Callback data string as carried by the platform
    pub fn to_callback_data(&self) -> String {
        STANDARD.encode(self.encode())
    }

    pub fn from_callback_data(data: &str) -> Result<Self, GateError> {
        let bytes = STANDARD
            .decode(data.trim())
            .map_err(|e| GateError::InvalidPayload(format!("bad callback encoding: {e}")))?;
        Self::decode(&bytes)
    }
}
