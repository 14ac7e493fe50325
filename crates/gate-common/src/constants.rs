//! Shared constants for Chiral Gate components.

/// Default Redis connection URL
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379";

/// Size of one compound index record in bytes
pub const INDEX_RECORD_SIZE: usize = 40;

/// Size of one pre-approval entry in bytes (big-endian u64 user id)
pub const PRE_APPROVAL_ENTRY_SIZE: usize = 8;

/// Pre-approval list file name inside a group directory
pub const PRE_APPROVAL_FILE_NAME: &str = "anointed.bin";

/// Size of an interactive button payload in bytes
pub const BUTTON_PAYLOAD_SIZE: usize = 8;

/// Largest grid dimension the packed `(x<<4)|y` region id can address
pub const MAX_GRID_DIMENSION: u8 = 16;

/// First challenge id handed out by a fresh store
pub const CHALLENGE_SEQUENCE_START: i32 = 10_000;

/// Capacity of the reply -> follow-up cascade delete association
pub const CASCADE_DELETE_CAPACITY: usize = 1000;

/// Default re-roll allowance for a fresh challenge
pub const DEFAULT_CHANGES_ALLOWED: u32 = 2;

/// Re-roll allowance of a session that never saw a challenge
pub const INITIAL_CHANGES_ALLOWED: u32 = 3;

/// Group config defaults (applied on lazy creation)
pub mod group_defaults {
    /// Verification enabled for newly seen groups
    pub const ENABLED: bool = true;

    /// Seconds a requester has to start a challenge (0 = never expire)
    pub const START_AUTH_TIMEOUT_SECS: u32 = 720;

    /// Seconds a single challenge may take
    pub const AUTH_PROCEDURE_TIMEOUT_SECS: u32 = 600;

    /// Allowed range for a non-zero start timeout
    pub const START_AUTH_TIMEOUT_RANGE: std::ops::RangeInclusive<u32> = 60..=86_400;

    /// Allowed range for the procedure timeout
    pub const AUTH_PROCEDURE_TIMEOUT_RANGE: std::ops::RangeInclusive<u32> = 60..=10_800;
}

/// Store key prefixes
pub mod store_keys {
    /// Root namespace: gate:{bot_user_id}:...
    pub const ROOT_PREFIX: &str = "gate:";

    /// Session record: gate:{bot}:session:{user_id}
    pub const SESSION_SEGMENT: &str = "session";

    /// Group config record: gate:{bot}:group:{group_id}
    pub const GROUP_CONFIG_SEGMENT: &str = "group";

    /// Blocked user marker: gate:{bot}:blocked:{user_id}
    pub const BLOCKED_SEGMENT: &str = "blocked";

    /// Challenge sequence counter: gate:{bot}:challenge_seq
    pub const CHALLENGE_SEQUENCE_SEGMENT: &str = "challenge_seq";
}
