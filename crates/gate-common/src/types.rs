//! Core types shared across Chiral Gate components.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::{INITIAL_CHANGES_ALLOWED, MAX_GRID_DIMENSION, group_defaults};
use crate::error::GateError;

/// Current wall clock time in epoch millis
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Lifecycle of a verification attempt.
///
/// Only `Requested` and `Authenticating` are ever persisted; the terminal
/// states are represented by deleting the session record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    Reset,
    Requested,
    Authenticating,
    Failed,
    Success,
}

impl Default for AuthStatus {
    fn default() -> Self {
        Self::Reset
    }
}

/// Whether the rendered challenge marks the chiral centres
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnforceMode {
    /// Chiral centres are highlighted, the user only maps them to cells
    WithHint,
    /// Nothing is highlighted
    NoHint,
}

impl Default for EnforceMode {
    fn default() -> Self {
        Self::WithHint
    }
}

/// One cell of the challenge grid.
///
/// Packed on the wire and in sessions as `(x << 4) | y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region {
    pub x: u8,
    pub y: u8,
}

impl Region {
    pub fn new(x: u8, y: u8) -> Self {
        Self { x: x & 0x0f, y: y & 0x0f }
    }

    pub fn pack(&self) -> u8 {
        (self.x << 4) | self.y
    }

    pub fn unpack(id: u8) -> Self {
        Self {
            x: (id >> 4) & 0x0f,
            y: id & 0x0f,
        }
    }

    /// Returns true if the cell lies inside a `width` x `height` grid
    pub fn within(&self, width: u8, height: u8) -> bool {
        self.x < width && self.y < height
    }
}

/// Column letter followed by 1-based row number, e.g. `C2`
impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", (b'A' + self.x) as char, self.y + 1)
    }
}

/// Durable per-user verification state, one record per user id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAuthSession {
    pub user_id: i64,
    #[serde(default)]
    pub user_nick: String,

    /// Group the user asked to join, 0 for a self-test session
    pub target_group_id: i64,
    #[serde(default)]
    pub target_group_name: String,

    pub status: AuthStatus,

    /// Epoch millis of the join request
    pub request_time: i64,

    /// Epoch millis the current challenge was issued
    pub auth_start_time: i64,

    pub current_challenge_id: i32,
    pub current_record_id: u32,
    pub changes_allowed: u32,
    pub grid_width: u8,
    pub grid_height: u8,

    /// Atom indices of the chiral centres in the current record
    #[serde(default)]
    pub chiral_atoms: Vec<u32>,

    pub correct_region_set: BTreeSet<u8>,
    pub selected_region_set: BTreeSet<u8>,

    /// Live challenge message, 0 when none
    pub original_message_id: i64,
}

/// Everything produced by a successful challenge generation
#[derive(Debug, Clone)]
pub struct ChallengeSetup {
    pub challenge_id: i32,
    pub record_id: u32,
    pub changes_allowed: u32,
    pub grid_width: u8,
    pub grid_height: u8,
    pub chiral_atoms: Vec<u32>,
    pub correct_region_set: BTreeSet<u8>,
    pub started_at: i64,
}

impl UserAuthSession {
    /// Fresh session for a join request
    pub fn requested(user: &UserInfo, group: &GroupInfo, now_millis: i64) -> Self {
        Self {
            user_id: user.user_id,
            user_nick: user.name.clone(),
            target_group_id: group.group_id,
            target_group_name: group.name.clone(),
            status: AuthStatus::Requested,
            request_time: now_millis,
            auth_start_time: 0,
            current_challenge_id: 0,
            current_record_id: 0,
            changes_allowed: INITIAL_CHANGES_ALLOWED,
            grid_width: 0,
            grid_height: 0,
            chiral_atoms: Vec::new(),
            correct_region_set: BTreeSet::new(),
            selected_region_set: BTreeSet::new(),
            original_message_id: 0,
        }
    }

    /// Session without a target group, used for trying the puzzle
    pub fn self_test(user: &UserInfo, now_millis: i64) -> Self {
        let nobody = GroupInfo {
            group_id: 0,
            name: String::new(),
        };
        Self::requested(user, &nobody, now_millis)
    }

    pub fn is_self_test(&self) -> bool {
        self.target_group_id == 0
    }

    /// REQUESTED or AUTHENTICATING
    pub fn is_pending(&self) -> bool {
        matches!(self.status, AuthStatus::Requested | AuthStatus::Authenticating)
    }

    /// Switch to a newly generated challenge; the previous selection is gone
    pub fn begin_challenge(&mut self, setup: ChallengeSetup) {
        self.status = AuthStatus::Authenticating;
        self.current_challenge_id = setup.challenge_id;
        self.current_record_id = setup.record_id;
        self.changes_allowed = setup.changes_allowed;
        self.grid_width = setup.grid_width;
        self.grid_height = setup.grid_height;
        self.chiral_atoms = setup.chiral_atoms;
        self.correct_region_set = setup.correct_region_set;
        self.selected_region_set.clear();
        self.auth_start_time = setup.started_at;
        self.original_message_id = 0;
    }

    /// Apply a region click. `was_selected` is the client's view of the
    /// button; a selected button deselects and vice versa.
    pub fn toggle_region(&mut self, region: Region, was_selected: bool) {
        if was_selected {
            self.selected_region_set.remove(&region.pack());
        } else {
            self.selected_region_set.insert(region.pack());
        }
    }

    /// Returns true if anything was deselected
    pub fn clear_selection(&mut self) -> bool {
        if self.selected_region_set.is_empty() {
            return false;
        }
        self.selected_region_set.clear();
        true
    }

    /// Set equality of the selection and the answer
    pub fn selection_matches(&self) -> bool {
        self.selected_region_set.len() == self.correct_region_set.len()
            && self
                .selected_region_set
                .iter()
                .all(|id| self.correct_region_set.contains(id))
    }

    /// Human readable names of the selected cells, in grid order
    pub fn selected_region_names(&self) -> Vec<String> {
        self.selected_region_set
            .iter()
            .map(|id| Region::unpack(*id).to_string())
            .collect()
    }

    /// Check the record invariants before it is persisted
    pub fn check_invariants(&self) -> Result<(), GateError> {
        if self.user_id <= 0 {
            return Err(GateError::Internal(format!("invalid user id {}", self.user_id)));
        }
        if self.target_group_id < 0 {
            return Err(GateError::Internal(format!(
                "invalid target group id {}",
                self.target_group_id
            )));
        }
        if self.grid_width > MAX_GRID_DIMENSION || self.grid_height > MAX_GRID_DIMENSION {
            return Err(GateError::Internal(format!(
                "grid {}x{} exceeds {}",
                self.grid_width, self.grid_height, MAX_GRID_DIMENSION
            )));
        }
        let in_grid = |id: &u8| Region::unpack(*id).within(self.grid_width, self.grid_height);
        if !self.correct_region_set.iter().all(in_grid)
            || !self.selected_region_set.iter().all(in_grid)
        {
            return Err(GateError::Internal("region outside challenge grid".into()));
        }
        match self.status {
            AuthStatus::Authenticating if self.current_challenge_id == 0 => Err(
                GateError::Internal("authenticating session without challenge id".into()),
            ),
            AuthStatus::Authenticating => Ok(()),
            _ if !self.selected_region_set.is_empty() => Err(GateError::Internal(
                "selection present outside of a challenge".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Per-group verification settings, one record per group id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupAuthConfig {
    pub group_id: i64,
    #[serde(default)]
    pub group_name: String,
    pub is_enabled: bool,
    pub enforce_mode: EnforceMode,

    /// 0 = never expire, else within [60, 86400]
    pub start_auth_timeout_seconds: u32,

    /// Within [60, 10800]
    pub auth_procedure_timeout_seconds: u32,
}

impl GroupAuthConfig {
    /// Config for a group seen for the first time
    pub fn with_defaults(group: &GroupInfo) -> Self {
        Self {
            group_id: group.group_id,
            group_name: group.name.clone(),
            is_enabled: group_defaults::ENABLED,
            enforce_mode: EnforceMode::default(),
            start_auth_timeout_seconds: group_defaults::START_AUTH_TIMEOUT_SECS,
            auth_procedure_timeout_seconds: group_defaults::AUTH_PROCEDURE_TIMEOUT_SECS,
        }
    }

    pub fn validate(&self) -> Result<(), GateError> {
        if self.group_id <= 0 {
            return Err(GateError::Config(format!("invalid group id {}", self.group_id)));
        }
        let start = self.start_auth_timeout_seconds;
        if start != 0 && !group_defaults::START_AUTH_TIMEOUT_RANGE.contains(&start) {
            return Err(GateError::Config(format!(
                "start auth timeout {start}s outside {{0}} U [60, 86400]"
            )));
        }
        let procedure = self.auth_procedure_timeout_seconds;
        if !group_defaults::AUTH_PROCEDURE_TIMEOUT_RANGE.contains(&procedure) {
            return Err(GateError::Config(format!(
                "auth procedure timeout {procedure}s outside [60, 10800]"
            )));
        }
        Ok(())
    }
}

/// A platform user as resolved by the messaging client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub user_id: i64,
    pub name: String,
}

/// A platform group as resolved by the messaging client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub group_id: i64,
    pub name: String,
}

/// Membership status observed on the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Banned,
}

impl MemberStatus {
    /// The user ended up inside the group
    pub fn is_admitted(&self) -> bool {
        matches!(
            self,
            Self::Creator | Self::Administrator | Self::Member | Self::Restricted
        )
    }
}
