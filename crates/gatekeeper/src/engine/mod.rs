//! Verification session engine.
//!
//! Drives a user's join request through the session state machine:
//!
//! ```text
//! RESET -> REQUESTED -> AUTHENTICATING -> SUCCESS (dropped)
//!              |              |
//!              +--------------+--> FAILED (dropped on ban / timeout)
//! ```
//!
//! Every mutating operation for one user runs under that user's lock, and
//! the start-timeout timer is cancelled whenever a session leaves REQUESTED.

mod buttons;
mod challenge;
mod commands;
mod lifecycle;
mod locks;
mod timers;

#[cfg(test)]
pub(crate) mod testing;

pub use buttons::{ButtonOutcome, evaluate_button};
pub use challenge::region_for_point;
pub use commands::BotCommand;
pub use locks::SessionLocks;
pub use timers::TimeoutTimers;

use std::sync::Arc;
use std::time::{Duration, Instant};

use gate_common::{GateError, GroupInfo, UserAuthSession};

use crate::cascade::CascadeDeleter;
use crate::collaborators::{ChannelAudit, ChatId, ChemistryToolkit, MessageId, MessagingClient};
use crate::compounds::CompoundLibrary;
use crate::config::{ChallengeConfig, RateLimitConfig};
use crate::preapproval::PreApprovalList;
use crate::ratelimit::TokenBucket;
use crate::store::SessionRepository;
use crate::texts;
use gate_common::constants::CASCADE_DELETE_CAPACITY;

/// Everything the engine is built from
pub struct EngineParts {
    pub repository: SessionRepository,
    pub library: Arc<CompoundLibrary>,
    pub preapproval: Arc<PreApprovalList>,
    pub client: Arc<dyn MessagingClient>,
    pub chemistry: Arc<dyn ChemistryToolkit>,
    pub audit: Arc<ChannelAudit>,
    /// The bot's own user id, to recognise its own actions
    pub bot_user_id: i64,
    pub challenge: ChallengeConfig,
    pub rate_limit: RateLimitConfig,
}

struct RateLimits {
    new_challenge: TokenBucket<i64>,
    callback: TokenBucket<i64>,
    command: TokenBucket<i64>,
    /// One bucket for every user, keyed on 0
    anti_shock: TokenBucket<i64>,
}

/// Verification engine, cheap to clone into spawned tasks
#[derive(Clone)]
pub struct VerificationEngine {
    repo: SessionRepository,
    library: Arc<CompoundLibrary>,
    preapproval: Arc<PreApprovalList>,
    client: Arc<dyn MessagingClient>,
    chemistry: Arc<dyn ChemistryToolkit>,
    audit: Arc<ChannelAudit>,
    limits: Arc<RateLimits>,
    locks: Arc<SessionLocks>,
    timers: Arc<TimeoutTimers>,
    cascade: Arc<CascadeDeleter>,
    bot_user_id: i64,
    challenge: Arc<ChallengeConfig>,
    started_at: Instant,
}

impl VerificationEngine {
    pub fn new(parts: EngineParts) -> Self {
        let limit = |(capacity, refill): (u32, Duration)| TokenBucket::new(capacity, refill);
        let limits = RateLimits {
            new_challenge: limit(parts.rate_limit.new_challenge()),
            callback: limit(parts.rate_limit.callback()),
            command: limit(parts.rate_limit.command()),
            anti_shock: limit(parts.rate_limit.anti_shock()),
        };

        Self {
            repo: parts.repository,
            library: parts.library,
            preapproval: parts.preapproval,
            client: parts.client,
            chemistry: parts.chemistry,
            audit: parts.audit,
            limits: Arc::new(limits),
            locks: Arc::new(SessionLocks::new()),
            timers: Arc::new(TimeoutTimers::new()),
            cascade: Arc::new(CascadeDeleter::new(CASCADE_DELETE_CAPACITY)),
            bot_user_id: parts.bot_user_id,
            challenge: Arc::new(parts.challenge),
            started_at: Instant::now(),
        }
    }

    pub fn repository(&self) -> &SessionRepository {
        &self.repo
    }

    pub fn timers(&self) -> &TimeoutTimers {
        &self.timers
    }

    /// Global flood guard, then the blocklist for private chats.
    ///
    /// Returns false if the event must be dropped without a reply. A
    /// blocklist lookup failure lets the event through.
    async fn admit_event(&self, user_id: i64, is_private: bool) -> bool {
        if self.limits.anti_shock.consume(0) < 0 {
            tracing::warn!(user_id, "Event dropped by anti-shock filter");
            return false;
        }
        if !is_private {
            return true;
        }
        match self.repo.is_blocked(user_id).await {
            Ok(false) => true,
            Ok(true) => {
                tracing::debug!(user_id, "Ignoring blocked user");
                false
            }
            Err(e) => {
                tracing::warn!(user_id, error = %e, "Blocklist unreadable");
                true
            }
        }
    }

    /// Seconds a challenge may take for the session's group
    async fn procedure_timeout_secs(&self, session: &UserAuthSession) -> u32 {
        let fallback = self.repo.group_defaults().auth_procedure_timeout_secs;
        if session.target_group_id == 0 {
            return fallback;
        }
        match self.repo.get_group_config(session.target_group_id).await {
            Ok(Some(config)) => config.auth_procedure_timeout_seconds,
            Ok(None) => fallback,
            Err(e) => {
                tracing::warn!(
                    group_id = session.target_group_id,
                    error = %e,
                    "Group config unreadable, using default procedure timeout"
                );
                fallback
            }
        }
    }

    /// Send `text` as a reply and delete it together with the trigger
    async fn reply_with_cascade(&self, chat_id: ChatId, trigger: MessageId, text: &str) {
        match self.client.send_text(chat_id, text, Some(trigger)).await {
            Ok(reply) => self.cascade.link(chat_id, trigger, reply),
            Err(e) => tracing::warn!(chat_id, error = %e, "Failed to send reply"),
        }
    }

    /// Best-effort notification; failures are only logged
    async fn notify(&self, chat_id: ChatId, text: &str) {
        if let Err(e) = self.client.send_text(chat_id, text, None).await {
            tracing::warn!(chat_id, error = %e, "Failed to notify user");
        }
    }

    async fn delete_message(&self, chat_id: ChatId, message_id: MessageId) {
        if message_id == 0 {
            return;
        }
        if let Err(e) = self.client.delete_messages(chat_id, &[message_id]).await {
            tracing::warn!(chat_id, message_id, error = %e, "Failed to delete message");
        }
    }
}

/// Group the session is trying to join
fn session_group(session: &UserAuthSession) -> GroupInfo {
    GroupInfo {
        group_id: session.target_group_id,
        name: session.target_group_name.clone(),
    }
}

/// Alert text for a failed button press
fn alert_text(error: &GateError) -> &'static str {
    match error {
        GateError::SessionNotFound(_) => texts::SESSION_NOT_FOUND,
        GateError::InvalidPayload(_)
        | GateError::InvalidRegion { .. }
        | GateError::InvalidCommand(_) => texts::INVALID_BUTTON,
        _ => texts::GENERIC_ERROR,
    }
}
