//! Join requests, start timeouts, membership changes and message deletes.

use std::time::Duration;

use gate_common::{ApiError, AuthStatus, GateError, GroupInfo, MemberStatus, UserAuthSession, now_millis};

use super::VerificationEngine;
use crate::collaborators::{AuditCategory, AuditEvent, ChatId, MessageId};
use crate::texts;

impl VerificationEngine {
    /// Handle a join request for `group`.
    ///
    /// Returns false when verification is disabled for the group; the
    /// request is then left pending for the administrators and no session
    /// is written. Otherwise a fresh REQUESTED session replaces any earlier
    /// one and the user is told how to start.
    pub async fn handle_join_request(&self, user_id: i64, group: &GroupInfo) -> Result<bool, GateError> {
        let _guard = self.locks.acquire(user_id).await;

        let config = self.repo.get_or_create_group_config(group).await?;
        if !config.is_enabled {
            tracing::info!(user_id, group_id = group.group_id, "Verification disabled, join request ignored");
            return Ok(false);
        }

        let user = self.client.resolve_user(user_id).await?;
        let pre_approved = self.preapproval.is_pre_approved(group.group_id, user_id).await?;

        self.timers.cancel(user_id);
        let session = UserAuthSession::requested(&user, group, now_millis());
        self.repo.save_session(&session).await?;
        self.audit.record(AuditEvent::new(AuditCategory::JoinRequest, group, user_id));

        if pre_approved {
            tracing::info!(user_id, group_id = group.group_id, "Pre-approved user admitted");
            match self.client.process_join_request(group.group_id, user_id, true).await {
                Ok(()) => {}
                Err(e) if e.is_ignorable() => {
                    tracing::debug!(user_id, group_id = group.group_id, error = %e, "Approval already applied");
                }
                Err(e) => {
                    tracing::error!(user_id, group_id = group.group_id, error = %e, "Pre-approval failed");
                    self.repo.drop_session(user_id).await?;
                    return Err(e.into());
                }
            }
            self.repo.drop_session(user_id).await?;
            self.audit.record(AuditEvent::new(AuditCategory::AutoApprove, group, user_id));
            return Ok(true);
        }

        let hint_message_id = match self
            .client
            .send_text(user_id, &texts::join_notice(&user.name, &group.name), None)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!(user_id, group_id = group.group_id, error = %e, "Failed to send join notice");
                0
            }
        };
        tracing::info!(user_id, group_id = group.group_id, "Join request awaiting verification");

        if config.start_auth_timeout_seconds > 0 {
            let delay = Duration::from_secs(u64::from(config.start_auth_timeout_seconds));
            let engine = self.clone();
            let group = group.clone();
            self.timers.schedule(user_id, delay, move |generation| async move {
                if let Err(e) = engine.handle_start_timeout(user_id, &group, hint_message_id).await {
                    tracing::error!(user_id, group_id = group.group_id, error = %e, "Start timeout handling failed");
                }
                engine.timers.finish(user_id, generation);
            });
        }

        Ok(true)
    }

    /// Deny a join request whose owner never started a challenge.
    ///
    /// Re-checks the stored session first; returns false if it moved on.
    pub async fn handle_start_timeout(
        &self,
        user_id: i64,
        group: &GroupInfo,
        hint_message_id: MessageId,
    ) -> Result<bool, GateError> {
        let _guard = self.locks.acquire(user_id).await;

        let Some(session) = self.repo.get_session_or_discard(user_id).await? else {
            return Ok(false);
        };
        if session.status != AuthStatus::Requested
            || session.current_challenge_id != 0
            || session.target_group_id != group.group_id
        {
            return Ok(false);
        }

        tracing::info!(user_id, group_id = group.group_id, "Join request timed out before verification");
        self.audit.record(AuditEvent::new(AuditCategory::StartAuthTimeout, group, user_id));
        self.repo.drop_session(user_id).await?;
        self.delete_message(user_id, hint_message_id).await;

        match self.client.process_join_request(group.group_id, user_id, false).await {
            Ok(()) | Err(ApiError::CannotHideRequester) => Ok(true),
            Err(e) => Err(e.into()),
        }
    }

    /// React to a membership change made outside the bot's flow.
    ///
    /// Returns true if a pending session for `group` was closed.
    pub async fn handle_member_status_change(
        &self,
        group: &GroupInfo,
        user_id: i64,
        new_status: MemberStatus,
        actor_id: i64,
    ) -> Result<bool, GateError> {
        let _guard = self.locks.acquire(user_id).await;

        let Some(session) = self.repo.get_session_or_discard(user_id).await? else {
            return Ok(false);
        };
        if session.target_group_id != group.group_id || !session.is_pending() {
            return Ok(false);
        }

        let category = if new_status.is_admitted() {
            if actor_id != self.bot_user_id {
                self.notify(user_id, &texts::approved_manually(&group.name)).await;
            }
            AuditCategory::Approve
        } else if new_status == MemberStatus::Banned {
            self.notify(user_id, &texts::banned_manually(&group.name)).await;
            AuditCategory::Dismiss
        } else {
            tracing::warn!(user_id, group_id = group.group_id, status = ?new_status, "Unexpected member status, ignored");
            return Ok(false);
        };

        self.repo.drop_session(user_id).await?;
        self.timers.cancel(user_id);
        self.audit
            .record(AuditEvent::new(category, group, user_id).by_admin(actor_id));
        self.delete_message(user_id, session.original_message_id).await;

        tracing::info!(user_id, group_id = group.group_id, status = ?new_status, actor_id, "Session closed by membership change");
        Ok(true)
    }

    /// Delete bot replies whose triggering messages were deleted
    pub async fn handle_messages_deleted(&self, chat_id: ChatId, message_ids: &[MessageId]) {
        let follow_ups = self.cascade.take(chat_id, message_ids);
        if follow_ups.is_empty() {
            return;
        }
        if let Err(e) = self.client.delete_messages(chat_id, &follow_ups).await {
            tracing::warn!(chat_id, error = %e, "Cascade delete failed");
        }
    }
}
