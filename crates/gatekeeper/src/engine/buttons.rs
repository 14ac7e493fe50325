//! Button presses on a live challenge.

use gate_common::{ApiError, AuthStatus, GateError, UserAuthSession, now_millis};

use super::{VerificationEngine, alert_text, session_group};
use crate::collaborators::{AuditCategory, AuditEvent, CallbackQuery};
use crate::protocol::{ButtonCommand, ButtonPayload};
use crate::texts;

/// Result of applying one button press to a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonOutcome {
    /// Session changed (or was left as is); answer with `text`, re-render
    /// the challenge if `refresh`
    Updated { text: String, refresh: bool },
    /// Nothing changed; answer with an alert
    Unavailable(&'static str),
    /// Selection matches the answer
    Passed,
    /// Selection does not match the answer
    Failed,
}

/// Apply `payload` to `session` in memory.
///
/// Rejects presses on stale challenges, cells outside the grid and unknown
/// command types without touching the session.
pub fn evaluate_button(
    session: &mut UserAuthSession,
    payload: &ButtonPayload,
) -> Result<ButtonOutcome, GateError> {
    if session.status != AuthStatus::Authenticating {
        return Err(GateError::SessionNotFound(format!(
            "user {} has no challenge in progress",
            session.user_id
        )));
    }
    if payload.challenge_id != session.current_challenge_id {
        return Err(GateError::SessionNotFound(format!(
            "challenge {} replaced by {}",
            payload.challenge_id, session.current_challenge_id
        )));
    }

    match payload.command() {
        ButtonCommand::Region => {
            let region = payload.target_region();
            if !region.within(session.grid_width, session.grid_height) {
                return Err(GateError::InvalidRegion {
                    x: region.x,
                    y: region.y,
                    width: session.grid_width,
                    height: session.grid_height,
                });
            }
            if session.original_message_id == 0 {
                return Err(GateError::SessionNotFound(
                    "challenge message is gone".into(),
                ));
            }

            let was_selected = payload.is_selected();
            session.toggle_region(region, was_selected);
            let name = region.to_string();
            let text = if was_selected {
                texts::region_unselected(&name)
            } else {
                texts::region_selected(&name)
            };
            Ok(ButtonOutcome::Updated {
                text,
                refresh: true,
            })
        }
        ButtonCommand::Clear => Ok(ButtonOutcome::Updated {
            text: texts::SELECTION_CLEARED.to_string(),
            refresh: session.clear_selection(),
        }),
        ButtonCommand::Change => Ok(ButtonOutcome::Unavailable(texts::CHANGE_UNAVAILABLE)),
        ButtonCommand::Submit => Ok(if session.selection_matches() {
            ButtonOutcome::Passed
        } else {
            ButtonOutcome::Failed
        }),
        ButtonCommand::Unknown(command) => Err(GateError::InvalidCommand(command)),
    }
}

impl VerificationEngine {
    /// Entry point for button clicks in the private chat
    pub async fn handle_callback_query(&self, query: &CallbackQuery) {
        let user_id = query.sender_id;
        if !self.admit_event(user_id, query.is_private()).await {
            return;
        }
        match self.limits.callback.consume(user_id) {
            remaining if remaining < 0 => return,
            0 => {
                self.answer(query.query_id, texts::TOO_MANY_REQUESTS, true).await;
                return;
            }
            _ => {}
        }
        if !query.is_private() {
            tracing::debug!(user_id, chat_id = query.chat_id, "Button pressed outside the private chat");
            self.answer(query.query_id, texts::INVALID_BUTTON, true).await;
            return;
        }

        if let Err(e) = self.process_callback(query).await {
            if e.is_user_facing() {
                tracing::debug!(user_id, error = %e, "Button rejected");
            } else if e.is_retryable() {
                tracing::warn!(user_id, error = %e, "Button handling hit a transient failure");
            } else {
                tracing::error!(user_id, error = %e, "Button handling failed");
            }
            self.answer(query.query_id, alert_text(&e), true).await;
        }
    }

    async fn process_callback(&self, query: &CallbackQuery) -> Result<(), GateError> {
        let payload = ButtonPayload::from_callback_data(&query.data)?;
        let user_id = query.sender_id;

        let _guard = self.locks.acquire(user_id).await;
        let mut session = self
            .repo
            .get_session_or_discard(user_id)
            .await?
            .ok_or_else(|| GateError::SessionNotFound(format!("no session for user {user_id}")))?;

        match evaluate_button(&mut session, &payload)? {
            ButtonOutcome::Unavailable(text) => self.answer(query.query_id, text, true).await,
            ButtonOutcome::Failed => {
                tracing::debug!(
                    user_id,
                    challenge_id = session.current_challenge_id,
                    selected = ?session.selected_region_set,
                    "Wrong answer"
                );
                self.answer(query.query_id, texts::AUTH_FAIL_RETRY, true).await;
            }
            ButtonOutcome::Passed => {
                self.on_authentication_success(&session).await?;
                self.answer(query.query_id, texts::AUTH_PASS, false).await;
            }
            ButtonOutcome::Updated { text, refresh } => {
                self.repo.save_session(&session).await?;
                if refresh {
                    match self.refresh_challenge(&session).await {
                        Err(GateError::ExternalApi(ApiError::NotModified)) => {}
                        other => other?,
                    }
                }
                self.answer(query.query_id, &text, false).await;
            }
        }
        Ok(())
    }

    /// Approve the user after a correct submission.
    ///
    /// Keeps the session when the platform refuses to hide the requester so
    /// the approval can be retried by another administrator.
    pub async fn on_authentication_success(&self, session: &UserAuthSession) -> Result<(), GateError> {
        let user_id = session.user_id;
        let elapsed_secs = (now_millis() - session.auth_start_time).max(0) / 1000;

        self.client
            .send_text(user_id, &texts::auth_passed_in(elapsed_secs), None)
            .await?;
        self.delete_message(user_id, session.original_message_id).await;

        let group = session_group(session);
        if !session.is_self_test() {
            match self.client.process_join_request(group.group_id, user_id, true).await {
                Ok(()) => {}
                Err(ApiError::AlreadyParticipant) => {
                    tracing::debug!(user_id, group_id = group.group_id, "User already a participant");
                }
                Err(ApiError::CannotHideRequester) => {
                    tracing::warn!(user_id, group_id = group.group_id, "Approval refused, requester not hideable");
                    self.audit.record(AuditEvent::new(AuditCategory::HideRequesterMissing, &group, user_id));
                    self.notify(user_id, texts::DENIED_BY_OTHER_ADMIN).await;
                    return Ok(());
                }
                Err(e) => return Err(e.into()),
            }
        }

        self.repo.drop_session(user_id).await?;
        self.timers.cancel(user_id);

        tracing::info!(
            user_id,
            group_id = group.group_id,
            challenge_id = session.current_challenge_id,
            elapsed_secs,
            "Authentication passed"
        );
        if !session.is_self_test() {
            self.notify(user_id, texts::APPROVE_SUCCESS).await;
            self.audit.record(AuditEvent::new(AuditCategory::AuthPassed, &group, user_id));
        }
        Ok(())
    }

    async fn answer(&self, query_id: i64, text: &str, show_alert: bool) {
        if let Err(e) = self.client.answer_callback(query_id, text, show_alert).await {
            tracing::warn!(query_id, error = %e, "Failed to answer callback");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::{Call, Harness};
    use gate_common::{ChallengeSetup, Region, UserInfo};

    fn live_session() -> UserAuthSession {
        let user = UserInfo {
            user_id: 7,
            name: "alice".to_string(),
        };
        let mut session = UserAuthSession::self_test(&user, 0);
        session.begin_challenge(ChallengeSetup {
            challenge_id: 10_001,
            record_id: 1,
            changes_allowed: 2,
            grid_width: 5,
            grid_height: 3,
            chiral_atoms: vec![0, 1],
            correct_region_set: [0x01, 0x10].into_iter().collect(),
            started_at: 0,
        });
        session.original_message_id = 55;
        session
    }

    fn region(x: u8, y: u8, selected: bool) -> ButtonPayload {
        ButtonPayload::for_region(10_001, Region::new(x, y), selected)
    }

    fn action(command: ButtonCommand) -> ButtonPayload {
        ButtonPayload::new(10_001, false, command, 0)
    }

    #[test]
    fn test_toggle_follows_client_flag() {
        let mut session = live_session();

        let outcome = evaluate_button(&mut session, &region(1, 0, false)).unwrap();
        assert_eq!(
            outcome,
            ButtonOutcome::Updated {
                text: texts::region_selected("B1"),
                refresh: true
            }
        );
        assert!(session.selected_region_set.contains(&0x10));

        evaluate_button(&mut session, &region(1, 0, true)).unwrap();
        assert!(session.selected_region_set.is_empty());
    }

    #[test]
    fn test_submit_compares_as_sets() {
        let mut session = live_session();
        evaluate_button(&mut session, &region(1, 0, false)).unwrap();
        evaluate_button(&mut session, &region(0, 1, false)).unwrap();
        assert_eq!(
            evaluate_button(&mut session, &action(ButtonCommand::Submit)).unwrap(),
            ButtonOutcome::Passed
        );

        let mut partial = live_session();
        evaluate_button(&mut partial, &region(0, 1, false)).unwrap();
        assert_eq!(
            evaluate_button(&mut partial, &action(ButtonCommand::Submit)).unwrap(),
            ButtonOutcome::Failed
        );

        evaluate_button(&mut partial, &region(1, 0, false)).unwrap();
        evaluate_button(&mut partial, &region(0, 2, false)).unwrap();
        assert_eq!(
            evaluate_button(&mut partial, &action(ButtonCommand::Submit)).unwrap(),
            ButtonOutcome::Failed
        );
    }

    #[test]
    fn test_clear_refreshes_only_on_change() {
        let mut session = live_session();
        let outcome = evaluate_button(&mut session, &action(ButtonCommand::Clear)).unwrap();
        assert!(matches!(outcome, ButtonOutcome::Updated { refresh: false, .. }));

        evaluate_button(&mut session, &region(2, 2, false)).unwrap();
        let outcome = evaluate_button(&mut session, &action(ButtonCommand::Clear)).unwrap();
        assert!(matches!(outcome, ButtonOutcome::Updated { refresh: true, .. }));
        assert!(session.selected_region_set.is_empty());
    }

    #[test]
    fn test_rejections_leave_session_untouched() {
        let session = live_session();

        let mut scratch = session.clone();
        assert!(matches!(
            evaluate_button(&mut scratch, &region(5, 0, false)),
            Err(GateError::InvalidRegion { x: 5, .. })
        ));
        assert!(matches!(
            evaluate_button(&mut scratch, &ButtonPayload::new(10_001, false, ButtonCommand::Unknown(9), 0)),
            Err(GateError::InvalidCommand(9))
        ));
        assert!(matches!(
            evaluate_button(&mut scratch, &ButtonPayload::for_region(9_999, Region::new(0, 0), false)),
            Err(GateError::SessionNotFound(_))
        ));
        assert_eq!(
            evaluate_button(&mut scratch, &action(ButtonCommand::Change)).unwrap(),
            ButtonOutcome::Unavailable(texts::CHANGE_UNAVAILABLE)
        );
        assert_eq!(scratch, session);

        let mut no_message = session.clone();
        no_message.original_message_id = 0;
        assert!(matches!(
            evaluate_button(&mut no_message, &region(0, 0, false)),
            Err(GateError::SessionNotFound(_))
        ));
    }

    #[test]
    fn test_requested_session_cannot_submit() {
        let user = UserInfo {
            user_id: 7,
            name: "alice".to_string(),
        };
        let mut session = UserAuthSession::self_test(&user, 0);
        assert!(matches!(
            evaluate_button(&mut session, &ButtonPayload::new(0, false, ButtonCommand::Submit, 0)),
            Err(GateError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_click_persists_and_refreshes() {
        let harness = Harness::new().await;
        let session = harness.start_self_test().await;

        harness.click_region(&session, 0x00, false).await;

        let stored = harness.session().await.unwrap();
        assert!(stored.selected_region_set.contains(&0x00));
        let edits = harness.messenger.calls_matching(|c| matches!(c, Call::EditCaption { .. }));
        assert_eq!(edits.len(), 1);
        assert_eq!(harness.messenger.last_answer(), Some((texts::region_selected("A1"), false)));
    }

    #[tokio::test]
    async fn test_not_modified_is_swallowed() {
        let harness = Harness::new().await;
        let session = harness.start_self_test().await;
        harness.messenger.fail_edits_with(ApiError::NotModified);

        harness.click_region(&session, 0x00, false).await;

        assert!(harness.session().await.unwrap().selected_region_set.contains(&0x00));
        assert_eq!(harness.messenger.last_answer(), Some((texts::region_selected("A1"), false)));
    }

    #[tokio::test]
    async fn test_refresh_failure_alerts_but_keeps_selection() {
        let harness = Harness::new().await;
        let session = harness.start_self_test().await;
        harness.messenger.fail_edits_with(ApiError::Other("FLOOD_WAIT".into()));

        harness.click_region(&session, 0x00, false).await;

        assert!(harness.session().await.unwrap().selected_region_set.contains(&0x00));
        assert_eq!(harness.messenger.last_answer(), Some((texts::GENERIC_ERROR.to_string(), true)));
    }

    #[tokio::test]
    async fn test_garbage_payload_alerts() {
        let harness = Harness::new().await;
        harness.start_self_test().await;

        harness
            .engine
            .handle_callback_query(&harness.callback("bm90IDggYnl0ZXM="))
            .await;
        assert_eq!(harness.messenger.last_answer(), Some((texts::INVALID_BUTTON.to_string(), true)));
    }

    #[tokio::test]
    async fn test_already_participant_counts_as_success() {
        let harness = Harness::new().await;
        let session = harness.start_group_challenge().await;
        harness.messenger.fail_join_requests_with(ApiError::AlreadyParticipant);

        harness.engine.on_authentication_success(&session).await.unwrap();

        assert!(harness.session().await.is_none());
        assert!(harness.messenger.sent_texts().contains(&texts::APPROVE_SUCCESS.to_string()));
    }

    #[tokio::test]
    async fn test_hidden_requester_keeps_session() {
        let harness = Harness::new().await;
        let session = harness.start_group_challenge().await;
        harness.messenger.fail_join_requests_with(ApiError::CannotHideRequester);

        harness.engine.on_authentication_success(&session).await.unwrap();

        assert!(harness.session().await.is_some());
        let texts_sent = harness.messenger.sent_texts();
        assert!(texts_sent.contains(&texts::DENIED_BY_OTHER_ADMIN.to_string()));
        assert!(!texts_sent.contains(&texts::APPROVE_SUCCESS.to_string()));
    }

    #[tokio::test]
    async fn test_other_approval_failures_are_raised() {
        let harness = Harness::new().await;
        let session = harness.start_group_challenge().await;
        harness.messenger.fail_join_requests_with(ApiError::Other("CHAT_ADMIN_REQUIRED".into()));

        let result = harness.engine.on_authentication_success(&session).await;
        assert!(matches!(result, Err(GateError::ExternalApi(ApiError::Other(_)))));
        assert!(harness.session().await.is_some());
    }

    #[tokio::test]
    async fn test_click_outside_private_chat_is_refused() {
        let harness = Harness::new().await;
        let session = harness.start_self_test().await;
        let payload = ButtonPayload::for_region(session.current_challenge_id, Region::unpack(0x00), false);
        let mut query = harness.callback(&payload.to_callback_data());
        query.chat_id = -100;

        harness.engine.handle_callback_query(&query).await;

        assert_eq!(harness.session().await.unwrap(), session);
        assert_eq!(harness.messenger.last_answer(), Some((texts::INVALID_BUTTON.to_string(), true)));
    }

    #[tokio::test]
    async fn test_blocked_user_clicks_are_dropped() {
        let harness = Harness::new().await;
        let session = harness.start_self_test().await;
        harness.engine.repository().block_user(harness.user_id).await.unwrap();

        harness.click_region(&session, 0x00, false).await;

        assert_eq!(harness.session().await.unwrap(), session);
        assert!(harness.messenger.last_answer().is_none());
    }
}
