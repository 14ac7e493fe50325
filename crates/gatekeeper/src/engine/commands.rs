//! Private chat commands.

use gate_common::{UserAuthSession, now_millis};

use super::VerificationEngine;
use crate::collaborators::IncomingMessage;
use crate::texts;

/// Commands understood in chats with the bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Help,
    Uptime,
    /// `/cc1`: try a challenge, with or without a pending join request
    SelfTest,
    /// `/ccg`: start the challenge for the pending join request
    Challenge,
    Unknown(String),
}

impl BotCommand {
    /// Parse the leading `/command[@bot]` token; None for plain text
    pub fn parse(text: &str) -> Option<Self> {
        let token = text.trim_start().split_whitespace().next()?;
        let name = token.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);

        Some(match name {
            "help" | "start" => Self::Help,
            "uptime" => Self::Uptime,
            "cc1" => Self::SelfTest,
            "ccg" => Self::Challenge,
            other => Self::Unknown(other.to_string()),
        })
    }
}

impl VerificationEngine {
    /// Entry point for text messages sent to the bot
    pub async fn handle_private_message(&self, message: &IncomingMessage) {
        let Some(command) = BotCommand::parse(&message.text) else {
            return;
        };
        let user_id = message.sender.user_id;
        if user_id <= 0 || !self.admit_event(user_id, message.is_private).await {
            return;
        }

        match self.limits.command.consume(user_id) {
            remaining if remaining < 0 => return,
            0 => {
                self.reply_with_cascade(message.chat_id, message.message_id, texts::TOO_MANY_REQUESTS)
                    .await;
                return;
            }
            _ => {}
        }

        tracing::debug!(user_id, chat_id = message.chat_id, command = ?command, "Command received");

        match command {
            BotCommand::Help => {
                self.reply_with_cascade(message.chat_id, message.message_id, texts::HELP)
                    .await;
            }
            BotCommand::Uptime => {
                let text = texts::uptime(self.started_at.elapsed().as_secs());
                self.reply_with_cascade(message.chat_id, message.message_id, &text)
                    .await;
            }
            BotCommand::SelfTest | BotCommand::Challenge if !message.is_private => {
                self.reply_with_cascade(message.chat_id, message.message_id, texts::PRIVATE_CHAT_ONLY)
                    .await;
            }
            BotCommand::SelfTest => self.handle_start_command(message, true).await,
            BotCommand::Challenge => self.handle_start_command(message, false).await,
            BotCommand::Unknown(_) => {
                self.reply_with_cascade(message.chat_id, message.message_id, texts::UNKNOWN_COMMAND)
                    .await;
            }
        }
    }

    /// `/ccg` and `/cc1`. A self-test creates a session without a target
    /// group when the user has none.
    async fn handle_start_command(&self, message: &IncomingMessage, for_test: bool) {
        let user = &message.sender;
        if self.limits.new_challenge.consume(user.user_id) < 0 {
            self.notify(message.chat_id, texts::TOO_MANY_REQUESTS).await;
            return;
        }

        let _guard = self.locks.acquire(user.user_id).await;
        let existing = match self.repo.get_session_or_discard(user.user_id).await {
            Ok(existing) => existing,
            Err(e) => {
                tracing::error!(user_id = user.user_id, error = %e, "Failed to load session");
                self.notify(message.chat_id, texts::GENERIC_ERROR).await;
                return;
            }
        };

        let pending_group = existing.as_ref().map_or(0, |s| s.target_group_id);
        if !for_test && pending_group == 0 {
            self.notify(message.chat_id, texts::NO_AUTH_REQUIRED).await;
            return;
        }

        let session = existing.unwrap_or_else(|| UserAuthSession::self_test(user, now_millis()));
        self.start_challenge(&session, message.chat_id, Some(message.message_id))
            .await;
    }
}
