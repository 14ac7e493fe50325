//! Messaging platform client port.

use async_trait::async_trait;
use gate_common::{ApiError, GroupInfo, UserInfo};

/// Platform chat id. A user's private chat shares the user id.
pub type ChatId = i64;

/// Platform message id, unique within a chat
pub type MessageId = i64;

/// Button of an inline keyboard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineButton {
    pub text: String,
    /// Opaque data echoed back on click (base64 of the 8-byte payload)
    pub callback_data: String,
}

/// Inline keyboard attached below a message
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineKeyboard {
    pub rows: Vec<Vec<InlineButton>>,
}

/// A text message addressed to the bot
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub chat_id: ChatId,
    pub message_id: MessageId,
    pub sender: UserInfo,
    pub text: String,
    /// Private chat between the sender and the bot
    pub is_private: bool,
}

/// A click on an inline button
#[derive(Debug, Clone)]
pub struct CallbackQuery {
    pub query_id: i64,
    pub chat_id: ChatId,
    pub sender_id: i64,
    /// Callback data as echoed by the platform
    pub data: String,
}

impl CallbackQuery {
    /// Clicked inside the sender's private chat with the bot
    pub fn is_private(&self) -> bool {
        self.chat_id == self.sender_id
    }
}

/// Operations the verification core needs from the messaging platform
#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Send a text message, returns the new message id
    async fn send_text(
        &self,
        chat_id: ChatId,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, ApiError>;

    /// Send a PNG photo with caption and keyboard, returns the new message id
    async fn send_photo(
        &self,
        chat_id: ChatId,
        png: &[u8],
        caption: &str,
        keyboard: &InlineKeyboard,
        reply_to: Option<MessageId>,
    ) -> Result<MessageId, ApiError>;

    /// Replace caption and keyboard. Fails with `ApiError::NotModified` if
    /// nothing changed.
    async fn edit_message_caption(
        &self,
        chat_id: ChatId,
        message_id: MessageId,
        caption: &str,
        keyboard: &InlineKeyboard,
    ) -> Result<(), ApiError>;

    async fn delete_messages(
        &self,
        chat_id: ChatId,
        message_ids: &[MessageId],
    ) -> Result<(), ApiError>;

    async fn answer_callback(
        &self,
        query_id: i64,
        text: &str,
        show_alert: bool,
    ) -> Result<(), ApiError>;

    /// Approve or deny a pending join request. May fail with
    /// `AlreadyParticipant` or `CannotHideRequester`.
    async fn process_join_request(
        &self,
        group_id: i64,
        user_id: i64,
        approve: bool,
    ) -> Result<(), ApiError>;

    async fn resolve_user(&self, user_id: i64) -> Result<UserInfo, ApiError>;

    async fn resolve_group(&self, group_id: i64) -> Result<GroupInfo, ApiError>;
}
