//! Outbound ports to the collaborators the verification core drives.
//!
//! - Messaging platform (send/edit/delete, join-request processing)
//! - Chemistry toolkit (parse, chirality detection, rendering)
//! - Audit channel (posts through the messaging platform)

mod audit;
mod chemistry;
mod messaging;

pub use audit::{AuditCategory, AuditEvent, ChannelAudit};
pub use chemistry::{ChemistryToolkit, Molecule, RenderRequest, RenderedImage};
pub use messaging::{
    CallbackQuery, ChatId, IncomingMessage, InlineButton, InlineKeyboard, MessageId,
    MessagingClient,
};
