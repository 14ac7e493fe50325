//! Audit channel: one post per noteworthy join-request event.

use std::sync::Arc;

use gate_common::GroupInfo;

use super::messaging::{ChatId, MessagingClient};

/// Audit entry categories (used as hashtags in the channel)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditCategory {
    JoinRequest,
    AutoApprove,
    StartAuthTimeout,
    HideRequesterMissing,
    AuthPassed,
    Approve,
    Dismiss,
}

impl AuditCategory {
    pub fn tag(&self) -> &'static str {
        match self {
            Self::JoinRequest => "JOIN_REQUEST",
            Self::AutoApprove => "AUTO_APPROVE",
            Self::StartAuthTimeout => "AUTH_TIMEOUT_START",
            Self::HideRequesterMissing => "HIDE_REQUESTER_MISSING",
            Self::AuthPassed => "AUTH_PASSED",
            Self::Approve => "APPROVE",
            Self::Dismiss => "DISMISS",
        }
    }
}

/// A single audit entry
#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub category: AuditCategory,
    pub group: GroupInfo,
    pub user_id: i64,
    /// Acting administrator, 0 when the bot acted on its own
    pub admin_id: i64,
}

impl AuditEvent {
    pub fn new(category: AuditCategory, group: &GroupInfo, user_id: i64) -> Self {
        Self {
            category,
            group: group.clone(),
            user_id,
            admin_id: 0,
        }
    }

    pub fn by_admin(mut self, admin_id: i64) -> Self {
        self.admin_id = admin_id;
        self
    }

    /// Channel post body
    pub fn render(&self) -> String {
        let mut body = format!(
            "#{}\nGroup: {} [{}]\n",
            self.category.tag(),
            self.group.name,
            self.group.group_id
        );
        if self.admin_id != 0 {
            body.push_str(&format!("Admin: [{}]\n", self.admin_id));
        }
        if self.user_id != 0 {
            body.push_str(&format!("User: [{}]\n", self.user_id));
        }
        body
    }
}

/// Posts audit entries to a channel, fire-and-forget
pub struct ChannelAudit {
    client: Arc<dyn MessagingClient>,
    /// 0 disables channel posts; entries are still traced
    channel_id: ChatId,
}

impl ChannelAudit {
    pub fn new(client: Arc<dyn MessagingClient>, channel_id: ChatId) -> Self {
        Self { client, channel_id }
    }

    pub fn record(&self, event: AuditEvent) {
        tracing::info!(
            category = event.category.tag(),
            group_id = event.group.group_id,
            user_id = event.user_id,
            admin_id = event.admin_id,
            "Audit event"
        );

        if self.channel_id == 0 {
            return;
        }

        let client = self.client.clone();
        let channel_id = self.channel_id;
        tokio::spawn(async move {
            if let Err(e) = client.send_text(channel_id, &event.render(), None).await {
                tracing::warn!(
                    channel_id = channel_id,
                    category = event.category.tag(),
                    error = %e,
                    "Failed to post audit entry"
                );
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_audit_entry() {
        let group = GroupInfo {
            group_id: 77,
            name: "Organic".to_string(),
        };
        let text = AuditEvent::new(AuditCategory::Approve, &group, 5)
            .by_admin(9)
            .render();
        assert_eq!(text, "#APPROVE\nGroup: Organic [77]\nAdmin: [9]\nUser: [5]\n");

        let text = AuditEvent::new(AuditCategory::JoinRequest, &group, 5).render();
        assert!(!text.contains("Admin"));
    }
}
