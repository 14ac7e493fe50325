//! Challenge generation: candidate draw, chirality, grid mapping, publish.

use std::collections::BTreeSet;

use gate_common::{ChallengeSetup, EnforceMode, GateError, Region, UserAuthSession, now_millis};

use super::VerificationEngine;
use crate::collaborators::{ChatId, MessageId, RenderRequest};
use crate::protocol::challenge_keyboard;
use crate::texts;

/// Grid cell containing pixel `(x, y)` of a `width` x `height` image cut
/// into `columns` x `rows` cells. Points on or past the far edge land in
/// the last cell.
pub fn region_for_point(
    x: f32,
    y: f32,
    width: u32,
    height: u32,
    columns: u8,
    rows: u8,
) -> Result<Region, GateError> {
    if width == 0 || height == 0 || columns == 0 || rows == 0 {
        return Err(GateError::Chemistry(format!(
            "cannot map into a {columns}x{rows} grid over a {width}x{height} image"
        )));
    }

    let cell = |value: f32, extent: u32, count: u8| {
        let size = extent as f32 / f32::from(count);
        let index = (value / size).floor();
        if index.is_nan() || index < 0.0 {
            0
        } else {
            (index as u32).min(u32::from(count) - 1) as u8
        }
    };

    Ok(Region::new(cell(x, width, columns), cell(y, height, rows)))
}

impl VerificationEngine {
    /// Issue a new challenge for `session` in `chat_id`.
    ///
    /// The stored session is only replaced once the challenge message has
    /// been sent; any failure leaves it as it was and tells the user.
    /// Returns true if a challenge was published. The caller holds the
    /// user's lock.
    pub async fn start_challenge(
        &self,
        session: &UserAuthSession,
        chat_id: ChatId,
        reply_to: Option<MessageId>,
    ) -> bool {
        let loading = match self.client.send_text(chat_id, texts::LOADING, reply_to).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(user_id = session.user_id, error = %e, "Failed to send loading message");
                None
            }
        };

        let published = match self.publish_challenge(session, chat_id, reply_to).await {
            Ok(updated) => {
                tracing::info!(
                    user_id = updated.user_id,
                    group_id = updated.target_group_id,
                    challenge_id = updated.current_challenge_id,
                    record_id = updated.current_record_id,
                    regions = updated.correct_region_set.len(),
                    "Challenge issued"
                );
                true
            }
            Err(e) => {
                tracing::error!(
                    user_id = session.user_id,
                    group_id = session.target_group_id,
                    challenge_id = session.current_challenge_id,
                    error = %e,
                    "Failed to create challenge"
                );
                self.notify(chat_id, texts::CHALLENGE_FAILED).await;
                false
            }
        };

        if let Some(loading) = loading {
            self.delete_message(chat_id, loading).await;
        }
        published
    }

    async fn publish_challenge(
        &self,
        session: &UserAuthSession,
        chat_id: ChatId,
        reply_to: Option<MessageId>,
    ) -> Result<UserAuthSession, GateError> {
        let group_config = if session.target_group_id > 0 {
            let group = self.client.resolve_group(session.target_group_id).await?;
            Some(self.repo.get_or_create_group_config(&group).await?)
        } else {
            None
        };
        let with_hint = group_config
            .as_ref()
            .is_some_and(|c| c.enforce_mode == EnforceMode::WithHint);
        let max_duration = group_config
            .as_ref()
            .map(|c| c.auth_procedure_timeout_seconds)
            .unwrap_or(self.repo.group_defaults().auth_procedure_timeout_secs);

        let record_id = self.library.next_random_candidate()?;
        let record = self.library.fetch_record_text(record_id).await?;
        let molecule = self.chemistry.parse(&record)?;
        let chiral_atoms = molecule.chiral_centers()?;
        if chiral_atoms.is_empty() {
            return Err(GateError::Chemistry(format!(
                "compound {record_id} has no chiral centre"
            )));
        }

        let request = RenderRequest {
            size: self.challenge.image_size,
            grid_columns: self.challenge.grid_columns,
            grid_rows: self.challenge.grid_rows,
            draw_grid: true,
            highlighted_atoms: if with_hint { chiral_atoms.clone() } else { Vec::new() },
        };
        let image = molecule.render(&request)?;

        let mut correct_region_set = BTreeSet::new();
        for atom in &chiral_atoms {
            let (x, y) = molecule.atom_coordinate(&request, *atom)?;
            let region = region_for_point(
                x,
                y,
                image.width,
                image.height,
                request.grid_columns,
                request.grid_rows,
            )?;
            correct_region_set.insert(region.pack());
        }

        let challenge_id = self.repo.next_challenge_id().await?;
        let mut updated = session.clone();
        updated.begin_challenge(ChallengeSetup {
            challenge_id,
            record_id,
            changes_allowed: self.challenge.changes_allowed,
            grid_width: request.grid_columns,
            grid_height: request.grid_rows,
            chiral_atoms,
            correct_region_set,
            started_at: now_millis(),
        });

        let caption = texts::challenge_caption(&updated, max_duration);
        let keyboard = challenge_keyboard(&updated);
        updated.original_message_id = self
            .client
            .send_photo(chat_id, &image.png, &caption, &keyboard, reply_to)
            .await?;

        if let Err(e) = self.repo.save_session(&updated).await {
            // The stored session still points at the old challenge
            self.delete_message(chat_id, updated.original_message_id).await;
            return Err(e);
        }
        self.timers.cancel(updated.user_id);

        // Buttons of the replaced challenge would be rejected as stale anyway
        self.delete_message(chat_id, session.original_message_id).await;

        Ok(updated)
    }

    /// Re-render caption and keyboard of the live challenge message
    pub(crate) async fn refresh_challenge(&self, session: &UserAuthSession) -> Result<(), GateError> {
        let max_duration = self.procedure_timeout_secs(session).await;
        let caption = texts::challenge_caption(session, max_duration);
        let keyboard = challenge_keyboard(session);
        self.client
            .edit_message_caption(session.user_id, session.original_message_id, &caption, &keyboard)
            .await?;
        Ok(())
    }
}
