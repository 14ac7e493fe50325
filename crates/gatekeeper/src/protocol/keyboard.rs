//! Inline keyboard for a live challenge.

use gate_common::{Region, UserAuthSession};

use super::codec::{ButtonCommand, ButtonPayload};
use crate::collaborators::{InlineButton, InlineKeyboard};
use crate::texts;

/// Build the grid keyboard plus the action row for `session`.
///
/// One row per grid row; selected cells are labelled `[A1]`.
pub fn challenge_keyboard(session: &UserAuthSession) -> InlineKeyboard {
    let challenge_id = session.current_challenge_id;
    let mut rows = Vec::with_capacity(session.grid_height as usize + 1);

    for y in 0..session.grid_height {
        let row = (0..session.grid_width)
            .map(|x| {
                let region = Region::new(x, y);
                let selected = session.selected_region_set.contains(&region.pack());
                let label = if selected {
                    format!("[{region}]")
                } else {
                    region.to_string()
                };
                InlineButton {
                    text: label,
                    callback_data: ButtonPayload::for_region(challenge_id, region, selected)
                        .to_callback_data(),
                }
            })
            .collect();
        rows.push(row);
    }

    let actions = [
        (texts::BTN_CHANGE, ButtonCommand::Change),
        (texts::BTN_RESET, ButtonCommand::Clear),
        (texts::BTN_SUBMIT, ButtonCommand::Submit),
    ];
    rows.push(
        actions
            .iter()
            .map(|(label, command)| InlineButton {
                text: label.to_string(),
                callback_data: ButtonPayload::new(challenge_id, false, *command, 0)
                    .to_callback_data(),
            })
            .collect(),
    );

    InlineKeyboard { rows }
}
