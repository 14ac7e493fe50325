//! User-visible copy.

use gate_common::UserAuthSession;

pub const BTN_CHANGE: &str = "Change";
pub const BTN_RESET: &str = "Reset";
pub const BTN_SUBMIT: &str = "Submit";

pub const LOADING: &str = "Generating your challenge, please wait...";
pub const CHALLENGE_FAILED: &str = "Failed to create a challenge. Please try again later.";
pub const TOO_MANY_REQUESTS: &str = "Too many requests. Please slow down.";
pub const NO_AUTH_REQUIRED: &str =
    "You have no pending join request. Send /cc1 if you want to try a challenge anyway.";
pub const SELECTION_CLEARED: &str = "Selection cleared";
pub const CHANGE_UNAVAILABLE: &str = "Changing the challenge is not available yet.";
pub const AUTH_PASS: &str = "Correct!";
pub const AUTH_FAIL_RETRY: &str =
    "Wrong answer. Check the highlighted regions and submit again.";
pub const APPROVE_SUCCESS: &str = "Your join request has been approved.";
pub const DENIED_BY_OTHER_ADMIN: &str = "You passed, but the bot could not approve your request. \
     An administrator of the group has to approve it manually.";
pub const SESSION_NOT_FOUND: &str = "This challenge has expired. Send /ccg to start a new one.";
pub const INVALID_BUTTON: &str = "Invalid button.";
pub const GENERIC_ERROR: &str = "Something went wrong. Please try again later.";
pub const UNKNOWN_COMMAND: &str = "Unknown command.";
pub const PRIVATE_CHAT_ONLY: &str = "This command can only be used in a private chat with the bot.";
pub const HELP: &str = "This bot verifies join requests with a chemistry puzzle.\n\n\
     /ccg - start the challenge for your pending join request\n\
     /cc1 - try a challenge without joining anything\n\
     /uptime - show how long the bot has been running";

pub fn region_selected(name: &str) -> String {
    format!("Selected {name}")
}

pub fn region_unselected(name: &str) -> String {
    format!("Unselected {name}")
}

pub fn join_notice(user_name: &str, group_name: &str) -> String {
    format!(
        "Hi {user_name}, you asked to join {group_name}. \
         Send /ccg to start the verification challenge."
    )
}

pub fn auth_passed_in(seconds: i64) -> String {
    format!("Verification passed in {seconds}s.")
}

pub fn approved_manually(group_name: &str) -> String {
    format!("An administrator of {group_name} approved your join request.")
}

pub fn banned_manually(group_name: &str) -> String {
    format!("An administrator of {group_name} denied your join request.")
}

/// Caption of the challenge photo, re-rendered after every selection change
pub fn challenge_caption(session: &UserAuthSession, max_duration_secs: u32) -> String {
    let selected = session.selected_region_names();
    let selected = if selected.is_empty() {
        "none".to_string()
    } else {
        selected.join(", ")
    };
    format!(
        "{name}, select every grid cell that contains a chiral centre, then press Submit. \
         You have {max_duration_secs} seconds.\n\
         The request is denied when time runs out.\n\
         Changes left: {changes}\n\
         Cells to find: {regions}\n\
         Selected: {selected}",
        name = session.user_nick,
        changes = session.changes_allowed,
        regions = session.correct_region_set.len(),
    )
}

pub fn uptime(total_secs: u64) -> String {
    let days = total_secs / 86_400;
    let hours = (total_secs / 3_600) % 24;
    let minutes = (total_secs / 60) % 60;
    let seconds = total_secs % 60;

    let mut out = String::from("Uptime: ");
    if days > 0 {
        out.push_str(&format!("{days}d "));
    }
    if hours > 0 {
        out.push_str(&format!("{hours}h "));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m "));
    }
    out.push_str(&format!("{seconds}s"));
    out
}
