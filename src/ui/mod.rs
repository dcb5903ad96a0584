pub mod campaigns;
pub mod chat_view;
pub mod login;
pub mod main_window;
pub mod sidebar;
pub mod view;

use crate::error::ApiError;

/// Something the user has to see before the next prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Alert(String),
    SessionExpired,
}

/// Maps a background failure. Only auth failures surface; everything else is
/// logged and dropped.
pub(crate) fn background_failure(what: &str, err: ApiError) -> Option<Notice> {
    if err.is_unauthorized() {
        return Some(Notice::SessionExpired);
    }
    log::debug!("{} failed: {}", what, err);
    None
}
