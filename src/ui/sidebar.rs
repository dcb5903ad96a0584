use crate::state::ClientState;
use crate::ui::view::Pane;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationRow {
    /// 1-based position in the displayed (filtered) list; what `/open n` takes.
    pub index: usize,
    pub id: String,
    pub title: String,
    pub preview: String,
    pub unread: u32,
    pub selected: bool,
}

pub fn conversation_rows(state: &ClientState) -> Vec<ConversationRow> {
    let selected = state.selected_id();
    state
        .visible_conversations()
        .into_iter()
        .enumerate()
        .map(|(i, conv)| ConversationRow {
            index: i + 1,
            id: conv.id.clone(),
            title: conv.title().to_string(),
            preview: conv.last_message_text.clone().unwrap_or_default(),
            unread: conv.unread_count,
            selected: selected == Some(conv.id.as_str()),
        })
        .collect()
}

/// Resolves `/open` arguments: a 1-based index into the displayed list, or a
/// conversation id.
pub fn resolve(state: &ClientState, arg: &str) -> Option<String> {
    let arg = arg.trim();
    let rows = conversation_rows(state);
    if let Ok(n) = arg.parse::<usize>() {
        if let Some(row) = rows.iter().find(|r| r.index == n) {
            return Some(row.id.clone());
        }
    }
    state.conversations().iter().find(|c| c.id == arg).map(|c| c.id.clone())
}

pub fn conversations_pane(state: &ClientState) -> Pane {
    let mut pane = match state.search_term() {
        "" => Pane::new("Conversations"),
        term => Pane::new(format!("Conversations matching \"{}\"", term)),
    };
    for row in conversation_rows(state) {
        let marker = if row.selected { '>' } else { ' ' };
        let badge = if row.unread > 0 { format!(" ({})", row.unread) } else { String::new() };
        pane.push(format!("{}{:>3}. {}{}", marker, row.index, row.title, badge));
        if !row.preview.is_empty() {
            pane.push(format!("       {}", row.preview));
        }
    }
    pane
}
