use crate::api::models::{Conversation, Message};

/// A message fetch request: the conversation and the selection generation it
/// was issued under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTicket {
    pub conversation_id: String,
    pub generation: u64,
}

/// Chat-side client state. Lists are only ever replaced wholesale with the
/// last successful fetch. A list restored from the cache is shown but is not
/// a send destination until a live fetch replaces it.
#[derive(Debug, Default)]
pub struct ClientState {
    conversations: Vec<Conversation>,
    live: bool,
    messages: Vec<Message>,
    selected: Option<String>,
    generation: u64,
    search: String,
}

impl ClientState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn selected_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn selected(&self) -> Option<&Conversation> {
        let id = self.selected.as_deref()?;
        self.conversations.iter().find(|c| c.id == id)
    }

    pub fn search_term(&self) -> &str {
        &self.search
    }

    /// The term is matched as typed, surrounding spaces included.
    pub fn set_search(&mut self, term: &str) {
        self.search = term.to_string();
    }

    pub fn replace_conversations(&mut self, list: Vec<Conversation>) {
        self.conversations = list;
        self.live = true;
    }

    /// Shows a list from a previous session until the first fetch lands.
    pub fn restore_conversations(&mut self, list: Vec<Conversation>) {
        self.conversations = list;
        self.live = false;
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Forgets lists and selection, e.g. after switching accounts. The
    /// generation keeps counting so in-flight fetches stay stale.
    pub fn reset(&mut self) {
        self.conversations.clear();
        self.live = false;
        self.messages.clear();
        self.selected = None;
        self.generation += 1;
    }

    /// Conversations matching the current search term, in fetch order.
    pub fn visible_conversations(&self) -> Vec<&Conversation> {
        filter_conversations(&self.conversations, &self.search)
    }

    /// Selects `id`, bumps the generation and clears the previous thread.
    /// Returns the ticket the message fetch must carry.
    pub fn select(&mut self, id: &str) -> MessageTicket {
        self.selected = Some(id.to_string());
        self.generation += 1;
        self.messages.clear();
        MessageTicket { conversation_id: id.to_string(), generation: self.generation }
    }

    /// Ticket for re-fetching the current selection without superseding it.
    pub fn current_ticket(&self) -> Option<MessageTicket> {
        self.selected.as_ref().map(|id| MessageTicket {
            conversation_id: id.clone(),
            generation: self.generation,
        })
    }

    /// Applies a message list if it belongs to the current selection.
    /// Returns false (and leaves state untouched) for superseded results.
    pub fn accept_messages(&mut self, ticket: &MessageTicket, messages: Vec<Message>) -> bool {
        if ticket.generation != self.generation
            || self.selected.as_deref() != Some(ticket.conversation_id.as_str())
        {
            return false;
        }
        self.messages = messages;
        true
    }

    /// Destination wa_id of the selected conversation, if it is in a list
    /// fetched during this session.
    pub fn destination(&self) -> Option<&str> {
        if !self.live {
            return None;
        }
        self.selected().map(|c| c.wa_id.as_str())
    }
}

/// Case-insensitive substring match over name and wa_id.
pub fn filter_conversations<'a>(list: &'a [Conversation], term: &str) -> Vec<&'a Conversation> {
    let term = term.to_lowercase();
    list.iter()
        .filter(|c| {
            term.is_empty()
                || c.name.as_deref().unwrap_or("").to_lowercase().contains(&term)
                || c.wa_id.to_lowercase().contains(&term)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::Direction;

    fn conv(id: &str, name: Option<&str>, wa_id: &str) -> Conversation {
        Conversation {
            id: id.into(),
            wa_id: wa_id.into(),
            name: name.map(Into::into),
            last_message_text: None,
            last_message_at: None,
            unread_count: 0,
        }
    }

    fn msg(text: &str) -> Message {
        Message {
            id: None,
            conversation_id: None,
            direction: Direction::Incoming,
            kind: None,
            text: Some(text.into()),
            status: None,
            timestamp: "2024-01-01T00:00:00".into(),
        }
    }

    #[test]
    fn filter_matches_name_or_wa_id_case_insensitively() {
        let list = vec![
            conv("1", Some("Maria Souza"), "5511900000001"),
            conv("2", None, "5521988887777"),
            conv("3", Some("JOÃO"), "5531977776666"),
        ];
        let ids = |found: Vec<&Conversation>| found.iter().map(|c| c.id.clone()).collect::<Vec<_>>();
        assert_eq!(ids(filter_conversations(&list, "maria")), vec!["1"]);
        assert_eq!(ids(filter_conversations(&list, "8888")), vec!["2"]);
        assert_eq!(ids(filter_conversations(&list, "joão")), vec!["3"]);
        assert_eq!(ids(filter_conversations(&list, "55")), vec!["1", "2", "3"]);
        assert_eq!(filter_conversations(&list, "").len(), 3);
        assert!(filter_conversations(&list, "zzz").is_empty());
    }

    #[test]
    fn superseded_message_results_are_dropped() {
        let mut state = ClientState::new();
        state.replace_conversations(vec![conv("a", Some("A"), "1"), conv("b", Some("B"), "2")]);
        let first = state.select("a");
        let second = state.select("b");

        assert!(!state.accept_messages(&first, vec![msg("from a")]));
        assert!(state.messages().is_empty());
        assert!(state.accept_messages(&second, vec![msg("from b")]));
        assert_eq!(state.messages()[0].text.as_deref(), Some("from b"));
        assert_eq!(state.selected().map(Conversation::title), Some("B"));
    }

    #[test]
    fn polling_ticket_keeps_generation() {
        let mut state = ClientState::new();
        assert_eq!(state.current_ticket(), None);
        let ticket = state.select("a");
        assert_eq!(state.current_ticket(), Some(ticket.clone()));
        assert!(state.accept_messages(&ticket, vec![msg("x")]));
    }

    #[test]
    fn destination_requires_loaded_conversation() {
        let mut state = ClientState::new();
        state.select("gone");
        assert_eq!(state.destination(), None);
        state.replace_conversations(vec![conv("gone", None, "5511")]);
        assert_eq!(state.destination(), Some("5511"));
    }

    #[test]
    fn visible_list_follows_search_and_replacement() {
        let mut state = ClientState::new();
        state.replace_conversations(vec![conv("1", Some("Ana"), "1"), conv("2", Some("Bia"), "2")]);
        state.set_search("an");
        assert_eq!(state.visible_conversations().len(), 1);
        state.replace_conversations(vec![conv("3", Some("Anabel"), "3")]);
        assert_eq!(state.visible_conversations()[0].id, "3");
    }

    #[test]
    fn search_term_keeps_surrounding_spaces() {
        let mut state = ClientState::new();
        state.replace_conversations(vec![
            conv("1", Some("Ana Lima"), "5511"),
            conv("2", Some("Bia"), "5521"),
        ]);
        state.set_search(" 55");
        assert_eq!(state.search_term(), " 55");
        assert!(state.visible_conversations().is_empty());
        state.set_search(" lima");
        assert_eq!(state.visible_conversations()[0].id, "1");
    }

    #[test]
    fn restored_list_is_not_a_send_destination() {
        let mut state = ClientState::new();
        state.restore_conversations(vec![conv("a", None, "5599")]);
        state.select("a");
        assert!(!state.is_live());
        assert_eq!(state.selected().map(|c| c.wa_id.as_str()), Some("5599"));
        assert_eq!(state.destination(), None);

        state.replace_conversations(vec![conv("a", None, "5511")]);
        assert_eq!(state.destination(), Some("5511"));
    }

    #[test]
    fn reset_drops_selection_and_invalidates_tickets() {
        let mut state = ClientState::new();
        state.replace_conversations(vec![conv("a", None, "1")]);
        let ticket = state.select("a");
        state.reset();
        assert!(state.conversations().is_empty());
        assert_eq!(state.selected_id(), None);
        assert!(!state.accept_messages(&ticket, vec![msg("late")]));
    }
}
