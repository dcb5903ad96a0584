use chrono::TimeZone;
use std::sync::mpsc::Sender;
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::api::client::ApiClient;
use crate::api::events::UiEvent;
use crate::api::models::{Conversation, Direction, Message, parse_timestamp};
use crate::error::ApiError;
use crate::forms::{TextMessageForm, ValidationError};
use crate::scheduler::{Poller, TaskSlot};
use crate::state::{ClientState, MessageTicket};
use crate::ui::view::Pane;
use crate::ui::{Notice, background_failure};
use crate::utils::run_async_to_main;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatHeader {
    pub name: String,
    pub info: String,
}

impl ChatHeader {
    pub fn of(conv: &Conversation) -> Self {
        Self { name: conv.title().to_string(), info: conv.wa_id.clone() }
    }
}

pub fn format_clock<Tz: TimeZone>(raw: &str, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match parse_timestamp(raw) {
        Some(ts) => ts.with_timezone(tz).format("%H:%M").to_string(),
        None => String::new(),
    }
}

pub fn message_line<Tz: TimeZone>(msg: &Message, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let marker = match msg.direction {
        Direction::Incoming => "<<",
        Direction::Outgoing => ">>",
        Direction::Unknown => "--",
    };
    let text = msg.text.as_deref().unwrap_or("");
    format!("{} [{}] {}", marker, format_clock(&msg.timestamp, tz), text)
}

pub fn chat_pane<Tz: TimeZone>(state: &ClientState, draft: &str, tz: &Tz) -> Pane
where
    Tz::Offset: std::fmt::Display,
{
    let Some(id) = state.selected_id() else {
        let mut pane = Pane::new("Chat");
        pane.push("No conversation selected. Use /open <n>.");
        return pane;
    };
    // Keep the header on the selection even if the last poll no longer lists it.
    let header = state
        .selected()
        .map(ChatHeader::of)
        .unwrap_or_else(|| ChatHeader { name: id.to_string(), info: String::new() });
    let mut pane = Pane::new(format!("{} {}", header.name, header.info).trim_end().to_string());
    for msg in state.messages() {
        pane.push(message_line(msg, tz));
    }
    if !draft.is_empty() {
        pane.push(format!("   draft: {}", draft));
    }
    pane
}

/// Conversation list, selected thread and the send flow.
pub struct ChatController {
    client: ApiClient,
    rt: Handle,
    tx: Sender<UiEvent>,
    pub state: ClientState,
    pub form: TextMessageForm,
    messages_fetch: TaskSlot,
    selection: watch::Sender<Option<MessageTicket>>,
}

impl ChatController {
    pub fn new(client: ApiClient, rt: Handle, tx: Sender<UiEvent>) -> Self {
        let (selection, _) = watch::channel(None);
        Self {
            client,
            rt,
            tx,
            state: ClientState::new(),
            form: TextMessageForm::default(),
            messages_fetch: TaskSlot::default(),
            selection,
        }
    }

    pub fn set_client(&mut self, client: ApiClient) {
        self.client = client;
    }

    pub fn load_conversations(&self) {
        let client = self.client.clone();
        run_async_to_main(&self.rt, &self.tx, async move {
            UiEvent::ConversationsLoaded(client.conversations().await)
        });
    }

    fn load_messages(&mut self, ticket: MessageTicket) {
        let client = self.client.clone();
        let handle = run_async_to_main(&self.rt, &self.tx, async move {
            let result = client.messages(&ticket.conversation_id).await;
            UiEvent::MessagesLoaded {
                conversation_id: ticket.conversation_id,
                generation: ticket.generation,
                result,
            }
        });
        self.messages_fetch.replace(handle);
    }

    /// Switches the thread. Any fetch for the previous selection is aborted
    /// and its late results are ignored.
    pub fn select(&mut self, id: &str) -> Option<ChatHeader> {
        let ticket = self.state.select(id);
        self.selection.send_replace(Some(ticket.clone()));
        self.load_messages(ticket);
        self.state.selected().map(ChatHeader::of)
    }

    pub fn refresh(&mut self) {
        self.load_conversations();
        if let Some(ticket) = self.state.current_ticket() {
            self.load_messages(ticket);
        }
    }

    /// Validates and posts the draft. Returns `Ok(false)` without sending when the
    /// selected conversation is no longer in the loaded list. A list restored
    /// from the cache never yields a destination.
    pub fn send(&mut self, text: &str) -> Result<bool, ValidationError> {
        if self.state.selected_id().is_none() {
            return Err(ValidationError::NoConversationSelected);
        }
        self.form.message = text.to_string();
        let to = self.state.destination().map(str::to_string);
        let body = self.form.to_request(to.as_deref().unwrap_or_default())?;
        if !self.state.is_live() {
            return Err(ValidationError::ConversationsNotLoaded);
        }
        if to.is_none() {
            log::debug!("selected conversation is not loaded, not sending");
            return Ok(false);
        }
        let client = self.client.clone();
        run_async_to_main(&self.rt, &self.tx, async move {
            UiEvent::MessageSent(client.send_text(&body).await)
        });
        Ok(true)
    }

    pub fn on_conversations(&mut self, result: Result<Vec<Conversation>, ApiError>) -> Option<Notice> {
        match result {
            Ok(list) => {
                self.state.replace_conversations(list);
                None
            }
            Err(e) => background_failure("loading conversations", e),
        }
    }

    pub fn on_messages(
        &mut self,
        conversation_id: String,
        generation: u64,
        result: Result<Vec<Message>, ApiError>,
    ) -> Option<Notice> {
        let ticket = MessageTicket { conversation_id, generation };
        match result {
            Ok(list) => {
                if !self.state.accept_messages(&ticket, list) {
                    log::debug!("dropping stale messages for {}", ticket.conversation_id);
                }
                None
            }
            Err(e) => background_failure("loading messages", e),
        }
    }

    pub fn on_sent(&mut self, result: Result<(), ApiError>) -> Option<Notice> {
        match result {
            Ok(()) => {
                self.form.message.clear();
                self.refresh();
                None
            }
            Err(ApiError::Unauthorized) => Some(Notice::SessionExpired),
            Err(e) => Some(Notice::Alert(format!("Error sending message: {}", e))),
        }
    }

    /// Every `period`: conversations, then the selected thread if any.
    pub fn start_polling(&self, period: std::time::Duration) -> Poller {
        let client = self.client.clone();
        let tx = self.tx.clone();
        let selection = self.selection.subscribe();
        Poller::spawn(&self.rt, "chat", period, move || {
            let client = client.clone();
            let tx = tx.clone();
            let ticket = selection.borrow().clone();
            async move {
                let _ = tx.send(UiEvent::ConversationsLoaded(client.conversations().await));
                if let Some(ticket) = ticket {
                    let result = client.messages(&ticket.conversation_id).await;
                    let _ = tx.send(UiEvent::MessagesLoaded {
                        conversation_id: ticket.conversation_id,
                        generation: ticket.generation,
                        result,
                    });
                }
            }
        })
    }
}
