use crate::api::models::{Campaign, CampaignItem, Conversation, Message};
use crate::error::ApiError;

/// Everything that reaches the UI thread: user input from the reader thread
/// and results of async work running on the shared runtime.
#[derive(Debug)]
pub enum UiEvent {
    Input(String),
    InputClosed,
    ConversationsLoaded(Result<Vec<Conversation>, ApiError>),
    /// Tagged with the selection it was requested for; stale tags are dropped.
    MessagesLoaded {
        conversation_id: String,
        generation: u64,
        result: Result<Vec<Message>, ApiError>,
    },
    MessageSent(Result<(), ApiError>),
    CampaignsLoaded(Result<Vec<Campaign>, ApiError>),
    CampaignCreated(Result<Campaign, ApiError>),
    LoggedIn(Result<String, ApiError>),
    CampaignItemsLoaded {
        campaign_name: String,
        result: Result<Vec<CampaignItem>, ApiError>,
    },
}
