use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Conversation {
    pub id: String,
    pub wa_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub last_message_text: Option<String>,
    #[serde(default)]
    pub last_message_at: Option<String>,
    #[serde(default)]
    pub unread_count: u32,
}

impl Conversation {
    /// Display title: the contact name when it is set and non-empty, else the wa_id.
    pub fn title(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.wa_id,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[serde(alias = "inbound")]
    Incoming,
    #[serde(alias = "outbound")]
    Outgoing,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Message {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub conversation_id: Option<String>,
    pub direction: Direction,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub timestamp: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    Pending,
    Running,
    Finished,
    Failed,
    #[serde(other)]
    Unknown,
}

impl CampaignStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Pending => "pending",
            CampaignStatus::Running => "running",
            CampaignStatus::Finished => "finished",
            CampaignStatus::Failed => "failed",
            CampaignStatus::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Campaign {
    pub id: String,
    pub name: String,
    pub status: CampaignStatus,
    #[serde(default)]
    pub sent: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CampaignItemStatus {
    Pending,
    Sent,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CampaignItem {
    pub id: String,
    pub campaign_id: String,
    pub to: String,
    pub status: CampaignItemStatus,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SendTextRequest {
    pub phone_number_id: String,
    pub to: String,
    pub message: String,
}

/// Body of `POST /api/campaigns`. Exactly one of the text / template branches
/// is populated; the other branch is serialized as explicit nulls.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CampaignCreate {
    pub name: String,
    pub phone_number_id: String,
    pub to_numbers: Vec<String>,
    pub message_text: Option<String>,
    pub template_name: Option<String>,
    pub template_language_code: Option<String>,
    pub template_body_params: Option<Vec<String>>,
}

#[derive(Debug, Serialize, Clone)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Parses server timestamps. RFC 3339 values keep their offset; naive
/// ISO values (no offset) are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}
