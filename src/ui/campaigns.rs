use chrono::TimeZone;
use std::sync::mpsc::Sender;
use tokio::runtime::Handle;

use crate::api::client::ApiClient;
use crate::api::events::UiEvent;
use crate::api::models::{Campaign, CampaignItem, CampaignItemStatus, parse_timestamp};
use crate::error::ApiError;
use crate::forms::{CampaignForm, CampaignMode, ValidationError};
use crate::scheduler::Poller;
use crate::ui::view::Pane;
use crate::ui::{Notice, background_failure};
use crate::utils::run_async_to_main;

pub fn format_created<Tz: TimeZone>(raw: Option<&str>, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    raw.and_then(parse_timestamp)
        .map(|ts| ts.with_timezone(tz).format("%d/%m/%Y %H:%M:%S").to_string())
        .unwrap_or_default()
}

pub fn campaign_line<Tz: TimeZone>(c: &Campaign, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{} - {} | Sent: {}/{} | Failed: {} | Created: {}",
        c.name,
        c.status.as_str(),
        c.sent,
        c.total,
        c.failed,
        format_created(c.created_at.as_deref(), tz)
    )
    .trim_end()
    .to_string()
}

pub fn campaigns_pane<Tz: TimeZone>(list: &[Campaign], tz: &Tz) -> Pane
where
    Tz::Offset: std::fmt::Display,
{
    let mut pane = Pane::new("Campaigns");
    for (i, c) in list.iter().enumerate() {
        pane.push(format!("{:>3}. {}", i + 1, campaign_line(c, tz)));
    }
    pane
}

pub fn items_pane(campaign_name: &str, items: &[CampaignItem]) -> Pane {
    let mut pane = Pane::new(format!("Recipients of {}", campaign_name));
    for item in items {
        let status = match item.status {
            CampaignItemStatus::Pending => "pending",
            CampaignItemStatus::Sent => "sent",
            CampaignItemStatus::Failed => "failed",
            CampaignItemStatus::Unknown => "unknown",
        };
        match &item.error_message {
            Some(err) => pane.push(format!("  {} {} ({})", item.to, status, err)),
            None => pane.push(format!("  {} {}", item.to, status)),
        }
    }
    pane
}

/// Only the section for the active mode is shown.
pub fn form_pane(form: &CampaignForm) -> Pane {
    let mut pane = Pane::new(format!("New campaign ({} mode)", form.mode.as_str()));
    pane.push(format!("  name:    {}", form.name));
    pane.push(format!("  phone:   {}", form.phone_number_id));
    pane.push(format!("  numbers: {} recipient(s)", crate::forms::split_lines(&form.numbers).len()));
    match form.mode {
        CampaignMode::Text => pane.push(format!("  message: {}", form.message)),
        CampaignMode::Template => {
            pane.push(format!("  template: {}", form.template_name));
            pane.push(format!("  lang:     {}", form.template_language));
            let params = crate::forms::split_lines(&form.template_params);
            pane.push(format!("  params:   [{}]", params.join(", ")));
        }
    }
    pane
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Name,
    Phone,
    Numbers,
    Message,
    Template,
    Language,
    Params,
}

impl FormField {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "name" => Some(FormField::Name),
            "phone" | "phone_number_id" => Some(FormField::Phone),
            "numbers" | "to" => Some(FormField::Numbers),
            "message" | "text" => Some(FormField::Message),
            "template" => Some(FormField::Template),
            "lang" | "language" => Some(FormField::Language),
            "params" => Some(FormField::Params),
            _ => None,
        }
    }

    pub fn is_multiline(&self) -> bool {
        matches!(self, FormField::Numbers | FormField::Params)
    }
}

/// Create-campaign form and the campaign status list.
pub struct CampaignController {
    client: ApiClient,
    rt: Handle,
    tx: Sender<UiEvent>,
    pub form: CampaignForm,
    pub campaigns: Vec<Campaign>,
    pub items: Option<(String, Vec<CampaignItem>)>,
}

impl CampaignController {
    pub fn new(client: ApiClient, rt: Handle, tx: Sender<UiEvent>) -> Self {
        Self {
            client,
            rt,
            tx,
            form: CampaignForm::default(),
            campaigns: Vec::new(),
            items: None,
        }
    }

    pub fn set_client(&mut self, client: ApiClient) {
        self.client = client;
    }

    pub fn set_mode(&mut self, mode: CampaignMode) {
        self.form.mode = mode;
    }

    pub fn set_field(&mut self, field: FormField, value: &str) {
        let slot = match field {
            FormField::Name => &mut self.form.name,
            FormField::Phone => &mut self.form.phone_number_id,
            FormField::Numbers => &mut self.form.numbers,
            FormField::Message => &mut self.form.message,
            FormField::Template => &mut self.form.template_name,
            FormField::Language => &mut self.form.template_language,
            FormField::Params => &mut self.form.template_params,
        };
        *slot = value.to_string();
    }

    /// Validates the form and posts it. Nothing is sent on a validation error.
    pub fn start(&self) -> Result<(), ValidationError> {
        let body = self.form.to_request()?;
        let client = self.client.clone();
        run_async_to_main(&self.rt, &self.tx, async move {
            UiEvent::CampaignCreated(client.create_campaign(&body).await)
        });
        Ok(())
    }

    pub fn load_campaigns(&self) {
        let client = self.client.clone();
        run_async_to_main(&self.rt, &self.tx, async move {
            UiEvent::CampaignsLoaded(client.campaigns().await)
        });
    }

    /// Loads recipients of the `n`-th (1-based) listed campaign.
    pub fn load_items(&self, n: usize) -> bool {
        let Some(campaign) = n.checked_sub(1).and_then(|i| self.campaigns.get(i)) else {
            return false;
        };
        let client = self.client.clone();
        let id = campaign.id.clone();
        let campaign_name = campaign.name.clone();
        run_async_to_main(&self.rt, &self.tx, async move {
            let result = client.campaign_items(&id).await;
            UiEvent::CampaignItemsLoaded { campaign_name, result }
        });
        true
    }

    pub fn on_created(&mut self, result: Result<Campaign, ApiError>) -> Option<Notice> {
        match result {
            Ok(campaign) => {
                log::info!("campaign {} created with {} recipient(s)", campaign.id, campaign.total);
                self.load_campaigns();
                None
            }
            Err(ApiError::Unauthorized) => Some(Notice::SessionExpired),
            Err(e) => Some(Notice::Alert(format!("Error creating campaign: {}", e))),
        }
    }

    pub fn on_campaigns(&mut self, result: Result<Vec<Campaign>, ApiError>) -> Option<Notice> {
        match result {
            Ok(list) => {
                self.campaigns = list;
                None
            }
            Err(e) => background_failure("loading campaigns", e),
        }
    }

    pub fn on_items(
        &mut self,
        campaign_name: String,
        result: Result<Vec<CampaignItem>, ApiError>,
    ) -> Option<Notice> {
        match result {
            Ok(items) => {
                self.items = Some((campaign_name, items));
                None
            }
            Err(ApiError::Unauthorized) => Some(Notice::SessionExpired),
            Err(e) => Some(Notice::Alert(format!("Error loading recipients: {}", e))),
        }
    }

    /// Refreshes the status list every `period`, whichever tab is showing.
    pub fn start_polling(&self, period: std::time::Duration) -> Poller {
        let client = self.client.clone();
        let tx = self.tx.clone();
        Poller::spawn(&self.rt, "campaigns", period, move || {
            let client = client.clone();
            let tx = tx.clone();
            async move {
                let _ = tx.send(UiEvent::CampaignsLoaded(client.campaigns().await));
            }
        })
    }
}
