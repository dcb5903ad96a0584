//! Pure parsing and validation for the two outbound forms. Nothing here
//! touches the network; a form either yields a request body or the first
//! missing field.

use thiserror::Error;

use crate::api::models::{CampaignCreate, SendTextRequest};

pub const DEFAULT_TEMPLATE_LANGUAGE: &str = "pt_BR";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Select a conversation first.")]
    NoConversationSelected,
    #[error("Type the message and the PHONE_NUMBER_ID.")]
    MissingMessageOrPhone,
    #[error("Fill in name, PHONE_NUMBER_ID and the numbers.")]
    MissingCampaignBasics,
    #[error("Type the text message.")]
    MissingCampaignMessage,
    #[error("Type the template name.")]
    MissingTemplateName,
    #[error("Conversations are still loading. Try again in a moment.")]
    ConversationsNotLoaded,
}

/// Splits newline-delimited input into trimmed, non-blank lines, in order.
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextMessageForm {
    pub message: String,
    pub phone_number_id: String,
}

impl TextMessageForm {
    /// Builds the send body for destination `to`. Text and phone-number-id
    /// are trimmed and must both be non-empty.
    pub fn to_request(&self, to: &str) -> Result<SendTextRequest, ValidationError> {
        let message = self.message.trim();
        let phone_number_id = self.phone_number_id.trim();
        if message.is_empty() || phone_number_id.is_empty() {
            return Err(ValidationError::MissingMessageOrPhone);
        }
        Ok(SendTextRequest {
            phone_number_id: phone_number_id.to_string(),
            to: to.to_string(),
            message: message.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CampaignMode {
    #[default]
    Text,
    Template,
}

impl CampaignMode {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Some(CampaignMode::Text),
            "template" => Some(CampaignMode::Template),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignMode::Text => "text",
            CampaignMode::Template => "template",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignForm {
    pub mode: CampaignMode,
    pub name: String,
    pub phone_number_id: String,
    /// One recipient per line.
    pub numbers: String,
    pub message: String,
    pub template_name: String,
    pub template_language: String,
    /// One body parameter per line, mapped to `{{1}}`, `{{2}}`, ...
    pub template_params: String,
}

impl CampaignForm {
    pub fn to_request(&self) -> Result<CampaignCreate, ValidationError> {
        let name = self.name.trim();
        let phone_number_id = self.phone_number_id.trim();
        let to_numbers = split_lines(&self.numbers);
        if name.is_empty() || phone_number_id.is_empty() || to_numbers.is_empty() {
            return Err(ValidationError::MissingCampaignBasics);
        }

        let mut body = CampaignCreate {
            name: name.to_string(),
            phone_number_id: phone_number_id.to_string(),
            to_numbers,
            message_text: None,
            template_name: None,
            template_language_code: None,
            template_body_params: None,
        };

        match self.mode {
            CampaignMode::Text => {
                let message = self.message.trim();
                if message.is_empty() {
                    return Err(ValidationError::MissingCampaignMessage);
                }
                body.message_text = Some(message.to_string());
            }
            CampaignMode::Template => {
                let template_name = self.template_name.trim();
                if template_name.is_empty() {
                    return Err(ValidationError::MissingTemplateName);
                }
                let language = match self.template_language.trim() {
                    "" => DEFAULT_TEMPLATE_LANGUAGE,
                    lang => lang,
                };
                body.template_name = Some(template_name.to_string());
                body.template_language_code = Some(language.to_string());
                body.template_body_params = Some(split_lines(&self.template_params));
            }
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_form() -> CampaignForm {
        CampaignForm {
            name: " Black Friday ".into(),
            phone_number_id: "1099".into(),
            numbers: "5511999990001\n\n  5511999990002 \n".into(),
            ..CampaignForm::default()
        }
    }

    #[test]
    fn split_lines_drops_blank_lines() {
        assert_eq!(split_lines("a\nb\n\n"), vec!["a", "b"]);
        assert_eq!(split_lines(" \r\n x \r\n"), vec!["x"]);
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn text_message_requires_text_and_phone() {
        let mut form = TextMessageForm { message: "   ".into(), phone_number_id: "1".into() };
        assert_eq!(form.to_request("55"), Err(ValidationError::MissingMessageOrPhone));
        form.message = " hello ".into();
        form.phone_number_id = " ".into();
        assert_eq!(form.to_request("55"), Err(ValidationError::MissingMessageOrPhone));
        form.phone_number_id = " 1099 ".into();
        let req = form.to_request("5511").unwrap();
        assert_eq!(req, SendTextRequest {
            phone_number_id: "1099".into(),
            to: "5511".into(),
            message: "hello".into(),
        });
    }

    #[test]
    fn text_campaign_nulls_template_branch() {
        let mut form = base_form();
        form.message = "Hi there".into();
        form.template_name = "ignored".into();
        let body = form.to_request().unwrap();
        assert_eq!(body.name, "Black Friday");
        assert_eq!(body.to_numbers, vec!["5511999990001", "5511999990002"]);
        assert_eq!(body.message_text.as_deref(), Some("Hi there"));
        assert_eq!(body.template_name, None);
        assert_eq!(body.template_language_code, None);
        assert_eq!(body.template_body_params, None);
    }

    #[test]
    fn text_campaign_without_message_is_rejected() {
        let form = base_form();
        assert_eq!(form.to_request(), Err(ValidationError::MissingCampaignMessage));
    }

    #[test]
    fn template_campaign_defaults_language_and_parses_params() {
        let mut form = base_form();
        form.mode = CampaignMode::Template;
        form.message = "ignored".into();
        form.template_name = "promo_v2".into();
        form.template_params = "a\nb\n\n".into();
        let body = form.to_request().unwrap();
        assert_eq!(body.message_text, None);
        assert_eq!(body.template_name.as_deref(), Some("promo_v2"));
        assert_eq!(body.template_language_code.as_deref(), Some("pt_BR"));
        assert_eq!(body.template_body_params, Some(vec!["a".to_string(), "b".to_string()]));

        form.template_language = "en_US".into();
        form.template_params.clear();
        let body = form.to_request().unwrap();
        assert_eq!(body.template_language_code.as_deref(), Some("en_US"));
        assert_eq!(body.template_body_params, Some(Vec::new()));
    }

    #[test]
    fn template_campaign_without_name_is_rejected() {
        let mut form = base_form();
        form.mode = CampaignMode::Template;
        assert_eq!(form.to_request(), Err(ValidationError::MissingTemplateName));
    }

    #[test]
    fn blank_recipients_are_rejected_before_mode_checks() {
        let mut form = base_form();
        form.numbers = "\n \n".into();
        form.message = "x".into();
        assert_eq!(form.to_request(), Err(ValidationError::MissingCampaignBasics));
    }

    #[test]
    fn mode_parse() {
        assert_eq!(CampaignMode::parse(" Template "), Some(CampaignMode::Template));
        assert_eq!(CampaignMode::parse("text"), Some(CampaignMode::Text));
        assert_eq!(CampaignMode::parse("sms"), None);
        assert_eq!(CampaignMode::default(), CampaignMode::Text);
    }
}
