use reqwest::{Client as HttpClient, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

use crate::api::models::{
    Campaign, CampaignCreate, CampaignItem, Conversation, LoginRequest, Message, SendTextRequest,
    TokenResponse,
};
use crate::error::ApiError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Authenticated client for the console REST API.
///
/// Requests carry `Authorization: Bearer <token>` when a token is configured
/// and go out unauthenticated otherwise. A 401 becomes
/// [`ApiError::Unauthorized`]; nothing is retried.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: HttpClient,
    base: Url,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, ApiError> {
        let http = HttpClient::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base: Self::base_url(base_url)?,
            token: token.filter(|t| !t.is_empty()),
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Strips a trailing `/api` and guarantees a trailing slash so joins
    /// append instead of replacing the last path segment.
    fn base_url(base_url: &str) -> Result<Url, ApiError> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let trimmed = trimmed.strip_suffix("/api").unwrap_or(trimmed);
        Ok(Url::parse(&format!("{}/", trimmed))?)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .push("api")
            .extend(segments);
        Ok(url)
    }

    fn with_auth(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(t) => req.bearer_auth(t),
            None => req,
        }
    }

    async fn check(resp: Response) -> Result<Response, ApiError> {
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Http { status: status.as_u16(), body });
        }
        Ok(resp)
    }

    async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, ApiError> {
        let resp = Self::check(resp).await?;
        let text = resp.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, ApiError> {
        let url = self.endpoint(segments)?;
        log::debug!("GET {}", url);
        let resp = self.with_auth(self.http.get(url)).send().await?;
        Self::read_json(resp).await
    }

    /// `POST /api/auth/login`. Returns the access token; the caller decides
    /// whether to keep it.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, ApiError> {
        let url = self.endpoint(&["auth", "login"])?;
        let body = LoginRequest { email: email.to_string(), password: password.to_string() };
        let resp = self.http.post(url).json(&body).send().await?;
        let token: TokenResponse = Self::read_json(resp).await?;
        Ok(token.access_token)
    }

    pub async fn conversations(&self) -> Result<Vec<Conversation>, ApiError> {
        self.get_json(&["conversations"]).await
    }

    pub async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, ApiError> {
        self.get_json(&["conversations", conversation_id, "messages"]).await
    }

    /// `POST /api/messages/text`. The success body is not interpreted.
    pub async fn send_text(&self, body: &SendTextRequest) -> Result<(), ApiError> {
        let url = self.endpoint(&["messages", "text"])?;
        log::debug!("POST {} to={}", url, body.to);
        let resp = self.with_auth(self.http.post(url)).json(body).send().await?;
        Self::check(resp).await?;
        Ok(())
    }

    pub async fn create_campaign(&self, body: &CampaignCreate) -> Result<Campaign, ApiError> {
        let url = self.endpoint(&["campaigns"])?;
        log::debug!("POST {} name={} recipients={}", url, body.name, body.to_numbers.len());
        let resp = self.with_auth(self.http.post(url)).json(body).send().await?;
        Self::read_json(resp).await
    }

    pub async fn campaigns(&self) -> Result<Vec<Campaign>, ApiError> {
        self.get_json(&["campaigns"]).await
    }

    pub async fn campaign_items(&self, campaign_id: &str) -> Result<Vec<CampaignItem>, ApiError> {
        self.get_json(&["campaigns", campaign_id, "items"]).await
    }
}
