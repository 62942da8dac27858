//! Reqwest-backed adapter for the claims service REST API.
//!
//! This adapter owns transport details only: URL construction, credentials,
//! timeout and HTTP error mapping, and envelope unwrapping. Records are
//! handed to the domain as raw JSON.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, StatusCode, Url};
use serde_json::{Value, json};
use zeroize::Zeroizing;

use super::dto;
use crate::domain::claim::{ClaimDraft, ClaimId, ClaimPatch, ClaimTransition};
use crate::domain::ports::{
    ClaimListQuery, ClaimScope, ClaimsGateway, GatewayError, RawClaimList, RawClaimRecord,
    UserDirectory,
};
use crate::domain::user::UserId;

const DEFAULT_USER_AGENT: &str = "claims-client/0.1";
const API_PREFIX: &str = "api";

/// Outbound identity sent with every request.
pub struct HttpIdentity {
    /// HTTP user-agent sent to the service.
    pub user_agent: String,
    /// Bearer token for the session, if any.
    pub bearer_token: Option<Zeroizing<String>>,
}

impl Default for HttpIdentity {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_owned(),
            bearer_token: None,
        }
    }
}

impl HttpIdentity {
    /// Identity carrying `token` as the bearer credential.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            bearer_token: Some(Zeroizing::new(token.into())),
            ..Self::default()
        }
    }
}

/// Claims service adapter implementing both outbound ports.
pub struct HttpGateway {
    client: Client,
    base_url: Url,
    user_agent: String,
    bearer_token: Option<Zeroizing<String>>,
}

impl HttpGateway {
    /// Build an adapter using a reqwest client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(
        base_url: Url,
        timeout: Duration,
        identity: HttpIdentity,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            user_agent: identity.user_agent,
            bearer_token: identity.bearer_token,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GatewayError::invalid_request("base URL cannot carry a path"))?
            .pop_if_empty()
            .push(API_PREFIX)
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder, GatewayError> {
        let url = self.endpoint(segments)?;
        let request = self
            .client
            .request(method, url)
            .header(reqwest::header::USER_AGENT, self.user_agent.as_str())
            .header(reqwest::header::ACCEPT, "application/json");
        Ok(match self.bearer_token.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Value, GatewayError> {
        let response = request.send().await.map_err(map_transport_error)?;
        let status = response.status();
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, body.as_ref()));
        }
        parse_body(body.as_ref())
    }

    async fn claim_record(&self, request: RequestBuilder) -> Result<RawClaimRecord, GatewayError> {
        let body = self.send(request).await?;
        dto::claim_record(body).map_err(GatewayError::decode)
    }
}

#[async_trait]
impl ClaimsGateway for HttpGateway {
    async fn fetch_claim_list(
        &self,
        scope: ClaimScope,
        query: &ClaimListQuery,
    ) -> Result<RawClaimList, GatewayError> {
        let request = self
            .request(Method::GET, &["claims", scope.segment()])?
            .query(&list_params(query));
        let body = self.send(request).await?;
        dto::claim_list(body).map_err(GatewayError::decode)
    }

    async fn fetch_claim_detail(&self, id: &ClaimId) -> Result<Value, GatewayError> {
        let request = self.request(Method::GET, &["claims", id.as_ref()])?;
        let body = self.send(request).await?;
        dto::claim_detail(body).map_err(GatewayError::decode)
    }

    async fn create_claim(&self, draft: &ClaimDraft) -> Result<RawClaimRecord, GatewayError> {
        let request = self
            .request(Method::POST, &["claims"])?
            .json(&with_draft_status(draft)?);
        self.claim_record(request).await
    }

    async fn update_claim(
        &self,
        id: &ClaimId,
        patch: &ClaimPatch,
    ) -> Result<RawClaimRecord, GatewayError> {
        let request = self
            .request(Method::PATCH, &["claims", id.as_ref()])?
            .json(&with_draft_status(patch)?);
        self.claim_record(request).await
    }

    async fn submit_claim(&self, id: &ClaimId) -> Result<RawClaimRecord, GatewayError> {
        let request = self.request(Method::PUT, &["claims", id.as_ref(), "submit"])?;
        self.claim_record(request).await
    }

    async fn transition_claim(
        &self,
        id: &ClaimId,
        transition: &ClaimTransition,
    ) -> Result<RawClaimRecord, GatewayError> {
        let body = transition
            .reason()
            .map_or_else(|| json!({}), |reason| json!({ "reason": reason }));
        let request = self
            .request(Method::PUT, &["claims", id.as_ref(), transition.action()])?
            .json(&body);
        self.claim_record(request).await
    }

    async fn delete_claim(&self, id: &ClaimId) -> Result<(), GatewayError> {
        let request = self.request(Method::DELETE, &["claims", id.as_ref()])?;
        self.send(request).await.map(drop)
    }
}

#[async_trait]
impl UserDirectory for HttpGateway {
    async fn fetch_user(&self, id: &UserId) -> Result<Value, GatewayError> {
        let request = self.request(Method::GET, &["users", id.as_ref()])?;
        let body = self.send(request).await?;
        dto::user_record(body, "user")
            .ok_or_else(|| GatewayError::not_found(format!("user {id}")))
    }

    async fn fetch_manager_of(&self, employee: &UserId) -> Result<Option<Value>, GatewayError> {
        let request = self.request(Method::GET, &["users", employee.as_ref(), "manager"])?;
        let body = self.send(request).await?;
        Ok(dto::user_record(body, "manager"))
    }

    async fn fetch_managers_batch(&self) -> Result<Vec<Value>, GatewayError> {
        let request = self.request(Method::GET, &["users", "managers"])?;
        let body = self.send(request).await?;
        dto::record_list(body, &["managers", "users"]).map_err(GatewayError::decode)
    }

    async fn fetch_user_summary(&self, user: &UserId) -> Result<Value, GatewayError> {
        let request = self.request(Method::GET, &["users", user.as_ref(), "claim-limit"])?;
        self.send(request).await
    }

    async fn fetch_summary_list(&self) -> Result<Vec<Value>, GatewayError> {
        let request = self.request(Method::GET, &["users", "claim-limits"])?;
        let body = self.send(request).await?;
        dto::record_list(body, &["limits", "users"]).map_err(GatewayError::decode)
    }
}

fn list_params(query: &ClaimListQuery) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(page) = query.page {
        params.push(("page", page.to_string()));
    }
    if let Some(limit) = query.limit {
        params.push(("limit", limit.to_string()));
    }
    if let Some(sort_by) = query.sort_by.as_deref().filter(|field| !field.trim().is_empty()) {
        params.push(("sortBy", sort_by.to_owned()));
    }
    if let Some(direction) = query.sort_dir {
        params.push(("sortDir", direction.as_str().to_owned()));
    }
    if let Some(status) = query.status {
        params.push(("status", status.as_str().to_owned()));
    }
    params
}

/// Serialise a draft or patch body; the service keeps edited claims as drafts.
fn with_draft_status<T: serde::Serialize>(body: &T) -> Result<Value, GatewayError> {
    let mut value = serde_json::to_value(body).map_err(|error| {
        GatewayError::invalid_request(format!("claim body cannot be encoded: {error}"))
    })?;
    if let Value::Object(fields) = &mut value {
        fields.insert("status".to_owned(), Value::String("draft".to_owned()));
    }
    Ok(value)
}

fn parse_body(body: &[u8]) -> Result<Value, GatewayError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|error| {
        GatewayError::decode(format!("invalid claims service JSON payload: {error}"))
    })
}

fn map_transport_error(error: reqwest::Error) -> GatewayError {
    if error.is_timeout() {
        GatewayError::timeout(error.to_string())
    } else {
        GatewayError::transport(error.to_string())
    }
}

fn map_status_error(status: StatusCode, body: &[u8]) -> GatewayError {
    let body_preview = body_preview(body);
    let message = if body_preview.is_empty() {
        format!("status {}", status.as_u16())
    } else {
        format!("status {}: {}", status.as_u16(), body_preview)
    };

    match status {
        StatusCode::UNAUTHORIZED => GatewayError::unauthorized(message),
        StatusCode::FORBIDDEN => GatewayError::forbidden(message),
        StatusCode::NOT_FOUND => GatewayError::not_found(message),
        StatusCode::TOO_MANY_REQUESTS => GatewayError::rate_limited(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => GatewayError::timeout(message),
        _ if status.is_client_error() => GatewayError::invalid_request(message),
        _ => GatewayError::transport(message),
    }
}

fn body_preview(body: &[u8]) -> String {
    const PREVIEW_CHAR_LIMIT: usize = 160;

    let compact = String::from_utf8_lossy(body)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let preview = compact.chars().take(PREVIEW_CHAR_LIMIT).collect::<String>();
    if compact.chars().count() > PREVIEW_CHAR_LIMIT {
        format!("{preview}...")
    } else {
        preview
    }
}
