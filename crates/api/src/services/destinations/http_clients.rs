//! HTTP clients for the CRM and mailing list connectors.
//!
//! Both speak plain JSON over HTTP; the payload shapes are owned by the
//! receiving integration.

use std::time::Duration;

use domain::errors::DestinationError;
use domain::services::{CrmClient, CrmContact, MailingListClient, Subscriber};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{json, Value as JsonValue};

use crate::config::{CrmConfig, MailingConfig};

/// Longest response excerpt kept in a rejection message.
const MAX_ERROR_BODY: usize = 512;

fn build_client(timeout_ms: u64) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .build()
}

fn transport_error(err: reqwest::Error) -> DestinationError {
    if err.is_timeout() {
        DestinationError::Transport(format!("Request timed out: {}", err))
    } else {
        DestinationError::Transport(err.to_string())
    }
}

/// Sends the request and turns the response into an acknowledgment.
async fn send(request: RequestBuilder) -> Result<JsonValue, DestinationError> {
    let response = request.send().await.map_err(transport_error)?;
    acknowledgment(response).await
}

async fn acknowledgment(response: Response) -> Result<JsonValue, DestinationError> {
    let status = response.status();
    let body = response.text().await.map_err(transport_error)?;

    if !status.is_success() {
        let mut message: String = body.chars().take(MAX_ERROR_BODY).collect();
        if message.trim().is_empty() {
            message = status.canonical_reason().unwrap_or("Request failed").to_string();
        }
        return Err(DestinationError::Rejected {
            status: Some(status.as_u16()),
            message,
        });
    }

    Ok(serde_json::from_str(&body).unwrap_or_else(|_| json!({ "status": status.as_u16() })))
}

/// CRM connector posting contact batches with a bearer token.
pub struct HttpCrmClient {
    client: Client,
    url: String,
    api_key: String,
}

impl HttpCrmClient {
    pub fn new(config: &CrmConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(config.timeout_ms)?,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait::async_trait]
impl CrmClient for HttpCrmClient {
    async fn push_batch(&self, contacts: &[CrmContact]) -> Result<JsonValue, DestinationError> {
        let mut request = self
            .client
            .post(&self.url)
            .json(&json!({ "contacts": contacts }));
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        send(request).await
    }
}

/// Mailing list connector using basic authentication.
pub struct HttpMailingListClient {
    client: Client,
    url: String,
    username: String,
    password: String,
}

impl HttpMailingListClient {
    pub fn new(config: &MailingConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_client(config.timeout_ms)?,
            url: config.url.clone(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }
}

#[async_trait::async_trait]
impl MailingListClient for HttpMailingListClient {
    async fn push_subscribers(
        &self,
        list_name: &str,
        subscribers: &[Subscriber],
    ) -> Result<JsonValue, DestinationError> {
        let mut request = self.client.post(&self.url).json(&json!({
            "list": list_name,
            "subscribers": subscribers,
        }));
        if !self.username.is_empty() {
            request = request.basic_auth(&self.username, Some(&self.password));
        }
        send(request).await
    }
}

/// Stand-in for a destination that is switched off in configuration.
#[derive(Debug, Clone, Copy)]
pub struct DisabledDestination(pub &'static str);

impl DisabledDestination {
    fn error(&self) -> DestinationError {
        DestinationError::NotConfigured(format!("{} destination is disabled", self.0))
    }
}

#[async_trait::async_trait]
impl CrmClient for DisabledDestination {
    async fn push_batch(&self, _contacts: &[CrmContact]) -> Result<JsonValue, DestinationError> {
        Err(self.error())
    }
}

#[async_trait::async_trait]
impl MailingListClient for DisabledDestination {
    async fn push_subscribers(
        &self,
        _list_name: &str,
        _subscribers: &[Subscriber],
    ) -> Result<JsonValue, DestinationError> {
        Err(self.error())
    }
}
