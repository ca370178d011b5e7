//! Client for the droplet endpoints of the DigitalOcean v2 API.
//!
//! The [`DropletApi`] trait is the seam the workflows depend on; the
//! [`DigitalOceanClient`] is the HTTP implementation used by the binary.

use async_trait::async_trait;
use reqwest::{header, Client, Response, StatusCode};
use shared::{
    domain::{Droplet, DropletId},
    error::{ApiError, ApiException, ErrorCode},
    protocol::{CreateDropletRequest, DropletEnvelope, DropletPage},
};
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

pub const DEFAULT_API_BASE_URL: &str = "https://api.digitalocean.com/v2";
pub const DEFAULT_PAGE_SIZE: u32 = 25;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("invalid provider url '{url}': {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("request to provider failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("provider rejected request with status {status}: {source}")]
    Rejected {
        status: u16,
        #[source]
        source: ApiException,
    },
}

impl ProviderError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ProviderError::Rejected { status, .. } => Some(*status),
            ProviderError::Transport(err) => err.status().map(|status| status.as_u16()),
            ProviderError::InvalidUrl { .. } => None,
        }
    }
}

#[async_trait]
pub trait DropletApi: Send + Sync {
    /// All droplets whose name equals `name`, across every result page.
    async fn list_droplets(&self, name: &str) -> Result<Vec<Droplet>, ProviderError>;
    /// Queues a droplet for creation. Success means accepted, not running.
    async fn create_droplet(&self, request: &CreateDropletRequest)
        -> Result<Droplet, ProviderError>;
    /// Queues a droplet for deletion.
    async fn delete_droplet(&self, id: DropletId) -> Result<(), ProviderError>;
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub page_size: u32,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.into(),
            api_key: api_key.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

pub struct DigitalOceanClient {
    http: Client,
    base_url: Url,
    api_key: String,
    page_size: u32,
}

impl DigitalOceanClient {
    pub fn new(config: ClientConfig) -> Result<Self, ProviderError> {
        // Url::join drops the last path segment unless it ends with a slash.
        let raw = format!("{}/", config.base_url.trim_end_matches('/'));
        let base_url = Url::parse(&raw).map_err(|source| ProviderError::InvalidUrl {
            url: config.base_url.clone(),
            source,
        })?;

        Ok(Self {
            http: Client::new(),
            base_url,
            api_key: config.api_key,
            page_size: config.page_size.max(1),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ProviderError> {
        self.base_url
            .join(path)
            .map_err(|source| ProviderError::InvalidUrl {
                url: format!("{}{path}", self.base_url),
                source,
            })
    }

    async fn fetch_page(&self, url: Url) -> Result<DropletPage, ProviderError> {
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.api_key)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        let page = check_status(response).await?.json().await?;
        Ok(page)
    }
}

#[async_trait]
impl DropletApi for DigitalOceanClient {
    async fn list_droplets(&self, name: &str) -> Result<Vec<Droplet>, ProviderError> {
        let mut url = self.endpoint("droplets")?;
        url.query_pairs_mut()
            .append_pair("name", name)
            .append_pair("per_page", &self.page_size.to_string());

        let mut droplets = Vec::new();
        loop {
            let page = self.fetch_page(url.clone()).await?;
            debug!(
                group = name,
                page_len = page.droplets.len(),
                total = page.meta.total,
                "droplets: fetched page"
            );
            let next = page.next_page().map(str::to_owned);
            droplets.extend(page.droplets);

            let Some(next) = next else {
                break;
            };
            let next = Url::parse(&next).map_err(|source| ProviderError::InvalidUrl {
                url: next.clone(),
                source,
            })?;
            if next == url {
                break;
            }
            url = next;
        }

        Ok(droplets)
    }

    async fn create_droplet(
        &self,
        request: &CreateDropletRequest,
    ) -> Result<Droplet, ProviderError> {
        let response = self
            .http
            .post(self.endpoint("droplets")?)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;
        let envelope: DropletEnvelope = check_status(response).await?.json().await?;
        info!(
            droplet_id = %envelope.droplet.id,
            group = %request.name,
            region = %request.region,
            "droplets: creation accepted"
        );
        Ok(envelope.droplet)
    }

    async fn delete_droplet(&self, id: DropletId) -> Result<(), ProviderError> {
        let response = self
            .http
            .delete(self.endpoint(&format!("droplets/{id}"))?)
            .bearer_auth(&self.api_key)
            .send()
            .await?;
        check_status(response).await?;
        info!(droplet_id = %id, "droplets: deletion accepted");
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let api_error = serde_json::from_str::<ApiError>(&body)
        .unwrap_or_else(|_| ApiError::new(code_for_status(status), fallback_message(status, &body)));

    Err(ProviderError::Rejected {
        status: status.as_u16(),
        source: api_error.into(),
    })
}

fn code_for_status(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::UNAUTHORIZED => ErrorCode::Unauthorized,
        StatusCode::FORBIDDEN => ErrorCode::Forbidden,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::UNPROCESSABLE_ENTITY => ErrorCode::UnprocessableEntity,
        StatusCode::TOO_MANY_REQUESTS => ErrorCode::TooManyRequests,
        status if status.is_server_error() => ErrorCode::ServerError,
        _ => ErrorCode::Unknown,
    }
}

fn fallback_message(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string()
    } else {
        body.to_string()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
