//! TestFlight page client
//!
//! One GET per call; retries, if any, happen on the next scheduled cycle.

use async_trait::async_trait;
use reqwest::{header, StatusCode};

use crate::{poller::StatusSource, HttpClient};

use super::{
    join_url,
    page::{self, PageStructureError},
    AppStatus,
};

const ACCEPT_HTML: &str = "text/html";
const ACCEPT_LANGUAGE: &str = "en-US,en";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected response status: {0}")]
    Status(StatusCode),
    #[error(transparent)]
    Page(#[from] PageStructureError),
}

#[derive(Clone)]
pub struct TestFlightClient {
    http_client: HttpClient,
}

impl TestFlightClient {
    pub fn new(http_client: HttpClient) -> Self {
        Self { http_client }
    }

    /// Fetch and parse the join page for `app_id`. A non-2xx response or any
    /// parse failure is a `FetchError`, never a panic.
    pub async fn fetch_status(&self, app_id: &str) -> Result<AppStatus, FetchError> {
        let response = self
            .http_client
            .get(join_url(app_id))
            .header(header::ACCEPT, ACCEPT_HTML)
            .header(header::ACCEPT_LANGUAGE, ACCEPT_LANGUAGE)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status()));
        }

        let body = response.text().await?;
        let parsed = page::parse_app_page(&body)?;

        Ok(AppStatus {
            app_id: app_id.to_string(),
            is_full: parsed.is_full,
            name: parsed.name,
            icon_url: parsed.icon_url,
        })
    }
}

#[async_trait]
impl StatusSource for TestFlightClient {
    async fn fetch_status(&self, app_id: &str) -> Result<AppStatus, FetchError> {
        TestFlightClient::fetch_status(self, app_id).await
    }
}
