// src/ingest/providers/reddit.rs
use std::time::Duration;

use async_trait::async_trait;
use metrics::histogram;
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::Deserialize;

use crate::config::ingest::{Credentials, Endpoints};
use crate::ingest::error::{IngestError, Result};
use crate::ingest::normalize::normalize_timestamp;
use crate::ingest::types::{
    Cursor, PageError, RawSubmission, SearchPage, SearchRequest, SubmissionApi,
};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<RawSubmission>,
}

/// Reddit OAuth endpoint for the credential check plus a Pushshift-compatible
/// archival search endpoint for bulk retrieval.
pub struct RedditClient {
    http: Client,
    credentials: Credentials,
    auth_base: String,
    search_base: String,
}

impl RedditClient {
    pub fn new(credentials: Credentials, endpoints: &Endpoints, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .user_agent(credentials.user_agent.clone())
            .connect_timeout(Duration::from_secs(4).min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| IngestError::Auth(format!("building http client: {e}")))?;
        Ok(Self {
            http,
            credentials,
            auth_base: endpoints.auth_base.trim_end_matches('/').to_string(),
            search_base: endpoints.search_base.trim_end_matches('/').to_string(),
        })
    }

    fn search_url(&self) -> String {
        format!("{}/reddit/search/submission", self.search_base)
    }
}

#[async_trait]
impl SubmissionApi for RedditClient {
    async fn verify_credentials(&self) -> Result<()> {
        let url = format!("{}/api/v1/access_token", self.auth_base);
        let rsp = self
            .http
            .post(&url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| IngestError::Auth(format!("read API unreachable: {e}")))?;

        let status = rsp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(IngestError::Auth(format!("credentials rejected ({status})")));
        }
        if !status.is_success() {
            return Err(IngestError::Auth(format!("token endpoint returned {status}")));
        }

        let body: TokenResponse = rsp
            .json()
            .await
            .map_err(|e| IngestError::Auth(format!("undecodable token response: {e}")))?;
        match body.access_token {
            Some(t) if !t.is_empty() => {
                tracing::info!(target: "ingest", provider = self.name(), "credentials verified");
                Ok(())
            }
            _ => Err(IngestError::Auth(format!(
                "no access token issued: {}",
                body.error.as_deref().unwrap_or("unknown error")
            ))),
        }
    }

    async fn search_page(&self, req: &SearchRequest) -> std::result::Result<SearchPage, PageError> {
        let t0 = std::time::Instant::now();

        let rsp = self
            .http
            .get(self.search_url())
            .query(&req.query_pairs())
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    PageError::Fatal(format!("bad search request: {e}"))
                } else {
                    PageError::Transient {
                        reason: format!("search request failed: {e}"),
                        retry_after: None,
                    }
                }
            })?;

        let status = rsp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = rsp
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(PageError::Transient {
                reason: format!("rate limited ({status})"),
                retry_after,
            });
        }
        if status.is_server_error() {
            return Err(PageError::Transient {
                reason: format!("search API returned {status}"),
                retry_after: None,
            });
        }
        if !status.is_success() {
            return Err(PageError::Fatal(format!("search API returned {status}")));
        }

        let body: SearchResponse = rsp.json().await.map_err(|e| {
            if e.is_timeout() {
                PageError::Transient {
                    reason: format!("reading search response: {e}"),
                    retry_after: None,
                }
            } else {
                PageError::Fatal(format!("undecodable search response: {e}"))
            }
        })?;

        let ms = t0.elapsed().as_secs_f64() * 1_000.0;
        histogram!("ingest_fetch_ms").record(ms);

        let next_cursor = body
            .data
            .last()
            .and_then(|last| last.get("created_utc"))
            .and_then(|v| normalize_timestamp("created_utc", v).ok())
            .map(|dt| Cursor::new(dt.timestamp().to_string()));

        Ok(SearchPage {
            records: body.data,
            next_cursor,
        })
    }

    fn name(&self) -> &'static str {
        "Reddit"
    }
}
