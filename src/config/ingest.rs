// src/config/ingest.rs
use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs};

use crate::ingest::paginate::RetryPolicy;
use crate::ingest::types::{SourceQuery, TimeFilter};

pub const ENV_CONFIG_PATH: &str = "INGEST_CONFIG_PATH";
pub const DEFAULT_CONFIG_PATH: &str = "config/ingest.toml";

fn default_auth_base() -> String {
    "https://www.reddit.com".to_string()
}
fn default_search_base() -> String {
    "https://api.pullpush.io".to_string()
}
fn default_page_size() -> usize {
    100
}
fn default_max_attempts() -> u32 {
    3
}
fn default_backoff_base_ms() -> u64 {
    500
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_output_name() -> String {
    "reddit_data".to_string()
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_limit() -> usize {
    100
}

/// Opaque client credentials handed to the API adapter.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    /// "ENV" means: read from REDDIT_CLIENT_ID
    pub client_id: String,
    /// "ENV" means: read from REDDIT_CLIENT_SECRET
    pub client_secret: String,
    /// "ENV" means: read from REDDIT_USER_AGENT
    pub user_agent: String,
}

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            user_agent: user_agent.into(),
        }
    }

    fn resolve_env(&mut self) -> Result<()> {
        resolve_field(&mut self.client_id, "REDDIT_CLIENT_ID")?;
        resolve_field(&mut self.client_secret, "REDDIT_CLIENT_SECRET")?;
        resolve_field(&mut self.user_agent, "REDDIT_USER_AGENT")?;
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

fn resolve_field(value: &mut String, var: &str) -> Result<()> {
    if value.trim().eq_ignore_ascii_case("env") {
        *value = env::var(var).map_err(|_| anyhow!("Missing {var} env var"))?;
    }
    let trimmed = value.trim().trim_matches('"');
    if trimmed.is_empty() {
        bail!("credential for {var} is empty");
    }
    *value = trimmed.to_string();
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
pub struct Endpoints {
    #[serde(default = "default_auth_base")]
    pub auth_base: String,
    #[serde(default = "default_search_base")]
    pub search_base: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            auth_base: default_auth_base(),
            search_base: default_search_base(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_attempts: default_max_attempts(),
            backoff_base_ms: default_backoff_base_ms(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl FetchConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, Duration::from_millis(self.backoff_base_ms))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    fn sanitize(&mut self) {
        self.page_size = self.page_size.clamp(1, 1000);
        self.max_attempts = self.max_attempts.max(1);
        if self.request_timeout_secs == 0 {
            self.request_timeout_secs = default_request_timeout_secs();
        }
    }
}

/// Run parameters; every field can be overridden from the command line.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    #[serde(default = "default_output_name")]
    pub output_name: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub subreddit: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub time_filter: TimeFilter,
    /// 0 means unbounded.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_name: default_output_name(),
            output_dir: default_output_dir(),
            subreddit: None,
            author: None,
            time_filter: TimeFilter::All,
            limit: default_limit(),
        }
    }
}

impl RunConfig {
    pub fn limit(&self) -> Option<usize> {
        (self.limit > 0).then_some(self.limit)
    }

    pub fn query(&self) -> crate::ingest::error::Result<SourceQuery> {
        SourceQuery::new(
            self.subreddit.clone(),
            self.author.clone(),
            self.time_filter,
            self.limit(),
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    pub credentials: Credentials,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub run: RunConfig,
}

impl IngestConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let mut cfg: IngestConfig = toml::from_str(s).context("parsing ingest config")?;
        cfg.credentials.resolve_env()?;
        cfg.fetch.sanitize();
        Ok(cfg)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading ingest config from {}", path.display()))?;
        Self::from_toml_str(&data).with_context(|| format!("in {}", path.display()))
    }

    /// Load using $INGEST_CONFIG_PATH, falling back to `config/ingest.toml`.
    pub fn load_default() -> Result<Self> {
        Self::load_from_file(resolve_config_path()?)
    }
}

/// Config path from the environment, else the default location.
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(p) = env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
        }
        return Ok(pb);
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_PATH))
}
