//! Configuration layer: resolves the user-agent, rate, concurrency and output
//! mode from explicit fields, falling back to environment variables and then
//! to a packaged-default-seeded file under the data directory.

use crate::error::{FetchError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 6;
pub const DEFAULT_FILES_CONCURRENCY: usize = 6;
pub const DEFAULT_TAR_MIRROR_CONCURRENCY: usize = 20;
pub const DEFAULT_ARCHIVE_BASE: &str = "https://www.sec.gov/Archives/edgar";
pub const DEFAULT_SUBMISSIONS_BASE: &str = "https://data.sec.gov/submissions";
pub const DEFAULT_MIRROR_BASE: &str = "https://sec-library.tar.datamule.xyz";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Files,
    Tar,
}

impl OutputMode {
    pub fn strategy(&self) -> &'static str {
        match self {
            OutputMode::Files => "index",
            OutputMode::Tar => "index_tar",
        }
    }
}

/// Selects how `tar`-mode output is produced: packaged locally from the
/// master-index/folder-enumeration path, or fetched pre-packaged from the
/// mirror-tar endpoint. Only meaningful when `output_mode` is
/// `Tar`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TarProvider {
    #[default]
    Local,
    DatamuleMirror,
}

impl std::str::FromStr for TarProvider {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "local" => Ok(TarProvider::Local),
            "datamule" | "datamule-mirror" => Ok(TarProvider::DatamuleMirror),
            other => Err(FetchError::InvalidTarProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: Option<String>,
    pub data_dir: PathBuf,
    pub rate_limit: f64,
    pub timeout: Duration,
    pub max_retries: u32,
    pub concurrency: Option<usize>,
    pub output_mode: OutputMode,
    pub tar_provider: TarProvider,
    pub extensions: Vec<String>,
    pub datamule_api_key: Option<String>,
    /// Base URL for `/Archives/edgar` (full-index and filing folders).
    /// Overridable so tests can point it at a mock server.
    pub archive_base: String,
    /// Base URL for `/submissions` (entity filing history JSON).
    pub submissions_base: String,
    /// Base URL for the pre-packaged mirror-tar endpoint.
    pub mirror_base: String,
}

impl FetchConfig {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            user_agent: None,
            data_dir: data_dir.into(),
            rate_limit: crate::rate_limiter::DEFAULT_RATE_PER_SECOND,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            concurrency: None,
            output_mode: OutputMode::Files,
            tar_provider: TarProvider::Local,
            extensions: Vec::new(),
            datamule_api_key: None,
            archive_base: DEFAULT_ARCHIVE_BASE.to_string(),
            submissions_base: DEFAULT_SUBMISSIONS_BASE.to_string(),
            mirror_base: DEFAULT_MIRROR_BASE.to_string(),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_rate_limit(mut self, rate: f64) -> Self {
        self.rate_limit = rate;
        self
    }

    pub fn with_output_mode(mut self, mode: OutputMode) -> Self {
        self.output_mode = mode;
        self
    }

    pub fn with_tar_provider(mut self, provider: TarProvider) -> Self {
        self.tar_provider = provider;
        self
    }

    pub fn with_extensions(mut self, extensions: Vec<String>) -> Self {
        self.extensions = extensions;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = Some(concurrency);
        self
    }

    pub fn with_datamule_api_key(mut self, key: impl Into<String>) -> Self {
        self.datamule_api_key = Some(key.into());
        self
    }

    /// Overrides the `/Archives/edgar` base URL, e.g. to point at a
    /// `wiremock::MockServer` in tests.
    pub fn with_archive_base(mut self, base: impl Into<String>) -> Self {
        self.archive_base = base.into();
        self
    }

    pub fn with_submissions_base(mut self, base: impl Into<String>) -> Self {
        self.submissions_base = base.into();
        self
    }

    pub fn with_mirror_base(mut self, base: impl Into<String>) -> Self {
        self.mirror_base = base.into();
        self
    }

    /// Concurrency to use for the scheduler, resolving the output-mode-dependent
    /// default when none was explicitly configured.
    pub fn resolved_concurrency(&self) -> usize {
        self.concurrency.unwrap_or(match self.output_mode {
            OutputMode::Files => DEFAULT_FILES_CONCURRENCY,
            OutputMode::Tar => DEFAULT_TAR_MIRROR_CONCURRENCY,
        })
        .max(1)
    }

    /// Resolves the contact user-agent string: explicit field, then
    /// `SEC_USER_AGENT`, then `{data}/config/email.json`. Fails with
    /// `MissingUserAgent` if nothing usable is found, or the value lacks an `@`.
    pub fn resolve_user_agent(&self) -> Result<String> {
        let candidate = self
            .user_agent
            .clone()
            .or_else(|| std::env::var("SEC_USER_AGENT").ok())
            .or_else(|| synthesize_from_email_json(&self.data_dir));

        match candidate {
            Some(ua) if ua.contains('@') => Ok(ua),
            _ => Err(FetchError::MissingUserAgent),
        }
    }

    pub fn resolve_datamule_api_key(&self) -> Option<String> {
        self.datamule_api_key
            .clone()
            .or_else(|| std::env::var("DATAMULE_API_KEY").ok())
    }
}

#[derive(Deserialize)]
struct EmailJson {
    emails: Vec<String>,
}

fn synthesize_from_email_json(data_dir: &Path) -> Option<String> {
    let path = data_dir.join("config").join("email.json");
    let text = std::fs::read_to_string(path).ok()?;
    let parsed: EmailJson = serde_json::from_str(&text).ok()?;
    if parsed.emails.is_empty() {
        return None;
    }
    let index = fastrand::usize(..parsed.emails.len());
    Some(format!("sec-fetcher {}", parsed.emails[index]))
}
