//! Run configuration.
//!
//! Sources, lowest priority first: built-in defaults, a JSON file
//! (`find-info.json` in the working directory or an explicit path), then
//! `FIND_INFO_*` environment variables. Relative paths resolve against
//! `root_dir`.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{FixedOffset, Utc};
use figment::Figment;
use figment::providers::{Env, Format as _, Json, Serialized};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{Error, Result};
use crate::locators::{Catalog, SelectorOverride};
use crate::navigation::RetryPolicy;
use crate::webdriver::BrowserType;

/// Config file picked up from the working directory
pub const DEFAULT_CONFIG_FILE: &str = "find-info.json";
/// Environment variable prefix
pub const ENV_PREFIX: &str = "FIND_INFO_";

/// Named sign-in account
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// A configured job and the portal it runs against
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    pub name: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub root_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub log_file: String,
    pub screenshots_dir: PathBuf,
    pub download_dir: PathBuf,
    pub export_dir: PathBuf,
    pub email_list_file: PathBuf,
    /// Report file name; dated `device_list_<YYYYMMDD>.xlsx` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_list_file: Option<String>,
    /// Structural field key to report column; lookup only, order is not kept
    pub column_names_mapping: BTreeMap<String, String>,
    pub os_to_exclude: Vec<String>,
    pub job_list: Vec<JobSpec>,
    pub job_reruns: usize,
    /// Seconds between job reruns
    pub job_reruns_delay: u64,
    pub browser_list: Vec<BrowserType>,
    pub browser_headless: bool,
    /// Base wait in seconds
    pub browser_timeout: u64,
    /// Wait in seconds for directory, device and profile views
    pub page_timeout: u64,
    pub poll_interval_ms: u64,
    pub view_retries: usize,
    pub identity_retries: usize,
    /// Upper bounds in seconds for the randomized stagger between jobs
    pub sleep_time_range: [u64; 2],
    pub users: Vec<Credential>,
    pub login_user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webdriver_url: Option<String>,
    /// `"view.role"` selector overrides
    pub locators: BTreeMap<String, SelectorOverride>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("/tmp/find-info"),
            logs_dir: PathBuf::from("logs"),
            log_file: "steps.log".to_string(),
            screenshots_dir: PathBuf::from("screenshots"),
            download_dir: PathBuf::from("download"),
            export_dir: PathBuf::from("export"),
            email_list_file: PathBuf::from("email_list.xlsx"),
            device_list_file: None,
            column_names_mapping: BTreeMap::new(),
            os_to_exclude: Vec::new(),
            job_list: Vec::new(),
            job_reruns: 0,
            job_reruns_delay: 0,
            browser_list: vec![BrowserType::Chrome],
            browser_headless: true,
            browser_timeout: 140,
            page_timeout: 20,
            poll_interval_ms: 500,
            view_retries: 6,
            identity_retries: 2,
            sleep_time_range: [60, 120],
            users: Vec::new(),
            login_user: "mem".to_string(),
            webdriver_url: None,
            locators: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Layered sources without extraction
    pub fn figment(config_path: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        let config_file = config_path.map(Path::to_path_buf).or_else(|| {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            default_path.exists().then(|| default_path.to_path_buf())
        });
        if let Some(path) = config_file {
            debug!("Reading configuration from {}", path.display());
            figment = figment.merge(Json::file(path));
        }

        figment.merge(Env::prefixed(ENV_PREFIX))
    }

    /// Extract and validate
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load, validate and create the configured directories
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = config_path {
            if !path.exists() {
                return Err(Error::Config(format!(
                    "Config file {} does not exist",
                    path.display()
                )));
            }
        }
        let config = Self::from_figment(Self::figment(config_path))?;
        config.create_dirs()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("browser_timeout", self.browser_timeout),
            ("page_timeout", self.page_timeout),
            ("poll_interval_ms", self.poll_interval_ms),
            ("view_retries", self.view_retries as u64),
            ("identity_retries", self.identity_retries as u64),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(Error::Config(format!("{} must be greater than zero", field)));
            }
        }

        if self.browser_list.is_empty() {
            return Err(Error::Config("browser_list must name at least one browser".to_string()));
        }

        let [low, high] = self.sleep_time_range;
        if low > high {
            return Err(Error::Config(format!(
                "sleep_time_range [{}, {}] is not ordered",
                low, high
            )));
        }

        for job in &self.job_list {
            if job.name.trim().is_empty() {
                return Err(Error::Config("job_list entries need a name".to_string()));
            }
            url::Url::parse(&job.url).map_err(|e| {
                Error::Config(format!("Job {} has an invalid url '{}': {}", job.name, job.url, e))
            })?;
        }

        self.catalog()?;
        Ok(())
    }

    /// Built-in locators patched with the configured overrides
    pub fn catalog(&self) -> Result<Catalog> {
        let mut catalog = Catalog::standard();
        catalog.apply_overrides(&self.locators)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Credential registered under `name`
    pub fn credential(&self, name: &str) -> Result<&Credential> {
        self.users
            .iter()
            .find(|user| user.name == name)
            .ok_or_else(|| Error::UnknownUser(name.to_string()))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            view_retries: self.view_retries,
            identity_retries: self.identity_retries,
            page_timeout: Duration::from_secs(self.page_timeout),
        }
    }

    pub fn browser_timeout(&self) -> Duration {
        Duration::from_secs(self.browser_timeout)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn job_reruns_delay(&self) -> Duration {
        Duration::from_secs(self.job_reruns_delay)
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        self.root_dir.join(path)
    }

    pub fn logs_path(&self) -> PathBuf {
        self.resolve(&self.logs_dir)
    }

    pub fn log_file_path(&self) -> PathBuf {
        self.logs_path().join(&self.log_file)
    }

    pub fn screenshots_path(&self) -> PathBuf {
        self.resolve(&self.screenshots_dir)
    }

    pub fn download_path(&self) -> PathBuf {
        self.resolve(&self.download_dir)
    }

    pub fn export_path(&self) -> PathBuf {
        self.resolve(&self.export_dir)
    }

    pub fn email_list_path(&self) -> PathBuf {
        self.resolve(&self.email_list_file)
    }

    pub fn device_list_path(&self) -> PathBuf {
        let name = self
            .device_list_file
            .clone()
            .unwrap_or_else(|| format!("device_list_{}.xlsx", report_date()));
        self.export_path().join(name)
    }

    fn create_dirs(&self) -> Result<()> {
        for dir in [
            self.logs_path(),
            self.screenshots_path(),
            self.download_path(),
            self.export_path(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}

/// Today's date at UTC+8, as used in report names
pub fn report_date() -> String {
    let now = Utc::now();
    match FixedOffset::east_opt(8 * 3600) {
        Some(offset) => now.with_timezone(&offset).format("%Y%m%d").to_string(),
        None => now.format("%Y%m%d").to_string(),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
