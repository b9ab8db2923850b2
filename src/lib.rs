//! # find-info
//!
//! Collects the devices registered to a list of users from a device
//! management portal, by driving a real browser over WebDriver, and exports
//! them as a spreadsheet.
//!
//! The portal is a single page application that renders its lists inside
//! iframes, fills them asynchronously behind loading shimmers, occasionally
//! bounces back to its home page and expires sessions without warning. The
//! crate is mostly about surviving that.
//!
//! ## CLI Usage
//!
//! ```bash
//! # Run every configured job whose name contains "mem"
//! find-info run --filter mem
//!
//! # Use an explicit email list instead of the workbook
//! find-info run --emails alice@example.com,bob@example.com
//!
//! # Force a browser instead of a random pick from browser_list
//! find-info run --browser firefox
//!
//! # Show configured jobs and which ones a filter selects
//! find-info jobs --filter mem
//!
//! # Print the effective locator catalog after overrides
//! find-info locators
//! ```
//!
//! A WebDriver server has to be running (`chromedriver --port 9515` or
//! `geckodriver --port 4444`).
//!
//! ## Configuration
//!
//! Defaults, then `find-info.json` (or `--config PATH`), then `FIND_INFO_*`
//! environment variables:
//!
//! ```json
//! {
//!   "job_list": [{"name": "test_download_mem_report", "url": "https://intune.microsoft.com/"}],
//!   "users": [{"name": "mem", "email": "ops@example.com", "password": "..."}],
//!   "browser_list": ["chrome", "firefox"],
//!   "column_names_mapping": {"operatingSystem": "OS"},
//!   "os_to_exclude": ["Android"],
//!   "locators": {"users.search_field": {"css": "input[role=searchbox]"}}
//! }
//! ```
//!
//! ## Library Usage
//!
//! Workflows are generic over [`driver::Driver`], so they can run against
//! any implementation of it:
//!
//! ```no_run
//! use find_info::config::Config;
//! use find_info::navigation::RetryPolicy;
//! use find_info::pages::collect_devices;
//! use find_info::screenshot::Screenshots;
//! use find_info::session::Session;
//! use find_info::webdriver::{BrowserType, WebDriverSession};
//!
//! # async fn example() -> find_info::errors::Result<()> {
//! let config = Config::load(None)?;
//! let driver = WebDriverSession::connect(BrowserType::Chrome, None, true, &config.download_path()).await?;
//! let mut session = Session::new(
//!     driver,
//!     config.catalog()?,
//!     "https://intune.microsoft.com/",
//!     Screenshots::new(config.screenshots_path()),
//! );
//! let emails = vec!["alice@example.com".to_string()];
//! let records = collect_devices(&mut session, &emails, &RetryPolicy::default()).await?;
//! println!("{} devices", records.len());
//! session.close().await?;
//! # Ok(())
//! # }
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod config;
pub mod download;
pub mod driver;
pub mod errors;
pub mod extract;
pub mod jobs;
pub mod locators;
pub mod navigation;
pub mod pages;
pub mod report;
pub mod screenshot;
pub mod session;
pub mod types;
pub mod webdriver;

pub use errors::{Error, Result};
pub use session::Session;
pub use types::{DeviceRecord, FrameContext, Locator, UserId, WaitOutcome};
