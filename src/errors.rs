use std::path::PathBuf;
use std::time::Duration;

use crate::locators::{Role, View};
use crate::types::FrameContext;

/// Crate result alias
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the crate.
///
/// Wait timeouts on DOM predicates are not errors; they come back as
/// [`WaitOutcome::TimedOut`](crate::types::WaitOutcome). Only the download
/// wait, configuration and data problems, and driver failures end up here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// WebDriver connection failed (exit code 4)
    #[error("WebDriver connection failed: {0}")]
    WebDriverFailed(String),

    /// A WebDriver command failed after the session was established (exit code 4)
    #[error("WebDriver command failed: {0}")]
    Driver(String),

    /// The element went stale or disappeared between lookup and use
    #[error("Element not available: {0}")]
    ElementUnavailable(String),

    /// An iframe-scoped locator was used while another frame was active
    #[error("Locator '{selector}' needs frame context {expected}, but the active context is {active}")]
    FrameContext {
        selector: String,
        expected: FrameContext,
        active: FrameContext,
    },

    /// Download did not complete in time (exit code 5)
    #[error("Download did not complete within the specified timeout seconds: {}", .0.as_secs())]
    DownloadTimeout(Duration),

    /// Invalid configuration (exit code 2)
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Credential lookup failed (exit code 2)
    #[error("User {0} is not defined, enter a valid user.")]
    UnknownUser(String),

    /// Locator catalog is missing a required entry (exit code 2)
    #[error("No locator defined for {view}.{role}")]
    MissingLocator { view: View, role: Role },

    /// Input workbook does not have exactly one visible sheet (exit code 2)
    #[error("{}: the excel file should contain only one visible sheet, found {count}", path.display())]
    VisibleSheets { path: PathBuf, count: usize },

    /// Input workbook lacks a required column (exit code 2)
    #[error("{}: column '{column}' not found", path.display())]
    MissingColumn { path: PathBuf, column: String },

    /// Spreadsheet could not be read or written
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::WebDriverFailed(_) | Error::Driver(_) => 4,
            Error::DownloadTimeout(_) => 5,
            Error::Config(_)
            | Error::UnknownUser(_)
            | Error::MissingLocator { .. }
            | Error::VisibleSheets { .. }
            | Error::MissingColumn { .. } => 2,
            _ => 1,
        }
    }

    /// Lookup errors that a polling wait treats as "predicate not yet true"
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::ElementUnavailable(_))
    }
}

impl From<fantoccini::error::CmdError> for Error {
    fn from(err: fantoccini::error::CmdError) -> Self {
        let msg = err.to_string();
        if err.is_miss() || msg.contains("stale element") {
            Error::ElementUnavailable(msg)
        } else {
            Error::Driver(msg)
        }
    }
}

impl From<fantoccini::error::NewSessionError> for Error {
    fn from(err: fantoccini::error::NewSessionError) -> Self {
        Error::WebDriverFailed(err.to_string())
    }
}

impl From<calamine::Error> for Error {
    fn from(err: calamine::Error) -> Self {
        Error::Spreadsheet(err.to_string())
    }
}

impl From<rust_xlsxwriter::XlsxError> for Error {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Error::Spreadsheet(err.to_string())
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(err.to_string())
    }
}

/// Exit code for an error bubbled up through `anyhow`
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<Error>())
        .map(Error::exit_code)
        .unwrap_or(1)
}
