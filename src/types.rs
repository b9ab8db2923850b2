use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::locators::View;

/// How a locator's selector string is interpreted
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// CSS selector
    Css,
    /// XPath expression
    Xpath,
    /// Element id attribute
    Id,
}

/// Document against which a locator resolves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameContext {
    /// The top-level page
    Document,
    /// The iframe hosting a view's content
    Frame(View),
}

impl fmt::Display for FrameContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameContext::Document => write!(f, "document"),
            FrameContext::Frame(view) => write!(f, "{} frame", view),
        }
    }
}

/// Selector strategy, selector string and the frame the element lives in
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Locator {
    pub strategy: Strategy,
    pub selector: Cow<'static, str>,
    pub scope: FrameContext,
}

impl Locator {
    pub const fn css(selector: &'static str) -> Self {
        Self {
            strategy: Strategy::Css,
            selector: Cow::Borrowed(selector),
            scope: FrameContext::Document,
        }
    }

    pub const fn xpath(selector: &'static str) -> Self {
        Self {
            strategy: Strategy::Xpath,
            selector: Cow::Borrowed(selector),
            scope: FrameContext::Document,
        }
    }

    pub const fn id(selector: &'static str) -> Self {
        Self {
            strategy: Strategy::Id,
            selector: Cow::Borrowed(selector),
            scope: FrameContext::Document,
        }
    }

    /// Build a locator from a runtime selector string
    pub fn dynamic(strategy: Strategy, selector: String) -> Self {
        Self {
            strategy,
            selector: Cow::Owned(selector),
            scope: FrameContext::Document,
        }
    }

    /// Same selector, resolved inside the frame of `view`
    pub fn in_frame(mut self, view: View) -> Self {
        self.scope = FrameContext::Frame(view);
        self
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.selector)
    }
}

/// Result of a bounded wait that did not hit a driver error
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The predicate held before the deadline
    Satisfied,
    /// The deadline passed first
    TimedOut { waited: Duration },
}

impl WaitOutcome {
    pub fn is_satisfied(&self) -> bool {
        matches!(self, WaitOutcome::Satisfied)
    }

    pub fn timed_out(&self) -> bool {
        !self.is_satisfied()
    }
}

/// Snapshot of the first element matching a locator
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElementProbe {
    pub displayed: bool,
    pub enabled: bool,
    pub text: String,
}

/// Keys sent to an element outside of plain text input
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Enter,
    Delete,
    /// Control+A
    SelectAll,
    /// Control+Home
    Top,
    End,
}

/// Page scroll direction
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Opaque directory identifier taken from a user result link
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

impl UserId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Cells of one device row keyed by their structural attribute
pub type DeviceFields = IndexMap<String, String>;

/// One listed device, stamped with the email it was collected under
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(rename = "Email")]
    pub email: String,
    #[serde(flatten)]
    pub fields: DeviceFields,
}

impl DeviceRecord {
    pub fn new(email: impl Into<String>, fields: DeviceFields) -> Self {
        Self {
            email: email.into(),
            fields,
        }
    }
}

/// Emptiness classification of a filtered result list
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultsState {
    /// The count text moved away from the zero baseline
    Found,
    /// The explicit "no results" marker is visible
    Empty,
    /// Neither signal showed up before the deadlines
    Undetermined,
}

impl ResultsState {
    pub fn is_found(&self) -> bool {
        matches!(self, ResultsState::Found)
    }
}

#[cfg(test)]
#[path = "types_test.rs"]
mod types_test;
