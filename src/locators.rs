//! Locator catalog for the portal views.
//!
//! Every element the workflows touch is addressed by a (view, role) pair.
//! The catalog starts from built-in selectors, accepts overrides from
//! configuration and is validated once at startup, so a missing entry fails
//! the run before a browser is opened.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};
use crate::types::{FrameContext, Locator, Strategy};

/// Logical page or panel of the portal
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum View {
    /// Elements present on every page
    Common,
    /// SSO sign-in form
    Login,
    /// Portal landing page
    Home,
    /// "Session expired" interstitial
    SessionExpired,
    /// User directory listing
    Users,
    /// Devices of a single user
    Devices,
    /// Overview of a single user
    Profile,
}

/// Element purpose within a view
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    Html,
    Body,
    Logo,
    UsernameField,
    NextButton,
    DisplayName,
    PasswordField,
    SignInButton,
    StaySignedIn,
    Title,
    TryAgain,
    Frame,
    SearchField,
    LoadingIndicator,
    ResultCount,
    NoResults,
    ResultLink,
    Row,
    Email,
}

impl View {
    pub const ALL: [View; 7] = [
        View::Common,
        View::Login,
        View::Home,
        View::SessionExpired,
        View::Users,
        View::Devices,
        View::Profile,
    ];

    /// Roles that must resolve for this view
    pub fn required_roles(self) -> &'static [Role] {
        match self {
            View::Common => &[Role::Html, Role::Body],
            View::Login => &[
                Role::Logo,
                Role::UsernameField,
                Role::NextButton,
                Role::DisplayName,
                Role::PasswordField,
                Role::SignInButton,
                Role::StaySignedIn,
            ],
            View::Home => &[Role::Title],
            View::SessionExpired => &[Role::Title, Role::TryAgain],
            View::Users => &[
                Role::Title,
                Role::Frame,
                Role::SearchField,
                Role::LoadingIndicator,
                Role::ResultCount,
                Role::NoResults,
                Role::ResultLink,
            ],
            View::Devices => &[
                Role::Title,
                Role::Frame,
                Role::LoadingIndicator,
                Role::ResultCount,
                Role::NoResults,
                Role::Row,
            ],
            View::Profile => &[Role::Title, Role::Email],
        }
    }

    fn key(self) -> &'static str {
        match self {
            View::Common => "common",
            View::Login => "login",
            View::Home => "home",
            View::SessionExpired => "session_expired",
            View::Users => "users",
            View::Devices => "devices",
            View::Profile => "profile",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for View {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        View::ALL
            .into_iter()
            .find(|view| view.key() == s)
            .ok_or_else(|| Error::Config(format!("Unknown view '{}' in locator override", s)))
    }
}

impl Role {
    pub const ALL: [Role; 19] = [
        Role::Html,
        Role::Body,
        Role::Logo,
        Role::UsernameField,
        Role::NextButton,
        Role::DisplayName,
        Role::PasswordField,
        Role::SignInButton,
        Role::StaySignedIn,
        Role::Title,
        Role::TryAgain,
        Role::Frame,
        Role::SearchField,
        Role::LoadingIndicator,
        Role::ResultCount,
        Role::NoResults,
        Role::ResultLink,
        Role::Row,
        Role::Email,
    ];

    fn key(self) -> &'static str {
        match self {
            Role::Html => "html",
            Role::Body => "body",
            Role::Logo => "logo",
            Role::UsernameField => "username_field",
            Role::NextButton => "next_button",
            Role::DisplayName => "display_name",
            Role::PasswordField => "password_field",
            Role::SignInButton => "sign_in_button",
            Role::StaySignedIn => "stay_signed_in",
            Role::Title => "title",
            Role::TryAgain => "try_again",
            Role::Frame => "frame",
            Role::SearchField => "search_field",
            Role::LoadingIndicator => "loading_indicator",
            Role::ResultCount => "result_count",
            Role::NoResults => "no_results",
            Role::ResultLink => "result_link",
            Role::Row => "row",
            Role::Email => "email",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Role::ALL
            .into_iter()
            .find(|role| role.key() == s)
            .ok_or_else(|| Error::Config(format!("Unknown role '{}' in locator override", s)))
    }
}

/// Replacement selector supplied through configuration
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SelectorOverride {
    Css(String),
    Xpath(String),
    Id(String),
}

impl SelectorOverride {
    fn into_parts(self) -> (Strategy, String) {
        match self {
            SelectorOverride::Css(s) => (Strategy::Css, s),
            SelectorOverride::Xpath(s) => (Strategy::Xpath, s),
            SelectorOverride::Id(s) => (Strategy::Id, s),
        }
    }
}

/// Mapping from (view, role) to locator
#[derive(Clone, Debug)]
pub struct Catalog {
    entries: HashMap<(View, Role), Locator>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl Catalog {
    /// Empty catalog, mostly useful to exercise validation
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Built-in selectors for the portal
    pub fn standard() -> Self {
        let mut catalog = Self::empty();

        catalog.insert(View::Common, Role::Html, Locator::css("html"));
        catalog.insert(View::Common, Role::Body, Locator::xpath("//body"));

        catalog.insert(
            View::Login,
            Role::Logo,
            Locator::xpath(r#"//*[@id="lightbox"]/div/img[contains(@class, "logo")]"#),
        );
        catalog.insert(
            View::Login,
            Role::UsernameField,
            Locator::xpath(r#"//input[contains(@type, "email")]"#),
        );
        catalog.insert(
            View::Login,
            Role::NextButton,
            Locator::xpath(
                r#"//input[contains(@type, "submit") and (contains(@value, "Next") or contains(@value, "Yes"))]"#,
            ),
        );
        catalog.insert(View::Login, Role::DisplayName, Locator::id("displayName"));
        catalog.insert(
            View::Login,
            Role::PasswordField,
            Locator::xpath(r#"//*[@id="lightbox"]//input[contains(@type, "password")]"#),
        );
        catalog.insert(
            View::Login,
            Role::SignInButton,
            Locator::xpath(r#"//*[@id="lightbox"]//input[contains(@value, "Sign in")]"#),
        );
        catalog.insert(
            View::Login,
            Role::StaySignedIn,
            Locator::xpath(r#"//*[@id="lightbox"]//div[contains(text(), "Stay signed in")]"#),
        );

        catalog.insert(
            View::Home,
            Role::Title,
            Locator::xpath(r#"//h1[contains(text(),"Home")]"#),
        );

        catalog.insert(
            View::SessionExpired,
            Role::Title,
            Locator::xpath(r#"//h1[contains(text(),"Session expired")]"#),
        );
        catalog.insert(
            View::SessionExpired,
            Role::TryAgain,
            Locator::id("error-page-content-tryagain"),
        );

        catalog.insert(
            View::Users,
            Role::Title,
            Locator::xpath(r#"//h2[contains(text(),"Users")]"#),
        );
        catalog.insert(
            View::Users,
            Role::Frame,
            Locator::xpath(r#"//iframe[contains(@name, "UsersList.ReactView")]"#),
        );
        catalog.insert(
            View::Users,
            Role::SearchField,
            Locator::xpath(r#"//input[contains(@class,"ms-SearchBox-field")]"#).in_frame(View::Users),
        );
        catalog.insert(
            View::Users,
            Role::LoadingIndicator,
            Locator::xpath(r#"//div[contains(@class, "ms-Shimmer-container")]"#)
                .in_frame(View::Users),
        );
        catalog.insert(
            View::Users,
            Role::ResultCount,
            Locator::xpath(r#"//span[contains(text(), "users found")]"#).in_frame(View::Users),
        );
        catalog.insert(
            View::Users,
            Role::NoResults,
            Locator::xpath(r#"//*[contains(text(), "No users found")]"#).in_frame(View::Users),
        );
        catalog.insert(
            View::Users,
            Role::ResultLink,
            Locator::xpath(
                r#"((//div[@class="ms-DetailsList-contentWrapper"]//div[@role="presentation" and @class="ms-List-cell"])[1]//a)[1]"#,
            )
            .in_frame(View::Users),
        );

        catalog.insert(
            View::Devices,
            Role::Title,
            Locator::xpath(r#"//h2/span[contains(text(),"Device")]"#),
        );
        catalog.insert(
            View::Devices,
            Role::Frame,
            Locator::xpath(r#"//iframe[contains(@name, "DevicesList.ReactView")]"#),
        );
        catalog.insert(
            View::Devices,
            Role::LoadingIndicator,
            Locator::xpath(r#"//div[contains(@class, "ms-Shimmer-container")]"#)
                .in_frame(View::Devices),
        );
        catalog.insert(
            View::Devices,
            Role::ResultCount,
            Locator::xpath(r#"//span[contains(text(), "devices found")]"#).in_frame(View::Devices),
        );
        catalog.insert(
            View::Devices,
            Role::NoResults,
            Locator::xpath(r#"//*[contains(text(), "No devices found")]"#)
                .in_frame(View::Devices),
        );
        catalog.insert(
            View::Devices,
            Role::Row,
            Locator::xpath(r#"//div[contains(@class, "ms-DetailsRow-fields")]"#)
                .in_frame(View::Devices),
        );

        catalog.insert(
            View::Profile,
            Role::Title,
            Locator::xpath(r#"//h2/span[contains(text(),"Overview")]"#),
        );
        catalog.insert(
            View::Profile,
            Role::Email,
            Locator::xpath(
                r#"//div[contains(@class, "ms-Stack")]//*[contains(text(), "User principal name")]/following-sibling::*[1]"#,
            ),
        );

        catalog
    }

    pub fn insert(&mut self, view: View, role: Role, locator: Locator) {
        self.entries.insert((view, role), locator);
    }

    /// Apply `"view.role" -> selector` overrides; the frame scope of the
    /// replaced entry is kept
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, SelectorOverride>) -> Result<()> {
        for (key, selector) in overrides {
            let (view, role) = key.split_once('.').ok_or_else(|| {
                Error::Config(format!(
                    "Locator override '{}' must be written as <view>.<role>",
                    key
                ))
            })?;
            let view: View = view.parse()?;
            let role: Role = role.parse()?;
            let (strategy, selector) = selector.clone().into_parts();
            if selector.trim().is_empty() {
                return Err(Error::Config(format!("Locator override '{}' is empty", key)));
            }
            let scope = self
                .entries
                .get(&(view, role))
                .map(|existing| existing.scope)
                .unwrap_or(FrameContext::Document);
            let mut locator = Locator::dynamic(strategy, selector);
            locator.scope = scope;
            self.insert(view, role, locator);
        }
        Ok(())
    }

    /// Fail on the first (view, role) pair the workflows need but cannot resolve
    pub fn validate(&self) -> Result<()> {
        for view in View::ALL {
            for role in view.required_roles() {
                match self.entries.get(&(view, *role)) {
                    Some(locator) if !locator.selector.trim().is_empty() => {}
                    _ => return Err(Error::MissingLocator { view, role: *role }),
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, view: View, role: Role) -> Result<&Locator> {
        self.entries
            .get(&(view, role))
            .ok_or(Error::MissingLocator { view, role })
    }

    /// Entries sorted by view and role
    pub fn iter(&self) -> impl Iterator<Item = (View, Role, &Locator)> {
        let mut keys: Vec<_> = self.entries.keys().copied().collect();
        keys.sort();
        keys.into_iter()
            .filter_map(|key| self.entries.get(&key).map(|loc| (key.0, key.1, loc)))
    }

    /// Reverse lookup of a locator.
    ///
    /// Workflows never need it; it lets scripted [`Driver`](crate::driver::Driver)
    /// implementations tell which catalog entry they were handed.
    #[doc(hidden)]
    pub fn identify(&self, locator: &Locator) -> Option<(View, Role)> {
        self.entries
            .iter()
            .find(|(_, candidate)| *candidate == locator)
            .map(|(key, _)| *key)
    }
}

/// Account badge shown in the portal header once `email` is signed in
pub fn account_badge(email: &str) -> Locator {
    Locator::dynamic(
        Strategy::Xpath,
        format!(r#"//div[contains(@title, "{}")]"#, email),
    )
}

#[cfg(test)]
#[path = "locators_test.rs"]
mod locators_test;
