// Common test utilities and fixtures
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use find_info::config::Credential;
use find_info::driver::Driver;
use find_info::errors::{Error, Result};
use find_info::locators::{Catalog, Role, View};
use find_info::navigation::RetryPolicy;
use find_info::screenshot::Screenshots;
use find_info::session::Session;
use find_info::types::{ElementProbe, Key, Locator};

pub const BASE_URL: &str = "https://portal.example/";

/// Directory entry of the scripted portal
#[derive(Clone, Debug)]
pub struct PortalUser {
    pub id: String,
    pub email: String,
    /// Email shown on the profile page when it differs from `email`
    pub profile_email: Option<String>,
    pub devices: Vec<Vec<(String, String)>>,
}

impl PortalUser {
    pub fn new(id: &str, email: &str) -> Self {
        Self {
            id: id.to_string(),
            email: email.to_string(),
            profile_email: None,
            devices: Vec::new(),
        }
    }

    pub fn with_device(mut self, cells: &[(&str, &str)]) -> Self {
        self.devices.push(
            cells
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        );
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoginStep {
    Username,
    Password,
    StaySignedIn,
    Done,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Page {
    Blank,
    Login,
    Home,
    SessionExpired { resume: String },
    Users,
    Devices(String),
    Profile(String),
}

/// In-memory portal implementing [`Driver`].
///
/// Models the sign-in form, the user directory with substring search, user
/// profiles and device lists, plus scripted home redirects and session
/// expiries that fire on the next view navigations.
pub struct FakePortal {
    catalog: Catalog,
    pub users: Vec<PortalUser>,
    pub page: Page,
    pub url: String,
    pub frame: Option<View>,
    pub login_step: LoginStep,
    /// Clicking "next" on the username step does nothing
    pub login_stuck: bool,
    pub signed_in_as: Option<String>,
    pub redirects_home: usize,
    pub session_expiries: usize,
    /// Result lists keep their zero count and never show the empty marker
    pub stalled_results: bool,
    fields: HashMap<(View, Role), String>,
    selected: Option<(View, Role)>,
    pub submitted_search: Option<String>,
    pub log: Vec<String>,
    pub closed: bool,
}

impl FakePortal {
    pub fn new(users: Vec<PortalUser>) -> Self {
        Self {
            catalog: Catalog::standard(),
            users,
            page: Page::Blank,
            url: String::new(),
            frame: None,
            login_step: LoginStep::Username,
            login_stuck: false,
            signed_in_as: None,
            redirects_home: 0,
            session_expiries: 0,
            stalled_results: false,
            fields: HashMap::new(),
            selected: None,
            submitted_search: None,
            log: Vec::new(),
            closed: false,
        }
    }

    /// Start already signed in, as after a successful login
    pub fn signed_in(mut self) -> Self {
        self.login_step = LoginStep::Done;
        self.signed_in_as = Some("ops@example.com".to_string());
        self
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.log.iter().filter(|entry| entry.starts_with(prefix)).count()
    }

    fn route(&mut self, url: &str) -> Page {
        let target = if url.contains("/AllUsers") {
            Page::Users
        } else if let Some(id) = segment_after(url, "/Devices/userId/") {
            Page::Devices(id)
        } else if let Some(id) = segment_after(url, "/overview/userId/") {
            Page::Profile(id)
        } else if url.trim_end_matches('/') == BASE_URL.trim_end_matches('/') {
            return if self.login_step == LoginStep::Done {
                Page::Home
            } else {
                Page::Login
            };
        } else {
            return Page::Blank;
        };

        if self.redirects_home > 0 {
            self.redirects_home -= 1;
            return Page::Home;
        }
        if self.session_expiries > 0 {
            self.session_expiries -= 1;
            return Page::SessionExpired {
                resume: url.to_string(),
            };
        }
        target
    }

    fn load(&mut self, page: Page) {
        self.page = page;
        self.frame = None;
        self.fields.clear();
        self.selected = None;
        self.submitted_search = None;
    }

    fn matches(&self) -> Vec<&PortalUser> {
        match &self.submitted_search {
            Some(term) => {
                let term = term.to_lowercase();
                self.users
                    .iter()
                    .filter(|user| user.email.to_lowercase().contains(&term))
                    .collect()
            }
            None => Vec::new(),
        }
    }

    fn user(&self, id: &str) -> Option<&PortalUser> {
        self.users.iter().find(|user| user.id == id)
    }

    fn element(&self, locator: &Locator) -> Option<String> {
        // Elements only resolve inside the document they live in
        let here = match locator.scope {
            find_info::FrameContext::Document => self.frame.is_none(),
            find_info::FrameContext::Frame(view) => self.frame == Some(view),
        };
        if !here {
            return None;
        }

        if locator.selector.contains("@title") {
            let email = self.signed_in_as.as_deref()?;
            return locator.selector.contains(email).then(String::new);
        }

        let (view, role) = self.catalog.identify(locator)?;
        let text = |s: &str| Some(s.to_string());

        match (&self.page, view, role) {
            (_, View::Common, Role::Html | Role::Body) => text(""),

            (Page::Login, View::Login, role) => match (self.login_step, role) {
                (_, Role::Logo) => text(""),
                (LoginStep::Username, Role::UsernameField) => text(""),
                (LoginStep::Username | LoginStep::StaySignedIn, Role::NextButton) => text(""),
                (LoginStep::Password, Role::DisplayName) => self.fields.get(&(View::Login, Role::UsernameField)).cloned(),
                (LoginStep::Password, Role::PasswordField | Role::SignInButton) => text(""),
                (LoginStep::StaySignedIn, Role::StaySignedIn) => text("Stay signed in?"),
                _ => None,
            },

            (Page::Home, View::Home, Role::Title) => text("Home"),

            (Page::SessionExpired { .. }, View::SessionExpired, Role::Title) => text("Session expired"),
            (Page::SessionExpired { .. }, View::SessionExpired, Role::TryAgain) => text("Try again"),

            (Page::Users, View::Users, Role::Title) => text("Users"),
            (Page::Users, View::Users, Role::Frame) => text(""),
            (Page::Users, View::Users, Role::SearchField) => text(""),
            (Page::Users, View::Users, Role::ResultCount | Role::NoResults) if self.stalled_results => {
                (role == Role::ResultCount).then(|| "0 users found".to_string())
            }
            (Page::Users, View::Users, Role::ResultCount) => match &self.submitted_search {
                Some(_) => Some(format!("{} users found", self.matches().len())),
                None => Some(format!("{} users found", self.users.len())),
            },
            (Page::Users, View::Users, Role::NoResults) => {
                (self.submitted_search.is_some() && self.matches().is_empty()).then(|| "No users found".to_string())
            }
            (Page::Users, View::Users, Role::ResultLink) => {
                self.matches().first().map(|user| user.email.clone())
            }

            (Page::Devices(id), View::Devices, role) => {
                let user = self.user(id)?;
                match role {
                    Role::ResultCount if self.stalled_results => text("0 devices found"),
                    Role::NoResults if self.stalled_results => None,
                    Role::Title => text("Devices"),
                    Role::Frame => text(""),
                    Role::ResultCount => Some(format!("{} devices found", user.devices.len())),
                    Role::NoResults => user.devices.is_empty().then(|| "No devices found".to_string()),
                    Role::Row => (!user.devices.is_empty()).then(String::new),
                    _ => None,
                }
            }

            (Page::Profile(id), View::Profile, role) => {
                let user = self.user(id)?;
                match role {
                    Role::Title => text("Overview"),
                    Role::Email => Some(user.profile_email.clone().unwrap_or_else(|| user.email.clone())),
                    _ => None,
                }
            }

            _ => None,
        }
    }

    fn require(&self, locator: &Locator) -> Result<(View, Role)> {
        if self.element(locator).is_none() {
            return Err(Error::ElementUnavailable(format!("no such element: {}", locator)));
        }
        Ok(self.catalog.identify(locator).unwrap_or((View::Common, Role::Body)))
    }
}

fn segment_after(url: &str, marker: &str) -> Option<String> {
    let rest = &url[url.find(marker)? + marker.len()..];
    Some(rest.split('/').next().unwrap_or_default().to_string())
}

#[async_trait]
impl Driver for FakePortal {
    async fn goto(&mut self, url: &str) -> Result<()> {
        self.log.push(format!("goto {}", url));
        self.url = url.to_string();
        let page = self.route(url);
        self.load(page);
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self.url.clone())
    }

    async fn title(&mut self) -> Result<String> {
        Ok(format!("{:?}", self.page))
    }

    async fn probe(&mut self, locator: &Locator) -> Result<Option<ElementProbe>> {
        Ok(self.element(locator).map(|text| ElementProbe {
            displayed: true,
            enabled: true,
            text,
        }))
    }

    async fn attribute(&mut self, locator: &Locator, name: &str) -> Result<Option<String>> {
        let (view, role) = self.require(locator)?;
        if (view, role, name) == (View::Users, Role::ResultLink, "href") {
            let matches = self.matches();
            let Some(user) = matches.first() else {
                return Ok(None);
            };
            return Ok(Some(format!(
                "{}#view/Microsoft_AAD_UsersAndTenants/UserProfileMenuBlade/~/overview/userId/{}",
                BASE_URL, user.id
            )));
        }
        Ok(None)
    }

    async fn outer_html_all(&mut self, locator: &Locator) -> Result<Vec<String>> {
        let (view, role) = self.require(locator)?;
        let Page::Devices(id) = &self.page else {
            return Ok(Vec::new());
        };
        if (view, role) != (View::Devices, Role::Row) {
            return Ok(Vec::new());
        }
        let user = self.user(id).cloned();
        Ok(user
            .map(|user| {
                user.devices
                    .iter()
                    .map(|cells| {
                        let cells: String = cells
                            .iter()
                            .map(|(k, v)| {
                                format!(
                                    r#"<div class="ms-DetailsRow-cell" data-automation-key="{}"><span>{}</span></div>"#,
                                    k, v
                                )
                            })
                            .collect();
                        format!(r#"<div class="ms-DetailsRow-fields">{}</div>"#, cells)
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn click(&mut self, locator: &Locator) -> Result<()> {
        let (view, role) = self.require(locator)?;
        self.log.push(format!("click {}.{}", view, role));

        match (view, role, self.login_step) {
            (View::Login, Role::NextButton, LoginStep::Username) if !self.login_stuck => {
                self.login_step = LoginStep::Password;
            }
            (View::Login, Role::SignInButton, LoginStep::Password) => {
                self.login_step = LoginStep::StaySignedIn;
            }
            (View::Login, Role::NextButton, LoginStep::StaySignedIn) => {
                self.login_step = LoginStep::Done;
                self.signed_in_as = self.fields.get(&(View::Login, Role::UsernameField)).cloned();
                self.load(Page::Home);
            }
            (View::SessionExpired, Role::TryAgain, _) => {
                if let Page::SessionExpired { resume } = self.page.clone() {
                    self.url = resume.clone();
                    let page = self.route(&resume);
                    self.load(page);
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn send_text(&mut self, locator: &Locator, text: &str) -> Result<()> {
        let key = self.require(locator)?;
        self.log.push(format!("type {}.{} {}", key.0, key.1, text));
        self.fields.entry(key).or_default().push_str(text);
        Ok(())
    }

    async fn press(&mut self, locator: &Locator, key: Key) -> Result<()> {
        let field = self.require(locator)?;
        match key {
            Key::SelectAll => self.selected = Some(field),
            Key::Delete => {
                if self.selected.take() == Some(field) {
                    self.fields.remove(&field);
                }
            }
            Key::Enter if field == (View::Users, Role::SearchField) => {
                let term = self.fields.get(&field).cloned().unwrap_or_default();
                self.log.push(format!("search {}", term));
                self.submitted_search = Some(term);
            }
            _ => {}
        }
        Ok(())
    }

    async fn hover(&mut self, locator: &Locator) -> Result<()> {
        self.require(locator)?;
        Ok(())
    }

    async fn enter_frame(&mut self, frame: &Locator) -> Result<bool> {
        if self.frame.is_some() || self.element(frame).is_none() {
            return Ok(false);
        }
        match self.catalog.identify(frame) {
            Some((view, Role::Frame)) => {
                self.frame = Some(view);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn leave_frames(&mut self) -> Result<()> {
        self.frame = None;
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        Ok(b"\x89PNG\r\n".to_vec())
    }

    async fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

pub fn policy() -> RetryPolicy {
    RetryPolicy {
        view_retries: 6,
        identity_retries: 2,
        page_timeout: Duration::from_secs(20),
    }
}

pub fn session(portal: FakePortal, screenshots: &Path) -> Session<FakePortal> {
    Session::new(
        portal,
        Catalog::standard(),
        BASE_URL,
        Screenshots::new(screenshots),
    )
    .with_default_timeout(Duration::from_secs(30))
}

pub fn credential() -> Credential {
    Credential {
        name: "mem".to_string(),
        email: "ops@example.com".to_string(),
        password: "hunter2".to_string(),
    }
}

pub fn screenshot_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|entries| entries.count()).unwrap_or(0)
}
