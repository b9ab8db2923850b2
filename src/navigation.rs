//! Reaching a portal view despite redirects and expired sessions.
//!
//! Each attempt navigates to the route and waits for the view title. When
//! the title never shows, the page is inspected for the two anomalies the
//! portal is known for: a bounce to the home page and the "session expired"
//! interstitial. Both are absorbed and the attempt is repeated. Anything
//! else is logged and also retried, until the retry budget runs out.

use std::time::Duration;

use tracing::{error, info, warn};

use crate::driver::Driver;
use crate::errors::Result;
use crate::locators::{Role, View};
use crate::session::{Condition, Session};
use crate::types::{Locator, UserId};

/// User directory listing
pub const USERS_PATH: &str = "#view/Microsoft_AAD_UsersAndTenants/UserManagementMenuBlade/~/AllUsers";

/// Bounds applied by the view and identity retry loops
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts to reach a view before giving up
    pub view_retries: usize,
    /// Search and verify cycles per email
    pub identity_retries: usize,
    /// Default wait for directory, device and profile views
    pub page_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            view_retries: 6,
            identity_retries: 2,
            page_timeout: Duration::from_secs(20),
        }
    }
}

/// Where a view lives, relative to the portal base URL
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Route {
    pub view: View,
    pub path: String,
    /// URL fragment that identifies the view after a reload
    pub marker: &'static str,
}

impl Route {
    pub fn users() -> Self {
        Self {
            view: View::Users,
            path: USERS_PATH.to_string(),
            marker: "AllUsers",
        }
    }

    pub fn devices(user_id: &UserId) -> Self {
        Self {
            view: View::Devices,
            path: format!(
                "#view/Microsoft_AAD_UsersAndTenants/UserProfileMenuBlade/~/Devices/userId/{}/hidePreviewBanner~/true",
                user_id
            ),
            marker: "Devices",
        }
    }

    pub fn profile(user_id: &UserId) -> Self {
        Self {
            view: View::Profile,
            path: format!(
                "#view/Microsoft_AAD_UsersAndTenants/UserProfileMenuBlade/~/overview/userId/{}",
                user_id
            ),
            marker: "overview",
        }
    }
}

/// Progress of a single navigation attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NavigationState {
    Navigating,
    TitleWait,
    Success,
    /// Portal bounced to its home page
    RedirectedHome,
    /// Session expired interstitial was acknowledged
    SessionExpired,
    /// Title missing and no known anomaly on screen
    TimedOutUnrecoverable,
}

impl NavigationState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, NavigationState::Navigating | NavigationState::TitleWait)
    }
}

/// Try to reach `route` up to `policy.view_retries` times.
///
/// Returns the number of attempts it took, or `None` once the budget is
/// spent. Exhaustion is not an error; callers decide what a missing view
/// means for them.
pub async fn reach_view<D: Driver>(
    session: &mut Session<D>,
    route: &Route,
    policy: &RetryPolicy,
) -> Result<Option<usize>> {
    for attempt in 1..=policy.view_retries {
        match run_attempt(session, route, policy).await? {
            NavigationState::Success => {
                info!("Reached {} view on attempt {}", route.view, attempt);
                return Ok(Some(attempt));
            }
            NavigationState::RedirectedHome => {
                warn!("Redirected to home while opening {} view, retrying", route.view)
            }
            NavigationState::SessionExpired => {
                warn!("Session expired while opening {} view, retrying", route.view)
            }
            state => {
                error!(
                    "Attempt {}/{} to open {} view ended in {:?}",
                    attempt, policy.view_retries, route.view, state
                );
                session
                    .capture(&format!("{} view attempt {}", route.view, attempt))
                    .await;
            }
        }
    }

    error!(
        "Giving up on {} view after {} attempts",
        route.view, policy.view_retries
    );
    Ok(None)
}

async fn run_attempt<D: Driver>(
    session: &mut Session<D>,
    route: &Route,
    policy: &RetryPolicy,
) -> Result<NavigationState> {
    let mut state = NavigationState::Navigating;
    while !state.is_terminal() {
        state = match state {
            NavigationState::Navigating => {
                session.open(&route.path).await?;
                NavigationState::TitleWait
            }
            NavigationState::TitleWait => {
                let title = session.locator(route.view, Role::Title)?;
                let outcome = session
                    .poll(Condition::Visible(&title), Some(policy.page_timeout))
                    .await?;
                if outcome.is_satisfied() {
                    NavigationState::Success
                } else {
                    diagnose(session, route, policy).await?
                }
            }
            terminal => terminal,
        };
    }
    Ok(state)
}

/// Classify a missing title, recovering from an expired session on the way
async fn diagnose<D: Driver>(
    session: &mut Session<D>,
    route: &Route,
    policy: &RetryPolicy,
) -> Result<NavigationState> {
    let home = session.locator(View::Home, Role::Title)?;
    if is_visible_now(session, &home).await? {
        return Ok(NavigationState::RedirectedHome);
    }

    let expired = session.locator(View::SessionExpired, Role::Title)?;
    if is_visible_now(session, &expired).await? {
        let try_again = session.locator(View::SessionExpired, Role::TryAgain)?;
        if session
            .click(&try_again, Some(policy.page_timeout))
            .await?
            .timed_out()
        {
            warn!("Session expired prompt on {} view without a usable try again button", route.view);
        }
        let _ = session
            .wait_url_contains(route.marker, Some(policy.page_timeout))
            .await?;
        return Ok(NavigationState::SessionExpired);
    }

    Ok(NavigationState::TimedOutUnrecoverable)
}

async fn is_visible_now<D: Driver>(
    session: &mut Session<D>,
    locator: &Locator,
) -> Result<bool> {
    let outcome = session
        .poll(Condition::Visible(locator), Some(Duration::ZERO))
        .await?;
    Ok(outcome.is_satisfied())
}
