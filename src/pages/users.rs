//! Resolving an email to a directory user id.
//!
//! Directory search is a substring match, so a hit is only trusted after the
//! candidate's profile shows the same email.

use lazy_static::lazy_static;
use regex::Regex;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::driver::Driver;
use crate::errors::Result;
use crate::locators::{Role, View};
use crate::navigation::{RetryPolicy, Route, reach_view};
use crate::session::Session;
use crate::types::{Key, ResultsState, UserId};

use super::results_state;

/// Count text the directory shows before a search matched anything
pub const USERS_BASELINE: &str = "0 users found";

lazy_static! {
    static ref USER_ID: Option<Regex> = Regex::new(r"userId/([0-9a-fA-F-]+)").ok();
}

/// Pull the user id out of a result link target
pub fn parse_user_id(href: &str) -> Option<UserId> {
    USER_ID
        .as_ref()?
        .captures(href)
        .and_then(|caps| caps.get(1))
        .map(|id| UserId(id.as_str().to_string()))
}

/// Trimmed, case-insensitive email comparison
pub fn same_email(shown: &str, wanted: &str) -> bool {
    shown.trim().to_lowercase() == wanted.trim().to_lowercase()
}

/// Search the directory for `email` and return the id of the account whose
/// profile shows exactly that email.
///
/// `None` when the directory has no match, when the views could not be
/// reached, or when every verification attempt landed on another account.
#[instrument(skip(session, policy))]
pub async fn resolve_user<D: Driver>(
    session: &mut Session<D>,
    email: &str,
    policy: &RetryPolicy,
) -> Result<Option<UserId>> {
    let started = Instant::now();

    for attempt in 1..=policy.identity_retries {
        let Some(candidate) = search(session, email, policy).await? else {
            info!("No user found for {}", email);
            return Ok(None);
        };

        if verify(session, &candidate, email, policy).await? {
            info!(
                "Resolved {} to user {} in {} ms",
                email,
                candidate,
                started.elapsed().as_millis()
            );
            return Ok(Some(candidate));
        }
        warn!(
            "User {} does not belong to {} (attempt {}/{})",
            candidate, email, attempt, policy.identity_retries
        );
    }

    warn!("Could not verify a user for {}", email);
    Ok(None)
}

async fn search<D: Driver>(
    session: &mut Session<D>,
    email: &str,
    policy: &RetryPolicy,
) -> Result<Option<UserId>> {
    let timeout = Some(policy.page_timeout);

    if reach_view(session, &Route::users(), policy).await?.is_none() {
        return Ok(None);
    }
    if session.switch_to_frame(View::Users, timeout).await?.timed_out() {
        return Ok(None);
    }

    let search_field = session.locator(View::Users, Role::SearchField)?;
    if session
        .input_text(&search_field, email, true, timeout)
        .await?
        .timed_out()
    {
        return Ok(None);
    }
    session.press(&search_field, Key::Enter).await?;

    let loading = session.locator(View::Users, Role::LoadingIndicator)?;
    let _ = session.wait_invisible(&loading, timeout).await?;

    match results_state(session, View::Users, USERS_BASELINE, timeout).await? {
        ResultsState::Found => {}
        ResultsState::Empty | ResultsState::Undetermined => return Ok(None),
    }

    let link = session.locator(View::Users, Role::ResultLink)?;
    if session.wait_present(&link, timeout).await?.timed_out() {
        return Ok(None);
    }
    let href = session.attribute(&link, "href").await?.unwrap_or_default();
    debug!("First result links to {}", href);

    let user_id = parse_user_id(&href);
    if user_id.is_none() {
        warn!("No user id in result link '{}'", href);
    }
    Ok(user_id)
}

async fn verify<D: Driver>(
    session: &mut Session<D>,
    user_id: &UserId,
    email: &str,
    policy: &RetryPolicy,
) -> Result<bool> {
    if reach_view(session, &Route::profile(user_id), policy)
        .await?
        .is_none()
    {
        return Ok(false);
    }

    let shown = session.locator(View::Profile, Role::Email)?;
    if session
        .wait_visible(&shown, Some(policy.page_timeout))
        .await?
        .timed_out()
    {
        return Ok(false);
    }
    let shown = session.text(&shown).await?.unwrap_or_default();
    debug!("Profile of {} shows {}", user_id, shown);
    Ok(same_email(&shown, email))
}
