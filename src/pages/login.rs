//! SSO sign-in.
//!
//! Every step is attempted even when the previous wait timed out. A stuck
//! step shows up as a logged timeout and a screenshot, and usually as a
//! confusing failure further down the run; the flow itself never stops early.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, instrument};

use crate::config::Credential;
use crate::driver::Driver;
use crate::errors::Result;
use crate::locators::{Role, View};
use crate::session::Session;
use crate::types::Locator;

/// Open the portal and sign in as `credential`.
///
/// `landmark`, when given, is waited for once the "stay signed in" prompt
/// has been dismissed.
#[instrument(skip_all, fields(user = %credential.name))]
pub async fn sign_in<D: Driver>(
    session: &mut Session<D>,
    credential: &Credential,
    landmark: Option<&Locator>,
    timeout: Option<Duration>,
) -> Result<()> {
    let started = Instant::now();

    session.open("").await?;
    let logo = session.locator(View::Login, Role::Logo)?;
    let _ = session.wait_visible(&logo, timeout).await?;

    let username = session.locator(View::Login, Role::UsernameField)?;
    let next = session.locator(View::Login, Role::NextButton)?;
    let display_name = session.locator(View::Login, Role::DisplayName)?;
    let password = session.locator(View::Login, Role::PasswordField)?;
    let sign_in = session.locator(View::Login, Role::SignInButton)?;
    let stay_signed_in = session.locator(View::Login, Role::StaySignedIn)?;

    let _ = session
        .input_text(&username, &credential.email, true, timeout)
        .await?;
    let _ = session.click(&next, timeout).await?;
    let _ = session.wait_visible(&display_name, timeout).await?;
    let _ = session
        .input_text(&password, &credential.password, false, timeout)
        .await?;
    let _ = session.click(&sign_in, timeout).await?;
    let _ = session.wait_visible(&stay_signed_in, timeout).await?;
    let _ = session.click(&next, timeout).await?;

    if let Some(landmark) = landmark {
        let _ = session.wait_visible(landmark, timeout).await?;
    }

    info!(
        "Signed in as {} in {} ms",
        credential.email,
        started.elapsed().as_millis()
    );
    Ok(())
}
