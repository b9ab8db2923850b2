//! Device listing of a resolved user

use tokio::time::Instant;
use tracing::{info, instrument, warn};

use crate::driver::Driver;
use crate::errors::Result;
use crate::extract::device_fields;
use crate::locators::{Role, View};
use crate::navigation::{RetryPolicy, Route, reach_view};
use crate::session::Session;
use crate::types::{DeviceRecord, ResultsState, UserId};

use super::{resolve_user, results_state};

/// Count text the device list shows while empty
pub const DEVICES_BASELINE: &str = "0 devices found";

/// Read every rendered device row of `user_id`, stamped with `email`.
///
/// An unreachable view or an empty list both yield no records.
#[instrument(skip(session, policy), fields(user_id = %user_id))]
pub async fn resolve_devices<D: Driver>(
    session: &mut Session<D>,
    email: &str,
    user_id: &UserId,
    policy: &RetryPolicy,
) -> Result<Vec<DeviceRecord>> {
    let started = Instant::now();
    let timeout = Some(policy.page_timeout);

    if reach_view(session, &Route::devices(user_id), policy)
        .await?
        .is_none()
    {
        return Ok(Vec::new());
    }
    if session.switch_to_frame(View::Devices, timeout).await?.timed_out() {
        return Ok(Vec::new());
    }

    let shimmer = session.locator(View::Devices, Role::LoadingIndicator)?;
    let _ = session.wait_invisible(&shimmer, timeout).await?;

    match results_state(session, View::Devices, DEVICES_BASELINE, timeout).await? {
        ResultsState::Found => {}
        ResultsState::Empty => {
            info!("{} has no devices", email);
            return Ok(Vec::new());
        }
        ResultsState::Undetermined => return Ok(Vec::new()),
    }

    let row = session.locator(View::Devices, Role::Row)?;
    if session.wait_visible(&row, timeout).await?.timed_out() {
        return Ok(Vec::new());
    }

    let records: Vec<DeviceRecord> = session
        .outer_html_all(&row)
        .await?
        .iter()
        .map(|markup| DeviceRecord::new(email, device_fields(markup)))
        .collect();

    info!(
        "Collected {} device(s) for {} in {} ms",
        records.len(),
        email,
        started.elapsed().as_millis()
    );
    Ok(records)
}

/// Resolve each email to its devices and concatenate the results in input
/// order. Emails without a verified user contribute nothing.
pub async fn collect_devices<D: Driver>(
    session: &mut Session<D>,
    emails: &[String],
    policy: &RetryPolicy,
) -> Result<Vec<DeviceRecord>> {
    let mut records = Vec::new();
    for email in emails {
        let Some(user_id) = resolve_user(session, email, policy).await? else {
            warn!("Skipping {}: no matching user", email);
            continue;
        };
        records.extend(resolve_devices(session, email, &user_id, policy).await?);
    }
    Ok(records)
}
