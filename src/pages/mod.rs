//! Workflows over the portal views.
//!
//! Each workflow is a plain async function taking the [`Session`] it drives.
//! They never hold on to elements across steps; every interaction resolves
//! its locator again against the session's current frame.

pub mod devices;
pub mod login;
pub mod users;

use std::time::Duration;

use tracing::{info, warn};

use crate::driver::Driver;
use crate::errors::Result;
use crate::locators::{Role, View};
use crate::session::{Condition, Session};
use crate::types::ResultsState;

pub use devices::{DEVICES_BASELINE, collect_devices, resolve_devices};
pub use login::sign_in;
pub use users::{USERS_BASELINE, parse_user_id, resolve_user};

/// Decide whether a filtered list has results.
///
/// The count text of `view` must move away from `baseline` within
/// `timeout`. When it does not, the explicit "no results" marker is given
/// the same bound; seeing it means the list is empty, seeing neither leaves
/// the state undetermined. The timed-out marker wait has already saved a
/// screenshot by then.
pub async fn results_state<D: Driver>(
    session: &mut Session<D>,
    view: View,
    baseline: &str,
    timeout: Option<Duration>,
) -> Result<ResultsState> {
    let count = session.locator(view, Role::ResultCount)?;
    let changed = session
        .poll(Condition::TextChangedFrom(&count, baseline), timeout)
        .await?;
    if changed.is_satisfied() {
        return Ok(ResultsState::Found);
    }

    let no_results = session.locator(view, Role::NoResults)?;
    if session.wait_visible(&no_results, timeout).await?.is_satisfied() {
        info!("{} view reports no results", view);
        Ok(ResultsState::Empty)
    } else {
        warn!(
            "{} view showed neither results nor an empty marker, treating as not found",
            view
        );
        Ok(ResultsState::Undetermined)
    }
}
