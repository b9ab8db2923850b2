// Recovery behaviour of the view navigator against the scripted portal
use std::time::Duration;

use find_info::Error;
use find_info::FrameContext;
use find_info::locators::{Role, View};
use find_info::navigation::{RetryPolicy, Route, reach_view};
use find_info::types::UserId;
use pretty_assertions::assert_eq;

mod common;
use common::{FakePortal, PortalUser, policy, screenshot_count, session};

const USERS_URL: &str =
    "goto https://portal.example/#view/Microsoft_AAD_UsersAndTenants/UserManagementMenuBlade/~/AllUsers";

fn portal() -> FakePortal {
    FakePortal::new(vec![PortalUser::new("aaaa-0001", "a@x.com")]).signed_in()
}

#[tokio::test(start_paused = true)]
async fn test_first_attempt_success() {
    let shots = tempfile::tempdir().unwrap();
    let mut session = session(portal(), shots.path());

    let attempts = reach_view(&mut session, &Route::users(), &policy()).await.unwrap();

    assert_eq!(attempts, Some(1));
    assert_eq!(session.driver_mut().count(USERS_URL), 1);
    assert_eq!(screenshot_count(shots.path()), 0);
}

#[tokio::test(start_paused = true)]
async fn test_home_redirects_are_absorbed() {
    let shots = tempfile::tempdir().unwrap();
    let mut portal = portal();
    portal.redirects_home = 2;
    let mut session = session(portal, shots.path());

    let attempts = reach_view(&mut session, &Route::users(), &policy()).await.unwrap();

    assert_eq!(attempts, Some(3));
    assert_eq!(session.driver_mut().count(USERS_URL), 3);
    // Known anomalies are not screenshot-worthy
    assert_eq!(screenshot_count(shots.path()), 0);
}

#[tokio::test(start_paused = true)]
async fn test_session_expiry_clicks_try_again() {
    let shots = tempfile::tempdir().unwrap();
    let mut portal = portal();
    portal.session_expiries = 1;
    let mut session = session(portal, shots.path());
    let route = Route::devices(&UserId("aaaa-0001".to_string()));

    let attempts = reach_view(&mut session, &route, &policy()).await.unwrap();

    assert_eq!(attempts, Some(2));
    let portal = session.driver_mut();
    assert_eq!(portal.count("click session_expired.try_again"), 1);
    assert!(portal.url.contains("/Devices/userId/aaaa-0001/"));
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_view_retries() {
    let shots = tempfile::tempdir().unwrap();
    let mut portal = portal();
    portal.redirects_home = 10;
    let mut session = session(portal, shots.path());

    let attempts = reach_view(&mut session, &Route::users(), &policy()).await.unwrap();

    assert_eq!(attempts, None);
    assert_eq!(session.driver_mut().count(USERS_URL), 6);
}

#[tokio::test(start_paused = true)]
async fn test_unknown_page_is_captured_every_attempt() {
    let shots = tempfile::tempdir().unwrap();
    let mut session = session(portal(), shots.path());
    let route = Route {
        view: View::Users,
        path: "#view/Nowhere".to_string(),
        marker: "Nowhere",
    };
    let policy = RetryPolicy {
        view_retries: 3,
        ..policy()
    };

    let attempts = reach_view(&mut session, &route, &policy).await.unwrap();

    assert_eq!(attempts, None);
    assert_eq!(screenshot_count(shots.path()), 3);
}

#[tokio::test(start_paused = true)]
async fn test_title_wait_uses_page_timeout() {
    let shots = tempfile::tempdir().unwrap();
    let mut portal = portal();
    portal.redirects_home = 1;
    let mut session = session(portal, shots.path());
    let policy = RetryPolicy {
        page_timeout: Duration::from_secs(5),
        ..policy()
    };

    let start = tokio::time::Instant::now();
    reach_view(&mut session, &Route::users(), &policy).await.unwrap();
    let elapsed = start.elapsed();

    assert!(elapsed >= Duration::from_secs(5));
    assert!(elapsed < Duration::from_secs(30));
}

#[tokio::test(start_paused = true)]
async fn test_frame_scoped_locator_needs_switch() {
    let shots = tempfile::tempdir().unwrap();
    let mut session = session(portal(), shots.path());
    reach_view(&mut session, &Route::users(), &policy()).await.unwrap();

    let search = session.locator(View::Users, Role::SearchField).unwrap();
    let err = session.wait_visible(&search, None).await.unwrap_err();
    assert!(matches!(
        err,
        Error::FrameContext {
            expected: FrameContext::Frame(View::Users),
            active: FrameContext::Document,
            ..
        }
    ));

    assert!(session.switch_to_frame(View::Users, None).await.unwrap().is_satisfied());
    assert!(session.wait_visible(&search, None).await.unwrap().is_satisfied());

    // Navigating away drops the frame context again
    reach_view(&mut session, &Route::users(), &policy()).await.unwrap();
    assert_eq!(session.frame(), FrameContext::Document);
}
