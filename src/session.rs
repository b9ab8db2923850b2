//! Wait engine and interaction primitives over a [`Driver`].
//!
//! A [`Session`] owns the browser, the locator catalog and the one piece of
//! state the portal punishes you for forgetting: which document locators
//! resolve against. Navigation resets it to the top-level document, entering
//! a view's iframe sets it, and every locator-based call checks that the
//! locator's scope matches before touching the browser.
//!
//! Waits are fail-soft. [`Session::wait`] logs and screenshots a timeout and
//! hands back [`WaitOutcome::TimedOut`]; [`Session::poll`] does the same
//! polling silently for callers that expect timeouts as a normal answer.

use std::path::PathBuf;
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{debug, error, info};

use crate::driver::Driver;
use crate::errors::{Error, Result};
use crate::locators::{Catalog, Role, View};
use crate::screenshot::Screenshots;
use crate::types::{FrameContext, Key, Locator, ScrollDirection, WaitOutcome};

/// Base default for waits without an explicit timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(140);
/// Delay between predicate evaluations
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Predicate a wait blocks on
#[derive(Clone, Copy, Debug)]
pub enum Condition<'a> {
    Present(&'a Locator),
    Visible(&'a Locator),
    Invisible(&'a Locator),
    Clickable(&'a Locator),
    TextContains(&'a Locator, &'a str),
    /// Text is non-empty and differs from the baseline
    TextChangedFrom(&'a Locator, &'a str),
    UrlContains(&'a str),
    /// The view's iframe exists; evaluating it enters the frame
    FrameAvailable(View),
}

impl Condition<'_> {
    fn failure(&self, timeout: Duration) -> (String, String) {
        let secs = timeout.as_secs_f64();
        match self {
            Condition::Present(l) => (
                format!("* Element not found within {} seconds! --> {}", secs, l),
                format!("{} not found", l),
            ),
            Condition::Visible(l) => (
                format!("* Element not visible within {} seconds! --> {}", secs, l),
                format!("{} not found", l),
            ),
            Condition::Invisible(l) => (
                format!("* Element not invisible within {} seconds! --> {}", secs, l),
                format!("{} not disappeared", l),
            ),
            Condition::Clickable(l) => (
                format!("* Element not clickable within {} seconds! --> {}", secs, l),
                format!("{} not clickable", l),
            ),
            Condition::TextContains(l, text) => (
                format!("* {} not display within {} seconds! --> {}", text, secs, l),
                format!("{} not display", text),
            ),
            Condition::TextChangedFrom(l, baseline) => (
                format!(
                    "* Text still '{}' after {} seconds! --> {}",
                    baseline, secs, l
                ),
                format!("{} unchanged", baseline),
            ),
            Condition::UrlContains(fragment) => (
                format!("* URL not changed to {} within {} seconds!", fragment, secs),
                format!("url not changed to {}", fragment),
            ),
            Condition::FrameAvailable(view) => (
                format!("* Frame not visible within {} seconds! --> {} frame", secs, view),
                format!("{} frame not found", view),
            ),
        }
    }
}

/// Browser session bound to one portal base URL
pub struct Session<D: Driver> {
    driver: D,
    catalog: Catalog,
    base_url: String,
    frame: FrameContext,
    default_timeout: Duration,
    poll_interval: Duration,
    screenshots: Screenshots,
}

impl<D: Driver> Session<D> {
    pub fn new(
        driver: D,
        catalog: Catalog,
        base_url: impl Into<String>,
        screenshots: Screenshots,
    ) -> Self {
        Self {
            driver,
            catalog,
            base_url: base_url.into(),
            frame: FrameContext::Document,
            default_timeout: DEFAULT_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            screenshots,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Document that locators currently resolve against
    pub fn frame(&self) -> FrameContext {
        self.frame
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Owned copy of a catalog entry
    pub fn locator(&self, view: View, role: Role) -> Result<Locator> {
        self.catalog.get(view, role).cloned()
    }

    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Navigate to a path relative to the base URL
    pub async fn open(&mut self, path: &str) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        self.open_url(&url).await
    }

    /// Navigate to an absolute URL
    pub async fn open_url(&mut self, url: &str) -> Result<()> {
        self.frame = FrameContext::Document;
        self.driver.goto(url).await
    }

    pub async fn current_url(&mut self) -> Result<String> {
        self.driver.current_url().await
    }

    pub async fn title(&mut self) -> Result<String> {
        self.driver.title().await
    }

    /// Wait for a view's iframe and enter it
    pub async fn switch_to_frame(
        &mut self,
        view: View,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome> {
        self.wait(Condition::FrameAvailable(view), timeout).await
    }

    /// Return to the top-level document
    pub async fn leave_frame(&mut self) -> Result<()> {
        self.driver.leave_frames().await?;
        self.frame = FrameContext::Document;
        Ok(())
    }

    /// Poll `condition` until it holds or `timeout` (session default when
    /// `None`) elapses. A zero timeout evaluates exactly once.
    pub async fn poll(
        &mut self,
        condition: Condition<'_>,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome> {
        self.check_condition_scope(&condition)?;
        let timeout = timeout.unwrap_or(self.default_timeout);
        let start = Instant::now();

        loop {
            match self.evaluate(&condition).await {
                Ok(true) => return Ok(WaitOutcome::Satisfied),
                Ok(false) => {}
                Err(e) if e.is_transient() => debug!("Ignoring transient lookup error: {}", e),
                Err(e) => return Err(e),
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Ok(WaitOutcome::TimedOut { waited: elapsed });
            }
            sleep(self.poll_interval.min(timeout - elapsed)).await;
        }
    }

    /// [`poll`](Self::poll), logging and screenshotting on timeout
    pub async fn wait(
        &mut self,
        condition: Condition<'_>,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome> {
        let outcome = self.poll(condition, timeout).await?;
        if outcome.timed_out() {
            let (message, reason) = condition.failure(timeout.unwrap_or(self.default_timeout));
            error!("{}", message);
            self.capture(&reason).await;
        }
        Ok(outcome)
    }

    pub async fn wait_present(&mut self, locator: &Locator, timeout: Option<Duration>) -> Result<WaitOutcome> {
        self.wait(Condition::Present(locator), timeout).await
    }

    pub async fn wait_visible(&mut self, locator: &Locator, timeout: Option<Duration>) -> Result<WaitOutcome> {
        self.wait(Condition::Visible(locator), timeout).await
    }

    pub async fn wait_invisible(&mut self, locator: &Locator, timeout: Option<Duration>) -> Result<WaitOutcome> {
        self.wait(Condition::Invisible(locator), timeout).await
    }

    pub async fn wait_clickable(&mut self, locator: &Locator, timeout: Option<Duration>) -> Result<WaitOutcome> {
        self.wait(Condition::Clickable(locator), timeout).await
    }

    pub async fn wait_text(
        &mut self,
        locator: &Locator,
        text: &str,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome> {
        self.wait(Condition::TextContains(locator, text), timeout).await
    }

    pub async fn wait_url_contains(&mut self, fragment: &str, timeout: Option<Duration>) -> Result<WaitOutcome> {
        let outcome = self.poll(Condition::UrlContains(fragment), timeout).await?;
        if outcome.timed_out() {
            let current = self.current_url().await.unwrap_or_default();
            let secs = timeout.unwrap_or(self.default_timeout).as_secs_f64();
            error!(
                "* URL not changed to {} within {} seconds! --> current URL is {}",
                fragment, secs, current
            );
            self.capture(&format!("url not changed to {}", fragment)).await;
        }
        Ok(outcome)
    }

    /// Whether anything matches right now
    pub async fn exists(&mut self, locator: &Locator) -> Result<bool> {
        self.ensure_scope(locator)?;
        match self.driver.probe(locator).await {
            Ok(probe) => Ok(probe.is_some()),
            Err(e) if e.is_transient() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Visible text of the first match
    pub async fn text(&mut self, locator: &Locator) -> Result<Option<String>> {
        self.ensure_scope(locator)?;
        Ok(self.driver.probe(locator).await?.map(|probe| probe.text))
    }

    pub async fn attribute(&mut self, locator: &Locator, name: &str) -> Result<Option<String>> {
        self.ensure_scope(locator)?;
        self.driver.attribute(locator, name).await
    }

    pub async fn outer_html_all(&mut self, locator: &Locator) -> Result<Vec<String>> {
        self.ensure_scope(locator)?;
        self.driver.outer_html_all(locator).await
    }

    /// Type into a field once it is clickable, optionally wiping it first.
    /// Nothing is typed when the field never became clickable.
    pub async fn input_text(
        &mut self,
        locator: &Locator,
        text: &str,
        overwrite: bool,
        timeout: Option<Duration>,
    ) -> Result<WaitOutcome> {
        let outcome = self.wait_clickable(locator, timeout).await?;
        if outcome.timed_out() {
            return Ok(outcome);
        }
        if overwrite {
            self.driver.press(locator, Key::SelectAll).await?;
            self.driver.press(locator, Key::Delete).await?;
        }
        self.driver.send_text(locator, text).await?;
        Ok(outcome)
    }

    pub async fn press(&mut self, locator: &Locator, key: Key) -> Result<()> {
        self.ensure_scope(locator)?;
        self.driver.press(locator, key).await
    }

    /// Click once clickable; skipped when the wait timed out
    pub async fn click(&mut self, locator: &Locator, timeout: Option<Duration>) -> Result<WaitOutcome> {
        let outcome = self.wait_clickable(locator, timeout).await?;
        if outcome.is_satisfied() {
            self.driver.click(locator).await?;
        }
        Ok(outcome)
    }

    pub async fn hover(&mut self, locator: &Locator) -> Result<()> {
        self.ensure_scope(locator)?;
        self.driver.hover(locator).await
    }

    pub async fn scroll(&mut self, direction: ScrollDirection) -> Result<()> {
        let html = self.locator(View::Common, Role::Html)?;
        self.ensure_scope(&html)?;
        info!("Scrolling page {:?}", direction);
        let key = match direction {
            ScrollDirection::Up => Key::Top,
            ScrollDirection::Down => Key::End,
        };
        self.driver.press(&html, key).await
    }

    /// Save a diagnostic screenshot
    pub async fn capture(&mut self, reason: &str) -> Option<PathBuf> {
        self.screenshots.capture(&mut self.driver, reason).await
    }

    /// End the browser session
    pub async fn close(mut self) -> Result<()> {
        info!("Closing browser session for {}", self.base_url);
        self.driver.close().await
    }

    fn ensure_scope(&self, locator: &Locator) -> Result<()> {
        if locator.scope == self.frame {
            Ok(())
        } else {
            Err(Error::FrameContext {
                selector: locator.selector.to_string(),
                expected: locator.scope,
                active: self.frame,
            })
        }
    }

    fn check_condition_scope(&self, condition: &Condition<'_>) -> Result<()> {
        match condition {
            Condition::Present(l)
            | Condition::Visible(l)
            | Condition::Invisible(l)
            | Condition::Clickable(l)
            | Condition::TextContains(l, _)
            | Condition::TextChangedFrom(l, _) => self.ensure_scope(l),
            Condition::UrlContains(_) => Ok(()),
            Condition::FrameAvailable(view) => {
                let frame = self.catalog.get(*view, Role::Frame)?;
                self.ensure_scope(frame)
            }
        }
    }

    async fn evaluate(&mut self, condition: &Condition<'_>) -> Result<bool> {
        match *condition {
            Condition::Present(l) => Ok(self.driver.probe(l).await?.is_some()),
            Condition::Visible(l) => Ok(self
                .driver
                .probe(l)
                .await?
                .is_some_and(|probe| probe.displayed)),
            Condition::Invisible(l) => match self.driver.probe(l).await {
                Ok(probe) => Ok(probe.is_none_or(|probe| !probe.displayed)),
                // An element that went stale is gone
                Err(e) if e.is_transient() => Ok(true),
                Err(e) => Err(e),
            },
            Condition::Clickable(l) => Ok(self
                .driver
                .probe(l)
                .await?
                .is_some_and(|probe| probe.displayed && probe.enabled)),
            Condition::TextContains(l, text) => Ok(self
                .driver
                .probe(l)
                .await?
                .is_some_and(|probe| probe.text.contains(text))),
            Condition::TextChangedFrom(l, baseline) => {
                Ok(self.driver.probe(l).await?.is_some_and(|probe| {
                    let current = probe.text.trim();
                    !current.is_empty() && current != baseline.trim()
                }))
            }
            Condition::UrlContains(fragment) => {
                Ok(self.driver.current_url().await?.contains(fragment))
            }
            Condition::FrameAvailable(view) => {
                let frame = self.catalog.get(view, Role::Frame)?.clone();
                if self.driver.enter_frame(&frame).await? {
                    debug!("Entered {} frame", view);
                    self.frame = FrameContext::Frame(view);
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
