//! Browser capability consumed by [`Session`](crate::session::Session).
//!
//! Lookups address the first element matching a locator inside whatever
//! document the driver currently has entered. Frame bookkeeping lives in the
//! session; the driver only performs the switch it is told to.

use async_trait::async_trait;

use crate::errors::Result;
use crate::types::{ElementProbe, Key, Locator};

#[async_trait]
pub trait Driver: Send {
    /// Load `url` in the current window
    async fn goto(&mut self, url: &str) -> Result<()>;

    async fn current_url(&mut self) -> Result<String>;

    async fn title(&mut self) -> Result<String>;

    /// State of the first match, `None` when nothing matches
    async fn probe(&mut self, locator: &Locator) -> Result<Option<ElementProbe>>;

    async fn attribute(&mut self, locator: &Locator, name: &str) -> Result<Option<String>>;

    /// Outer markup of every match, in document order
    async fn outer_html_all(&mut self, locator: &Locator) -> Result<Vec<String>>;

    async fn click(&mut self, locator: &Locator) -> Result<()>;

    async fn send_text(&mut self, locator: &Locator, text: &str) -> Result<()>;

    async fn press(&mut self, locator: &Locator, key: Key) -> Result<()>;

    /// Move the pointer over the first match
    async fn hover(&mut self, locator: &Locator) -> Result<()>;

    /// Enter the iframe matched by `frame`; `false` when it is not there yet
    async fn enter_frame(&mut self, frame: &Locator) -> Result<bool>;

    /// Return to the top-level document
    async fn leave_frames(&mut self) -> Result<()>;

    /// PNG of the current viewport
    async fn screenshot(&mut self) -> Result<Vec<u8>>;

    /// End the browser session
    async fn close(&mut self) -> Result<()>;
}
