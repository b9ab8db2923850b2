use std::path::Path;

use async_trait::async_trait;
use fantoccini::key::Key as WdKey;
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use tracing::{debug, info};

use crate::driver::Driver;
use crate::errors::{Error, Result};
use crate::types::{ElementProbe, Key, Locator, Strategy};

/// Supported browser types
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserType {
    /// Mozilla Firefox
    Firefox,
    /// Google Chrome/Chromium
    Chrome,
}

impl std::str::FromStr for BrowserType {
    type Err = Error;

    /// Parse browser type from string (case-insensitive)
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "firefox" => Ok(BrowserType::Firefox),
            "chrome" | "chromium" => Ok(BrowserType::Chrome),
            _ => Err(Error::Config(format!("Unsupported browser: {}", s))),
        }
    }
}

impl std::fmt::Display for BrowserType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrowserType::Firefox => write!(f, "firefox"),
            BrowserType::Chrome => write!(f, "chrome"),
        }
    }
}

impl BrowserType {
    /// Default WebDriver URL for this browser type
    pub fn default_webdriver_url(&self) -> &'static str {
        match self {
            BrowserType::Firefox => "http://localhost:4444",
            BrowserType::Chrome => "http://localhost:9515",
        }
    }

    fn driver_name(&self) -> &'static str {
        match self {
            BrowserType::Firefox => "geckodriver",
            BrowserType::Chrome => "chromedriver",
        }
    }

    /// WebDriver capabilities for a run
    pub fn capabilities(
        &self,
        headless: bool,
        download_dir: &Path,
    ) -> serde_json::Map<String, serde_json::Value> {
        let mut caps = serde_json::Map::new();
        let download_dir = download_dir.display().to_string();

        match self {
            BrowserType::Firefox => {
                let mut args = Vec::new();
                if headless {
                    args.push("--headless".to_string());
                }
                caps.insert(
                    "moz:firefoxOptions".to_string(),
                    json!({
                        "args": args,
                        "prefs": {
                            "browser.download.dir": download_dir,
                            "browser.download.folderList": 2,
                            "browser.download.useDownloadDir": true,
                        }
                    }),
                );
            }
            BrowserType::Chrome => {
                let mut args = vec!["--no-sandbox".to_string()];
                if headless {
                    // Chrome 112+ changed headless behavior
                    args.push("--headless=new".to_string());
                    args.push("--disable-gpu".to_string());
                    args.push("--disable-dev-shm-usage".to_string());
                }
                args.push("--window-size=1920,1080".to_string());
                caps.insert(
                    "goog:chromeOptions".to_string(),
                    json!({
                        "args": args,
                        "prefs": {
                            "download.default_directory": download_dir,
                            "download.prompt_for_download": false,
                        }
                    }),
                );
            }
        }

        caps
    }
}

/// [`Driver`] backed by a WebDriver session
pub struct WebDriverSession {
    client: Client,
    browser_type: BrowserType,
}

impl WebDriverSession {
    /// Open a new browser session
    ///
    /// # Arguments
    /// * `browser_type` - Firefox or Chrome
    /// * `webdriver_url` - Endpoint override, defaults per browser
    /// * `headless` - Whether to run in headless mode
    /// * `download_dir` - Where the browser should save downloads
    pub async fn connect(
        browser_type: BrowserType,
        webdriver_url: Option<&str>,
        headless: bool,
        download_dir: &Path,
    ) -> Result<Self> {
        let webdriver_url = webdriver_url.unwrap_or(browser_type.default_webdriver_url());
        info!("Connecting to {:?} WebDriver at {}", browser_type, webdriver_url);

        if !Self::is_webdriver_running(webdriver_url).await {
            let driver_name = browser_type.driver_name();
            return Err(Error::WebDriverFailed(format!(
                "Cannot connect to {} at {}.\n\
                Please ensure {} is running:\n\
                  For Firefox: geckodriver --port 4444\n\
                  For Chrome: chromedriver --port 9515",
                driver_name, webdriver_url, driver_name
            )));
        }

        let caps = browser_type.capabilities(headless, download_dir);
        debug!("Requesting capabilities {:?}", caps);

        let client = ClientBuilder::rustls()
            .capabilities(caps)
            .connect(webdriver_url)
            .await?;

        Ok(Self {
            client,
            browser_type,
        })
    }

    pub fn browser_type(&self) -> BrowserType {
        self.browser_type
    }

    async fn is_webdriver_running(url: &str) -> bool {
        // Try to connect to the WebDriver status endpoint
        let status_url = format!("{}/status", url.trim_end_matches('/'));

        match reqwest::get(&status_url).await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn first(&self, locator: &Locator) -> Result<fantoccini::elements::Element> {
        Ok(self.client.find(wd_locator(locator)).await?)
    }
}

fn wd_locator(locator: &Locator) -> fantoccini::Locator<'_> {
    let selector = locator.selector.as_ref();
    match locator.strategy {
        Strategy::Css => fantoccini::Locator::Css(selector),
        Strategy::Xpath => fantoccini::Locator::XPath(selector),
        Strategy::Id => fantoccini::Locator::Id(selector),
    }
}

fn key_sequence(key: Key) -> String {
    let control = char::from(WdKey::Control);
    let release = char::from(WdKey::Null);
    match key {
        Key::Enter => char::from(WdKey::Enter).to_string(),
        Key::Delete => char::from(WdKey::Delete).to_string(),
        Key::End => char::from(WdKey::End).to_string(),
        Key::SelectAll => format!("{}a{}", control, release),
        Key::Top => format!("{}{}{}", control, char::from(WdKey::Home), release),
    }
}

#[async_trait]
impl Driver for WebDriverSession {
    async fn goto(&mut self, url: &str) -> Result<()> {
        info!("Navigating to {}", url);
        self.client.goto(url).await?;

        // Wait for the page to be ready
        // This helps avoid stale element references
        let wait_script = "return document.readyState === 'complete';";
        for _ in 0..20 {
            match self.client.execute(wait_script, vec![]).await {
                Ok(val) if val.as_bool().unwrap_or(false) => break,
                _ => tokio::time::sleep(tokio::time::Duration::from_millis(100)).await,
            }
        }

        Ok(())
    }

    async fn current_url(&mut self) -> Result<String> {
        Ok(self.client.current_url().await?.to_string())
    }

    async fn title(&mut self) -> Result<String> {
        let value = self.client.execute("return document.title;", vec![]).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn probe(&mut self, locator: &Locator) -> Result<Option<ElementProbe>> {
        let elements = self.client.find_all(wd_locator(locator)).await?;
        let Some(element) = elements.into_iter().next() else {
            return Ok(None);
        };

        Ok(Some(ElementProbe {
            displayed: element.is_displayed().await?,
            enabled: element.is_enabled().await?,
            text: element.text().await?,
        }))
    }

    async fn attribute(&mut self, locator: &Locator, name: &str) -> Result<Option<String>> {
        let element = self.first(locator).await?;
        Ok(element.attr(name).await?)
    }

    async fn outer_html_all(&mut self, locator: &Locator) -> Result<Vec<String>> {
        let elements = self.client.find_all(wd_locator(locator)).await?;
        let mut markup = Vec::with_capacity(elements.len());
        for element in elements {
            markup.push(element.html(false).await?);
        }
        Ok(markup)
    }

    async fn click(&mut self, locator: &Locator) -> Result<()> {
        debug!("Clicking {}", locator);
        self.first(locator).await?.click().await?;
        Ok(())
    }

    async fn send_text(&mut self, locator: &Locator, text: &str) -> Result<()> {
        self.first(locator).await?.send_keys(text).await?;
        Ok(())
    }

    async fn press(&mut self, locator: &Locator, key: Key) -> Result<()> {
        debug!("Pressing {:?} on {}", key, locator);
        self.first(locator)
            .await?
            .send_keys(&key_sequence(key))
            .await?;
        Ok(())
    }

    async fn hover(&mut self, locator: &Locator) -> Result<()> {
        let element = self.first(locator).await?;
        let arg = serde_json::to_value(&element).map_err(|e| Error::Driver(e.to_string()))?;
        let script = r#"
            arguments[0].scrollIntoView({block: 'center'});
            arguments[0].dispatchEvent(new MouseEvent('mouseover', {bubbles: true}));
            arguments[0].dispatchEvent(new MouseEvent('mouseenter', {bubbles: false}));
        "#;
        self.client.execute(script, vec![arg]).await?;
        Ok(())
    }

    async fn enter_frame(&mut self, frame: &Locator) -> Result<bool> {
        match self.client.find(wd_locator(frame)).await {
            Ok(element) => {
                element.enter_frame().await?;
                Ok(true)
            }
            Err(e) if e.is_miss() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn leave_frames(&mut self) -> Result<()> {
        self.client.enter_frame(None).await?;
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>> {
        Ok(self.client.screenshot().await?)
    }

    async fn close(&mut self) -> Result<()> {
        self.client.clone().close().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_browser_type_parse() {
        assert_eq!("Firefox".parse::<BrowserType>().unwrap(), BrowserType::Firefox);
        assert_eq!(" chromium ".parse::<BrowserType>().unwrap(), BrowserType::Chrome);
        assert!("safari".parse::<BrowserType>().is_err());
    }

    #[test]
    fn test_chrome_capabilities() {
        let caps = BrowserType::Chrome.capabilities(true, &PathBuf::from("/tmp/dl"));
        let opts = &caps["goog:chromeOptions"];
        let args: Vec<&str> = opts["args"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|a| a.as_str())
            .collect();
        assert!(args.contains(&"--headless=new"));
        assert_eq!(opts["prefs"]["download.default_directory"], "/tmp/dl");
    }

    #[test]
    fn test_firefox_capabilities_visible() {
        let caps = BrowserType::Firefox.capabilities(false, &PathBuf::from("/tmp/dl"));
        let opts = &caps["moz:firefoxOptions"];
        assert!(opts["args"].as_array().unwrap().is_empty());
        assert_eq!(opts["prefs"]["browser.download.dir"], "/tmp/dl");
    }

    #[test]
    fn test_key_sequences_release_modifiers() {
        let select_all = key_sequence(Key::SelectAll);
        assert!(select_all.contains('a'));
        assert!(select_all.ends_with(char::from(WdKey::Null)));
        assert_eq!(key_sequence(Key::Enter).chars().count(), 1);
    }

    #[tokio::test]
    async fn test_is_webdriver_running() {
        // Should return false for a URL that's not running
        assert!(!WebDriverSession::is_webdriver_running("http://localhost:65432").await);
    }
}
