use std::time::Duration;

use async_trait::async_trait;
use thirtyfour::prelude::*;
use tracing::info;

use super::{Locator, PageDriver};
use crate::config::ScrapeSettings;
use crate::error::{ScrapeError, ScrapeResult};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One long-lived browser session (cookies, selected pickup point).
///
/// Acquired once per run with [`BrowserSession::start`], passed by reference
/// into every stage and released with [`BrowserSession::close`].
pub struct BrowserSession {
    driver: WebDriver,
}

impl BrowserSession {
    pub async fn start(
        webdriver_url: &str,
        headless: bool,
        settings: &ScrapeSettings,
    ) -> ScrapeResult<Self> {
        url::Url::parse(webdriver_url)
            .map_err(|e| ScrapeError::Driver(format!("invalid WebDriver URL {webdriver_url}: {e}")))?;

        let mut caps = DesiredCapabilities::chrome();
        caps.add_arg("--no-sandbox")?;
        caps.add_arg("--disable-gpu")?;
        caps.add_arg("--lang=ru-RU")?;
        caps.add_arg("--window-size=1920,1080")?;
        if headless {
            caps.set_headless()?;
        }

        info!("Connecting to WebDriver at {}", webdriver_url);
        let driver = WebDriver::new(webdriver_url, caps).await?;
        driver.set_page_load_timeout(settings.nav_timeout).await?;
        driver.set_script_timeout(settings.action_timeout).await?;
        Ok(Self { driver })
    }

    pub async fn close(self) -> ScrapeResult<()> {
        info!("Closing browser session");
        self.driver.quit().await?;
        Ok(())
    }
}

fn to_by(locator: Locator, scoped: bool) -> By {
    match locator {
        Locator::Css(css) => By::Css(css),
        Locator::Text(phrase) => {
            let axis = if scoped { ".//" } else { "//" };
            By::XPath(format!(
                "{axis}*[text()[contains(normalize-space(.), {})]]",
                xpath_literal(phrase)
            ))
        }
    }
}

/// Quote a string for use inside an XPath expression.
fn xpath_literal(s: &str) -> String {
    if !s.contains('\'') {
        format!("'{s}'")
    } else if !s.contains('"') {
        format!("\"{s}\"")
    } else {
        let parts: Vec<String> = s.split('\'').map(|p| format!("'{p}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

#[async_trait]
impl PageDriver for BrowserSession {
    type Handle = WebElement;

    async fn navigate(&self, url: &str) -> ScrapeResult<()> {
        self.driver
            .goto(url)
            .await
            .map_err(|e| ScrapeError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn find(
        &self,
        scope: Option<&WebElement>,
        locator: Locator,
        timeout: Duration,
    ) -> ScrapeResult<Option<WebElement>> {
        let by = to_by(locator, scope.is_some());
        let found = match scope {
            Some(root) => root.query(by).wait(timeout, POLL_INTERVAL).first_opt().await?,
            None => self.driver.query(by).wait(timeout, POLL_INTERVAL).first_opt().await?,
        };
        Ok(found)
    }

    async fn find_all(
        &self,
        scope: Option<&WebElement>,
        locator: Locator,
    ) -> ScrapeResult<Vec<WebElement>> {
        let by = to_by(locator, scope.is_some());
        let found = match scope {
            Some(root) => root.find_all(by).await?,
            None => self.driver.find_all(by).await?,
        };
        Ok(found)
    }

    async fn ancestor(&self, handle: &WebElement, levels: usize) -> ScrapeResult<Option<WebElement>> {
        if levels == 0 {
            return Ok(Some(handle.clone()));
        }
        let xpath = format!("ancestor::*[{levels}]");
        let mut found = handle.find_all(By::XPath(xpath)).await?;
        Ok(if found.is_empty() { None } else { Some(found.swap_remove(0)) })
    }

    async fn click(&self, handle: &WebElement) -> ScrapeResult<()> {
        handle.click().await?;
        Ok(())
    }

    async fn scroll(&self, dx: i64, dy: i64) -> ScrapeResult<()> {
        self.driver
            .execute(
                "window.scrollBy(arguments[0], arguments[1]);",
                vec![serde_json::json!(dx), serde_json::json!(dy)],
            )
            .await?;
        Ok(())
    }

    async fn read_text(&self, handle: &WebElement) -> ScrapeResult<String> {
        Ok(handle.text().await?)
    }

    async fn read_attribute(&self, handle: &WebElement, name: &str) -> ScrapeResult<Option<String>> {
        Ok(handle.attr(name).await?)
    }

    async fn current_title(&self) -> ScrapeResult<String> {
        Ok(self.driver.title().await?)
    }

    async fn current_html(&self) -> ScrapeResult<String> {
        Ok(self.driver.source().await?)
    }
}
