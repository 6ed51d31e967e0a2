pub mod webdriver;

#[cfg(test)]
pub mod scripted;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ScrapeResult;
use crate::parser::norm_text;

/// How an element is looked up on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locator {
    /// CSS selector.
    Css(&'static str),
    /// Innermost element whose own text contains the phrase.
    Text(&'static str),
}

/// Browser page capability used by every extraction stage.
///
/// Lookups that time out resolve to `Ok(None)` (or an empty list); `Err` is
/// reserved for failures of the driver itself. `scope` restricts a lookup to
/// the descendants of an element; `None` searches the whole page.
#[async_trait]
pub trait PageDriver: Send + Sync {
    type Handle: Clone + Send + Sync;

    async fn navigate(&self, url: &str) -> ScrapeResult<()>;

    async fn find(
        &self,
        scope: Option<&Self::Handle>,
        locator: Locator,
        timeout: Duration,
    ) -> ScrapeResult<Option<Self::Handle>>;

    async fn find_all(
        &self,
        scope: Option<&Self::Handle>,
        locator: Locator,
    ) -> ScrapeResult<Vec<Self::Handle>>;

    /// The `levels`-th ancestor (1 = parent).
    async fn ancestor(&self, handle: &Self::Handle, levels: usize)
        -> ScrapeResult<Option<Self::Handle>>;

    async fn click(&self, handle: &Self::Handle) -> ScrapeResult<()>;

    async fn scroll(&self, dx: i64, dy: i64) -> ScrapeResult<()>;

    async fn read_text(&self, handle: &Self::Handle) -> ScrapeResult<String>;

    async fn read_attribute(&self, handle: &Self::Handle, name: &str)
        -> ScrapeResult<Option<String>>;

    async fn current_title(&self) -> ScrapeResult<String>;

    async fn current_html(&self) -> ScrapeResult<String>;
}

/// Find an element and return its whitespace-normalized text.
pub async fn find_text<D: PageDriver>(
    driver: &D,
    scope: Option<&D::Handle>,
    locator: Locator,
    timeout: Duration,
) -> ScrapeResult<Option<String>> {
    match driver.find(scope, locator, timeout).await? {
        Some(handle) => Ok(Some(norm_text(&driver.read_text(&handle).await?))),
        None => Ok(None),
    }
}

/// Click an element if it shows up within `timeout`. Click failures are
/// reported as `false`.
pub async fn click_if_present<D: PageDriver>(
    driver: &D,
    locator: Locator,
    timeout: Duration,
) -> ScrapeResult<bool> {
    let Some(handle) = driver.find(None, locator, timeout).await? else {
        return Ok(false);
    };
    match driver.click(&handle).await {
        Ok(()) => Ok(true),
        Err(e) => {
            tracing::debug!("Click on {:?} failed: {}", locator, e);
            Ok(false)
        }
    }
}
