use thiserror::Error;

/// Failures raised by the page driver. An element that is simply not on the
/// page is never an error: lookups report it as `None` or an empty list.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("WebDriver error: {0}")]
    WebDriver(#[from] thirtyfour::error::WebDriverError),

    #[error("Navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("Bot interstitial still present on {0}")]
    Interstitial(String),

    #[error("Driver error: {0}")]
    Driver(String),
}

pub type ScrapeResult<T> = std::result::Result<T, ScrapeError>;
