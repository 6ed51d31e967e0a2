use std::time::Duration;

use anyhow::{Context, Result};

pub const DB_PATH: &str = "data/margin.sqlite";
pub const WEBDRIVER_URL: &str = "http://localhost:9515";

pub const BASE_URL: &str = "https://www.ozon.ru/";
pub const PICKUP_URL: &str = "https://www.ozon.ru/geo/himki/387923/";

/// Product links taken from the search results of one query.
pub const TOP_N_PRODUCTS: usize = 5;
/// Ideas requested from the language model per seed.
pub const IDEAS_PER_SEED: usize = 20;

pub const NAV_TIMEOUT_MS: u64 = 45_000;
pub const ACTION_TIMEOUT_MS: u64 = 15_000;
pub const SETTLE_PAUSE_MS: u64 = 2_000;
pub const SCROLL_PAUSE_MS: u64 = 900;
pub const LOAD_MORE_PAUSE_MS: u64 = 800;
pub const INTERSTITIAL_WAIT_MS: u64 = 15_000;

/// Pixels scrolled per discovery round.
pub const SCROLL_STEP_PX: i64 = 900;

/// Consecutive discovery rounds without new links before giving up.
pub const STABLE_ROUND_LIMIT: u32 = 4;

/// Upper bound on "load more" rounds inside the offers panel.
pub const MAX_OFFER_ROUNDS: usize = 30;

/// Anchors inspected per discovery round.
pub const LINK_SCAN_CAP: usize = 300;

/// Knobs of the browser-facing stages. Tests build it with zero pauses.
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    pub base_url: String,
    pub pickup_url: Option<String>,
    pub top_products: usize,
    pub nav_timeout: Duration,
    pub action_timeout: Duration,
    pub settle_pause: Duration,
    pub scroll_pause: Duration,
    pub load_more_pause: Duration,
    pub interstitial_wait: Duration,
    pub scroll_step: i64,
    pub stable_round_limit: u32,
    pub max_offer_rounds: usize,
    pub link_scan_cap: usize,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            pickup_url: Some(PICKUP_URL.to_string()),
            top_products: TOP_N_PRODUCTS,
            nav_timeout: Duration::from_millis(NAV_TIMEOUT_MS),
            action_timeout: Duration::from_millis(ACTION_TIMEOUT_MS),
            settle_pause: Duration::from_millis(SETTLE_PAUSE_MS),
            scroll_pause: Duration::from_millis(SCROLL_PAUSE_MS),
            load_more_pause: Duration::from_millis(LOAD_MORE_PAUSE_MS),
            interstitial_wait: Duration::from_millis(INTERSTITIAL_WAIT_MS),
            scroll_step: SCROLL_STEP_PX,
            stable_round_limit: STABLE_ROUND_LIMIT,
            max_offer_rounds: MAX_OFFER_ROUNDS,
            link_scan_cap: LINK_SCAN_CAP,
        }
    }
}

#[cfg(test)]
impl ScrapeSettings {
    pub fn instant() -> Self {
        Self {
            base_url: "https://market.test/".to_string(),
            pickup_url: None,
            settle_pause: Duration::ZERO,
            scroll_pause: Duration::ZERO,
            load_more_pause: Duration::ZERO,
            interstitial_wait: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// OpenAI-compatible endpoint used by the idea generation stage.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub model: String,
    pub api_key: String,
    pub temperature: f64,
}

impl LlmConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_url: env_required("OPENAI_API_URL")?,
            model: env_required("OPENAI_MODEL")?,
            api_key: env_required("OPENAI_API_KEY")?,
            temperature: env_parse("OPENAI_TEMPERATURE", 0.7),
        })
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    pub webdriver_url: String,
    pub headless: bool,
    pub scrape: ScrapeSettings,
}

impl Config {
    /// Reads `.env` (if present) and the process environment over the defaults.
    pub fn from_env() -> Self {
        let _ = dotenv::dotenv();

        let pickup_url = match std::env::var("PICKUP_URL") {
            Ok(v) if v.trim().is_empty() => None,
            Ok(v) => Some(v),
            Err(_) => Some(PICKUP_URL.to_string()),
        };

        Self {
            db_path: std::env::var("MARGIN_DB_PATH").unwrap_or_else(|_| DB_PATH.to_string()),
            webdriver_url: std::env::var("WEBDRIVER_URL")
                .unwrap_or_else(|_| WEBDRIVER_URL.to_string()),
            headless: env_flag("HEADLESS"),
            scrape: ScrapeSettings {
                base_url: std::env::var("MARKET_BASE_URL").unwrap_or_else(|_| BASE_URL.to_string()),
                pickup_url,
                top_products: env_parse("TOP_N_PRODUCTS", TOP_N_PRODUCTS),
                ..ScrapeSettings::default()
            },
        }
    }
}

fn env_required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("{key} environment variable must be set"))
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|raw| raw.trim().parse().ok())
        .unwrap_or(default)
}

fn env_flag(key: &str) -> bool {
    matches!(
        std::env::var(key).as_deref().map(str::trim),
        Ok("1") | Ok("true") | Ok("yes")
    )
}
