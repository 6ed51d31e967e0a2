pub mod card;
pub mod links;
pub mod offers;
pub mod selectors;
pub mod session;

use std::fmt;

use tracing::{debug, warn};

use crate::config::ScrapeSettings;
use crate::driver::PageDriver;
use crate::error::ScrapeResult;
use card::CardInfo;
use offers::Offer;

/// Where a product page is in its extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductState {
    NotVisited,
    Loaded,
    SellerExtracted,
    ModalAttempted,
    OffersCollected,
    NoOffers,
    Done,
}

impl fmt::Display for ProductState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProductState::NotVisited => "not-visited",
            ProductState::Loaded => "loaded",
            ProductState::SellerExtracted => "seller-extracted",
            ProductState::ModalAttempted => "modal-attempted",
            ProductState::OffersCollected => "offers-collected",
            ProductState::NoOffers => "no-offers",
            ProductState::Done => "done",
        };
        f.write_str(s)
    }
}

/// Everything extracted from one product page.
#[derive(Debug, Clone)]
pub struct ProductReport {
    pub url: String,
    pub card: CardInfo,
    pub offers: Vec<Offer>,
    /// States passed through, in order. Always ends in `Done`.
    pub trail: Vec<ProductState>,
    /// Why the page could not be read, if it could not.
    pub error: Option<String>,
}

impl ProductReport {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            card: CardInfo::default(),
            offers: Vec::new(),
            trail: vec![ProductState::NotVisited],
            error: None,
        }
    }

    fn advance(&mut self, next: ProductState) {
        if let Some(prev) = self.trail.last() {
            debug!("{}: {} -> {}", self.url, prev, next);
        }
        self.trail.push(next);
    }
}

async fn load<D: PageDriver>(driver: &D, settings: &ScrapeSettings, url: &str) -> ScrapeResult<()> {
    driver.navigate(url).await?;
    session::settle(settings.settle_pause).await;
    session::guard_interstitial(driver, settings, url).await
}

/// Load one product page and read its card and competing offers.
///
/// Never fails: a page that cannot be loaded goes straight to `Done` with
/// `error` set, and empty extractions still walk every state.
pub async fn process_product<D: PageDriver>(
    driver: &D,
    settings: &ScrapeSettings,
    url: &str,
) -> ProductReport {
    let mut report = ProductReport::new(url);

    if let Err(e) = load(driver, settings, url).await {
        warn!("Skipping product {}: {}", url, e);
        report.error = Some(e.to_string());
        report.advance(ProductState::Done);
        return report;
    }
    report.advance(ProductState::Loaded);

    report.card = card::extract_card(driver).await;
    report.advance(ProductState::SellerExtracted);

    let offers = offers::collect_offers(driver, settings).await;
    report.advance(ProductState::ModalAttempted);

    if offers.is_empty() {
        report.advance(ProductState::NoOffers);
    } else {
        report.offers = offers;
        report.advance(ProductState::OffersCollected);
    }
    report.advance(ProductState::Done);
    report
}
