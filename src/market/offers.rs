use std::collections::HashSet;

use tracing::{debug, warn};

use super::selectors::offers as sel;
use super::session::settle;
use crate::config::ScrapeSettings;
use crate::driver::{find_text, PageDriver};
use crate::error::ScrapeResult;
use crate::parser::{delivery_days, norm_text, parse_price_rub};

/// One competing seller's terms for a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    pub shop: String,
    pub shop_url: String,
    pub price_rub: Option<i64>,
    pub delivery_text: String,
    pub delivery_days: Option<i64>,
}

/// Identity of an offer within one product's offer set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OfferKey {
    shop: String,
    price_rub: Option<i64>,
    delivery_text: String,
    shop_url: String,
}

impl From<&Offer> for OfferKey {
    fn from(offer: &Offer) -> Self {
        Self {
            shop: offer.shop.clone(),
            price_rub: offer.price_rub,
            delivery_text: offer.delivery_text.clone(),
            shop_url: offer.shop_url.clone(),
        }
    }
}

/// Offers in encounter order, deduplicated on [`OfferKey`].
#[derive(Debug, Default)]
pub struct OfferSet {
    seen: HashSet<OfferKey>,
    offers: Vec<Offer>,
}

impl OfferSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `offer` unless it is a duplicate or has no shop name.
    pub fn insert(&mut self, offer: Offer) -> bool {
        if offer.shop.is_empty() || !self.seen.insert(OfferKey::from(&offer)) {
            return false;
        }
        self.offers.push(offer);
        true
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    pub fn into_offers(self) -> Vec<Offer> {
        self.offers
    }
}

/// Open the competing-offers panel. `None` means the product has none.
pub async fn open_panel<D: PageDriver>(driver: &D) -> ScrapeResult<Option<D::Handle>> {
    let Some(button) = driver.find(None, sel::OPEN_PANEL, sel::OPEN_TIMEOUT).await? else {
        return Ok(None);
    };

    if let Err(e) = driver.click(&button).await {
        debug!("Offers button click failed ({}), trying its container", e);
        let Some(parent) = driver.ancestor(&button, 1).await? else {
            return Ok(None);
        };
        if let Err(e) = driver.click(&parent).await {
            debug!("Offers button container click failed: {}", e);
            return Ok(None);
        }
    }

    driver.find(None, sel::PANEL, sel::PANEL_TIMEOUT).await
}

async fn read_offer<D: PageDriver>(driver: &D, card: &D::Handle) -> ScrapeResult<Option<Offer>> {
    let Some(shop_link) = driver.find(Some(card), sel::SHOP_LINK, sel::FIELD_TIMEOUT).await? else {
        return Ok(None);
    };
    let shop = norm_text(&driver.read_text(&shop_link).await?);
    if shop.is_empty() {
        return Ok(None);
    }
    let shop_url = driver
        .read_attribute(&shop_link, "href")
        .await?
        .unwrap_or_default();

    let price_text = find_text(driver, Some(card), sel::PRICE, sel::FIELD_TIMEOUT)
        .await?
        .unwrap_or_default();
    let delivery_text = find_text(driver, Some(card), sel::DELIVERY, sel::FIELD_TIMEOUT)
        .await?
        .unwrap_or_default();

    Ok(Some(Offer {
        shop,
        shop_url,
        price_rub: parse_price_rub(&price_text),
        delivery_days: delivery_days(&delivery_text),
        delivery_text,
    }))
}

/// Page through an open offers panel, clicking "load more" for at most
/// `max_offer_rounds` rounds. Hitting the cap truncates, it is not an error.
pub async fn collect<D: PageDriver>(
    driver: &D,
    settings: &ScrapeSettings,
    panel: &D::Handle,
) -> Vec<Offer> {
    let mut set = OfferSet::new();

    for round in 1..=settings.max_offer_rounds {
        let cards = match driver.find_all(Some(panel), sel::CARD).await {
            Ok(cards) => cards,
            Err(e) => {
                warn!("Offer card scan failed: {}", e);
                break;
            }
        };

        for card in &cards {
            match read_offer(driver, card).await {
                Ok(Some(offer)) => {
                    set.insert(offer);
                }
                Ok(None) => {}
                Err(e) => debug!("Skipping unreadable offer card: {}", e),
            }
        }

        let more = match driver.find(Some(panel), sel::LOAD_MORE, sel::CONTROL_TIMEOUT).await {
            Ok(Some(button)) => button,
            Ok(None) => break,
            Err(e) => {
                warn!("Load-more lookup failed: {}", e);
                break;
            }
        };
        if round == settings.max_offer_rounds {
            debug!("Offer round cap ({}) reached with {} offers", round, set.len());
            break;
        }
        if let Err(e) = driver.click(&more).await {
            debug!("Load-more click failed: {}", e);
            break;
        }
        settle(settings.load_more_pause).await;
    }

    set.into_offers()
}

/// Close the offers panel. Failure only leaves the panel open.
pub async fn close_panel<D: PageDriver>(driver: &D) {
    match driver.find(None, sel::CLOSE, sel::CONTROL_TIMEOUT).await {
        Ok(Some(button)) => {
            if let Err(e) = driver.click(&button).await {
                debug!("Closing offers panel failed: {}", e);
            }
        }
        Ok(None) => debug!("Offers panel has no close control"),
        Err(e) => debug!("Close control lookup failed: {}", e),
    }
}

/// Competing offers of the product on the current page; empty when the
/// product has no offers panel.
pub async fn collect_offers<D: PageDriver>(driver: &D, settings: &ScrapeSettings) -> Vec<Offer> {
    let panel = match open_panel(driver).await {
        Ok(Some(panel)) => panel,
        Ok(None) => {
            debug!("No competing offers panel");
            return Vec::new();
        }
        Err(e) => {
            warn!("Opening offers panel failed: {}", e);
            return Vec::new();
        }
    };

    settle(settings.load_more_pause).await;
    let offers = collect(driver, settings, &panel).await;
    close_panel(driver).await;
    offers
}
