use tracing::{debug, warn};

use super::selectors::card as sel;
use crate::driver::{find_text, Locator, PageDriver};
use crate::error::ScrapeResult;
use crate::parser::{norm_text, parse_price_rub};

/// What the listing's own card says: its primary seller and the
/// payment-method reference price.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardInfo {
    /// Empty when no strategy found a seller.
    pub shop: String,
    pub reference_price: Option<i64>,
}

pub async fn extract_card<D: PageDriver>(driver: &D) -> CardInfo {
    let shop = extract_shop(driver).await;
    let reference_price = match extract_reference_price(driver).await {
        Ok(price) => price,
        Err(e) => {
            warn!("Reference price lookup failed: {}", e);
            None
        }
    };
    CardInfo { shop, reference_price }
}

fn accept(strategy: &str, result: ScrapeResult<Option<String>>) -> Option<String> {
    match result {
        Ok(Some(name)) if sel::SHOP_NAME_CHARS.contains(&name.chars().count()) => {
            debug!("Seller found via {}: {}", strategy, name);
            Some(name)
        }
        Ok(Some(name)) if !name.is_empty() => {
            debug!("Seller candidate via {} rejected ({} chars)", strategy, name.chars().count());
            None
        }
        Ok(_) => None,
        Err(e) => {
            warn!("Seller lookup via {} failed: {}", strategy, e);
            None
        }
    }
}

/// Seller name of the current product page, or an empty string.
///
/// Tries the "Магазин" section of new card layouts, then any seller or shop
/// link on the page, then the legacy "Продавец" label.
pub async fn extract_shop<D: PageDriver>(driver: &D) -> String {
    if let Some(name) = accept("shop section", shop_from_section(driver).await) {
        return name;
    }
    if let Some(name) = accept("seller link", shop_from_link(driver, sel::SELLER_LINK).await) {
        return name;
    }
    if let Some(name) = accept("shop link", shop_from_link(driver, sel::SHOP_LINK).await) {
        return name;
    }
    accept("seller label", shop_from_legacy_label(driver).await).unwrap_or_default()
}

async fn shop_from_section<D: PageDriver>(driver: &D) -> ScrapeResult<Option<String>> {
    let Some(heading) = driver.find(None, sel::SHOP_ANCHOR, sel::ANCHOR_TIMEOUT).await? else {
        return Ok(None);
    };
    let Some(section) = driver.ancestor(&heading, sel::SHOP_SECTION_DEPTH).await? else {
        return Ok(None);
    };

    if let Some(name) = find_text(driver, Some(&section), sel::SHOP_NAME, sel::FALLBACK_TIMEOUT).await? {
        if !name.is_empty() {
            return Ok(Some(name));
        }
    }

    let Some(link) = driver.find(Some(&section), sel::SECTION_LINK, sel::FALLBACK_TIMEOUT).await? else {
        return Ok(None);
    };
    let href = driver.read_attribute(&link, "href").await?.unwrap_or_default();
    if !href.contains(sel::SELLER_HREF_MARKER) {
        return Ok(None);
    }
    Ok(Some(norm_text(&driver.read_text(&link).await?)))
}

async fn shop_from_link<D: PageDriver>(driver: &D, link: Locator) -> ScrapeResult<Option<String>> {
    find_text(driver, None, link, sel::FALLBACK_TIMEOUT).await
}

async fn shop_from_legacy_label<D: PageDriver>(driver: &D) -> ScrapeResult<Option<String>> {
    let Some(label) = driver.find(None, sel::LEGACY_SELLER_ANCHOR, sel::FALLBACK_TIMEOUT).await? else {
        return Ok(None);
    };
    let Some(block) = driver.ancestor(&label, sel::LEGACY_SELLER_DEPTH).await? else {
        return Ok(None);
    };
    let text = norm_text(&driver.read_text(&block).await?.replacen(sel::LEGACY_SELLER_PHRASE, "", 1));
    let name = text.trim_start_matches([':', '-']).trim_start();
    Ok(Some(name.to_string()))
}

/// Price shown next to the payment-method call-out.
///
/// Each call-out is tried in turn, looking for a price in its nearest
/// containers first. When a call-out exists but none of its containers carry
/// a price, the page text around the bank name is scanned instead.
pub async fn extract_reference_price<D: PageDriver>(driver: &D) -> ScrapeResult<Option<i64>> {
    let mut anchored = false;
    for (i, &anchor_locator) in sel::REFERENCE_PRICE_ANCHORS.iter().enumerate() {
        let timeout = if i == 0 { sel::ANCHOR_TIMEOUT } else { sel::EXTRA_ANCHOR_TIMEOUT };
        let Some(anchor) = driver.find(None, anchor_locator, timeout).await? else {
            continue;
        };
        anchored = true;
        for &depth in sel::REFERENCE_PRICE_DEPTHS {
            let Some(container) = driver.ancestor(&anchor, depth).await? else {
                break;
            };
            if let Some(price) = parse_price_rub(&driver.read_text(&container).await?) {
                debug!("Reference price {} via {:?} at depth {}", price, anchor_locator, depth);
                return Ok(Some(price));
            }
        }
    }
    if !anchored {
        return Ok(None);
    }

    let Some(body) = driver.find(None, sel::PAGE_BODY, sel::FALLBACK_TIMEOUT).await? else {
        return Ok(None);
    };
    let text = norm_text(&driver.read_text(&body).await?);
    Ok(marker_window(&text).and_then(|window| parse_price_rub(&window)))
}

/// Text around the first case-insensitive occurrence of the bank marker.
fn marker_window(text: &str) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();
    let marker: Vec<char> = sel::REFERENCE_PRICE_MARKER.chars().collect();
    let at = chars.windows(marker.len()).position(|w| {
        w.iter().zip(&marker).all(|(c, m)| c.to_lowercase().eq(m.to_lowercase()))
    })?;
    let from = at.saturating_sub(sel::REFERENCE_WINDOW_BEFORE);
    let to = (at + sel::REFERENCE_WINDOW_AFTER).min(chars.len());
    Some(chars[from..to].iter().collect())
}
