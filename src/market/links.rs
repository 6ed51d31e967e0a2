use std::collections::HashSet;

use tracing::{debug, info, warn};
use url::Url;

use super::selectors::{search, PRODUCT_PATH_MARKER};
use super::session::{dismiss_banners, settle};
use crate::config::ScrapeSettings;
use crate::driver::PageDriver;
use crate::error::{ScrapeError, ScrapeResult};

fn parse_base(base_url: &str) -> ScrapeResult<Url> {
    Url::parse(base_url).map_err(|e| ScrapeError::Navigation {
        url: base_url.to_string(),
        reason: e.to_string(),
    })
}

/// Search results URL for `query`.
pub fn search_url(base_url: &str, query: &str) -> ScrapeResult<String> {
    let mut url = parse_base(base_url)?
        .join("search/")
        .map_err(|e| ScrapeError::Navigation {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
    url.query_pairs_mut()
        .append_pair("text", query)
        .append_pair("from_global", "true");
    Ok(url.into())
}

/// Host without a leading "www.", so both forms of the site compare equal.
fn site_host(url: &Url) -> Option<&str> {
    url.host_str().map(|h| h.strip_prefix("www.").unwrap_or(h))
}

/// Resolve `href` against the site root, drop query and fragment, and keep
/// it only if it points at a product page on the same site.
pub fn normalize_link(base: &Url, href: &str) -> Option<String> {
    let mut url = base.join(href.trim()).ok()?;
    url.set_query(None);
    url.set_fragment(None);
    if !url.path().contains(PRODUCT_PATH_MARKER) || site_host(&url) != site_host(base) {
        return None;
    }
    Some(url.into())
}

/// Collect up to `limit` unique product links for `query`, in first-seen order.
///
/// Scans the rendered results, scrolls for more, and stops once `limit` is
/// reached or `stable_round_limit` consecutive rounds added nothing. A query
/// with no results yields an empty list; only a failed search navigation is
/// an error.
pub async fn discover<D: PageDriver>(
    driver: &D,
    settings: &ScrapeSettings,
    query: &str,
    limit: usize,
) -> ScrapeResult<Vec<String>> {
    let base = parse_base(&settings.base_url)?;
    let url = search_url(&settings.base_url, query)?;

    info!("Searching: {}", url);
    driver.navigate(&url).await?;
    settle(settings.settle_pause).await;
    dismiss_banners(driver).await;

    let mut links: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut stable_rounds = 0u32;

    while links.len() < limit && stable_rounds < settings.stable_round_limit {
        settle(settings.scroll_pause).await;
        let before = links.len();

        let anchors = match driver.find_all(None, search::PRODUCT_LINK).await {
            Ok(anchors) => anchors,
            Err(e) => {
                warn!("Link scan failed for '{}': {}", query, e);
                Vec::new()
            }
        };
        debug!("Round scan: {} anchors for '{}'", anchors.len(), query);

        for anchor in anchors.iter().take(settings.link_scan_cap) {
            let href = match driver.read_attribute(anchor, "href").await {
                Ok(Some(href)) => href,
                Ok(None) => continue,
                Err(e) => {
                    debug!("Unreadable anchor: {}", e);
                    continue;
                }
            };
            let Some(link) = normalize_link(&base, &href) else {
                continue;
            };
            if seen.insert(link.clone()) {
                links.push(link);
                if links.len() >= limit {
                    break;
                }
            }
        }

        if let Err(e) = driver.scroll(0, settings.scroll_step).await {
            debug!("Scroll failed: {}", e);
        }

        if links.len() == before {
            stable_rounds += 1;
        } else {
            stable_rounds = 0;
        }
    }

    links.truncate(limit);
    info!("Found {} product links for '{}'", links.len(), query);
    Ok(links)
}
