use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::config::ScrapeSettings;
use crate::db::{self, IdeaRow, OfferRow};
use crate::driver::PageDriver;
use crate::market::links::discover;
use crate::market::session::settle;
use crate::market::{process_product, ProductReport};

/// Collect stats returned after completion.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub ideas: usize,
    pub products: usize,
    pub failed_products: usize,
    pub offers: usize,
    pub rows: usize,
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

/// Offers rows of one product: one per offer, or a single card-only row.
pub fn product_rows(idea: &IdeaRow, report: &ProductReport) -> Vec<OfferRow> {
    let base = OfferRow {
        idea_id: idea.idea_id,
        query: idea.query.clone(),
        product_url: Some(report.url.clone()),
        card_shop: non_empty(&report.card.shop),
        card_price_reference: report.card.reference_price,
        ..OfferRow::default()
    };

    if report.offers.is_empty() {
        return vec![base];
    }

    report
        .offers
        .iter()
        .map(|o| OfferRow {
            offer_shop: Some(o.shop.clone()),
            offer_shop_url: non_empty(&o.shop_url),
            offer_price_rub: o.price_rub,
            offer_delivery_text: non_empty(&o.delivery_text),
            offer_delivery_days: o.delivery_days,
            ..base.clone()
        })
        .collect()
}

/// Search the idea's query and extract every product found.
///
/// Always returns at least one row so the idea is represented downstream.
pub async fn collect_idea<D: PageDriver>(
    driver: &D,
    settings: &ScrapeSettings,
    idea: &IdeaRow,
    stats: &mut CollectStats,
) -> Vec<OfferRow> {
    let links = match discover(driver, settings, &idea.query, settings.top_products).await {
        Ok(links) => links,
        Err(e) => {
            warn!("[{}] search failed for '{}': {}", idea.idea_id, idea.query, e);
            Vec::new()
        }
    };

    if links.is_empty() {
        info!("[{}] no products for '{}'", idea.idea_id, idea.query);
        return vec![OfferRow::no_product(idea.idea_id, &idea.query)];
    }

    let mut rows = Vec::new();
    for (i, url) in links.iter().enumerate() {
        if i > 0 {
            settle(settings.settle_pause).await;
        }
        let report = process_product(driver, settings, url).await;
        stats.products += 1;
        if report.error.is_some() {
            stats.failed_products += 1;
        }
        stats.offers += report.offers.len();
        rows.extend(product_rows(idea, &report));
    }
    rows
}

/// Walk `ideas` sequentially on one browser session, saving each idea's
/// rows as soon as it finishes.
pub async fn collect_offers<D: PageDriver>(
    driver: &D,
    settings: &ScrapeSettings,
    conn: &Connection,
    ideas: &[IdeaRow],
) -> Result<CollectStats> {
    let pb = ProgressBar::new(ideas.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} ideas (eta {eta}) {msg}")?
            .progress_chars("=> "),
    );

    let mut stats = CollectStats::default();
    for idea in ideas {
        pb.set_message(idea.query.clone());
        let rows = collect_idea(driver, settings, idea, &mut stats).await;
        stats.rows += db::save_offers(conn, idea.idea_id, &rows)?;
        stats.ideas += 1;
        pb.inc(1);
    }

    pb.finish_and_clear();
    info!(
        "Collected {} ideas: {} products ({} failed), {} offers",
        stats.ideas, stats.products, stats.failed_products, stats.offers
    );
    Ok(stats)
}
