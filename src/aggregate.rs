use std::collections::HashMap;

use rayon::prelude::*;

use crate::db::{IdeaRow, OfferRow};

/// Price and delivery statistics of one idea. Every statistic is `None`
/// when the idea has no priced offer.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateStat {
    pub idea_id: i64,
    pub offers_count: i64,
    pub min_price: Option<i64>,
    pub max_price: Option<i64>,
    pub mean_price: Option<f64>,
    pub rms_price: Option<f64>,
    pub min_delivery_days: Option<i64>,
    pub max_delivery_days: Option<i64>,
    pub profit_min: Option<f64>,
    pub profit_rms: Option<f64>,
    pub profit_max: Option<f64>,
}

impl AggregateStat {
    pub fn empty(idea_id: i64) -> Self {
        Self {
            idea_id,
            offers_count: 0,
            min_price: None,
            max_price: None,
            mean_price: None,
            rms_price: None,
            min_delivery_days: None,
            max_delivery_days: None,
            profit_min: None,
            profit_rms: None,
            profit_max: None,
        }
    }
}

pub fn mean(values: &[i64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().map(|&v| v as f64).sum::<f64>() / values.len() as f64)
}

/// Quadratic mean.
pub fn rms(values: &[i64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let squares: f64 = values.iter().map(|&v| (v as f64).powi(2)).sum();
    Some((squares / values.len() as f64).sqrt())
}

/// `price - cost`, unclamped.
pub fn profit(price: Option<f64>, cost: Option<f64>) -> Option<f64> {
    Some(price? - cost?)
}

fn stat_for(idea: &IdeaRow, offers: &[&OfferRow]) -> AggregateStat {
    let prices: Vec<i64> = offers.iter().filter_map(|o| o.offer_price_rub).collect();
    if prices.is_empty() {
        return AggregateStat::empty(idea.idea_id);
    }
    let days: Vec<i64> = offers.iter().filter_map(|o| o.offer_delivery_days).collect();

    let min_price = prices.iter().min().copied();
    let max_price = prices.iter().max().copied();
    let rms_price = rms(&prices);
    let cost = idea.material_cost_rub;

    AggregateStat {
        idea_id: idea.idea_id,
        offers_count: prices.len() as i64,
        min_price,
        max_price,
        mean_price: mean(&prices),
        rms_price,
        min_delivery_days: days.iter().min().copied(),
        max_delivery_days: days.iter().max().copied(),
        profit_min: profit(min_price.map(|p| p as f64), cost),
        profit_rms: profit(rms_price, cost),
        profit_max: profit(max_price.map(|p| p as f64), cost),
    }
}

/// One stat per idea, in `ideas` order, whether or not it has offers.
pub fn aggregate(ideas: &[IdeaRow], offers: &[OfferRow]) -> Vec<AggregateStat> {
    let mut by_idea: HashMap<i64, Vec<&OfferRow>> = HashMap::new();
    for offer in offers {
        by_idea.entry(offer.idea_id).or_default().push(offer);
    }

    ideas
        .par_iter()
        .map(|idea| {
            let rows = by_idea.get(&idea.idea_id).map(Vec::as_slice).unwrap_or(&[]);
            stat_for(idea, rows)
        })
        .collect()
}
