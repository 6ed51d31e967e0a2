use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use rusqlite::Connection;

use crate::aggregate::AggregateStat;

pub fn connect(path: &str) -> Result<Connection> {
    if let Some(dir) = Path::new(path).parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("creating database directory {}", dir.display()))?;
    }
    let conn = Connection::open(path).with_context(|| format!("opening database {}", path))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS ideas (
            idea_id           INTEGER PRIMARY KEY,
            seed              TEXT NOT NULL,
            title             TEXT NOT NULL,
            query             TEXT NOT NULL,
            description       TEXT NOT NULL DEFAULT '',
            material_cost_rub REAL,
            created_at        TEXT NOT NULL DEFAULT (datetime('now'))
        );

        -- One row per competing offer; a product without offers gets one
        -- card-only row, an idea without products one all-null row.
        CREATE TABLE IF NOT EXISTS offers (
            id                   INTEGER PRIMARY KEY,
            idea_id              INTEGER NOT NULL REFERENCES ideas(idea_id),
            query                TEXT NOT NULL,
            product_url          TEXT,
            card_shop            TEXT,
            card_price_reference INTEGER,
            offer_shop           TEXT,
            offer_shop_url       TEXT,
            offer_price_rub      INTEGER,
            offer_delivery_text  TEXT,
            offer_delivery_days  INTEGER,
            collected_at         TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_offers_idea ON offers(idea_id);

        CREATE TABLE IF NOT EXISTS stats (
            idea_id           INTEGER PRIMARY KEY REFERENCES ideas(idea_id),
            seed              TEXT NOT NULL,
            title             TEXT NOT NULL,
            query             TEXT NOT NULL,
            description       TEXT NOT NULL,
            material_cost_rub REAL,
            offers_count      INTEGER NOT NULL DEFAULT 0,
            min_price         INTEGER,
            max_price         INTEGER,
            mean_price        REAL,
            rms_price         REAL,
            min_delivery_days INTEGER,
            max_delivery_days INTEGER,
            profit_min        REAL,
            profit_rms        REAL,
            profit_max        REAL,
            computed_at       TEXT NOT NULL DEFAULT (datetime('now'))
        );
        ",
    )?;
    Ok(())
}

// ── Ideas ──

#[derive(Debug, Clone, PartialEq)]
pub struct IdeaRow {
    pub idea_id: i64,
    pub seed: String,
    pub title: String,
    pub query: String,
    pub description: String,
    pub material_cost_rub: Option<f64>,
}

const IDEA_COLUMNS: &str = "idea_id, seed, title, query, description, material_cost_rub";

fn idea_from_row(row: &rusqlite::Row) -> rusqlite::Result<IdeaRow> {
    Ok(IdeaRow {
        idea_id: row.get(0)?,
        seed: row.get(1)?,
        title: row.get(2)?,
        query: row.get(3)?,
        description: row.get(4)?,
        material_cost_rub: row.get(5)?,
    })
}

/// First free idea id: one past the highest stored id.
pub fn next_idea_id(conn: &Connection) -> Result<i64> {
    let max: Option<i64> = conn.query_row("SELECT MAX(idea_id) FROM ideas", [], |r| r.get(0))?;
    Ok(max.map_or(1, |m| m + 1))
}

/// Insert ideas, keeping any existing row with the same id. Returns rows added.
pub fn insert_ideas(conn: &Connection, ideas: &[IdeaRow]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        let mut stmt = tx.prepare(
            "INSERT OR IGNORE INTO ideas (idea_id, seed, title, query, description, material_cost_rub)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for i in ideas {
            count += stmt.execute(rusqlite::params![
                i.idea_id, i.seed, i.title, i.query, i.description, i.material_cost_rub,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn fetch_ideas(conn: &Connection) -> Result<Vec<IdeaRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {} FROM ideas ORDER BY idea_id", IDEA_COLUMNS))?;
    let rows = stmt
        .query_map([], idea_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Ideas that have no offers rows yet, oldest first.
pub fn fetch_uncollected(conn: &Connection, limit: Option<usize>) -> Result<Vec<IdeaRow>> {
    let sql = format!(
        "SELECT {} FROM ideas i
         WHERE NOT EXISTS (SELECT 1 FROM offers o WHERE o.idea_id = i.idea_id)
         ORDER BY i.idea_id{}",
        IDEA_COLUMNS,
        match limit {
            Some(n) => format!(" LIMIT {}", n),
            None => String::new(),
        }
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], idea_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Offers ──

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OfferRow {
    pub idea_id: i64,
    pub query: String,
    pub product_url: Option<String>,
    pub card_shop: Option<String>,
    pub card_price_reference: Option<i64>,
    pub offer_shop: Option<String>,
    pub offer_shop_url: Option<String>,
    pub offer_price_rub: Option<i64>,
    pub offer_delivery_text: Option<String>,
    pub offer_delivery_days: Option<i64>,
}

impl OfferRow {
    /// Placeholder row for an idea whose search produced no products.
    pub fn no_product(idea_id: i64, query: &str) -> Self {
        Self {
            idea_id,
            query: query.to_string(),
            ..Self::default()
        }
    }
}

/// Replace every offers row of `idea_id` with `rows` in one transaction.
pub fn save_offers(conn: &Connection, idea_id: i64, rows: &[OfferRow]) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        tx.execute("DELETE FROM offers WHERE idea_id = ?1", [idea_id])?;
        let mut stmt = tx.prepare(
            "INSERT INTO offers
             (idea_id, query, product_url, card_shop, card_price_reference, offer_shop,
              offer_shop_url, offer_price_rub, offer_delivery_text, offer_delivery_days)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        )?;
        for r in rows {
            count += stmt.execute(rusqlite::params![
                r.idea_id, r.query, r.product_url, r.card_shop, r.card_price_reference,
                r.offer_shop, r.offer_shop_url, r.offer_price_rub, r.offer_delivery_text,
                r.offer_delivery_days,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

pub fn fetch_offers(conn: &Connection) -> Result<Vec<OfferRow>> {
    let mut stmt = conn.prepare(
        "SELECT idea_id, query, product_url, card_shop, card_price_reference, offer_shop,
                offer_shop_url, offer_price_rub, offer_delivery_text, offer_delivery_days
         FROM offers ORDER BY id",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(OfferRow {
                idea_id: row.get(0)?,
                query: row.get(1)?,
                product_url: row.get(2)?,
                card_shop: row.get(3)?,
                card_price_reference: row.get(4)?,
                offer_shop: row.get(5)?,
                offer_shop_url: row.get(6)?,
                offer_price_rub: row.get(7)?,
                offer_delivery_text: row.get(8)?,
                offer_delivery_days: row.get(9)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

/// Rewrite the stats table: one row per idea, stat columns NULL (and
/// `offers_count` 0) for ideas missing from `stats`.
pub fn save_stats(conn: &Connection, ideas: &[IdeaRow], stats: &[AggregateStat]) -> Result<usize> {
    let by_idea: HashMap<i64, &AggregateStat> = stats.iter().map(|s| (s.idea_id, s)).collect();
    let empty = AggregateStat::empty(0);

    let tx = conn.unchecked_transaction()?;
    let mut count = 0;
    {
        tx.execute("DELETE FROM stats", [])?;
        let mut stmt = tx.prepare(
            "INSERT INTO stats
             (idea_id, seed, title, query, description, material_cost_rub, offers_count,
              min_price, max_price, mean_price, rms_price, min_delivery_days, max_delivery_days,
              profit_min, profit_rms, profit_max)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16)",
        )?;
        for i in ideas {
            let s = by_idea.get(&i.idea_id).copied().unwrap_or(&empty);
            count += stmt.execute(rusqlite::params![
                i.idea_id, i.seed, i.title, i.query, i.description, i.material_cost_rub,
                s.offers_count, s.min_price, s.max_price, s.mean_price, s.rms_price,
                s.min_delivery_days, s.max_delivery_days, s.profit_min, s.profit_rms,
                s.profit_max,
            ])?;
        }
    }
    tx.commit()?;
    Ok(count)
}

#[cfg(test)]
pub fn fetch_stat(conn: &Connection, idea_id: i64) -> Result<Option<(IdeaRow, AggregateStat)>> {
    use rusqlite::OptionalExtension;

    let row = conn
        .query_row(
            &format!(
                "SELECT {}, offers_count, min_price, max_price, mean_price, rms_price,
                        min_delivery_days, max_delivery_days, profit_min, profit_rms, profit_max
                 FROM stats WHERE idea_id = ?1",
                IDEA_COLUMNS
            ),
            [idea_id],
            |row| Ok((idea_from_row(row)?, stat_from_row(row, 6)?)),
        )
        .optional()?;
    Ok(row)
}

#[cfg(test)]
fn stat_from_row(row: &rusqlite::Row, at: usize) -> rusqlite::Result<AggregateStat> {
    Ok(AggregateStat {
        idea_id: row.get(0)?,
        offers_count: row.get(at)?,
        min_price: row.get(at + 1)?,
        max_price: row.get(at + 2)?,
        mean_price: row.get(at + 3)?,
        rms_price: row.get(at + 4)?,
        min_delivery_days: row.get(at + 5)?,
        max_delivery_days: row.get(at + 6)?,
        profit_min: row.get(at + 7)?,
        profit_rms: row.get(at + 8)?,
        profit_max: row.get(at + 9)?,
    })
}

// ── Overview ──

pub struct OverviewRow {
    pub idea_id: i64,
    pub title: String,
    pub query: String,
    pub material_cost_rub: Option<f64>,
    pub offers_count: i64,
    pub min_price: Option<i64>,
    pub rms_price: Option<f64>,
    pub min_delivery_days: Option<i64>,
    pub profit_rms: Option<f64>,
}

/// Most profitable ideas first; ideas without a profit figure go last.
pub fn fetch_overview(conn: &Connection, limit: usize) -> Result<Vec<OverviewRow>> {
    let sql = format!(
        "SELECT idea_id, title, query, material_cost_rub, offers_count, min_price,
                rms_price, min_delivery_days, profit_rms
         FROM stats
         ORDER BY profit_rms DESC NULLS LAST, idea_id
         LIMIT {}",
        limit
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], |row| {
            Ok(OverviewRow {
                idea_id: row.get(0)?,
                title: row.get(1)?,
                query: row.get(2)?,
                material_cost_rub: row.get(3)?,
                offers_count: row.get(4)?,
                min_price: row.get(5)?,
                rms_price: row.get(6)?,
                min_delivery_days: row.get(7)?,
                profit_rms: row.get(8)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub struct Stats {
    pub ideas: usize,
    pub collected: usize,
    pub uncollected: usize,
    pub offer_rows: usize,
    pub priced_offers: usize,
    pub products: usize,
    pub stats_rows: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let ideas: usize = conn.query_row("SELECT COUNT(*) FROM ideas", [], |r| r.get(0))?;
    let collected: usize =
        conn.query_row("SELECT COUNT(DISTINCT idea_id) FROM offers", [], |r| r.get(0))?;
    let offer_rows: usize = conn.query_row("SELECT COUNT(*) FROM offers", [], |r| r.get(0))?;
    let priced_offers: usize = conn.query_row(
        "SELECT COUNT(*) FROM offers WHERE offer_price_rub IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let products: usize = conn.query_row(
        "SELECT COUNT(DISTINCT product_url) FROM offers WHERE product_url IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let stats_rows: usize = conn.query_row("SELECT COUNT(*) FROM stats", [], |r| r.get(0))?;
    Ok(Stats {
        ideas,
        collected,
        uncollected: ideas.saturating_sub(collected),
        offer_rows,
        priced_offers,
        products,
        stats_rows,
    })
}
