mod aggregate;
mod config;
mod db;
mod driver;
mod error;
mod ideas;
mod market;
mod parser;
mod pipeline;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rusqlite::Connection;
use tracing::warn;

use config::{Config, LlmConfig};
use driver::webdriver::BrowserSession;

#[derive(Parser)]
#[command(name = "margin_scout", about = "Marketplace margin estimates for product ideas")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate product ideas from seed materials via the language model
    Ideas {
        /// JSON array of {"seed", "material_cost_rub"}
        #[arg(long, default_value = "seeds.json")]
        seeds: PathBuf,
        /// Ideas requested per seed
        #[arg(long, default_value_t = config::IDEAS_PER_SEED)]
        per_seed: usize,
    },
    /// Import an already generated {"items": [...]} file
    Import {
        file: PathBuf,
        /// Seed the items were generated from
        #[arg(long)]
        seed: String,
        /// Fallback material cost for items without one
        #[arg(long)]
        cost: Option<f64>,
    },
    /// Collect offers for ideas that have none yet
    Collect {
        /// Max ideas to collect (default: all uncollected)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Products per search query
        #[arg(long)]
        top: Option<usize>,
    },
    /// Recompute per-idea price statistics and profit
    Aggregate,
    /// Collect + aggregate in one pipeline
    Run {
        /// Max ideas to collect
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Products per search query
        #[arg(long)]
        top: Option<usize>,
    },
    /// Show row counts per stage
    Stats,
    /// Ideas ranked by profit at the RMS price
    Overview {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
    },
}

fn open_db(config: &Config) -> anyhow::Result<Connection> {
    let conn = db::connect(&config.db_path)?;
    db::init_schema(&conn)?;
    Ok(conn)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut config = Config::from_env();

    let result = match cli.command {
        Commands::Ideas { seeds, per_seed } => {
            let conn = open_db(&config)?;
            let seeds = ideas::load_seeds(&seeds)?;
            if seeds.is_empty() {
                println!("Seeds file is empty.");
                return Ok(());
            }
            let source = ideas::ChatCompletions::new(LlmConfig::from_env()?)?;
            let first_id = db::next_idea_id(&conn)?;
            println!("Generating up to {} ideas for {} seeds...", per_seed, seeds.len());
            let rows = ideas::generate_ideas(&source, &seeds, per_seed, first_id).await;
            let inserted = db::insert_ideas(&conn, &rows)?;
            println!("Inserted {} ideas.", inserted);
            Ok(())
        }
        Commands::Import { file, seed, cost } => {
            let conn = open_db(&config)?;
            let seed = ideas::Seed { seed, material_cost_rub: cost };
            let rows = ideas::import_file(&file, &seed, db::next_idea_id(&conn)?)?;
            let inserted = db::insert_ideas(&conn, &rows)?;
            println!("Imported {} ideas from {}", inserted, file.display());
            Ok(())
        }
        Commands::Collect { limit, top } => {
            let conn = open_db(&config)?;
            if let Some(top) = top {
                config.scrape.top_products = top;
            }
            collect(&config, &conn, limit).await
        }
        Commands::Aggregate => {
            let conn = open_db(&config)?;
            aggregate_stats(&conn)
        }
        Commands::Run { limit, top } => {
            let conn = open_db(&config)?;
            if let Some(top) = top {
                config.scrape.top_products = top;
            }

            // Phase 1: Collect
            let t_collect = Instant::now();
            collect(&config, &conn, limit).await?;
            println!("Collected in {:.1}s", t_collect.elapsed().as_secs_f64());

            // Phase 2: Aggregate
            aggregate_stats(&conn)
        }
        Commands::Overview { limit } => {
            let conn = open_db(&config)?;
            let rows = db::fetch_overview(&conn, limit)?;
            if rows.is_empty() {
                println!("No stats yet. Run 'aggregate' first.");
                return Ok(());
            }

            println!(
                "{:>4} | {:<28} | {:<28} | {:>7} | {:>6} | {:>8} | {:>9} | {:>4} | {:>9}",
                "id", "Title", "Query", "Cost", "Offers", "Min", "RMS", "Days", "Profit"
            );
            println!("{}", "-".repeat(124));

            for r in &rows {
                println!(
                    "{:>4} | {:<28} | {:<28} | {:>7} | {:>6} | {:>8} | {:>9} | {:>4} | {:>9}",
                    r.idea_id,
                    truncate(&r.title, 28),
                    truncate(&r.query, 28),
                    fmt_opt(r.material_cost_rub.map(|c| format!("{:.0}", c))),
                    r.offers_count,
                    fmt_opt(r.min_price.map(|p| p.to_string())),
                    fmt_opt(r.rms_price.map(|p| format!("{:.1}", p))),
                    fmt_opt(r.min_delivery_days.map(|d| d.to_string())),
                    fmt_opt(r.profit_rms.map(|p| format!("{:.1}", p))),
                );
            }

            println!("\n{} ideas | prices in RUB", rows.len());
            Ok(())
        }
        Commands::Stats => {
            let conn = open_db(&config)?;
            let s = db::get_stats(&conn)?;
            println!("Ideas:       {}", s.ideas);
            println!("Collected:   {}", s.collected);
            println!("Uncollected: {}", s.uncollected);
            println!("Products:    {}", s.products);
            println!("Offer rows:  {}", s.offer_rows);
            println!("Priced:      {}", s.priced_offers);
            println!("Stats rows:  {}", s.stats_rows);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn collect(config: &Config, conn: &Connection, limit: Option<usize>) -> anyhow::Result<()> {
    let ideas = db::fetch_uncollected(conn, limit)?;
    if ideas.is_empty() {
        println!("No uncollected ideas. Run 'ideas' or 'import' first.");
        return Ok(());
    }

    let session = BrowserSession::start(&config.webdriver_url, config.headless, &config.scrape)
        .await
        .context("starting browser session")?;

    match market::session::select_pickup_point(&session, &config.scrape).await {
        Ok(false) if config.scrape.pickup_url.is_some() => {
            warn!("Pickup point not confirmed; prices follow the default location")
        }
        Ok(_) => {}
        Err(e) => warn!("Pickup point selection failed: {}", e),
    }

    println!("Collecting offers for {} ideas...", ideas.len());
    let result = pipeline::collect_offers(&session, &config.scrape, conn, &ideas).await;

    if let Err(e) = session.close().await {
        warn!("Closing browser session failed: {}", e);
    }

    let stats = result?;
    println!(
        "Done: {} ideas, {} products ({} failed), {} offers, {} rows saved.",
        stats.ideas, stats.products, stats.failed_products, stats.offers, stats.rows
    );
    Ok(())
}

fn aggregate_stats(conn: &Connection) -> anyhow::Result<()> {
    let ideas = db::fetch_ideas(conn)?;
    if ideas.is_empty() {
        println!("No ideas to aggregate.");
        return Ok(());
    }
    let offers = db::fetch_offers(conn)?;
    let stats = aggregate::aggregate(&ideas, &offers);
    let saved = db::save_stats(conn, &ideas, &stats)?;
    let priced = stats.iter().filter(|s| s.offers_count > 0).count();
    println!("Saved stats for {} ideas ({} with priced offers).", saved, priced);
    Ok(())
}

fn fmt_opt(value: Option<String>) -> String {
    value.unwrap_or_else(|| "-".into())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
