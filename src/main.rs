use anyhow::Context;
use clap::Parser;
use rental_scout::export::{Exporter, JsonExporter};
use rental_scout::orchestrator;
use rental_scout::scrapers::build_extractors;
use rental_scout::session::{ChromeSessionFactory, SessionFactory};
use rental_scout::{Settings, Source};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rental-scout", about = "Find affordable vacation rentals across several sites")]
struct Args {
    /// Search settings file
    #[arg(short, long, default_value = "rental-scout.toml")]
    config: PathBuf,

    /// Directory for the results file
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Only search these sites (repeatable)
    #[arg(short, long = "source", value_parser = parse_source)]
    sources: Vec<Source>,
}

fn parse_source(name: &str) -> Result<Source, String> {
    Source::ALL
        .into_iter()
        .find(|source| source.name().eq_ignore_ascii_case(name))
        .ok_or_else(|| format!("unknown source '{}'", name))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let mut settings =
        Settings::load(&args.config).with_context(|| format!("loading settings from {}", args.config.display()))?;
    if !args.sources.is_empty() {
        settings.sources.clear();
        for source in &args.sources {
            if !settings.sources.contains(source) {
                settings.sources.push(*source);
            }
        }
    }

    info!("🏖️  Rental Scout");
    info!("==========================================");
    info!(
        "Searching {} for {} guests, {} nights, up to {}€/night within {} km",
        settings.criteria.destination,
        settings.criteria.occupancy,
        settings.criteria.dates.nights(),
        settings.criteria.max_price_per_night,
        settings.criteria.max_distance_km
    );

    let extractors = build_extractors(&settings);
    let factory: Arc<dyn SessionFactory> = Arc::new(ChromeSessionFactory::new(settings.browser.clone()));
    let summary = orchestrator::run_with_report(extractors, Arc::new(settings.criteria.clone()), factory).await;

    for report in &summary.reports {
        match &report.outcome {
            Ok(count) => info!("  {:<12} {} listings", report.source.name(), count),
            Err(reason) => info!("  {:<12} failed: {}", report.source.name(), reason),
        }
    }
    info!("\n✅ Found {} rentals\n", summary.listings.len());

    for (i, listing) in summary.listings.iter().enumerate() {
        println!("{}. {} [{}]", i + 1, listing.name(), listing.source());
        println!(
            "   {:.2}€ total, {:.2}€/night, {:.1} km away",
            listing.total_price(),
            listing.price_per_night(),
            listing.distance_km()
        );
        println!("   URL: {}", listing.url());
        println!();
    }

    let exporter = JsonExporter::new(args.output_dir);
    exporter.export(&summary.listings).await?;

    Ok(())
}
