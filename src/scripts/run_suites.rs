use anyhow::{Context, Result};
use catalog_harness::config::HarnessConfig;
use catalog_harness::suites;
use catalog_harness::{HttpCatalog, SharedClient};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    let config = HarnessConfig::load().context("Failed to load harness configuration")?;
    let catalog = HttpCatalog::from_config(&config)?;
    println!("Running catalog suites against {}", catalog.base_url());

    let client: SharedClient = Arc::new(catalog);
    let reports = suites::run_all(client, &config.retry_policy()).await?;

    let mut failed = 0;
    for report in &reports {
        println!("{}", report);
        for (step, message) in report.failures() {
            println!("  {} failed: {}", step, message);
        }
        if !report.is_success() {
            failed += 1;
        }
    }

    println!(
        "{} of {} suites passed",
        reports.len() - failed,
        reports.len()
    );
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
