//! Simple example of acquiring content for a topic.

use std::time::Duration;
use webharvest::{AcquireConfig, Acquirer, SearchMode};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = AcquireConfig::builder()
        // catalogue produced by an out-of-band proxy tester
        .catalogue_path("working_proxies.csv")
        .max_attempts(3)
        .search_timeout(Duration::from_secs(36))
        // rate limit for each proxy, lower performance but avoid banned
        .max_requests_per_second(3.0)
        .build();

    let acquirer = Acquirer::new(config);

    println!("Acquiring pages...");
    let pages = acquirer
        .acquire("rust async runtimes", SearchMode::Research, 5)
        .await?;

    for page in &pages {
        println!("{} — {}", page.url, page.title);
        println!("  {}", page.content);
    }

    let stats = acquirer.directory().stats();
    println!(
        "Proxies: {}/{} available, {} requests ({}% success)",
        stats.available_proxies,
        stats.total_proxies,
        stats.usage.total_requests,
        stats.usage.success_rate
    );

    Ok(())
}
