use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use digest_client::DigestClient;
use digest_common::Config;
use digest_engine::controller::DigestController;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("digest_engine=info".parse()?))
        .init();

    info!("Market Digest engine starting...");

    let config = Config::from_env();
    let client = Arc::new(DigestClient::new(&config.api_base));

    // Companies from the command line, or the whole selection universe.
    let selection: Vec<String> = std::env::args().skip(1).collect();
    let selection = if selection.is_empty() {
        client.companies("").await?
    } else {
        selection
    };
    info!(companies = selection.len(), "Running one digest cycle");

    let controller =
        DigestController::new(client.clone()).with_derive_timeout(config.derive_timeout);
    controller.set_selection(selection).await?;

    let state = controller.state();
    if let Some(error) = &state.news_error {
        warn!(error = error.as_str(), "News fetch failed, no digest produced");
        return Ok(());
    }
    for (company, articles) in &state.news {
        info!(company = company.as_str(), articles = articles.len(), "Fetched news");
    }
    for (company, summary) in &state.summaries {
        info!(
            company = company.as_str(),
            sentiment = %summary.digest.sentiment,
            "{}",
            summary.digest.text
        );
    }
    for company in &state.summary_failed {
        info!(company = company.as_str(), "No summary available");
    }

    Ok(())
}
