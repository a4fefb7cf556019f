//! pagefetch - resilient page acquisition.
//!
//! Fetches the rendered HTML of a URL under adversarial conditions and hands
//! the result to a downstream extractor.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (before anything else)
    let _ = dotenvy::dotenv();

    // Initialize logging based on verbosity
    let default_filter = if pagefetch::cli::is_verbose() {
        "pagefetch=info"
    } else {
        "pagefetch=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    pagefetch::cli::run().await
}
