use mailchimp_signup::config::Config;
use mailchimp_signup::handlers::{self, AppState};
use mailchimp_signup::services::MailChimpService;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// Initializes tracing, loads configuration, builds the single
/// `MailChimpService` of the process and serves the HTTP routes.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailchimp_signup=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let service = MailChimpService::from_config(&config)?;
    tracing::info!(
        "✓ MailChimp client initialized for data center {}",
        service.client().api_key().data_center()
    );
    tracing::info!(
        "Interest metadata cache initialized ({}s TTL)",
        config.interest_cache_ttl_secs
    );

    let app_state = Arc::new(AppState { service });

    let app = handlers::router(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
