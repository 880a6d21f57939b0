use std::net::SocketAddr;
use std::sync::Arc;
use dotenv::dotenv;
use tokio::net::TcpListener;
use tower_http::cors::{CorsLayer, Any};
use tower_http::trace::{self, TraceLayer};
use tracing::{Level, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod router;

use payment_cell::{PaymentGateway, RazorpayClient};
use shared_config::{AppConfig, StorageBackend};
use shared_database::{InMemoryStore, SchedulingStore, SupabaseStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Loading Env Vars
    dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting telehealth booking API server");

    // Load configuration
    let config = Arc::new(AppConfig::from_env());

    let store: Arc<dyn SchedulingStore> = match config.storage_backend() {
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data is lost on restart");
            Arc::new(InMemoryStore::new())
        }
        StorageBackend::Supabase => {
            info!("Using Supabase storage at {}", config.supabase_url);
            Arc::new(SupabaseStore::new(&config))
        }
    };

    let payments: Arc<dyn PaymentGateway> = Arc::new(RazorpayClient::new(&config));

    // Set up CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the application router
    let app = router::create_router(config.clone(), store, payments)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new()
                    .level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new()
                    .level(Level::INFO)),
        )
        .layer(cors);

    // Run the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    info!("Listening on {}", addr);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
