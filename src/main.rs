//! Entry point: load config, wire stores and the relay loop, and run the server.

use axum::http::{HeaderValue, Method};
use callrelay::auth::JwtSecret;
use callrelay::config::Config;
use callrelay::db;
use callrelay::repositories::{ConversationStore, MemoryRepository, PgRepository, UserStore};
use callrelay::{create_app, AppState, Relay};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().map_err(|e| anyhow::anyhow!("config: {}", e))?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))?;
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let (users, conversations): (Arc<dyn UserStore>, Arc<dyn ConversationStore>) =
        match &config.database_url {
            Some(url) => {
                let pool = db::create_pool(url).await?;
                db::run_migrations(&pool).await?;
                let repo = Arc::new(PgRepository::new(pool));
                let users: Arc<dyn UserStore> = repo.clone();
                (users, repo as Arc<dyn ConversationStore>)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory stores");
                let repo = Arc::new(MemoryRepository::new());
                let users: Arc<dyn UserStore> = repo.clone();
                (users, repo as Arc<dyn ConversationStore>)
            }
        };

    let (relay, relay_task) = Relay::spawn(users, conversations, config.call_log_window);

    let state = AppState {
        app_key: config.app_key.clone(),
        relay,
        jwt_secret: JwtSecret::new(config.jwt_secret.clone()),
    };

    let cors = CorsLayer::new()
        .allow_origin(config.cors_origin.parse::<HeaderValue>()?)
        .allow_methods([Method::GET, Method::POST])
        .allow_credentials(true);

    let app = create_app(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    tracing::info!(
        addr = %config.server_addr,
        call_log_window_secs = config.call_log_window.as_secs(),
        "listening"
    );
    let listener = tokio::net::TcpListener::bind(config.server_addr).await?;
    axum::serve(listener, app).await?;
    relay_task.abort();
    Ok(())
}
