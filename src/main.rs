use shopkeeper::app::build_router;
use shopkeeper::core::auth::JwtService;
use shopkeeper::core::config::Config;
use shopkeeper::core::db::{DbConfig, create_pool_with_migrations};

#[tokio::main]
async fn main() {
    // Load .env file (if exists)
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "shopkeeper=info,tower_http=info".into()),
        )
        .init();

    // Load application config from environment variables
    let config = Config::from_env();

    // Log config status (without revealing secrets)
    tracing::info!(
        "Config loaded: database={}, jwt_secret={}",
        config.has_database(),
        config.has_jwt_secret()
    );

    let db_config = DbConfig::new(config.database_url_or_panic());
    let pool = match create_pool_with_migrations(&db_config).await {
        Ok(pool) => pool,
        Err(err) => {
            tracing::error!("Failed to initialize database: {}", err);
            std::process::exit(1);
        }
    };

    let jwt_service = match JwtService::from_env() {
        Ok(service) => service,
        Err(err) => {
            tracing::error!("Failed to initialize JWT service: {}", err);
            std::process::exit(1);
        }
    };

    let app = build_router(pool, jwt_service);

    tracing::info!("listening on http://{}", &config.bind_addr);

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("Failed to bind {}: {}", config.bind_addr, err);
            std::process::exit(1);
        }
    };

    if let Err(err) = axum::serve(listener, app.into_make_service()).await {
        tracing::error!("Server error: {}", err);
        std::process::exit(1);
    }
}
