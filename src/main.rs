use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use nakliyenet::auth::jwt::JwtService;
use nakliyenet::config::AppConfig;
use nakliyenet::db;
use nakliyenet::oauth::{GoogleIdentityProvider, IdentityProvider};
use nakliyenet::routes::create_router;
use nakliyenet::s3::build_client;
use nakliyenet::state::AppState;
use nakliyenet::storage::S3Storage;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "api",
        database_url = %config.redacted_database_url(),
        pool_size = config.database_max_pool_size,
        server_host = %config.server_host,
        server_port = config.server_port,
        s3_bucket = %config.s3_bucket,
        site_base_url = %config.site_base_url,
        platform_fee_percent = %config.platform_fee_percent,
        google_oauth = config.google_oauth.is_some(),
        "loaded configuration"
    );

    let pool = db::init_pool_and_migrate(&config.database_url, config.database_max_pool_size)?;
    let s3_client = build_client(&config).await?;
    let storage = Arc::new(S3Storage::new(s3_client, config.s3_bucket.clone()));
    let jwt = JwtService::from_config(&config)?;
    let identity = config.google_oauth.clone().map(|google| {
        Arc::new(GoogleIdentityProvider::new(google)) as Arc<dyn IdentityProvider>
    });

    let listen_addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port).parse()?;
    let state = AppState::new(pool, config, storage, jwt, identity);
    let router = create_router(state);

    let listener = TcpListener::bind(listen_addr).await?;
    tracing::info!("listening on {}", listen_addr);

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
