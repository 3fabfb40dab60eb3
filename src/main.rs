mod cache_manager;
mod config;
mod error;
mod models;
mod routes;
mod services;
mod utils;

use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::cache_manager::start_cleanup_task;
use crate::config::Config;
use crate::error::AppResult;
use crate::services::{
    CrmService, HttpTransport, ReqwestTransport, SearchCache, SheetService, WorkDriveService,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub crm: Arc<CrmService>,
    // None when no WorkDrive organization is configured
    pub workdrive: Option<Arc<WorkDriveService>>,
    pub sheet: Arc<SheetService>,
    // Shared with the CRM service and swept in the background
    pub search_cache: Arc<SearchCache>,
}

impl AppState {
    pub fn new(config: Config, transport: Arc<dyn HttpTransport>) -> AppResult<Self> {
        let search_cache = Arc::new(SearchCache::new(config.cache_ttl));
        let crm = Arc::new(CrmService::new(
            &config,
            transport.clone(),
            search_cache.clone(),
        ));
        let workdrive = match &config.workdrive {
            Some(credentials) => Some(Arc::new(WorkDriveService::new(
                credentials.clone(),
                config.public_base_url.clone(),
                transport.clone(),
            )?)),
            None => None,
        };
        let sheet = Arc::new(SheetService::new(&config, transport));

        Ok(Self {
            config: Arc::new(config),
            crm,
            workdrive,
            sheet,
            search_cache,
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("🚀 Starting Zoho gateway");

    let config = Config::from_env()?;
    info!("✅ Configuration loaded from environment");
    if config.workdrive.is_none() {
        warn!("ZOHO_WORKDRIVE_ORG_ID is not set; WorkDrive routes are disabled");
    }

    // Shared HTTP client for every upstream integration
    let http_client = ReqwestTransport::build_client(config.upstream_timeout)?;
    let transport: Arc<dyn HttpTransport> = Arc::new(ReqwestTransport::new(
        http_client,
        config.upstream_max_body_bytes,
    ));
    info!(
        "✅ HTTP client initialized (timeout {}s, body cap {} bytes)",
        config.upstream_timeout.as_secs(),
        config.upstream_max_body_bytes
    );

    let state = Arc::new(AppState::new(config.clone(), transport)?);

    start_cleanup_task(
        "search",
        state.search_cache.clone(),
        config.cache_sweep_interval,
    );
    info!(
        "✅ Search cache ready (ttl {}s, sweep every {}s)",
        config.cache_ttl.as_secs(),
        config.cache_sweep_interval.as_secs()
    );

    let app = routes::create_routes(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new())
            .layer(CorsLayer::permissive().max_age(std::time::Duration::from_secs(3600))),
    );

    let addr = SocketAddr::from((config.host.parse::<std::net::IpAddr>()?, config.port));
    info!("🚀 Axum server running at http://{}", addr);
    info!("📄 Public base URL: {}", config.public_base_url);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
