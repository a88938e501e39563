use std::sync::Arc;

use inquiry_worker::{
    api,
    completion::{
        direct::HttpDirectCompletion,
        managed_run::{ManagedRunBackend, PollPolicy},
        run_api::HttpRunApi,
    },
    config::{Config, LogFormat, StoreBackend},
    db,
    orchestrator::InquiryOrchestrator,
    store::{HttpInquiryStore, SharedInquiryStore, SqliteInquiryStore},
    AppState,
};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "inquiry_worker=debug,tower_http=info".into());
    match LogFormat::from_env() {
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init(),
    }

    let config = Config::from_env()?;
    info!(
        port = config.port,
        store = ?config.store_backend,
        poll_ceiling_ms = config.poll_ceiling.as_millis() as u64,
        "inquiry worker starting"
    );

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;

    let store: SharedInquiryStore = match config.store_backend {
        StoreBackend::Sqlite => {
            let pool = db::connect(&config.database_url).await?;
            Arc::new(SqliteInquiryStore::new(pool))
        }
        StoreBackend::Http => {
            let (Some(base_url), Some(api_key)) = (
                config.inquiry_api_base_url.clone(),
                config.inquiry_api_key.clone(),
            ) else {
                anyhow::bail!("INQUIRY_STORE=http requires INQUIRY_API_BASE_URL and INQUIRY_API_KEY");
            };
            Arc::new(HttpInquiryStore::new(http.clone(), base_url, api_key))
        }
    };

    let direct = Arc::new(HttpDirectCompletion::new(
        http.clone(),
        config.completion_base_url.clone(),
        config.completion_api_key.clone(),
        config.sampling.clone(),
    ));
    let run_api = Arc::new(HttpRunApi::new(
        http,
        config.managed_run_base_url.clone(),
        config.managed_run_owner.clone(),
        config.managed_run_api_key.clone(),
    ));
    let managed = Arc::new(ManagedRunBackend::new(
        run_api,
        PollPolicy {
            ceiling: config.poll_ceiling,
            base_delay: config.poll_base_delay,
        },
    ));

    let state = Arc::new(AppState {
        orchestrator: Arc::new(InquiryOrchestrator::new(direct, managed, store.clone())),
        store,
    });

    let app = api::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("0.0.0.0:{}", config.port);
    info!("listening on {addr}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
