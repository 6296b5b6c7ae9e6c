use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use studyboard_core::account::AccountDeletion;
use studyboard_core::auth::SessionCache;
use studyboard_core::config::Settings;
use studyboard_core::dashboard::Dashboard;
use studyboard_core::financial::FinancialAggregator;
use studyboard_core::store::appwrite::AppwriteClient;

mod routes;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let backend = match build_backend(&settings) {
        Ok(backend) => Some(backend),
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "document store not configured; starting API in degraded mode");
            None
        }
    };

    if settings.account_deletion_function_id.is_none() {
        tracing::warn!("APPWRITE_DELETION_FUNCTION_ID is not set; account deletion requests will fail");
    }

    if settings.admin_emails.is_empty() {
        tracing::warn!("ADMIN_EMAILS is empty; every dashboard request will be rejected");
    }

    let state = routes::AppState {
        backend,
        settings: Arc::new(settings.clone()),
    };

    let app = Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/session", get(routes::get_session))
        .route("/session/logout", post(routes::logout))
        .route("/account/deletion", post(routes::request_account_deletion))
        .route("/financials", get(routes::get_financials))
        .route("/financials/days/:date", get(routes::get_day_details))
        .route("/feedback/recent", get(routes::get_recent_feedback))
        .route("/collections/:name", get(routes::get_collection))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn build_backend(settings: &Settings) -> anyhow::Result<routes::Backend> {
    let client = Arc::new(AppwriteClient::from_settings(settings)?);
    Ok(routes::Backend {
        aggregator: FinancialAggregator::from_settings(client.clone(), settings)?,
        dashboard: Dashboard::from_settings(client.clone(), settings)?,
        sessions: Arc::new(SessionCache::new(client.clone(), settings.session_cache_ttl())),
        account: AccountDeletion::from_settings(client, settings),
    })
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
