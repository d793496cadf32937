use std::{net::SocketAddr, sync::Arc};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use catalog::Catalog;
use shared::{
    error::ApiError,
    protocol::{subcategory_listing_path, SubcategoryQuery, SubcategoryRecord},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, Settings};

#[derive(Clone)]
struct AppState {
    catalog: Arc<Catalog>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let settings = load_settings();
    let catalog = load_catalog(&settings)?;
    info!(
        domain = %settings.domain,
        categories = catalog.categories().len(),
        "catalog ready"
    );

    let state = AppState {
        catalog: Arc::new(catalog),
    };
    let app = build_router(Arc::new(state), &settings.domain);

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, path = %subcategory_listing_path(&settings.domain), "listing server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn load_catalog(settings: &Settings) -> anyhow::Result<Catalog> {
    let Some(path) = &settings.catalog_path else {
        warn!("no catalog file configured; serving the built-in sample catalog");
        return Ok(Catalog::sample());
    };

    Catalog::load(path).map_err(|error| {
        let detail = format!("{error:#}");
        error!(path = %path.display(), %detail, "failed to load catalog");
        error
    })
}

fn build_router(state: Arc<AppState>, domain: &str) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route(&subcategory_listing_path(domain), get(list_subcategories))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn list_subcategories(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SubcategoryQuery>,
) -> Result<Json<Vec<SubcategoryRecord>>, (StatusCode, Json<ApiError>)> {
    state
        .catalog
        .list_subcategories(query.category_id.as_deref())
        .map(Json)
        .map_err(|e| (StatusCode::BAD_REQUEST, Json(ApiError::from(e))))
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
