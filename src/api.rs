use axum::{
    extract::{Json, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse},
    routing::{get, post},
    Router,
};
use askama::Template;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::{
    app_state::AppState,
    cms::{
        config_loader::{clean_host, SiteConfigResolver, ORIGINAL_HOST_HEADER},
        fetcher::ContentQuery,
        layout::DEFAULT_PAGE,
        site_config::SiteConfig,
    },
    models::{ComponentsEnvelope, ContentFilters},
    seed, views,
};

type ApiError = (StatusCode, Json<Value>);

#[derive(Deserialize)]
pub struct HostQuery {
    #[serde(default)]
    host: Option<String>,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", get(home_handler))
        .route("/pagina/:page", get(page_handler))
        // API pública simulada del CMS
        .route("/api/public/v1/cms-components", get(cms_components_handler))
        .route("/api/public/v1/client-config", get(client_config_handler))
        .route("/api/public/v1/client-config/schema", get(client_config_schema_handler))
        // Operación de la caché
        .route("/api/cms/cache-stats", get(cache_stats_handler))
        .route("/api/cms/refetch", post(refetch_handler))
        .with_state(app_state)
}

// --- Páginas ---

#[axum::debug_handler]
async fn home_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Html<String>, ApiError> {
    render_page(&state, &headers, DEFAULT_PAGE).await
}

#[axum::debug_handler]
async fn page_handler(
    State(state): State<AppState>,
    Path(page): Path<String>,
    headers: HeaderMap,
) -> Result<Html<String>, ApiError> {
    render_page(&state, &headers, &page).await
}

fn request_host(headers: &HeaderMap) -> String {
    headers
        .get(ORIGINAL_HOST_HEADER)
        .or_else(|| headers.get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .map(|h| clean_host(h).to_string())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Resuelve configuración y contenido a la vez y pinta el layout de `page`.
async fn render_page(state: &AppState, headers: &HeaderMap, page: &str) -> Result<Html<String>, ApiError> {
    let host = request_host(headers);
    let resolver = SiteConfigResolver::new(
        state.config_loader.clone(),
        &host,
        state.initial_site_config.clone(),
    );
    let query = ContentQuery::new(state.fetcher.clone(), ContentFilters::for_page(page));

    let (config_state, content_state) = tokio::join!(resolver.resolve(), query.load());
    if let Some(e) = &content_state.error {
        warn!("Contenido de '{}' no disponible: {}", page, e);
    }

    let layout = state.layout.for_page(page);
    let body = layout.render(&config_state, &content_state);
    let site = config_state.config_or_default();
    let title = site.seo.title_for(page);

    let html = views::PageView {
        title: &title,
        config: &site,
        body: &body,
    }
    .render()
    .map_err(|e| {
        error!("Error renderizando la página '{}': {}", page, e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": format!("Error al renderizar la página: {}", e)})),
        )
    })?;
    Ok(Html(html))
}

// --- API pública simulada ---

#[axum::debug_handler]
async fn cms_components_handler(Query(filters): Query<ContentFilters>) -> Json<ComponentsEnvelope> {
    let filters = filters.normalized();
    let payload = seed::components_payload(&filters);
    info!("cms-components: {} registros para {:?}", payload.components.len(), filters);
    Json(ComponentsEnvelope {
        success: true,
        data: Some(payload),
        message: None,
    })
}

#[axum::debug_handler]
async fn client_config_handler(Query(query): Query<HostQuery>) -> Json<Value> {
    let host = query.host.unwrap_or_default();
    info!("client-config solicitado para host '{}'", host);
    Json(json!({ "success": true, "data": SiteConfig::default_config() }))
}

#[axum::debug_handler]
async fn client_config_schema_handler() -> Json<Value> {
    Json(SiteConfig::json_schema())
}

// --- Caché ---

#[axum::debug_handler]
async fn cache_stats_handler(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.fetcher.cache_stats();
    Json(json!({ "stats": stats, "inFlight": state.fetcher.in_flight() }))
}

#[axum::debug_handler]
async fn refetch_handler(
    State(state): State<AppState>,
    Json(filters): Json<ContentFilters>,
) -> Result<Json<Value>, ApiError> {
    let query = ContentQuery::new(state.fetcher.clone(), filters.normalized());
    let result = query.refetch().await;
    match result.records {
        Some(records) => Ok(Json(json!({ "count": records.len(), "components": records }))),
        None => {
            let message = result.error.unwrap_or_else(|| "sin resultado".to_string());
            error!("Error en refetch: {}", message);
            Err((
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": format!("No se pudieron recargar los componentes: {}", message)})),
            ))
        }
    }
}
