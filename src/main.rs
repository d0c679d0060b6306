// Módulos de la aplicación
mod api;
mod app_state;
mod cms;
mod config;
mod models;
mod sections;
mod seed;
mod views;

use crate::app_state::AppState;
use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env()?;
    info!(
        "API del CMS en {} (caché: {})",
        cfg.cms_api_url,
        cfg.cache_path.display()
    );

    // 3. Crear estado compartido (orígenes HTTP, caché persistida, layout)
    let app_state = AppState::from_config(cfg)?;
    if app_state.initial_site_config.is_some() {
        info!("Configuración de sitio inyectada desde SITE_CONFIG_PATH");
    }

    // 4. Router de páginas y API más los ficheros estáticos
    let app = Router::new()
        .merge(api::create_router(app_state.clone()))
        .fallback_service(ServeDir::new(&app_state.config.static_dir))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 5. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr).await?;
    info!("🚀 Servidor escuchando en http://{}", server_addr);

    // Apagado ordenado con Ctrl+C.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}
