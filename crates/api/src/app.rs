use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use domain::store::{CompanyStore, FilterStore};
use shared::jwt::JwtVerifier;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, require_user_auth, trace_id};
use crate::routes::{cnaes, companies, exports, filters, health};
use crate::services::ExportService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub companies: Arc<dyn CompanyStore>,
    pub filters: Arc<dyn FilterStore>,
    pub exports: ExportService,
    pub jwt: Arc<JwtVerifier>,
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        // Default: allow any origin (for development)
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    // Protected routes (require a bearer token)
    let protected_routes = Router::new()
        .route("/empresas", get(companies::search_companies))
        .route("/empresas/:cnpj", get(companies::get_company))
        .route(
            "/empresas/exportar/:destino",
            post(companies::export_companies),
        )
        .route("/cnaes", get(cnaes::list_cnaes))
        .route("/cnaes/:codigo", get(cnaes::get_cnae))
        .route("/exportacoes", get(exports::list_exports))
        .route("/exportacoes/:id", get(exports::get_export))
        .route("/exportacoes/:id/status", get(exports::get_export_status))
        .route("/exportacoes/:id/logs", get(exports::get_export_logs))
        .route("/exportacoes/:id/download", get(exports::download_export))
        .route(
            "/filtros",
            post(filters::create_filter).get(filters::list_filters),
        )
        .route(
            "/filtros/:id",
            get(filters::get_filter)
                .put(filters::update_filter)
                .delete(filters::delete_filter),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_user_auth,
        ));

    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
