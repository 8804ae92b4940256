// Router assembly and shared application state

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{HeaderValue, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::Level;
use uuid::Uuid;

use crate::config::{AppConfig, SecurityConfig};
use crate::database::entity::TreeEntity;
use crate::database::manager::DatabaseManager;
use crate::database::models::{AppSystem, CustomerManual};
use crate::handlers::{protected, public};
use crate::middleware::{jwt_auth_middleware, tenant_middleware};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseManager>,
    /// Cancelled on shutdown; tree creations run under child tokens
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(db: DatabaseManager) -> Self {
        Self {
            db: Arc::new(db),
            shutdown: CancellationToken::new(),
        }
    }
}

pub fn app(state: AppState, config: &AppConfig) -> Router {
    let protected_routes = Router::new()
        .nest(
            "/api/app-system",
            entity_routes::<AppSystem>()
                .route("/create-multiple", post(protected::app_system::create_multiple)),
        )
        .nest("/api/customer-manual", entity_routes::<CustomerManual>())
        // Layers run bottom-up: JWT first, then tenant pool
        .layer(from_fn_with_state(state.clone(), tenant_middleware))
        .layer(from_fn(jwt_auth_middleware));

    let response_level = if config.api.enable_request_logging {
        Level::INFO
    } else {
        Level::DEBUG
    };

    Router::new()
        // Public
        .route("/", get(public::root))
        .route("/health", get(public::health))
        .merge(protected_routes)
        // Global middleware
        .layer(DefaultBodyLimit::max(config.api.max_request_size_bytes))
        .layer(cors_layer(&config.security))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &Request<Body>| {
                    tracing::info_span!(
                        "request",
                        id = %Uuid::new_v4(),
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                })
                .on_response(DefaultOnResponse::new().level(response_level)),
        )
        .with_state(state)
}

/// The route set every tree entity exposes under its prefix
fn entity_routes<E: TreeEntity>() -> Router<AppState> {
    use protected::tree;

    Router::new()
        .route("/tree", get(tree::tree::<E>))
        .route("/list", get(tree::list::<E>))
        .route("/category/:category", get(tree::by_category::<E>))
        .route("/search", get(tree::search::<E>))
        .route("/create", post(tree::create::<E>))
        .route("/create-nested", post(tree::create::<E>))
        .route("/update/:id", put(tree::update::<E>))
        .route("/delete/:id", delete(tree::delete::<E>))
        .route("/:id", get(tree::get::<E>).delete(tree::delete::<E>))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
