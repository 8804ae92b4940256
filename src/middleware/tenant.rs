use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use sqlx::PgPool;

use super::auth::AuthUser;
use crate::error::ApiError;
use crate::server::AppState;

/// Tenant database pool, injected by middleware
#[derive(Clone)]
pub struct TenantPool(pub PgPool);

/// Resolve the tenant database named in the JWT to a pooled connection.
/// Must run after `jwt_auth_middleware`.
pub async fn tenant_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or_else(|| ApiError::unauthorized("JWT authentication required before tenant resolution"))?;

    let pool = state.db.tenant_pool(&auth_user.database).await.map_err(|e| {
        tracing::error!(
            "Failed to get database pool for tenant '{}' ({}): {}",
            auth_user.tenant,
            auth_user.database,
            e
        );
        ApiError::from(e)
    })?;

    tracing::debug!("Tenant database pool acquired for: {}", auth_user.database);
    request.extensions_mut().insert(TenantPool(pool));

    Ok(next.run(request).await)
}
