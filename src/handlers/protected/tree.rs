// Handlers shared by every tree entity. Each is generic over the entity and
// instantiated per route prefix in `server::entity_routes`.

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query, State},
    Json,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::config;
use crate::database::entity::TreeEntity;
use crate::database::pagination::{ListFilter, PageRequest, PageResponse};
use crate::error::ApiError;
use crate::hierarchy::{CreatedNode, MenuNode};
use crate::middleware::{ApiResponse, ApiResult, TenantPool};
use crate::server::AppState;
use crate::services::TreeService;

/// Default page size for unfiltered listings
pub const LIST_PAGE_SIZE: i64 = 50;

#[derive(Debug, Deserialize)]
pub struct TreeQuery {
    pub include_orphans: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub keyword: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateQuery {
    pub parent_id: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub cascade: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResult {
    pub id: i32,
    pub deleted: u64,
}

pub(crate) fn service<E: TreeEntity>(pool: sqlx::PgPool) -> TreeService<E> {
    TreeService::new(pool, &config::config().hierarchy)
}

/// Accept a single object or an array of objects; anything else is malformed
pub(crate) fn parse_one_or_many<R: DeserializeOwned>(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Vec<R>, ApiError> {
    let Json(body) = body.map_err(|e| ApiError::invalid_json(e.body_text()))?;

    let requests = match body {
        Value::Array(items) => items
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<R>, _>>(),
        Value::Object(_) => serde_json::from_value(body).map(|r| vec![r]),
        _ => return Err(ApiError::invalid_json("Request body must be an object or an array")),
    }
    .map_err(|e| ApiError::invalid_json(e.to_string()))?;

    if requests.is_empty() {
        return Err(ApiError::bad_request("Request body is empty"));
    }
    Ok(requests)
}

/// GET /tree - ordered forest of every live row
pub async fn tree<E: TreeEntity>(
    Query(query): Query<TreeQuery>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
) -> ApiResult<Vec<MenuNode<E::Fields>>> {
    let nodes = service::<E>(pool)
        .tree(query.include_orphans.unwrap_or(false))
        .await?;
    Ok(ApiResponse::success(nodes))
}

/// GET /list - newest first
pub async fn list<E: TreeEntity>(
    Query(query): Query<PageQuery>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
) -> ApiResult<PageResponse<E>> {
    let page = PageRequest::new(query.page, query.page_size, LIST_PAGE_SIZE);
    let rows = service::<E>(pool).list(page, &ListFilter::default()).await?;
    Ok(ApiResponse::success(rows))
}

/// GET /category/:category
pub async fn by_category<E: TreeEntity>(
    Path(category): Path<String>,
    Query(query): Query<PageQuery>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
) -> ApiResult<PageResponse<E>> {
    let category = E::normalize_category(&category);
    if category.is_empty() {
        return Err(ApiError::field_error("category", "Category is required"));
    }

    let page = PageRequest::new(query.page, query.page_size, E::FILTERED_PAGE_SIZE);
    let filter = ListFilter {
        category: Some(category),
        keyword: None,
    };
    let rows = service::<E>(pool).list(page, &filter).await?;
    Ok(ApiResponse::success(rows))
}

/// GET /search?keyword= - an empty keyword lists everything
pub async fn search<E: TreeEntity>(
    Query(query): Query<SearchQuery>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
) -> ApiResult<PageResponse<E>> {
    let keyword = query
        .keyword
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string);

    let default_size = if keyword.is_some() { E::FILTERED_PAGE_SIZE } else { LIST_PAGE_SIZE };
    let page = PageRequest::new(query.page, query.page_size, default_size);
    let filter = ListFilter {
        category: None,
        keyword,
    };
    let rows = service::<E>(pool).list(page, &filter).await?;
    Ok(ApiResponse::success(rows))
}

/// GET /:id
pub async fn get<E: TreeEntity>(
    Path(id): Path<i32>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
) -> ApiResult<E> {
    let row = service::<E>(pool).get(id).await?;
    Ok(ApiResponse::success(row))
}

/// POST /create, /create-nested - one object or an array, children nested
/// under `children`; created in a single transaction
pub async fn create<E: TreeEntity>(
    State(state): State<AppState>,
    Query(query): Query<CreateQuery>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<Vec<CreatedNode<E>>> {
    let requests: Vec<E::New> = parse_one_or_many(body)?;
    let cancel = state.shutdown.child_token();

    let created = service::<E>(pool)
        .create(&requests, query.parent_id, &cancel)
        .await?;
    Ok(ApiResponse::created(created))
}

/// PUT /update/:id - partial update
pub async fn update<E: TreeEntity>(
    Path(id): Path<i32>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<E> {
    let Json(body) = body.map_err(|e| ApiError::invalid_json(e.body_text()))?;
    if !body.is_object() {
        return Err(ApiError::invalid_json("Request body must be an object"));
    }
    let patch: E::Patch = serde_json::from_value(body).map_err(|e| ApiError::invalid_json(e.to_string()))?;

    let row = service::<E>(pool).update(id, &patch).await?;
    Ok(ApiResponse::success(row))
}

/// DELETE /:id, /delete/:id - soft delete, `?cascade=true` takes the subtree
pub async fn delete<E: TreeEntity>(
    Path(id): Path<i32>,
    Query(query): Query<DeleteQuery>,
    Extension(TenantPool(pool)): Extension<TenantPool>,
) -> ApiResult<DeleteResult> {
    let deleted = service::<E>(pool)
        .delete(id, query.cascade.unwrap_or(false))
        .await?;
    Ok(ApiResponse::success(DeleteResult { id, deleted }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::NewCustomerManual;
    use serde_json::json;

    fn body(value: Value) -> Result<Json<Value>, JsonRejection> {
        Ok(Json(value))
    }

    #[test]
    fn single_object_becomes_one_request() {
        let parsed: Vec<NewCustomerManual> = parse_one_or_many(body(json!({
            "customer_manual_name": "Root",
            "description": "d",
            "category": "office",
            "children": [{ "customer_manual_name": "Child", "description": "d", "category": "office" }]
        })))
        .unwrap();

        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].children.len(), 1);
    }

    #[test]
    fn array_keeps_input_order() {
        let parsed: Vec<NewCustomerManual> = parse_one_or_many(body(json!([
            { "customer_manual_name": "A" },
            { "customer_manual_name": "B" }
        ])))
        .unwrap();

        let names: Vec<&str> = parsed.iter().map(|r| r.customer_manual_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn empty_array_is_bad_request() {
        let err = parse_one_or_many::<NewCustomerManual>(body(json!([]))).unwrap_err();
        assert_eq!(err.error_code(), "BAD_REQUEST");
    }

    #[test]
    fn scalars_and_wrong_types_are_invalid_json() {
        let err = parse_one_or_many::<NewCustomerManual>(body(json!("text"))).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_JSON");

        let err = parse_one_or_many::<NewCustomerManual>(body(json!({ "children": "nope" }))).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_JSON");
    }
}
