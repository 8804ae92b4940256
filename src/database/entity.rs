use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{postgres::PgRow, FromRow, PgConnection};

use crate::database::manager::DatabaseError;
use crate::hierarchy::{FlatNode, NestedRequest};

/// How an update touches the parent reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentChange {
    Keep,
    Clear,
    Set(i32),
}

/// Partial update body for a tree entity
pub trait PatchRequest {
    fn validate(&self) -> Result<(), String>;

    fn parent_change(&self) -> ParentChange;
}

/// A self-referencing table: rows carry `parent_id` and `sort_order` columns
/// and are soft deleted through `deleted_at`.
///
/// Generic repositories, services and handlers are written against this
/// trait; each entity supplies its table layout and its insert/update SQL.
#[async_trait]
pub trait TreeEntity:
    for<'r> FromRow<'r, PgRow> + Serialize + Send + Sync + Unpin + 'static
{
    const TABLE: &'static str;
    const ID_COLUMN: &'static str;
    const NAME_COLUMN: &'static str;
    /// Explicit select list matching the struct fields
    const COLUMNS: &'static str;
    /// Human readable name used in error messages
    const LABEL: &'static str;
    /// Default page size for category and search listings
    const FILTERED_PAGE_SIZE: i64;

    /// Columns carried into each MenuNode besides id, name and sort_order
    type Fields: Serialize + Send + 'static;
    type New: NestedRequest + DeserializeOwned + 'static;
    type Patch: PatchRequest + DeserializeOwned + Send + Sync + 'static;

    fn id(&self) -> i32;

    fn parent_id(&self) -> Option<i32>;

    fn into_flat(self) -> FlatNode<Self::Fields>;

    /// Normalize a category value the way this entity stores it
    fn normalize_category(category: &str) -> String {
        category.trim().to_lowercase()
    }

    async fn insert(
        conn: &mut PgConnection,
        new: &Self::New,
        parent_id: Option<i32>,
    ) -> Result<Self, DatabaseError>;

    async fn update(
        conn: &mut PgConnection,
        id: i32,
        patch: &Self::Patch,
    ) -> Result<Option<Self>, DatabaseError>;
}
