use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};

use super::{non_blank, require};
use crate::database::entity::{ParentChange, PatchRequest, TreeEntity};
use crate::database::manager::DatabaseError;
use crate::hierarchy::{FlatNode, NestedRequest};

/// Portal menu item (`ps_app_systems`)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AppSystem {
    pub id: i32,
    pub name: String,
    pub description: String,
    pub category: String,
    pub href: String,
    pub icon: String,
    pub parent_id: Option<i32>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Menu payload carried into the tree output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppSystemFields {
    pub description: String,
    pub category: String,
    pub href: String,
    pub icon: String,
}

/// Create body; may nest children of the same shape
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAppSystem {
    #[serde(default)]
    pub name: String,
    #[serde(default, alias = "desc")]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub href: String,
    #[serde(default)]
    pub icon: String,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub children: Vec<NewAppSystem>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppSystemPatch {
    pub name: Option<String>,
    #[serde(alias = "desc")]
    pub description: Option<String>,
    pub category: Option<String>,
    pub href: Option<String>,
    pub icon: Option<String>,
    pub parent_id: Option<i32>,
    pub sort_order: Option<i32>,
    #[serde(default)]
    pub clear_parent_id: bool,
}

impl NestedRequest for NewAppSystem {
    fn children(&self) -> &[Self] {
        &self.children
    }

    fn validate(&self) -> Result<(), String> {
        require(&[
            ("name", &self.name),
            ("description", &self.description),
            ("category", &self.category),
            ("href", &self.href),
        ])
    }
}

impl PatchRequest for AppSystemPatch {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    fn parent_change(&self) -> ParentChange {
        match (self.clear_parent_id, self.parent_id) {
            (true, _) => ParentChange::Clear,
            (false, Some(parent)) => ParentChange::Set(parent),
            (false, None) => ParentChange::Keep,
        }
    }
}

const COLUMNS: &str =
    "id, name, description, category, href, icon, parent_id, sort_order, created_at, updated_at, deleted_at";

#[async_trait]
impl TreeEntity for AppSystem {
    const TABLE: &'static str = "ps_app_systems";
    const ID_COLUMN: &'static str = "id";
    const NAME_COLUMN: &'static str = "name";
    const COLUMNS: &'static str = COLUMNS;
    const LABEL: &'static str = "AppSystem";
    const FILTERED_PAGE_SIZE: i64 = 10;

    type Fields = AppSystemFields;
    type New = NewAppSystem;
    type Patch = AppSystemPatch;

    fn id(&self) -> i32 {
        self.id
    }

    fn parent_id(&self) -> Option<i32> {
        self.parent_id
    }

    fn into_flat(self) -> FlatNode<AppSystemFields> {
        FlatNode {
            id: self.id,
            parent_id: self.parent_id,
            sort_order: self.sort_order,
            name: self.name,
            payload: AppSystemFields {
                description: self.description,
                category: self.category,
                href: self.href,
                icon: self.icon,
            },
        }
    }

    async fn insert(
        conn: &mut PgConnection,
        new: &NewAppSystem,
        parent_id: Option<i32>,
    ) -> Result<Self, DatabaseError> {
        let sql = format!(
            "INSERT INTO ps_app_systems (name, description, category, href, icon, parent_id, sort_order) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            COLUMNS
        );

        Ok(sqlx::query_as::<_, AppSystem>(&sql)
            .bind(new.name.trim())
            .bind(new.description.trim())
            .bind(Self::normalize_category(&new.category))
            .bind(new.href.trim())
            .bind(new.icon.trim())
            .bind(parent_id)
            .bind(new.sort_order)
            .fetch_one(conn)
            .await?)
    }

    async fn update(
        conn: &mut PgConnection,
        id: i32,
        patch: &AppSystemPatch,
    ) -> Result<Option<Self>, DatabaseError> {
        let sql = format!(
            "UPDATE ps_app_systems SET \
                 name = COALESCE($2, name), \
                 description = COALESCE($3, description), \
                 category = COALESCE($4, category), \
                 href = COALESCE($5, href), \
                 icon = COALESCE($6, icon), \
                 parent_id = CASE WHEN $7 THEN NULL ELSE COALESCE($8, parent_id) END, \
                 sort_order = COALESCE($9, sort_order), \
                 updated_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {}",
            COLUMNS
        );

        Ok(sqlx::query_as::<_, AppSystem>(&sql)
            .bind(id)
            .bind(non_blank(&patch.name))
            .bind(non_blank(&patch.description))
            .bind(non_blank(&patch.category).map(|c| Self::normalize_category(&c)))
            .bind(non_blank(&patch.href))
            .bind(non_blank(&patch.icon))
            .bind(patch.clear_parent_id)
            .bind(patch.parent_id)
            .bind(patch.sort_order)
            .fetch_optional(conn)
            .await?)
    }
}
