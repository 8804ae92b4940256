use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgConnection};

use super::{non_blank, require};
use crate::database::entity::{ParentChange, PatchRequest, TreeEntity};
use crate::database::manager::DatabaseError;
use crate::hierarchy::{FlatNode, NestedRequest};

pub const VALID_CATEGORIES: &[&str] = &["office", "production", "quality", "support"];

fn check_category(category: &str) -> Result<(), String> {
    let category = category.trim().to_lowercase();
    if VALID_CATEGORIES.contains(&category.as_str()) {
        Ok(())
    } else {
        Err(format!(
            "invalid category. Must be one of: {}",
            VALID_CATEGORIES.join(", ")
        ))
    }
}

/// Customer manual document (`customer_manuals`)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CustomerManual {
    pub customer_manual_id: i32,
    pub customer_manual_name: String,
    pub description: String,
    pub category: String,
    pub file_name: String,
    pub parent_id: Option<i32>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerManualFields {
    pub description: String,
    pub category: String,
    pub file_name: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewCustomerManual {
    #[serde(default, alias = "name")]
    pub customer_manual_name: String,
    #[serde(default, alias = "desc")]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub children: Vec<NewCustomerManual>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomerManualPatch {
    #[serde(alias = "name")]
    pub customer_manual_name: Option<String>,
    #[serde(alias = "desc")]
    pub description: Option<String>,
    pub category: Option<String>,
    pub file_name: Option<String>,
    pub parent_id: Option<i32>,
    pub sort_order: Option<i32>,
    #[serde(default)]
    pub clear_parent_id: bool,
}

impl NestedRequest for NewCustomerManual {
    fn children(&self) -> &[Self] {
        &self.children
    }

    fn validate(&self) -> Result<(), String> {
        require(&[
            ("customer_manual_name", &self.customer_manual_name),
            ("description", &self.description),
            ("category", &self.category),
        ])?;
        check_category(&self.category)
    }
}

impl PatchRequest for CustomerManualPatch {
    fn validate(&self) -> Result<(), String> {
        match non_blank(&self.category) {
            Some(category) => check_category(&category),
            None => Ok(()),
        }
    }

    fn parent_change(&self) -> ParentChange {
        match (self.clear_parent_id, self.parent_id) {
            (true, _) => ParentChange::Clear,
            (false, Some(parent)) => ParentChange::Set(parent),
            (false, None) => ParentChange::Keep,
        }
    }
}

const COLUMNS: &str = "customer_manual_id, customer_manual_name, description, category, file_name, \
                       parent_id, sort_order, created_at, updated_at, deleted_at";

#[async_trait]
impl TreeEntity for CustomerManual {
    const TABLE: &'static str = "customer_manuals";
    const ID_COLUMN: &'static str = "customer_manual_id";
    const NAME_COLUMN: &'static str = "customer_manual_name";
    const COLUMNS: &'static str = COLUMNS;
    const LABEL: &'static str = "Customer manual";
    const FILTERED_PAGE_SIZE: i64 = 50;

    type Fields = CustomerManualFields;
    type New = NewCustomerManual;
    type Patch = CustomerManualPatch;

    fn id(&self) -> i32 {
        self.customer_manual_id
    }

    fn parent_id(&self) -> Option<i32> {
        self.parent_id
    }

    fn into_flat(self) -> FlatNode<CustomerManualFields> {
        FlatNode {
            id: self.customer_manual_id,
            parent_id: self.parent_id,
            sort_order: self.sort_order,
            name: self.customer_manual_name,
            payload: CustomerManualFields {
                description: self.description,
                category: self.category,
                file_name: self.file_name,
            },
        }
    }

    async fn insert(
        conn: &mut PgConnection,
        new: &NewCustomerManual,
        parent_id: Option<i32>,
    ) -> Result<Self, DatabaseError> {
        let sql = format!(
            "INSERT INTO customer_manuals \
                 (customer_manual_name, description, category, file_name, parent_id, sort_order) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            COLUMNS
        );

        Ok(sqlx::query_as::<_, CustomerManual>(&sql)
            .bind(new.customer_manual_name.trim())
            .bind(new.description.trim())
            .bind(Self::normalize_category(&new.category))
            .bind(new.file_name.trim())
            .bind(parent_id)
            .bind(new.sort_order)
            .fetch_one(conn)
            .await?)
    }

    async fn update(
        conn: &mut PgConnection,
        id: i32,
        patch: &CustomerManualPatch,
    ) -> Result<Option<Self>, DatabaseError> {
        let sql = format!(
            "UPDATE customer_manuals SET \
                 customer_manual_name = COALESCE($2, customer_manual_name), \
                 description = COALESCE($3, description), \
                 category = COALESCE($4, category), \
                 file_name = COALESCE($5, file_name), \
                 parent_id = CASE WHEN $6 THEN NULL ELSE COALESCE($7, parent_id) END, \
                 sort_order = COALESCE($8, sort_order), \
                 updated_at = NOW() \
             WHERE customer_manual_id = $1 AND deleted_at IS NULL \
             RETURNING {}",
            COLUMNS
        );

        Ok(sqlx::query_as::<_, CustomerManual>(&sql)
            .bind(id)
            .bind(non_blank(&patch.customer_manual_name))
            .bind(non_blank(&patch.description))
            .bind(non_blank(&patch.category).map(|c| Self::normalize_category(&c)))
            .bind(non_blank(&patch.file_name))
            .bind(patch.clear_parent_id)
            .bind(patch.parent_id)
            .bind(patch.sort_order)
            .fetch_optional(conn)
            .await?)
    }
}
