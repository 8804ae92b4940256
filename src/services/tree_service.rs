use sqlx::PgPool;
use std::marker::PhantomData;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::HierarchyConfig;
use crate::database::entity::{ParentChange, PatchRequest, TreeEntity};
use crate::database::manager::DatabaseError;
use crate::database::pagination::{ListFilter, PageRequest, PageResponse};
use crate::database::repository::{Repository, TxWriter};
use crate::hierarchy::{build_tree, create_tree, CreateLimits, CreatedNode, Forest, HierarchyError, MenuNode};

#[derive(Debug, thiserror::Error)]
pub enum TreeServiceError {
    #[error(transparent)]
    Database(#[from] DatabaseError),
    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),
    #[error("{0}")]
    Validation(String),
    #[error("Request contains no nodes")]
    Empty,
    #[error("Parent {label} {id} not found")]
    ParentNotFound { label: &'static str, id: i32 },
    #[error("{0}")]
    Cycle(String),
}

/// Tree operations for one entity table in one tenant database
pub struct TreeService<E> {
    pool: PgPool,
    limits: CreateLimits,
    fetch_page_size: i64,
    _entity: PhantomData<fn() -> E>,
}

impl<E: TreeEntity> TreeService<E> {
    pub fn new(pool: PgPool, config: &HierarchyConfig) -> Self {
        Self {
            pool,
            limits: CreateLimits {
                max_depth: config.max_depth,
                max_nodes: config.max_nodes,
                parent_depth: 0,
            },
            fetch_page_size: config.fetch_page_size,
            _entity: PhantomData,
        }
    }

    fn repository(&self) -> Repository<E> {
        Repository::new(self.pool.clone())
    }

    pub async fn get(&self, id: i32) -> Result<E, TreeServiceError> {
        Ok(self.repository().select_404(id).await?)
    }

    pub async fn list(&self, page: PageRequest, filter: &ListFilter) -> Result<PageResponse<E>, TreeServiceError> {
        let (rows, total) = self.repository().select_page(page, filter).await?;
        Ok(PageResponse::new(rows, total, page))
    }

    /// Every live row assembled into a forest. Rows that could not be placed
    /// are kept in `orphans` and reported in the log.
    pub async fn forest(&self) -> Result<Forest<E::Fields>, TreeServiceError> {
        let rows = self.repository().select_all(self.fetch_page_size).await?;
        let forest = build_tree(rows.into_iter().map(E::into_flat).collect());

        if !forest.orphans.is_empty() {
            let ids: Vec<i32> = forest.orphans.iter().map(|n| n.id).collect();
            warn!(
                "{} has {} rows not placed in the tree: {:?}",
                E::TABLE,
                ids.len(),
                ids
            );
        }

        Ok(forest)
    }

    pub async fn tree(&self, include_orphans: bool) -> Result<Vec<MenuNode<E::Fields>>, TreeServiceError> {
        let forest = self.forest().await?;
        if include_orphans {
            Ok(forest.into_roots_with_orphans())
        } else {
            Ok(forest.roots)
        }
    }

    /// Create a nested forest under `parent_id` (or as new roots) in one
    /// transaction. Any failure leaves the table untouched.
    ///
    /// Depth is counted from the table's roots, not from `parent_id`.
    pub async fn create(
        &self,
        requests: &[E::New],
        parent_id: Option<i32>,
        cancel: &CancellationToken,
    ) -> Result<Vec<CreatedNode<E>>, TreeServiceError> {
        if requests.is_empty() {
            return Err(TreeServiceError::Empty);
        }

        let mut writer = TxWriter::<E>::begin(&self.pool).await?;
        let mut limits = self.limits;
        if let Some(parent) = parent_id {
            writer.lock_table().await?;
            if !writer.parent_exists(parent).await? {
                return Err(TreeServiceError::ParentNotFound { label: E::LABEL, id: parent });
            }
            limits.parent_depth = writer.parent_links().await?.depth(parent);
        }

        let created = create_tree(&mut writer, requests, parent_id, &limits, cancel).await?;
        let inserted = writer.commit().await?;

        info!("Created {} {} rows under parent {:?}", inserted, E::TABLE, parent_id);
        Ok(created)
    }

    /// Partial update. A parent change is checked and applied under a table
    /// lock: the new parent must exist, must not be the row or one of its
    /// descendants, and the moved subtree must stay within `max_depth`.
    pub async fn update(&self, id: i32, patch: &E::Patch) -> Result<E, TreeServiceError> {
        patch.validate().map_err(TreeServiceError::Validation)?;

        let mut writer = TxWriter::<E>::begin(&self.pool).await?;
        if let ParentChange::Set(parent) = patch.parent_change() {
            if parent == id {
                return Err(TreeServiceError::Cycle(format!("{} {} cannot be its own parent", E::LABEL, id)));
            }

            writer.lock_table().await?;
            if !writer.parent_exists(parent).await? {
                return Err(TreeServiceError::ParentNotFound { label: E::LABEL, id: parent });
            }

            let links = writer.parent_links().await?;
            if links.creates_cycle(id, parent) {
                return Err(TreeServiceError::Cycle(format!(
                    "Moving {} {} under {} would create a cycle",
                    E::LABEL,
                    id,
                    parent
                )));
            }

            let deepest = links.depth(parent) + links.height(id);
            if deepest > self.limits.max_depth {
                return Err(HierarchyError::DepthExceeded {
                    path: "parent_id".to_string(),
                    max: self.limits.max_depth,
                }
                .into());
            }
        }

        let row = writer.update(id, patch).await?;
        writer.commit().await?;
        Ok(row)
    }

    pub async fn delete(&self, id: i32, cascade: bool) -> Result<u64, TreeServiceError> {
        let deleted = self.repository().soft_delete(id, cascade).await?;
        info!("Soft deleted {} {} rows starting at {}", deleted, E::TABLE, id);
        Ok(deleted)
    }
}
