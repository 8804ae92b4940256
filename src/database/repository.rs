use async_trait::async_trait;
use sqlx::{Executor, PgPool, Postgres, Transaction};
use std::marker::PhantomData;

use crate::database::entity::TreeEntity;
use crate::database::manager::DatabaseError;
use crate::database::pagination::{ListFilter, PageRequest};
use crate::hierarchy::{NodeStore, ParentLinks};

/// Read/delete access to one tree entity table
pub struct Repository<E> {
    pool: PgPool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: TreeEntity> Repository<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }

    pub async fn select_404(&self, id: i32) -> Result<E, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = $1 AND deleted_at IS NULL",
            E::COLUMNS,
            E::TABLE,
            E::ID_COLUMN
        );

        sqlx::query_as::<_, E>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("{} {} not found", E::LABEL, id)))
    }

    /// One page of live rows, newest first, plus the total matching count
    pub async fn select_page(
        &self,
        page: PageRequest,
        filter: &ListFilter,
    ) -> Result<(Vec<E>, i64), DatabaseError> {
        let where_clause = format!(
            "deleted_at IS NULL \
             AND ($1::text IS NULL OR category = $1) \
             AND ($2::text IS NULL OR {name} ILIKE $2 OR description ILIKE $2)",
            name = E::NAME_COLUMN
        );
        let keyword = filter.keyword_pattern();

        let count_sql = format!("SELECT COUNT(*) FROM {} WHERE {}", E::TABLE, where_clause);
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.category.as_deref())
            .bind(keyword.as_deref())
            .fetch_one(&self.pool)
            .await?;

        let select_sql = format!(
            "SELECT {} FROM {} WHERE {} ORDER BY created_at DESC, {} DESC LIMIT $3 OFFSET $4",
            E::COLUMNS,
            E::TABLE,
            where_clause,
            E::ID_COLUMN
        );
        let rows = sqlx::query_as::<_, E>(&select_sql)
            .bind(filter.category.as_deref())
            .bind(keyword.as_deref())
            .bind(page.limit())
            .bind(page.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok((rows, total))
    }

    /// Every live row, fetched in id order by keyset pages of `page_size`
    pub async fn select_all(&self, page_size: i64) -> Result<Vec<E>, DatabaseError> {
        let page_size = page_size.max(1);
        let sql = format!(
            "SELECT {} FROM {} WHERE deleted_at IS NULL AND {id} > $1 ORDER BY {id} ASC LIMIT $2",
            E::COLUMNS,
            E::TABLE,
            id = E::ID_COLUMN
        );

        let mut rows: Vec<E> = Vec::new();
        let mut after = i32::MIN;
        loop {
            let page = sqlx::query_as::<_, E>(&sql)
                .bind(after)
                .bind(page_size)
                .fetch_all(&self.pool)
                .await?;

            let exhausted = (page.len() as i64) < page_size;
            if let Some(last) = page.last() {
                after = last.id();
            }
            rows.extend(page);

            if exhausted {
                break;
            }
        }

        tracing::debug!("Fetched {} {} rows for tree", rows.len(), E::TABLE);
        Ok(rows)
    }

    /// Soft delete one row, or the row and all its live descendants.
    /// Returns the number of rows marked deleted.
    pub async fn soft_delete(&self, id: i32, cascade: bool) -> Result<u64, DatabaseError> {
        let sql = if cascade {
            // UNION (not UNION ALL) so corrupted parent loops still terminate
            format!(
                "WITH RECURSIVE subtree AS ( \
                     SELECT {id} FROM {table} WHERE {id} = $1 AND deleted_at IS NULL \
                     UNION \
                     SELECT t.{id} FROM {table} t JOIN subtree s ON t.parent_id = s.{id} \
                     WHERE t.deleted_at IS NULL \
                 ) \
                 UPDATE {table} SET deleted_at = NOW(), updated_at = NOW() \
                 WHERE {id} IN (SELECT {id} FROM subtree)",
                id = E::ID_COLUMN,
                table = E::TABLE
            )
        } else {
            format!(
                "UPDATE {table} SET deleted_at = NOW(), updated_at = NOW() \
                 WHERE {id} = $1 AND deleted_at IS NULL",
                id = E::ID_COLUMN,
                table = E::TABLE
            )
        };

        let result = sqlx::query(&sql).bind(id).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!(
                "{} {} not found or already deleted",
                E::LABEL,
                id
            )));
        }
        Ok(result.rows_affected())
    }
}

async fn parent_links_in<'c, E, X>(executor: X) -> Result<ParentLinks, DatabaseError>
where
    E: TreeEntity,
    X: Executor<'c, Database = Postgres>,
{
    let sql = format!(
        "SELECT {}, parent_id FROM {} WHERE deleted_at IS NULL",
        E::ID_COLUMN,
        E::TABLE
    );
    let links = sqlx::query_as::<_, (i32, Option<i32>)>(&sql)
        .fetch_all(executor)
        .await?;
    Ok(links.into_iter().collect())
}

async fn exists_in<'c, E, X>(executor: X, id: i32) -> Result<bool, DatabaseError>
where
    E: TreeEntity,
    X: Executor<'c, Database = Postgres>,
{
    let sql = format!(
        "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = $1 AND deleted_at IS NULL)",
        E::TABLE,
        E::ID_COLUMN
    );
    Ok(sqlx::query_scalar::<_, bool>(&sql)
        .bind(id)
        .fetch_one(executor)
        .await?)
}

/// Writes to one tree table inside a single transaction. Nothing is visible
/// to other connections until `commit`; dropping the writer rolls back.
pub struct TxWriter<E> {
    tx: Transaction<'static, Postgres>,
    inserted: usize,
    _entity: PhantomData<fn() -> E>,
}

impl<E: TreeEntity> TxWriter<E> {
    pub async fn begin(pool: &PgPool) -> Result<Self, DatabaseError> {
        Ok(Self {
            tx: pool.begin().await?,
            inserted: 0,
            _entity: PhantomData,
        })
    }

    /// Block other writers to the table until this transaction ends.
    /// Reads stay unblocked; concurrent re-parenting and inserts queue up.
    pub async fn lock_table(&mut self) -> Result<(), DatabaseError> {
        let sql = format!("LOCK TABLE {} IN SHARE ROW EXCLUSIVE MODE", E::TABLE);
        sqlx::query(&sql).execute(&mut *self.tx).await?;
        Ok(())
    }

    /// Check a parent row inside the transaction before creating under it
    pub async fn parent_exists(&mut self, id: i32) -> Result<bool, DatabaseError> {
        exists_in::<E, _>(&mut *self.tx, id).await
    }

    /// Parent links of every live row as seen by this transaction
    pub async fn parent_links(&mut self) -> Result<ParentLinks, DatabaseError> {
        parent_links_in::<E, _>(&mut *self.tx).await
    }

    pub async fn update(&mut self, id: i32, patch: &E::Patch) -> Result<E, DatabaseError> {
        E::update(&mut self.tx, id, patch)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("{} {} not found", E::LABEL, id)))
    }

    pub async fn commit(self) -> Result<usize, DatabaseError> {
        self.tx.commit().await?;
        Ok(self.inserted)
    }
}

#[async_trait]
impl<E: TreeEntity> NodeStore for TxWriter<E> {
    type Request = E::New;
    type Record = E;

    async fn insert(&mut self, request: &E::New, parent_id: Option<i32>) -> Result<E, DatabaseError> {
        let record = E::insert(&mut self.tx, request, parent_id).await?;
        self.inserted += 1;
        Ok(record)
    }

    fn record_id(record: &E) -> i32 {
        record.id()
    }
}
