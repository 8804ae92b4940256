// Tenant schema for the hierarchical tables. Statements are idempotent so
// `portal migrate` can run against an existing tenant database.

use sqlx::PgPool;
use tracing::info;

use crate::database::manager::DatabaseError;

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS ps_app_systems (
        id          SERIAL PRIMARY KEY,
        name        VARCHAR(255) NOT NULL,
        description TEXT NOT NULL,
        category    VARCHAR(50) NOT NULL,
        href        TEXT NOT NULL,
        icon        TEXT NOT NULL DEFAULT '',
        parent_id   INTEGER NULL REFERENCES ps_app_systems (id),
        sort_order  INTEGER NOT NULL DEFAULT 0,
        created_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at  TIMESTAMPTZ NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_ps_app_systems_parent_id ON ps_app_systems (parent_id)",
    "CREATE INDEX IF NOT EXISTS idx_ps_app_systems_deleted_at ON ps_app_systems (deleted_at)",
    r#"
    CREATE TABLE IF NOT EXISTS customer_manuals (
        customer_manual_id   SERIAL PRIMARY KEY,
        customer_manual_name VARCHAR(255) NOT NULL,
        description          TEXT NOT NULL,
        category             VARCHAR(50) NOT NULL,
        file_name            TEXT NOT NULL DEFAULT '',
        parent_id            INTEGER NULL REFERENCES customer_manuals (customer_manual_id),
        sort_order           INTEGER NOT NULL DEFAULT 0,
        created_at           TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        updated_at           TIMESTAMPTZ NOT NULL DEFAULT NOW(),
        deleted_at           TIMESTAMPTZ NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_customer_manuals_parent_id ON customer_manuals (parent_id)",
    "CREATE INDEX IF NOT EXISTS idx_customer_manuals_deleted_at ON customer_manuals (deleted_at)",
];

/// Create the tree tables in one transaction
pub async fn apply(pool: &PgPool) -> Result<usize, DatabaseError> {
    let mut tx = pool.begin().await?;
    for statement in STATEMENTS {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    tx.commit().await?;

    info!("Applied {} schema statements", STATEMENTS.len());
    Ok(STATEMENTS.len())
}
