use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config;
use crate::database::manager::DatabaseManager;
use crate::database::schema;

pub async fn handle(tenant: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    let manager = DatabaseManager::from_env(&config::init()?.database)?;
    let database = DatabaseManager::tenant_database_name(tenant);

    let pool = manager.tenant_pool(&database).await?;
    let applied = schema::apply(&pool).await?;
    manager.close_all().await;

    output_success(
        &output_format,
        &format!("Applied {} schema statements to {} ({})", applied, database, tenant),
        Some(json!({ "tenant": tenant, "database": database, "statements": applied })),
    )
}
