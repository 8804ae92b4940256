use serde_json::json;

use crate::auth::{generate_jwt, Claims};
use crate::cli::{utils::output_success, OutputFormat};
use crate::config;
use crate::database::manager::DatabaseManager;

pub fn handle(tenant: String, user: String, access: String, output_format: OutputFormat) -> anyhow::Result<()> {
    let security = &config::init()?.security;
    let database = DatabaseManager::tenant_database_name(&tenant);
    let claims = Claims::new(tenant, user, database, access, security.jwt_expiry_hours);
    let token = generate_jwt(&claims, &security.jwt_secret)?;

    match output_format {
        OutputFormat::Text => println!("{}", token),
        OutputFormat::Json => output_success(
            &output_format,
            "Token issued",
            Some(json!({ "token": token, "database": claims.database, "expires_at": claims.exp })),
        )?,
    }
    Ok(())
}
