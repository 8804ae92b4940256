mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::Value;

#[tokio::test]
async fn tree_requires_bearer_token() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::get(format!("{}/api/app-system/tree", server.base_url)).await?;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await?;
    assert_eq!(body["error"], true);
    assert_eq!(body["code"], "UNAUTHORIZED");
    Ok(())
}

#[tokio::test]
async fn forged_token_is_rejected() -> Result<()> {
    let server = common::ensure_server().await?;
    let claims = portal_api::auth::Claims::new(
        "acme".to_string(),
        "mallory".to_string(),
        "tenant_0000000000000000".to_string(),
        "full".to_string(),
        1,
    );
    let forged = portal_api::auth::generate_jwt(&claims, "some-other-secret")?;

    let res = reqwest::Client::new()
        .get(format!("{}/api/customer-manual/tree", server.base_url))
        .bearer_auth(forged)
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn valid_token_reaches_tenant_database() -> Result<()> {
    let server = common::ensure_server().await?;
    let token = common::token_for("acme")?;

    let res = reqwest::Client::new()
        .get(format!("{}/api/app-system/tree", server.base_url))
        .bearer_auth(token)
        .send()
        .await?;

    // Authenticated; the tenant database is unreachable in this environment
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = res.json().await?;
    assert_eq!(body["code"], "SERVICE_UNAVAILABLE");
    Ok(())
}
