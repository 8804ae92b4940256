// Runs against a real Postgres when PORTAL_TEST_DATABASE_URL is set; each
// test works in its own throwaway schema. Without the variable every test
// returns early.

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Executor, PgPool};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use portal_api::config::HierarchyConfig;
use portal_api::database::models::{AppSystem, AppSystemPatch, NewAppSystem};
use portal_api::database::{schema, Repository, TxWriter};
use portal_api::error::ApiError;
use portal_api::hierarchy::{HierarchyError, NodeStore};
use portal_api::services::{TreeService, TreeServiceError};

struct TestDb {
    admin: PgPool,
    pool: PgPool,
    schema: String,
}

impl TestDb {
    async fn connect() -> Result<Option<Self>> {
        let Ok(url) = std::env::var("PORTAL_TEST_DATABASE_URL") else {
            eprintln!("PORTAL_TEST_DATABASE_URL not set, skipping");
            return Ok(None);
        };

        let schema = format!("portal_test_{}", Uuid::new_v4().simple());
        let admin = PgPool::connect(&url).await?;
        sqlx::query(&format!("CREATE SCHEMA {}", schema))
            .execute(&admin)
            .await?;

        let search_path = format!("SET search_path TO {}", schema);
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .after_connect(move |conn, _meta| {
                let sql = search_path.clone();
                Box::pin(async move {
                    conn.execute(sql.as_str()).await?;
                    Ok(())
                })
            })
            .connect(&url)
            .await?;
        schema::apply(&pool).await?;

        Ok(Some(Self { admin, pool, schema }))
    }

    fn service(&self, max_depth: usize) -> TreeService<AppSystem> {
        let config = HierarchyConfig {
            max_depth,
            max_nodes: 100,
            fetch_page_size: 2,
        };
        TreeService::new(self.pool.clone(), &config)
    }

    async fn row_count(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM ps_app_systems")
            .fetch_one(&self.pool)
            .await?)
    }

    async fn cleanup(self) -> Result<()> {
        self.pool.close().await;
        sqlx::query(&format!("DROP SCHEMA {} CASCADE", self.schema))
            .execute(&self.admin)
            .await?;
        self.admin.close().await;
        Ok(())
    }
}

fn system(name: &str, children: Vec<NewAppSystem>) -> NewAppSystem {
    NewAppSystem {
        name: name.to_string(),
        description: format!("{} menu", name),
        category: "hr".to_string(),
        href: format!("/{}", name.to_lowercase()),
        children,
        ..Default::default()
    }
}

fn move_under(parent: i32) -> AppSystemPatch {
    AppSystemPatch {
        parent_id: Some(parent),
        ..Default::default()
    }
}

#[tokio::test]
async fn failed_descendant_insert_rolls_back_whole_forest() -> Result<()> {
    let Some(db) = TestDb::connect().await? else { return Ok(()) };
    let service = db.service(8);

    // category is VARCHAR(50); the leaf insert fails after two rows went in
    let mut leaf = system("Leaf", vec![]);
    leaf.category = "x".repeat(80);
    let request = system("Root", vec![system("Child", vec![leaf])]);

    let err = service
        .create(&[request], None, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, TreeServiceError::Hierarchy(HierarchyError::Store(_))));
    assert_eq!(db.row_count().await?, 0);

    db.cleanup().await
}

#[tokio::test]
async fn select_all_reads_through_exactly_full_pages() -> Result<()> {
    let Some(db) = TestDb::connect().await? else { return Ok(()) };
    let roots: Vec<NewAppSystem> = ["A", "B", "C", "D"].iter().map(|n| system(n, vec![])).collect();
    db.service(8).create(&roots, None, &CancellationToken::new()).await?;

    let repository = Repository::<AppSystem>::new(db.pool.clone());
    for page_size in [1, 2, 3, 4, 5] {
        let rows = repository.select_all(page_size).await?;
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C", "D"], "page size {}", page_size);
    }

    db.cleanup().await
}

#[tokio::test]
async fn cascade_delete_takes_the_subtree() -> Result<()> {
    let Some(db) = TestDb::connect().await? else { return Ok(()) };
    let service = db.service(8);
    let created = service
        .create(
            &[system("Root", vec![system("Child", vec![system("Grandchild", vec![])])]), system("Other", vec![])],
            None,
            &CancellationToken::new(),
        )
        .await?;
    let root_id = created[0].record.id;

    assert_eq!(service.delete(root_id, true).await?, 3);

    let tree = service.tree(true).await?;
    let names: Vec<&str> = tree.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(names, vec!["Other"]);
    assert!(matches!(
        service.delete(root_id, true).await,
        Err(TreeServiceError::Database(_))
    ));

    db.cleanup().await
}

#[tokio::test]
async fn single_delete_leaves_descendants_as_orphans() -> Result<()> {
    let Some(db) = TestDb::connect().await? else { return Ok(()) };
    let service = db.service(8);
    let created = service
        .create(
            &[system("Root", vec![system("Child", vec![system("Grandchild", vec![])])])],
            None,
            &CancellationToken::new(),
        )
        .await?;
    let child_id = created[0].children[0].record.id;
    let grandchild_id = created[0].children[0].children[0].record.id;

    assert_eq!(service.delete(child_id, false).await?, 1);

    let forest = service.forest().await?;
    assert_eq!(forest.node_count(), 1);
    let orphan_ids: Vec<i32> = forest.orphans.iter().map(|n| n.id).collect();
    assert_eq!(orphan_ids, vec![grandchild_id]);

    db.cleanup().await
}

#[tokio::test]
async fn missing_parent_reference_is_bad_request() -> Result<()> {
    let Some(db) = TestDb::connect().await? else { return Ok(()) };

    let mut writer = TxWriter::<AppSystem>::begin(&db.pool).await?;
    let err = writer
        .insert(&system("Stray", vec![]), Some(999_999))
        .await
        .unwrap_err();
    drop(writer);

    assert!(err.is_foreign_key_violation());
    assert_eq!(ApiError::from(err).status_code(), 400);

    db.cleanup().await
}

#[tokio::test]
async fn creates_count_depth_from_the_table_roots() -> Result<()> {
    let Some(db) = TestDb::connect().await? else { return Ok(()) };
    let service = db.service(3);
    let cancel = CancellationToken::new();
    let created = service
        .create(&[system("A", vec![system("B", vec![system("C", vec![])])])], None, &cancel)
        .await?;
    let b_id = created[0].children[0].record.id;
    let c_id = created[0].children[0].children[0].record.id;

    let err = service
        .create(&[system("TooDeep", vec![])], Some(c_id), &cancel)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TreeServiceError::Hierarchy(HierarchyError::DepthExceeded { max: 3, .. })
    ));
    assert_eq!(db.row_count().await?, 3);

    service.create(&[system("Sibling", vec![])], Some(b_id), &cancel).await?;
    assert_eq!(db.row_count().await?, 4);

    db.cleanup().await
}

#[tokio::test]
async fn moves_reject_cycles_and_overdeep_subtrees() -> Result<()> {
    let Some(db) = TestDb::connect().await? else { return Ok(()) };
    let service = db.service(3);
    let created = service
        .create(
            &[
                system("A", vec![system("B", vec![system("C", vec![])])]),
                system("D", vec![]),
                system("E", vec![system("F", vec![])]),
            ],
            None,
            &CancellationToken::new(),
        )
        .await?;
    let a_id = created[0].record.id;
    let c_id = created[0].children[0].children[0].record.id;
    let d_id = created[1].record.id;
    let e_id = created[2].record.id;

    assert!(matches!(
        service.update(a_id, &move_under(c_id)).await,
        Err(TreeServiceError::Cycle(_))
    ));
    assert!(matches!(
        service.update(e_id, &move_under(c_id)).await,
        Err(TreeServiceError::Hierarchy(HierarchyError::DepthExceeded { .. }))
    ));

    let moved = service.update(e_id, &move_under(d_id)).await?;
    assert_eq!(moved.parent_id, Some(d_id));

    db.cleanup().await
}

#[tokio::test]
async fn concurrent_opposite_moves_cannot_both_succeed() -> Result<()> {
    let Some(db) = TestDb::connect().await? else { return Ok(()) };
    let service = db.service(8);
    let created = service
        .create(&[system("A", vec![]), system("B", vec![])], None, &CancellationToken::new())
        .await?;
    let a_id = created[0].record.id;
    let b_id = created[1].record.id;

    let other = db.service(8);
    let a_under_b = move_under(b_id);
    let b_under_a = move_under(a_id);
    let (first, second) = tokio::join!(
        service.update(a_id, &a_under_b),
        other.update(b_id, &b_under_a)
    );

    let succeeded = [first.is_ok(), second.is_ok()].iter().filter(|ok| **ok).count();
    assert_eq!(succeeded, 1);
    assert!(matches!(first, Ok(_) | Err(TreeServiceError::Cycle(_))));
    assert!(matches!(second, Ok(_) | Err(TreeServiceError::Cycle(_))));

    let forest = service.forest().await?;
    assert!(forest.orphans.is_empty());
    assert_eq!(forest.node_count(), 2);

    db.cleanup().await
}
