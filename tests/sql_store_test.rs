//! SeaORM store against an in-memory SQLite database.

mod common;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use common::{unit_of_work, TestCategory, TestProduct, TEST_USER};
use specrepo::domain::{AuditQuery, AuditType};
use specrepo::errors::AppError;
use specrepo::infra::{Database, ReadRepository, SqlStore, Store, WriteRepository};
use specrepo::specification::Specification;

async fn sql_store() -> Arc<dyn Store> {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    tokio_test::assert_ok!(db.ping().await);
    Arc::new(SqlStore::new(db.get_connection()))
}

#[tokio::test]
async fn test_commit_persists_rows_and_audit_logs() {
    let store = sql_store().await;
    let uow = unit_of_work(&store);
    let tools = uow.repository::<TestCategory>().add(TestCategory::new("Tools")).await.unwrap();
    let hammer = uow
        .repository::<TestProduct>()
        .add(TestProduct::new("Hammer", 10, tools))
        .await
        .unwrap();
    assert_eq!(uow.save_changes(&CancellationToken::new()).await.unwrap(), 2);

    let row = store.find("TestProduct", hammer).await.unwrap().unwrap();
    assert_eq!(row.version, 1);
    assert_eq!(row.data["name"], "Hammer");

    let logs = store.audit_logs(AuditQuery::default()).await.unwrap();
    assert_eq!(logs.len(), 2);
    assert!(logs.iter().all(|l| l.audit_type == AuditType::Create && l.user_id == TEST_USER));

    let limited = store
        .audit_logs(AuditQuery {
            table_name: Some("TestCategory".into()),
            limit: Some(5),
        })
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);
    assert!(limited[0].primary_key.contains(&tools.to_string()));
}

#[tokio::test]
async fn test_conflict_rolls_back_transaction() {
    let store = sql_store().await;
    let setup = unit_of_work(&store);
    let hammer = setup
        .repository::<TestProduct>()
        .add(TestProduct::new("Hammer", 10, uuid::Uuid::now_v7()))
        .await
        .unwrap();
    setup.save_changes(&CancellationToken::new()).await.unwrap();

    let stale = unit_of_work(&store);
    let mut product = stale.repository::<TestProduct>().get_by_id(hammer).await.unwrap().unwrap();

    let winner = unit_of_work(&store);
    let mut fresh = winner.repository::<TestProduct>().get_by_id(hammer).await.unwrap().unwrap();
    fresh.price = 11;
    winner.repository::<TestProduct>().update(fresh).await.unwrap();
    winner.save_changes(&CancellationToken::new()).await.unwrap();

    let garden = stale.repository::<TestCategory>().add(TestCategory::new("Garden")).await.unwrap();
    product.price = 99;
    stale.repository::<TestProduct>().update(product).await.unwrap();

    let err = stale.save_changes(&CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, AppError::ConcurrencyConflict { .. }));
    assert!(store.find("TestCategory", garden).await.unwrap().is_none());
    assert_eq!(store.find("TestProduct", hammer).await.unwrap().unwrap().version, 2);
    assert_eq!(store.audit_logs(AuditQuery::default()).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_specification_reads_over_sql_rows() {
    let store = sql_store().await;
    let uow = unit_of_work(&store);
    let tools = uow.repository::<TestCategory>().add(TestCategory::new("Tools")).await.unwrap();
    for (name, price) in [("Saw", 20), ("Hammer", 10), ("Drill", 30)] {
        uow.repository::<TestProduct>()
            .add(TestProduct::new(name, price, tools))
            .await
            .unwrap();
    }
    uow.save_changes(&CancellationToken::new()).await.unwrap();

    let spec = Specification::<TestProduct>::new()
        .include(TestProduct::category())
        .order_by_descending(|p| p.price)
        .page(0, 2);
    let names: Vec<String> = uow
        .repository::<TestProduct>()
        .list_with_spec(&spec)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["Drill", "Saw"]);
}

#[tokio::test]
async fn test_purge_deletes_row() {
    let store = sql_store().await;
    let uow = unit_of_work(&store);
    let categories = uow.repository::<TestCategory>();
    let tools = categories.add(TestCategory::new("Tools")).await.unwrap();
    uow.save_changes(&CancellationToken::new()).await.unwrap();

    let category = categories.get_by_id(tools).await.unwrap().unwrap();
    categories.purge(category).await.unwrap();
    uow.save_changes(&CancellationToken::new()).await.unwrap();

    assert!(store.find("TestCategory", tools).await.unwrap().is_none());
    let logs = store.audit_logs(AuditQuery::for_table("TestCategory")).await.unwrap();
    assert!(logs.iter().any(|l| l.audit_type == AuditType::Delete));
}
