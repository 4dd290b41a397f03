//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    clinicore_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    for table in [
        "clinic",
        "staff",
        "patient",
        "visit",
        "attachment",
        "audit_event",
        "_migration",
    ] {
        assert!(info_str.contains(table), "missing {table} table");
    }
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    clinicore_db::run_migrations(&db).await.unwrap();
    clinicore_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 1, "expected exactly one migration record");
}

#[tokio::test]
async fn unknown_role_is_rejected_by_schema() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    clinicore_db::run_migrations(&db).await.unwrap();

    let result = db
        .query(
            "CREATE staff SET clinic_id = 'c', username = 'x', \
             password_hash = 'h', role = 'janitor'",
        )
        .await
        .unwrap()
        .check();
    assert!(result.is_err(), "role assertion should reject 'janitor'");
}

#[test]
fn schema_ddl_is_exposed() {
    let ddl = clinicore_db::schema_v1();
    assert!(ddl.contains("idx_patient_clinic_national_id"));
    assert!(ddl.contains("idx_staff_clinic_username"));
}
