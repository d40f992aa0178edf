//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::Mem;

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    gms_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    assert!(info_str.contains("person"), "missing person table");
    assert!(info_str.contains("group_entry"), "missing group_entry table");
    assert!(info_str.contains("_migration"), "missing _migration table");
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    // Run twice — should not fail.
    gms_db::run_migrations(&db).await.unwrap();
    gms_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 1, "expected exactly one migration record");
}

#[tokio::test]
async fn group_entry_defaults_are_applied() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    gms_db::run_migrations(&db).await.unwrap();

    db.query(
        "CREATE group_entry SET \
         dn = 'cn=a,ou=groups,dc=gms', \
         cn = 'a', \
         owner = 'uid=alice,ou=people,dc=gms'",
    )
    .await
    .unwrap()
    .check()
    .unwrap();

    let mut result = db
        .query(
            "SELECT count() AS total FROM group_entry \
             WHERE array::len(aci) = 0 AND account_lock = NONE GROUP ALL",
        )
        .await
        .unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(records.len(), 1);
}

#[tokio::test]
async fn unique_index_prevents_duplicate_entry_keys() {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();

    gms_db::run_migrations(&db).await.unwrap();

    db.query(
        "CREATE group_entry SET dn = 'cn=a,ou=groups,dc=gms', \
         cn = 'a', owner = 'uid=alice,ou=people,dc=gms'",
    )
    .await
    .unwrap()
    .check()
    .unwrap();

    let result = db
        .query(
            "CREATE group_entry SET dn = 'cn=a,ou=groups,dc=gms', \
             cn = 'a', owner = 'uid=bob,ou=people,dc=gms'",
        )
        .await
        .unwrap()
        .check();

    let err = result.expect_err("duplicate entry key should be rejected");
    assert!(
        err.to_string().contains(gms_db::UNIQUE_VIOLATION),
        "unexpected unique-index message: {err}"
    );
}
