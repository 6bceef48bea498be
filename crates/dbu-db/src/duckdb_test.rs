use super::*;

fn db_with_table() -> DuckDbBackend {
    let db = DuckDbBackend::in_memory().unwrap();
    db.execute("CREATE TABLE accounts (id INTEGER, name VARCHAR)")
        .unwrap();
    db.execute("INSERT INTO accounts VALUES (1, 'alice'), (2, 'bob')")
        .unwrap();
    db.commit().unwrap();
    db
}

fn scalar(db: &DuckDbBackend, sql: &str) -> Option<String> {
    db.query_strings(sql, &[]).unwrap()[0][0].clone()
}

#[test]
fn test_in_memory() {
    let db = DuckDbBackend::in_memory().unwrap();
    assert_eq!(db.vendor(), "duckdb");
    assert!(!db.vendor_version().is_empty());
}

#[test]
fn test_matches_vendor_case_insensitively() {
    let db = DuckDbBackend::in_memory().unwrap();
    assert!(db.matches(None, None));
    assert!(db.matches(Some("DuckDB"), None));
    assert!(!db.matches(Some("postgresql"), None));
    let version = db.vendor_version().to_uppercase();
    assert!(db.matches(Some("duckdb"), Some(&version)));
    assert!(!db.matches(Some("duckdb"), Some("v0.0.0")));
}

#[test]
fn test_query_strings_with_params_and_nulls() {
    let db = db_with_table();
    db.execute("INSERT INTO accounts VALUES (3, NULL)").unwrap();
    let rows = db
        .query_strings(
            "SELECT id, name FROM accounts WHERE name = ? OR name IS NULL ORDER BY id",
            &["bob"],
        )
        .unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Some("2".to_string()), Some("bob".to_string())],
            vec![Some("3".to_string()), None],
        ]
    );
}

#[test]
fn test_table_and_column_exists() {
    let db = db_with_table();
    assert!(db.table_exists("accounts").unwrap());
    assert!(db.table_exists("ACCOUNTS").unwrap());
    assert!(db.table_exists("main.accounts").unwrap());
    assert!(!db.table_exists("nonexistent").unwrap());
    assert!(db.column_exists("accounts", "NAME").unwrap());
    assert!(!db.column_exists("accounts", "email").unwrap());
}

#[test]
fn test_rollback_discards_work() {
    let db = db_with_table();
    db.execute("DELETE FROM accounts").unwrap();
    db.rollback().unwrap();
    assert_eq!(
        scalar(&db, "SELECT COUNT(*) FROM accounts"),
        Some("2".to_string())
    );
}

#[test]
fn test_commit_is_visible_to_independent_connection() {
    let db = db_with_table();
    let probe = db.open_independent().unwrap();

    db.execute("CREATE TABLE pending (id INTEGER)").unwrap();
    assert!(db.table_exists("pending").unwrap());
    assert!(!probe.table_exists("pending").unwrap());

    db.commit().unwrap();
    probe.rollback().unwrap();
    assert!(probe.table_exists("pending").unwrap());
    probe.close().unwrap();
}

#[test]
fn test_rollback_recovers_aborted_transaction() {
    let db = DuckDbBackend::in_memory().unwrap();
    db.execute("CREATE TABLE tags (id INTEGER PRIMARY KEY, label VARCHAR)")
        .unwrap();
    db.insert("tags", "VALUES (1, 'red')").unwrap();
    db.commit().unwrap();

    let err = db.insert("tags", "VALUES (1, 'dup')").unwrap_err();
    assert!(err.is_constraint_violation(), "unexpected error: {err}");
    db.rollback().unwrap();
    db.insert("tags", "VALUES (3, 'blue')").unwrap();
    db.commit().unwrap();
    assert_eq!(
        scalar(&db, "SELECT label FROM tags WHERE id = 3"),
        Some("blue".to_string())
    );
}

#[test]
fn test_failed_transaction_end_discards_work_and_restarts() {
    let db = DuckDbBackend::in_memory().unwrap();
    db.execute("CREATE TABLE pending (id INTEGER)").unwrap();

    let err = db.end_transaction("NOT A TRANSACTION COMMAND").unwrap_err();
    assert!(matches!(err, DbError::TransactionError(_)), "got {err:?}");
    assert!(!db.table_exists("pending").unwrap());

    db.execute("CREATE TABLE after_failure (id INTEGER)").unwrap();
    db.commit().unwrap();
    assert!(db.table_exists("after_failure").unwrap());
}

#[test]
fn test_add_and_delete_column() {
    let db = db_with_table();
    db.add_column("accounts", "email", "VARCHAR", Some("120"))
        .unwrap();
    assert!(db.column_exists("accounts", "email").unwrap());
    db.delete_column("accounts", "email").unwrap();
    assert!(!db.column_exists("accounts", "email").unwrap());
}

#[test]
fn test_alter_column_type_default_and_nullability() {
    let db = db_with_table();
    db.add_column("accounts", "score", "INTEGER", None).unwrap();
    db.commit().unwrap();

    let change = ColumnChange {
        sql_type: Some("BIGINT".to_string()),
        default_value: Some("0".to_string()),
        nullable: Some(true),
        ..Default::default()
    };
    db.alter_column("accounts", "score", &change).unwrap();
    db.commit().unwrap();

    db.execute("INSERT INTO accounts (id, name) VALUES (9, 'dflt')")
        .unwrap();
    assert_eq!(
        scalar(&db, "SELECT score FROM accounts WHERE id = 9"),
        Some("0".to_string())
    );
    assert_eq!(
        scalar(
            &db,
            "SELECT data_type FROM information_schema.columns \
             WHERE table_name = 'accounts' AND column_name = 'score'"
        ),
        Some("BIGINT".to_string())
    );
}

#[test]
fn test_update_column_binds_typed_value() {
    let db = db_with_table();
    db.add_column("accounts", "active", "BOOLEAN", None).unwrap();
    db.commit().unwrap();
    let updated = db
        .update_column("accounts", "active", Some("id = 1"), &SqlValue::Bool(true))
        .unwrap();
    assert_eq!(updated, 1);
    assert_eq!(
        scalar(&db, "SELECT COUNT(*) FROM accounts WHERE active"),
        Some("1".to_string())
    );
    let all = db
        .update_column("accounts", "name", None, &SqlValue::Null)
        .unwrap();
    assert_eq!(all, 2);
}

#[test]
fn test_create_sequence_and_drop_table() {
    let db = db_with_table();
    db.create_sequence("accounts_id_seq", 10, 5).unwrap();
    assert_eq!(
        scalar(&db, "SELECT nextval('accounts_id_seq')"),
        Some("10".to_string())
    );
    assert_eq!(
        scalar(&db, "SELECT nextval('accounts_id_seq')"),
        Some("15".to_string())
    );

    db.drop_table("accounts").unwrap();
    assert!(!db.table_exists("accounts").unwrap());
}

#[test]
fn test_no_foreign_key_query_for_duckdb() {
    let db = DuckDbBackend::in_memory().unwrap();
    assert!(db.foreign_key_query("accounts", "id").is_none());
}

#[test]
fn test_execute_reports_missing_table() {
    let db = DuckDbBackend::in_memory().unwrap();
    let err = db.execute("DELETE FROM missing_table").unwrap_err();
    assert!(matches!(err, DbError::TableNotFound(_)), "got {err:?}");
}

#[test]
fn test_from_path_persists_committed_work() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("upgrade.duckdb");
    {
        let db = DuckDbBackend::from_path(&path).unwrap();
        db.execute("CREATE TABLE kept (id INTEGER)").unwrap();
        db.commit().unwrap();
        db.execute("CREATE TABLE dropped (id INTEGER)").unwrap();
        db.close().unwrap();
    }
    let db = DuckDbBackend::new(path.to_str().unwrap()).unwrap();
    assert!(db.table_exists("kept").unwrap());
    assert!(!db.table_exists("dropped").unwrap());
}

#[test]
fn test_from_config_requires_path() {
    let config = DatabaseConfig::default();
    assert!(matches!(
        DuckDbBackend::from_config(&config),
        Err(DbError::ConnectionError(_))
    ));
}
