//! End-to-end upgrade runs against on-disk DuckDB databases.
//!
//! Each test writes a plan file next to a fresh database, runs it through
//! `UpgradePlan::load` + `Upgrader::run`, then reopens the database to
//! check what was made durable.

use dbu_core::{SchemaVersion, TypeMap};
use dbu_db::{Database, DbResult, DuckDbBackend};
use dbu_upgrade::{
    DatabaseUpgradeTask, ExternalTaskRegistry, UpgradeError, UpgradePlan, UpgradeReport,
    UpgradeResult, Upgrader,
};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

// ── Helpers ────────────────────────────────────────────────────────────

struct Fixture {
    dir: TempDir,
    db_path: PathBuf,
}

impl Fixture {
    /// A database at `version` with a small `rhq_alert` table.
    fn new(version: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("rhq.duckdb");
        let db = DuckDbBackend::from_path(&db_path).unwrap();
        db.execute(
            "CREATE TABLE rhq_system_config (property_key VARCHAR, property_value VARCHAR)",
        )
        .unwrap();
        db.execute_with_params(
            "INSERT INTO rhq_system_config VALUES ('DB_SCHEMA_VERSION', ?)",
            &[version],
        )
        .unwrap();
        db.execute("CREATE TABLE rhq_alert (id INTEGER, name VARCHAR)")
            .unwrap();
        db.execute("INSERT INTO rhq_alert VALUES (1, 'cpu'), (2, 'disk')")
            .unwrap();
        db.commit().unwrap();
        db.close().unwrap();
        Self { dir, db_path }
    }

    fn write_plan(&self, target: &str, steps: &str) -> PathBuf {
        let path = self.dir.path().join("dbupgrade.yml");
        let yaml = format!(
            "database:\n  path: \"{}\"\ntarget_schema_version: \"{target}\"\nsteps:\n{steps}",
            self.db_path.display()
        );
        fs::write(&path, yaml).unwrap();
        path
    }

    fn run(&self, target: &str, steps: &str) -> UpgradeResult<UpgradeReport> {
        let plan = UpgradePlan::load(&self.write_plan(target, steps))?;
        Upgrader::new(plan).run()
    }

    fn open(&self) -> DuckDbBackend {
        DuckDbBackend::from_path(&self.db_path).unwrap()
    }

    fn stored_version(&self) -> String {
        self.scalar("SELECT property_value FROM rhq_system_config")
            .unwrap()
    }

    fn scalar(&self, sql: &str) -> Option<String> {
        let db = self.open();
        let value = db.query_strings(sql, &[]).unwrap()[0][0].clone();
        db.close().unwrap();
        value
    }

    fn has_table(&self, table: &str) -> bool {
        let db = self.open();
        let exists = db.table_exists(table).unwrap();
        db.close().unwrap();
        exists
    }

    fn has_column(&self, table: &str, column: &str) -> bool {
        let db = self.open();
        let exists = db.column_exists(table, column).unwrap();
        db.close().unwrap();
        exists
    }
}

fn v(text: &str) -> SchemaVersion {
    SchemaVersion::parse(text).unwrap()
}

const THREE_STEPS: &str = r#"
  - version: "1.1"
    tasks:
      - { kind: add_column, table: rhq_alert, column: ack_time, column_type: LONG }
  - version: "1.2"
    tasks:
      - kind: direct_sql
        statements:
          - sql: CREATE TABLE rhq_alert_note (alert_id INTEGER, note VARCHAR)
  - version: "2.0"
    tasks:
      - { kind: create_sequence, name: rhq_alert_note_seq, initial: 100 }
"#;

// ── Full runs ──────────────────────────────────────────────────────────

#[test]
fn test_upgrade_to_latest_applies_every_step() {
    let fx = Fixture::new("1.0");
    let report = fx.run("LATEST", THREE_STEPS).unwrap();

    assert_eq!(report.from_version, v("1.0"));
    assert_eq!(report.to_version, v("2.0"));
    assert_eq!(report.applied, vec![v("1.1"), v("1.2"), v("2.0")]);
    assert!(report.skipped.is_empty());

    assert_eq!(fx.stored_version(), "2.0");
    assert!(fx.has_column("rhq_alert", "ack_time"));
    assert!(fx.has_table("rhq_alert_note"));
    assert_eq!(
        fx.scalar("SELECT nextval('rhq_alert_note_seq')"),
        Some("100".to_string())
    );
}

#[test]
fn test_upgrade_to_intermediate_version_stops_there() {
    let fx = Fixture::new("1.0");
    let report = fx.run("1.1", THREE_STEPS).unwrap();
    assert_eq!(report.applied, vec![v("1.1")]);
    assert_eq!(report.skipped, vec![v("1.2"), v("2.0")]);
    assert_eq!(fx.stored_version(), "1.1");
    assert!(!fx.has_table("rhq_alert_note"));

    let report = fx.run("LATEST", THREE_STEPS).unwrap();
    assert_eq!(report.applied, vec![v("1.2"), v("2.0")]);
    assert_eq!(fx.stored_version(), "2.0");
}

#[test]
fn test_equal_target_is_a_noop() {
    let fx = Fixture::new("2.0");
    let report = fx.run("2.0", THREE_STEPS).unwrap();
    assert!(report.applied.is_empty());
    assert_eq!(report.skipped.len(), 3);
    assert_eq!(fx.stored_version(), "2.0");
    assert!(!fx.has_column("rhq_alert", "ack_time"));
}

#[test]
fn test_downgrade_fails_without_changes() {
    let fx = Fixture::new("2.0");
    let err = fx.run("1.1", THREE_STEPS).unwrap_err();
    assert!(matches!(err, UpgradeError::Downgrade { .. }), "got {err:?}");
    assert_eq!(fx.stored_version(), "2.0");
}

// ── Validation before connecting ───────────────────────────────────────

fn unreachable_plan(steps: &str) -> UpgradePlan {
    let yaml = format!(
        "database:\n  path: /nonexistent/dir/rhq.duckdb\ntarget_schema_version: LATEST\nsteps:\n{steps}"
    );
    UpgradePlan::from_yaml_str(&yaml).unwrap()
}

#[test]
fn test_duplicate_versions_fail_before_connecting() {
    let plan = unreachable_plan(
        r#"
  - { version: "1.1", tasks: [] }
  - { version: "1.1.0", tasks: [] }
"#,
    );
    let err = Upgrader::new(plan).run().unwrap_err();
    assert!(matches!(err, UpgradeError::Config { .. }), "got {err:?}");
}

#[test]
fn test_out_of_order_versions_fail_before_connecting() {
    let plan = unreachable_plan(
        r#"
  - { version: "2.0", tasks: [] }
  - { version: "1.5", tasks: [] }
"#,
    );
    let err = Upgrader::new(plan).run().unwrap_err();
    assert!(matches!(err, UpgradeError::Config { .. }), "got {err:?}");
}

#[test]
fn test_unreachable_database_fails_after_validation() {
    let plan = unreachable_plan("  - { version: \"1.1\", tasks: [] }\n");
    let err = Upgrader::new(plan).run().unwrap_err();
    assert!(matches!(err, UpgradeError::Db(_)), "got {err:?}");
}

// ── Crash recovery ─────────────────────────────────────────────────────

const BROKEN_SECOND_STEP: &str = r#"
  - version: "1.1"
    tasks:
      - { kind: add_column, table: rhq_alert, column: ack_time, column_type: LONG }
  - version: "1.2"
    tasks:
      - kind: direct_sql
        statements:
          - sql: CREATE TABLE rhq_alert_note (alert_id INTEGER)
      - { kind: alter_column, table: rhq_alert, column: no_such_column, nullable: true }
"#;

const FIXED_SECOND_STEP: &str = r#"
  - version: "1.1"
    tasks:
      - { kind: add_column, table: rhq_alert, column: ack_time, column_type: LONG }
  - version: "1.2"
    tasks:
      - kind: direct_sql
        statements:
          - sql: CREATE TABLE rhq_alert_note (alert_id INTEGER)
      - { kind: alter_column, table: rhq_alert, column: ack_time, nullable: true }
"#;

#[test]
fn test_failed_step_heals_then_fails_then_succeeds() {
    let fx = Fixture::new("1.0");

    // First run dies inside 1.2: 1.1 stays committed, the marker stays behind.
    let err = fx.run("LATEST", BROKEN_SECOND_STEP).unwrap_err();
    let UpgradeError::StepExecution { version, task, .. } = &err else {
        panic!("expected step failure, got {err:?}");
    };
    assert_eq!(version, "1.2");
    assert_eq!(task, "alter_column");
    assert_eq!(
        fx.stored_version(),
        "1.1 *** UPGRADE IN PROGRESS: migrating to version 1.2"
    );
    assert!(fx.has_column("rhq_alert", "ack_time"));
    assert!(!fx.has_table("rhq_alert_note"));

    // Second run restores the version row and refuses to continue.
    let err = fx.run("LATEST", BROKEN_SECOND_STEP).unwrap_err();
    let UpgradeError::InconsistentState { restored, .. } = &err else {
        panic!("expected inconsistent state, got {err:?}");
    };
    assert_eq!(restored, "1.1");
    assert_eq!(fx.stored_version(), "1.1");

    // With the step fixed, the third run resumes from 1.1.
    let report = fx.run("LATEST", FIXED_SECOND_STEP).unwrap();
    assert_eq!(report.from_version, v("1.1"));
    assert_eq!(report.applied, vec![v("1.2")]);
    assert_eq!(fx.stored_version(), "1.2");
    assert!(fx.has_table("rhq_alert_note"));
}

// ── Task behavior inside full runs ─────────────────────────────────────

#[test]
fn test_ignorable_failure_does_not_stop_the_step() {
    let fx = Fixture::new("1.0");
    let steps = r#"
  - version: "1.1"
    tasks:
      - { kind: drop_foreign_keys, table: rhq_alert, column: id, ignore_error: true }
      - { kind: insert, table: rhq_alert, values: "VALUES (3, 'memory')" }
      - kind: direct_sql
        ignore_error: true
        statements:
          - sql: INSERT INTO rhq_alert VALUES (4, 'rolled back')
          - sql: INSERT INTO rhq_missing VALUES (1)
"#;
    let report = fx.run("LATEST", steps).unwrap();
    assert_eq!(report.applied, vec![v("1.1")]);
    assert_eq!(fx.stored_version(), "1.1");
    assert_eq!(
        fx.scalar("SELECT string_agg(name, ',' ORDER BY id) FROM rhq_alert"),
        Some("cpu,disk,memory".to_string())
    );
}

#[test]
fn test_delete_column_is_idempotent() {
    let fx = Fixture::new("1.0");
    let steps = r#"
  - version: "1.1"
    tasks:
      - { kind: delete_column, table: rhq_alert, column: name }
  - version: "1.2"
    tasks:
      - { kind: delete_column, table: rhq_alert, column: name }
"#;
    fx.run("LATEST", steps).unwrap();
    assert!(!fx.has_column("rhq_alert", "name"));
    assert_eq!(fx.stored_version(), "1.2");
}

#[test]
fn test_vendor_targeted_tasks_only_run_on_their_vendor() {
    let fx = Fixture::new("1.0");
    let steps = r#"
  - version: "1.1"
    tasks:
      - { kind: drop_table, table: rhq_alert, target_vendor: oracle }
      - kind: column_modify
        target_vendor: postgresql
        table: rhq_alert
        column: name
        modify: TYPE TEXT
      - kind: direct_sql
        statements:
          - sql: DROP TABLE rhq_alert
            target_vendor: postgresql
          - sql: UPDATE rhq_alert SET name = upper(name)
            target_vendor: duckdb
"#;
    fx.run("LATEST", steps).unwrap();
    assert!(fx.has_table("rhq_alert"));
    assert_eq!(
        fx.scalar("SELECT name FROM rhq_alert WHERE id = 1"),
        Some("CPU".to_string())
    );
}

#[test]
fn test_data_tasks_with_type_mapping() {
    let fx = Fixture::new("1.0");
    let steps = r#"
  - version: "1.1"
    tasks:
      - { kind: add_column, table: rhq_alert, column: enabled, column_type: BOOLEAN }
      - { kind: add_column, table: rhq_alert, column: priority, column_type: INTEGER }
  - version: "1.2"
    tasks:
      - { kind: alter_column, table: rhq_alert, column: priority, default: 1 }
  - version: "1.3"
    tasks:
      - { kind: update, table: rhq_alert, column: enabled, value: "true", column_type: BOOLEAN }
      - { kind: update, table: rhq_alert, column: priority, value: 5, where: "id = 2", column_type: INTEGER }
      - { kind: insert, table: rhq_alert, values: "(id, name, enabled) VALUES (3, 'net', false)" }
"#;
    fx.run("LATEST", steps).unwrap();
    assert_eq!(
        fx.scalar("SELECT COUNT(*) FROM rhq_alert WHERE enabled"),
        Some("2".to_string())
    );
    assert_eq!(
        fx.scalar("SELECT priority FROM rhq_alert WHERE id = 2"),
        Some("5".to_string())
    );
    assert_eq!(
        fx.scalar("SELECT priority FROM rhq_alert WHERE id = 3"),
        Some("1".to_string())
    );
}

#[test]
fn test_type_map_override_file() {
    let fx = Fixture::new("1.0");
    fs::write(
        fx.dir.path().join("types.yml"),
        r#"
types:
  - generic: MONEY
    kind: decimal
    default: DECIMAL(12,2)
"#,
    )
    .unwrap();
    let plan_path = fx.write_plan(
        "LATEST",
        "  - version: \"1.1\"\n    tasks:\n      - { kind: add_column, table: rhq_alert, column: cost, column_type: MONEY }\n",
    );
    let mut yaml = fs::read_to_string(&plan_path).unwrap();
    yaml.push_str("type_map_file: types.yml\n");
    fs::write(&plan_path, yaml).unwrap();

    let plan = UpgradePlan::load(&plan_path).unwrap();
    Upgrader::new(plan).run().unwrap();
    assert_eq!(
        fx.scalar(
            "SELECT data_type FROM information_schema.columns \
             WHERE table_name = 'rhq_alert' AND column_name = 'cost'"
        ),
        Some("DECIMAL(12,2)".to_string())
    );
}

struct CopyAlertNames;

impl DatabaseUpgradeTask for CopyAlertNames {
    fn execute(&mut self, type_map: &TypeMap, db: &dyn Database) -> DbResult<()> {
        let text = type_map
            .sql_type("STRING", db.vendor())
            .map_err(|e| dbu_db::DbError::Custom(e.to_string()))?;
        db.execute(&format!(
            "CREATE TABLE rhq_alert_names AS SELECT CAST(name AS {text}) AS name FROM rhq_alert"
        ))?;
        Ok(())
    }
}

#[test]
fn test_external_task_from_registry() {
    let fx = Fixture::new("1.0");
    let plan = UpgradePlan::load(&fx.write_plan(
        "LATEST",
        "  - version: \"1.1\"\n    tasks:\n      - { kind: external, class: CopyAlertNames }\n",
    ))
    .unwrap();

    let mut registry = ExternalTaskRegistry::new();
    registry.register("CopyAlertNames", || Box::new(CopyAlertNames));
    Upgrader::new(plan).with_registry(registry).run().unwrap();

    assert_eq!(
        fx.scalar("SELECT COUNT(*) FROM rhq_alert_names"),
        Some("2".to_string())
    );
}
