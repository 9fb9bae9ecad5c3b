//! Integration tests for schema migrations and database-level constraints

use std::sync::{Arc, Barrier};
use std::thread;

use rusqlite::params;
use supportal_store::config::DatabaseConfig;
use supportal_store::db::Database;
use supportal_store::migrations::{self, table_exists, Migrator, AUTH_USERS, SUPPORTAL_INITIAL};
use supportal_store::schema::SUPPORTAL_TABLES;
use supportal_store::StoreError;

fn unmigrated() -> Database {
    Database::connect(&DatabaseConfig::with_url(":memory:")).expect("Failed to open database")
}

#[test]
fn test_fresh_database_has_nothing_applied() {
    let db = unmigrated();
    let status = db.migration_status().expect("Failed to get status");
    assert_eq!(status.len(), migrations::ALL_MIGRATIONS.len());
    assert!(status.iter().all(|s| !s.is_applied()));
}

#[test]
fn test_migrate_applies_in_dependency_order() {
    let db = unmigrated();
    let applied = db.migrate().expect("Failed to migrate");
    let labels: Vec<_> = applied.iter().map(|m| m.label()).collect();
    assert_eq!(labels, ["auth.0001_users", "supportal.0001_initial"]);

    let conn = db.get_connection().expect("Failed to get connection");
    for table in SUPPORTAL_TABLES {
        assert!(table_exists(&conn, table).expect("Failed to check table"));
    }
}

#[test]
fn test_migrate_is_idempotent() {
    let db = Database::in_memory().expect("Failed to create database");
    assert!(db.migrate().expect("Failed to migrate").is_empty());
}

#[test]
fn test_concurrent_migrate_on_disk() {
    for _ in 0..10 {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");
        let db_url = format!("sqlite://{}", dir.path().join("shared.db").display());
        let barrier = Arc::new(Barrier::new(2));

        let handles: Vec<_> = (0..2)
            .map(|_| {
                let db_url = db_url.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let db = Database::connect(&DatabaseConfig::with_url(&db_url))
                        .expect("Failed to open database");
                    barrier.wait();
                    db.migrate().map(|applied| applied.len())
                })
            })
            .collect();

        // Each migration commits on its own, so the two callers may split the work
        let applied: usize = handles
            .into_iter()
            .map(|handle| {
                handle
                    .join()
                    .expect("Migration thread panicked")
                    .expect("Concurrent migrate failed")
            })
            .sum();
        assert_eq!(applied, migrations::ALL_MIGRATIONS.len());

        let db = Database::connect(&DatabaseConfig::with_url(&db_url))
            .expect("Failed to open database");
        let status = db.migration_status().expect("Failed to get status");
        assert!(status.iter().all(|s| s.is_applied()));
    }
}

#[test]
fn test_apply_without_dependency_fails() {
    let db = unmigrated();
    let err = db.apply_migration(&SUPPORTAL_INITIAL).unwrap_err();
    assert!(matches!(err, StoreError::MissingDependency(_)));

    let conn = db.get_connection().expect("Failed to get connection");
    assert!(!table_exists(&conn, "businesses").expect("Failed to check table"));
}

#[test]
fn test_apply_over_existing_table_changes_nothing() {
    let db = unmigrated();
    db.apply_migration(&AUTH_USERS).expect("Failed to apply auth");
    {
        let conn = db.get_connection().expect("Failed to get connection");
        conn.execute_batch("CREATE TABLE chat_sessions (id INTEGER PRIMARY KEY);")
            .expect("Failed to create table");
    }

    let err = db.apply_migration(&SUPPORTAL_INITIAL).unwrap_err();
    assert!(matches!(err, StoreError::TableExists(ref t) if t == "chat_sessions"));

    let conn = db.get_connection().expect("Failed to get connection");
    assert!(!table_exists(&conn, "businesses").expect("Failed to check table"));
    drop(conn);
    let status = db.migration_status().expect("Failed to get status");
    assert!(status[0].is_applied());
    assert!(!status[1].is_applied());
}

#[test]
fn test_rollback_reverts_latest_first() {
    let db = Database::in_memory().expect("Failed to create database");

    let reverted = db.rollback().expect("Failed to roll back");
    assert_eq!(reverted, Some(&SUPPORTAL_INITIAL));
    {
        let conn = db.get_connection().expect("Failed to get connection");
        for table in SUPPORTAL_TABLES {
            assert!(!table_exists(&conn, table).expect("Failed to check table"));
        }
        assert!(table_exists(&conn, "users").expect("Failed to check table"));
    }

    assert_eq!(db.rollback().expect("Failed to roll back"), Some(&AUTH_USERS));
    assert_eq!(db.rollback().expect("Failed to roll back"), None);

    // And forward again
    assert_eq!(db.migrate().expect("Failed to migrate").len(), 2);
}

#[test]
fn test_unapply_blocked_by_dependent() {
    let db = Database::in_memory().expect("Failed to create database");

    let err = db
        .migrator(|migrator| migrator.unapply(&AUTH_USERS))
        .unwrap_err();
    assert!(matches!(err, StoreError::Migration(_)));

    let still_applied = db
        .migrator(|migrator| migrator.is_applied(&AUTH_USERS))
        .expect("Failed to check");
    assert!(still_applied);
}

#[test]
fn test_sql_shows_up_migration() {
    assert!(Migrator::sql(&SUPPORTAL_INITIAL).contains("CREATE TABLE chat_messages"));
}

#[test]
fn test_foreign_keys_enforced_on_every_connection() {
    let db = Database::in_memory().expect("Failed to create database");
    let conn = db.get_connection().expect("Failed to get connection");
    let enabled: i64 = conn
        .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
        .expect("Failed to read pragma");
    assert_eq!(enabled, 1);
}

#[test]
fn test_database_rejects_invalid_message_type() {
    let db = Database::in_memory().expect("Failed to create database");
    let conn = db.get_connection().expect("Failed to get connection");
    conn.execute_batch(
        "INSERT INTO users (username, date_joined) VALUES ('u1', '2025-01-01 00:00:00+00:00');
         INSERT INTO businesses (name, created_at, updated_at, owner_id)
             VALUES ('Acme', '2025-01-01', '2025-01-01', 1);
         INSERT INTO chat_sessions (session_id, created_at, updated_at, business_id)
             VALUES ('S1', '2025-01-01', '2025-01-01', 1);",
    )
    .expect("Failed to seed rows");

    let err = conn
        .execute(
            "INSERT INTO chat_messages (message_type, content, created_at, session_id)
             VALUES (?1, 'hi', '2025-01-01', 1)",
            params!["bot"],
        )
        .map_err(StoreError::from_sqlite)
        .unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
}

#[test]
fn test_database_rejects_bad_document_file() {
    let db = Database::in_memory().expect("Failed to create database");
    let conn = db.get_connection().expect("Failed to get connection");
    conn.execute_batch(
        "INSERT INTO users (username, date_joined) VALUES ('u1', '2025-01-01 00:00:00+00:00');
         INSERT INTO businesses (name, created_at, updated_at, owner_id)
             VALUES ('Acme', '2025-01-01', '2025-01-01', 1);",
    )
    .expect("Failed to seed rows");

    for file in ["documents/run.exe", "uploads/manual.pdf"] {
        let result = conn.execute(
            "INSERT INTO documents (title, file, created_at, updated_at, business_id)
             VALUES ('t', ?1, '2025-01-01', '2025-01-01', 1)",
            params![file],
        );
        assert!(result.is_err(), "{file} accepted");
    }

    let accepted = conn.execute(
        "INSERT INTO documents (title, file, created_at, updated_at, business_id)
         VALUES ('t', 'documents/Manual.DOCX', '2025-01-01', '2025-01-01', 1)",
        [],
    );
    assert!(accepted.is_ok());
}

#[test]
fn test_sql_is_available_for_every_migration() {
    for migration in &migrations::ALL_MIGRATIONS {
        assert!(migration.up_sql.contains("CREATE TABLE"));
        assert!(migration.down_sql.contains("DROP TABLE"));
        assert_eq!(
            migrations::find(migration.app, migration.name),
            Some(migration)
        );
    }
}
