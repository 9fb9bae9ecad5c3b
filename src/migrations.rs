//! Versioned schema migrations
//!
//! Each [`Migration`] carries its up/down SQL and declares the migrations and
//! tables it depends on. [`Migrator`] applies them one at a time inside a
//! transaction and records every applied migration in the
//! `schema_migrations` ledger, so a failed apply leaves the store untouched.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::logging::OperationTimer;
use crate::metrics::MetricsCollector;
use crate::schema::{schema_migrations, users, SUPPORTAL_TABLES};

/// A single schema change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    /// Owning app label
    pub app: &'static str,
    /// Migration name, unique within the app
    pub name: &'static str,
    /// SQL that applies the migration
    pub up_sql: &'static str,
    /// SQL that reverts the migration
    pub down_sql: &'static str,
    /// Tables the up SQL creates; none may exist beforehand
    pub creates_tables: &'static [&'static str],
    /// Tables that must already exist (foreign key targets)
    pub requires_tables: &'static [&'static str],
    /// `(app, name)` pairs that must be applied first
    pub dependencies: &'static [(&'static str, &'static str)],
}

impl Migration {
    /// `app.name` label used in logs and the CLI
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}.{}", self.app, self.name)
    }
}

/// Owner accounts referenced by `businesses.owner_id`
pub const AUTH_USERS: Migration = Migration {
    app: "auth",
    name: "0001_users",
    up_sql: include_str!("../migrations/2025-01-01-000000_auth_users/up.sql"),
    down_sql: include_str!("../migrations/2025-01-01-000000_auth_users/down.sql"),
    creates_tables: &[users::TABLE],
    requires_tables: &[],
    dependencies: &[],
};

/// Businesses, documents, vector chunks, chat sessions and chat messages
pub const SUPPORTAL_INITIAL: Migration = Migration {
    app: "supportal",
    name: "0001_initial",
    up_sql: include_str!("../migrations/2025-01-01-000001_supportal_initial/up.sql"),
    down_sql: include_str!("../migrations/2025-01-01-000001_supportal_initial/down.sql"),
    creates_tables: &SUPPORTAL_TABLES,
    requires_tables: &[users::TABLE],
    dependencies: &[("auth", "0001_users")],
};

/// Every known migration in application order
pub static ALL_MIGRATIONS: [Migration; 2] = [AUTH_USERS, SUPPORTAL_INITIAL];

/// Look up a registered migration by app label and name
#[must_use]
pub fn find(app: &str, name: &str) -> Option<&'static Migration> {
    ALL_MIGRATIONS
        .iter()
        .find(|m| m.app == app && m.name == name)
}

/// Applied state of one registered migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationStatus {
    /// The migration
    pub migration: &'static Migration,
    /// When it was applied, if it has been
    pub applied_at: Option<DateTime<Utc>>,
}

impl MigrationStatus {
    /// True when the migration is recorded in the ledger
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        self.applied_at.is_some()
    }
}

/// Applies and reverts migrations on a single connection
pub struct Migrator<'a> {
    conn: &'a mut Connection,
    metrics: MetricsCollector,
}

impl<'a> Migrator<'a> {
    /// Wrap a connection, creating the ledger table if needed
    pub fn new(conn: &'a mut Connection) -> Result<Self> {
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {table} (
                {id} INTEGER PRIMARY KEY AUTOINCREMENT,
                {app} TEXT NOT NULL,
                {name} TEXT NOT NULL,
                {applied_at} TEXT NOT NULL,
                UNIQUE ({app}, {name})
            );",
            table = schema_migrations::TABLE,
            id = schema_migrations::ID,
            app = schema_migrations::APP,
            name = schema_migrations::NAME,
            applied_at = schema_migrations::APPLIED_AT,
        ))?;

        Ok(Self {
            conn,
            metrics: MetricsCollector::default(),
        })
    }

    /// Apply one migration atomically.
    ///
    /// Fails without changing anything if a dependency is unapplied, a
    /// required table is absent, or a table it would create already exists.
    pub fn apply(&mut self, migration: &Migration) -> Result<()> {
        self.apply_locked(migration, false).map(|_| ())
    }

    /// Apply under a write lock taken up front; with `skip_applied`, a
    /// migration another connection already recorded is skipped
    fn apply_locked(&mut self, migration: &Migration, skip_applied: bool) -> Result<bool> {
        let timer = OperationTimer::new(&format!("migration.apply {}", migration.label()));
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        if skip_applied && is_recorded(&tx, migration.app, migration.name)? {
            debug!(migration = %migration.label(), "Already applied");
            return Ok(false);
        }

        for (app, name) in migration.dependencies {
            if !is_recorded(&tx, app, name)? {
                warn!(migration = %migration.label(), dependency = %format!("{app}.{name}"), "Dependency not applied");
                return Err(StoreError::MissingDependency(format!(
                    "{} requires migration {app}.{name}",
                    migration.label()
                )));
            }
        }

        for table in migration.requires_tables {
            if !table_exists(&tx, table)? {
                return Err(StoreError::MissingDependency(format!(
                    "{} requires table {table}",
                    migration.label()
                )));
            }
        }

        for table in migration.creates_tables {
            if table_exists(&tx, table)? {
                return Err(StoreError::TableExists((*table).to_string()));
            }
        }

        if is_recorded(&tx, migration.app, migration.name)? {
            return Err(StoreError::Migration(format!(
                "{} is already recorded as applied",
                migration.label()
            )));
        }

        tx.execute_batch(migration.up_sql)
            .map_err(StoreError::from_sqlite)?;
        tx.execute(
            &format!(
                "INSERT INTO {} ({}, {}, {}) VALUES (?1, ?2, ?3)",
                schema_migrations::TABLE,
                schema_migrations::APP,
                schema_migrations::NAME,
                schema_migrations::APPLIED_AT
            ),
            params![migration.app, migration.name, Utc::now()],
        )?;
        tx.commit()?;

        self.metrics.record_migration(&migration.label(), true);
        info!(migration = %migration.label(), "Applied migration");
        timer.finish();
        Ok(true)
    }

    /// Apply every unapplied migration in order; returns those applied
    pub fn migrate(&mut self) -> Result<Vec<&'static Migration>> {
        let mut applied = Vec::new();

        for migration in &ALL_MIGRATIONS {
            if self.apply_locked(migration, true)? {
                applied.push(migration);
            }
        }

        if applied.is_empty() {
            info!("No migrations to apply");
        }

        Ok(applied)
    }

    /// Revert one applied migration atomically.
    ///
    /// Refuses while any applied migration depends on it.
    pub fn unapply(&mut self, migration: &Migration) -> Result<()> {
        let timer = OperationTimer::new(&format!("migration.unapply {}", migration.label()));
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        if !is_recorded(&tx, migration.app, migration.name)? {
            return Err(StoreError::Migration(format!(
                "{} is not applied",
                migration.label()
            )));
        }

        for dependent in ALL_MIGRATIONS.iter().filter(|m| {
            m.dependencies
                .iter()
                .any(|(app, name)| *app == migration.app && *name == migration.name)
        }) {
            if is_recorded(&tx, dependent.app, dependent.name)? {
                return Err(StoreError::Migration(format!(
                    "{} is still required by {}",
                    migration.label(),
                    dependent.label()
                )));
            }
        }

        tx.execute_batch(migration.down_sql)
            .map_err(StoreError::from_sqlite)?;
        tx.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1 AND {} = ?2",
                schema_migrations::TABLE,
                schema_migrations::APP,
                schema_migrations::NAME
            ),
            params![migration.app, migration.name],
        )?;
        tx.commit()?;

        self.metrics.record_migration(&migration.label(), false);
        info!(migration = %migration.label(), "Reverted migration");
        timer.finish();
        Ok(())
    }

    /// Revert the most recently applied migration, if any
    pub fn rollback(&mut self) -> Result<Option<&'static Migration>> {
        let latest: Option<(String, String)> = self
            .conn
            .query_row(
                &format!(
                    "SELECT {}, {} FROM {} ORDER BY {} DESC LIMIT 1",
                    schema_migrations::APP,
                    schema_migrations::NAME,
                    schema_migrations::TABLE,
                    schema_migrations::ID
                ),
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((app, name)) = latest else {
            info!("No migrations to roll back");
            return Ok(None);
        };

        let migration = find(&app, &name).ok_or_else(|| {
            StoreError::Migration(format!("ledger references unknown migration {app}.{name}"))
        })?;
        self.unapply(migration)?;
        Ok(Some(migration))
    }

    /// SQL executed when applying `migration`
    #[must_use]
    pub const fn sql(migration: &Migration) -> &'static str {
        migration.up_sql
    }

    /// Whether `migration` is recorded in the ledger
    pub fn is_applied(&self, migration: &Migration) -> Result<bool> {
        is_recorded(&*self.conn, migration.app, migration.name)
    }

    /// Applied state of every registered migration
    pub fn status(&self) -> Result<Vec<MigrationStatus>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM {} WHERE {} = ?1 AND {} = ?2",
            schema_migrations::APPLIED_AT,
            schema_migrations::TABLE,
            schema_migrations::APP,
            schema_migrations::NAME
        ))?;

        ALL_MIGRATIONS
            .iter()
            .map(|migration| -> Result<MigrationStatus> {
                let applied_at = stmt
                    .query_row(params![migration.app, migration.name], |row| row.get(0))
                    .optional()?;
                Ok(MigrationStatus {
                    migration,
                    applied_at,
                })
            })
            .collect()
    }
}

fn is_recorded(conn: &Connection, app: &str, name: &str) -> Result<bool> {
    let recorded = conn.query_row(
        &format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1 AND {} = ?2)",
            schema_migrations::TABLE,
            schema_migrations::APP,
            schema_migrations::NAME
        ),
        params![app, name],
        |row| row.get(0),
    )?;
    Ok(recorded)
}

/// Whether a table named `table` exists in the main schema
pub fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let exists = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        params![table],
        |row| row.get(0),
    )?;
    Ok(exists)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        conn
    }

    #[test]
    fn test_registry_order_respects_dependencies() {
        for (position, migration) in ALL_MIGRATIONS.iter().enumerate() {
            for (app, name) in migration.dependencies {
                let dependency = ALL_MIGRATIONS
                    .iter()
                    .position(|m| m.app == *app && m.name == *name)
                    .unwrap();
                assert!(dependency < position, "{} applied before its dependency", migration.label());
            }
        }
    }

    #[test]
    fn test_find() {
        assert_eq!(find("supportal", "0001_initial"), Some(&SUPPORTAL_INITIAL));
        assert!(find("supportal", "0002_missing").is_none());
    }

    #[test]
    fn test_migrate_creates_every_table() {
        let mut conn = connection();
        let applied = Migrator::new(&mut conn).unwrap().migrate().unwrap();
        assert_eq!(applied.len(), 2);

        for table in SUPPORTAL_TABLES.iter().chain([users::TABLE].iter()) {
            assert!(table_exists(&conn, table).unwrap(), "{table} missing");
        }
    }

    #[test]
    fn test_apply_twice_fails_and_changes_nothing() {
        let mut conn = connection();
        let mut migrator = Migrator::new(&mut conn).unwrap();
        migrator.migrate().unwrap();

        let err = migrator.apply(&SUPPORTAL_INITIAL).unwrap_err();
        assert!(matches!(err, StoreError::TableExists(ref t) if t == "businesses"));
        assert!(migrator.status().unwrap().iter().all(MigrationStatus::is_applied));
    }
}
