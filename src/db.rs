use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use crate::config::DatabaseConfig;
use crate::error::{Result, StoreError};
use crate::metrics::{MetricsCollector, MetricsTimer};
use crate::migrations::{Migration, MigrationStatus, Migrator};
use crate::models::{
    empty_metadata, Business, BusinessUpdate, ChatMessage, ChatSession, Document, DocumentFile,
    Metadata, NewBusiness, NewChatMessage, NewChatSession, NewDocument, NewUser, NewVectorChunk,
    StoreStats, User, VectorChunk,
};
use crate::schema::{businesses, chat_messages, chat_sessions, documents, users, vector_chunks};
use crate::validation::InputValidator;

/// SQLite connection pool
pub type DbPool = Pool<SqliteConnectionManager>;
/// A connection checked out of [`DbPool`]
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

const MEMORY_URL: &str = ":memory:";

/// Strip the `sqlite:` / `sqlite://` scheme from a database URL
#[must_use]
pub fn database_path(url: &str) -> &str {
    url.strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url)
}

/// Pooled SQLite store for tenants, documents, chunks and chat logs
pub struct Database {
    pool: DbPool,
    metrics: MetricsCollector,
}

impl Database {
    /// Open the store at `database_url` and apply any pending migrations
    pub fn new(database_url: &str) -> Result<Self> {
        let database = Self::connect(&DatabaseConfig::with_url(database_url))?;
        database.migrate()?;
        Ok(database)
    }

    /// Open a private in-memory store with every migration applied
    pub fn in_memory() -> Result<Self> {
        Self::new(MEMORY_URL)
    }

    /// Create the connection pool without touching the schema
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        let path = database_path(&config.url);
        let in_memory = path == MEMORY_URL;

        let manager = if in_memory {
            SqliteConnectionManager::memory()
        } else {
            // Create parent directory if it doesn't exist
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            SqliteConnectionManager::file(path)
        };

        let busy_timeout = Duration::from_millis(u64::from(config.busy_timeout_ms));
        let manager = manager.with_init(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch("PRAGMA foreign_keys = ON;")
        });

        // Every in-memory connection is its own database, so keep exactly one alive
        let max_size = if in_memory { 1 } else { config.max_connections };
        let mut builder = Pool::builder()
            .max_size(max_size)
            .connection_timeout(Duration::from_secs(u64::from(config.connection_timeout_secs)));
        if in_memory {
            builder = builder.idle_timeout(None).max_lifetime(None);
        }
        let pool = builder.build(manager)?;

        let metrics = MetricsCollector::default();
        metrics.update_connection_pool_size(max_size);
        info!(path, max_size, "Opened database");

        Ok(Self { pool, metrics })
    }

    /// Get a connection from the pool
    pub fn get_connection(&self) -> Result<DbConnection> {
        Ok(self.pool.get()?)
    }

    /// Run `f` on a pooled connection, recording timing and failures
    fn run<T>(
        &self,
        operation: &'static str,
        f: impl FnOnce(&mut Connection) -> Result<T>,
    ) -> Result<T> {
        let timer = MetricsTimer::new(self.metrics, operation);
        let result = self.get_connection().and_then(|mut conn| f(&mut conn));
        let elapsed = timer.finish(result.is_ok());
        debug!(
            operation,
            elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
            "Database operation"
        );

        if let Err(err) = &result {
            if err.is_constraint_violation() {
                self.metrics.record_constraint_violation(operation);
                warn!(operation, error = %err, "Write rejected");
            } else if !matches!(err, StoreError::NotFound(_)) {
                self.metrics.record_error(operation);
                error!(operation, error = %err, "Database operation failed");
            }
        }

        result
    }

    // ── Migrations ──

    /// Run `f` with a [`Migrator`] on a pooled connection
    pub fn migrator<T>(&self, f: impl FnOnce(&mut Migrator<'_>) -> Result<T>) -> Result<T> {
        self.run("migrator", |conn| f(&mut Migrator::new(conn)?))
    }

    /// Apply every pending migration
    pub fn migrate(&self) -> Result<Vec<&'static Migration>> {
        self.run("migrate", |conn| Migrator::new(conn)?.migrate())
    }

    /// Apply a single migration; fails if any table it creates already exists
    pub fn apply_migration(&self, migration: &Migration) -> Result<()> {
        self.run("apply_migration", |conn| Migrator::new(conn)?.apply(migration))
    }

    /// Revert the most recently applied migration
    pub fn rollback(&self) -> Result<Option<&'static Migration>> {
        self.run("rollback", |conn| Migrator::new(conn)?.rollback())
    }

    /// Applied state of every registered migration
    pub fn migration_status(&self) -> Result<Vec<MigrationStatus>> {
        self.run("migration_status", |conn| Migrator::new(conn)?.status())
    }

    // ── Users ──

    /// Create a tenant owner account
    pub fn create_user(&self, new_user: NewUser) -> Result<User> {
        InputValidator::validate_username(&new_user.username)?;
        let email = new_user.email.unwrap_or_default();
        InputValidator::validate_email("email", &email)?;

        self.run("create_user", |conn| {
            let date_joined = Utc::now();
            conn.execute(
                &format!(
                    "INSERT INTO {} ({}, {}, {}) VALUES (?1, ?2, ?3)",
                    users::TABLE,
                    users::USERNAME,
                    users::EMAIL,
                    users::DATE_JOINED
                ),
                params![new_user.username, email, date_joined],
            )
            .map_err(StoreError::from_sqlite)?;

            Ok(User {
                id: conn.last_insert_rowid(),
                username: new_user.username,
                email,
                date_joined,
            })
        })
    }

    /// Get a user by ID
    pub fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        self.run("get_user", |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT * FROM {} WHERE {} = ?1", users::TABLE, users::ID),
                    params![user_id],
                    map_user,
                )
                .optional()?)
        })
    }

    /// Delete a user and, by cascade, every business they own
    pub fn delete_user(&self, user_id: i64) -> Result<bool> {
        self.run("delete_user", |conn| {
            delete_by_id(conn, users::TABLE, users::ID, user_id)
        })
    }

    // ── Businesses ──

    /// Create a business owned by an existing user
    pub fn create_business(&self, new_business: NewBusiness) -> Result<Business> {
        InputValidator::validate_business_name(&new_business.name)?;
        let description = new_business.description.unwrap_or_default();

        self.run("create_business", |conn| {
            let now = Utc::now();
            conn.execute(
                &format!(
                    "INSERT INTO {} ({}, {}, {}, {}, {}, {}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    businesses::TABLE,
                    businesses::NAME,
                    businesses::DESCRIPTION,
                    businesses::CREATED_AT,
                    businesses::UPDATED_AT,
                    businesses::IS_ACTIVE,
                    businesses::OWNER_ID
                ),
                params![
                    new_business.name,
                    description,
                    now,
                    now,
                    true,
                    new_business.owner_id
                ],
            )
            .map_err(StoreError::from_sqlite)?;

            Ok(Business {
                id: conn.last_insert_rowid(),
                name: new_business.name,
                description,
                created_at: now,
                updated_at: now,
                is_active: true,
                owner_id: new_business.owner_id,
            })
        })
    }

    /// Get a business by ID
    pub fn get_business(&self, business_id: i64) -> Result<Option<Business>> {
        self.run("get_business", |conn| find_business(conn, business_id))
    }

    /// List businesses owned by a user, oldest first
    pub fn list_businesses(&self, owner_id: i64) -> Result<Vec<Business>> {
        self.run("list_businesses", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT * FROM {} WHERE {} = ?1 ORDER BY {}",
                businesses::TABLE,
                businesses::OWNER_ID,
                businesses::ID
            ))?;
            let rows = stmt.query_map(params![owner_id], map_business)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    /// Apply a partial update; `updated_at` is always refreshed
    pub fn update_business(&self, business_id: i64, update: BusinessUpdate) -> Result<Business> {
        if let Some(name) = &update.name {
            InputValidator::validate_business_name(name)?;
        }

        self.run("update_business", |conn| {
            let mut update_fields = vec![format!("{} = ?", businesses::UPDATED_AT)];
            let mut update_params: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(Utc::now())];

            if let Some(name) = update.name {
                update_fields.push(format!("{} = ?", businesses::NAME));
                update_params.push(Box::new(name));
            }
            if let Some(description) = update.description {
                update_fields.push(format!("{} = ?", businesses::DESCRIPTION));
                update_params.push(Box::new(description));
            }
            if let Some(is_active) = update.is_active {
                update_fields.push(format!("{} = ?", businesses::IS_ACTIVE));
                update_params.push(Box::new(is_active));
            }

            // Add the business ID for the WHERE clause
            update_params.push(Box::new(business_id));

            let query = format!(
                "UPDATE {} SET {} WHERE {} = ?",
                businesses::TABLE,
                update_fields.join(", "),
                businesses::ID
            );
            let changed = conn
                .execute(&query, rusqlite::params_from_iter(update_params.iter()))
                .map_err(StoreError::from_sqlite)?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("business {business_id}")));
            }

            find_business(conn, business_id)?
                .ok_or_else(|| StoreError::NotFound(format!("business {business_id}")))
        })
    }

    /// Delete a business with all of its documents, chunks, sessions and messages
    pub fn delete_business(&self, business_id: i64) -> Result<bool> {
        self.run("delete_business", |conn| {
            delete_by_id(conn, businesses::TABLE, businesses::ID, business_id)
        })
    }

    // ── Documents ──

    /// Record an uploaded document; `processed` starts out false
    pub fn create_document(&self, new_document: NewDocument) -> Result<Document> {
        InputValidator::validate_document_title(&new_document.title)?;
        let file = DocumentFile::upload(&new_document.file_name)?;
        let content = new_document.content.unwrap_or_default();

        self.run("create_document", |conn| {
            let now = Utc::now();
            conn.execute(
                &format!(
                    "INSERT INTO {} ({}, {}, {}, {}, {}, {}, {}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    documents::TABLE,
                    documents::TITLE,
                    documents::FILE,
                    documents::CONTENT,
                    documents::PROCESSED,
                    documents::CREATED_AT,
                    documents::UPDATED_AT,
                    documents::BUSINESS_ID
                ),
                params![
                    new_document.title,
                    file,
                    content,
                    false,
                    now,
                    now,
                    new_document.business_id
                ],
            )
            .map_err(StoreError::from_sqlite)?;

            debug!(business_id = new_document.business_id, file = %file, "Stored document");

            Ok(Document {
                id: conn.last_insert_rowid(),
                business_id: new_document.business_id,
                title: new_document.title,
                file,
                content,
                processed: false,
                created_at: now,
                updated_at: now,
            })
        })
    }

    /// Get a document by ID
    pub fn get_document(&self, document_id: i64) -> Result<Option<Document>> {
        self.run("get_document", |conn| find_document(conn, document_id))
    }

    /// List a business's documents in upload order
    pub fn list_documents(&self, business_id: i64) -> Result<Vec<Document>> {
        self.run("list_documents", |conn| {
            query_documents(conn, business_id, false)
        })
    }

    /// List a business's documents still awaiting chunking/embedding
    pub fn list_unprocessed_documents(&self, business_id: i64) -> Result<Vec<Document>> {
        self.run("list_unprocessed_documents", |conn| {
            query_documents(conn, business_id, true)
        })
    }

    /// Store text extracted from the uploaded file
    pub fn set_document_content(&self, document_id: i64, content: &str) -> Result<Document> {
        self.run("set_document_content", |conn| {
            update_document(
                conn,
                document_id,
                &format!("{} = ?1", documents::CONTENT),
                content,
            )
        })
    }

    /// Flip `processed` to true once downstream chunking/embedding is done
    pub fn mark_document_processed(&self, document_id: i64) -> Result<Document> {
        self.run("mark_document_processed", |conn| {
            update_document(
                conn,
                document_id,
                &format!("{} = ?1", documents::PROCESSED),
                true,
            )
        })
    }

    /// Delete a document together with its chunks
    pub fn delete_document(&self, document_id: i64) -> Result<bool> {
        self.run("delete_document", |conn| {
            delete_by_id(conn, documents::TABLE, documents::ID, document_id)
        })
    }

    // ── Vector chunks ──

    /// Store one chunk; `(document, chunk_index)` must be unused
    pub fn add_vector_chunk(&self, new_chunk: NewVectorChunk) -> Result<VectorChunk> {
        validate_chunk(&new_chunk)?;

        self.run("add_vector_chunk", |conn| insert_chunk(conn, new_chunk))
    }

    /// Store a batch of chunks atomically; nothing is kept if any is rejected
    pub fn add_vector_chunks(&self, new_chunks: Vec<NewVectorChunk>) -> Result<Vec<VectorChunk>> {
        for chunk in &new_chunks {
            validate_chunk(chunk)?;
        }

        self.run("add_vector_chunks", |conn| {
            let tx = write_transaction(conn)?;
            let stored = new_chunks
                .into_iter()
                .map(|chunk| insert_chunk(&tx, chunk))
                .collect::<Result<Vec<_>>>()?;
            tx.commit()?;

            info!(count = stored.len(), "Stored vector chunks");
            Ok(stored)
        })
    }

    /// Chunks of a document ordered by `chunk_index`
    pub fn get_chunks(&self, document_id: i64) -> Result<Vec<VectorChunk>> {
        self.run("get_chunks", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT * FROM {} WHERE {} = ?1 ORDER BY {} ASC",
                vector_chunks::TABLE,
                vector_chunks::DOCUMENT_ID,
                vector_chunks::CHUNK_INDEX
            ))?;
            let rows = stmt.query_map(params![document_id], map_vector_chunk)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    /// Drop every chunk of a document and mark it unprocessed for re-ingestion
    pub fn reset_document_chunks(&self, document_id: i64) -> Result<usize> {
        self.run("reset_document_chunks", |conn| {
            let tx = write_transaction(conn)?;
            if find_document(&tx, document_id)?.is_none() {
                return Err(StoreError::NotFound(format!("document {document_id}")));
            }

            let removed = tx.execute(
                &format!(
                    "DELETE FROM {} WHERE {} = ?1",
                    vector_chunks::TABLE,
                    vector_chunks::DOCUMENT_ID
                ),
                params![document_id],
            )?;
            update_document(
                &tx,
                document_id,
                &format!("{} = ?1", documents::PROCESSED),
                false,
            )?;
            tx.commit()?;

            info!(document_id, removed, "Reset document chunks");
            Ok(removed)
        })
    }

    // ── Chat sessions ──

    /// Open a chat session; `session_id` must be unique across all businesses
    pub fn create_chat_session(&self, new_session: NewChatSession) -> Result<ChatSession> {
        InputValidator::validate_session_id(&new_session.session_id)?;
        let customer_name = new_session.customer_name.unwrap_or_default();
        let customer_email = new_session.customer_email.unwrap_or_default();
        InputValidator::validate_customer_name(&customer_name)?;
        InputValidator::validate_email("customer_email", &customer_email)?;

        self.run("create_chat_session", |conn| {
            let now = Utc::now();
            conn.execute(
                &format!(
                    "INSERT INTO {} ({}, {}, {}, {}, {}, {}, {}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    chat_sessions::TABLE,
                    chat_sessions::SESSION_ID,
                    chat_sessions::CUSTOMER_NAME,
                    chat_sessions::CUSTOMER_EMAIL,
                    chat_sessions::CREATED_AT,
                    chat_sessions::UPDATED_AT,
                    chat_sessions::IS_ACTIVE,
                    chat_sessions::BUSINESS_ID
                ),
                params![
                    new_session.session_id,
                    customer_name,
                    customer_email,
                    now,
                    now,
                    true,
                    new_session.business_id
                ],
            )
            .map_err(|e| match StoreError::from_sqlite(e) {
                StoreError::UniqueViolation(_) => StoreError::UniqueViolation(format!(
                    "chat session {} already exists",
                    new_session.session_id
                )),
                other => other,
            })?;

            Ok(ChatSession {
                id: conn.last_insert_rowid(),
                business_id: new_session.business_id,
                session_id: new_session.session_id,
                customer_name,
                customer_email,
                created_at: now,
                updated_at: now,
                is_active: true,
            })
        })
    }

    /// Look up a chat session by its external identifier
    pub fn get_chat_session(&self, session_id: &str) -> Result<Option<ChatSession>> {
        self.run("get_chat_session", |conn| {
            find_chat_session(conn, session_id)
        })
    }

    /// List a business's chat sessions, oldest first
    pub fn list_chat_sessions(&self, business_id: i64) -> Result<Vec<ChatSession>> {
        self.run("list_chat_sessions", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT * FROM {} WHERE {} = ?1 ORDER BY {} ASC, {} ASC",
                chat_sessions::TABLE,
                chat_sessions::BUSINESS_ID,
                chat_sessions::CREATED_AT,
                chat_sessions::ID
            ))?;
            let rows = stmt.query_map(params![business_id], map_chat_session)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    /// Mark a chat session inactive
    pub fn close_chat_session(&self, session_id: &str) -> Result<ChatSession> {
        self.run("close_chat_session", |conn| {
            let changed = conn.execute(
                &format!(
                    "UPDATE {} SET {} = ?1, {} = ?2 WHERE {} = ?3",
                    chat_sessions::TABLE,
                    chat_sessions::IS_ACTIVE,
                    chat_sessions::UPDATED_AT,
                    chat_sessions::SESSION_ID
                ),
                params![false, Utc::now(), session_id],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(format!("chat session {session_id}")));
            }

            find_chat_session(conn, session_id)?
                .ok_or_else(|| StoreError::NotFound(format!("chat session {session_id}")))
        })
    }

    /// Delete a chat session and its messages
    pub fn delete_chat_session(&self, session_id: &str) -> Result<bool> {
        self.run("delete_chat_session", |conn| {
            let deleted = conn.execute(
                &format!(
                    "DELETE FROM {} WHERE {} = ?1",
                    chat_sessions::TABLE,
                    chat_sessions::SESSION_ID
                ),
                params![session_id],
            )?;
            Ok(deleted > 0)
        })
    }

    // ── Chat messages ──

    /// Append a message to a session and refresh the session's `updated_at`
    pub fn add_chat_message(&self, new_message: NewChatMessage) -> Result<ChatMessage> {
        InputValidator::validate_message_content(&new_message.content)?;
        let metadata = new_message.metadata.unwrap_or_else(empty_metadata);
        let metadata_json = serde_json::to_string(&metadata)?;

        self.run("add_chat_message", |conn| {
            let tx = write_transaction(conn)?;
            let now = Utc::now();

            tx.execute(
                &format!(
                    "INSERT INTO {} ({}, {}, {}, {}, {}) VALUES (?1, ?2, ?3, ?4, ?5)",
                    chat_messages::TABLE,
                    chat_messages::MESSAGE_TYPE,
                    chat_messages::CONTENT,
                    chat_messages::METADATA,
                    chat_messages::CREATED_AT,
                    chat_messages::SESSION_ID
                ),
                params![
                    new_message.message_type,
                    new_message.content,
                    metadata_json,
                    now,
                    new_message.session_id
                ],
            )
            .map_err(StoreError::from_sqlite)?;
            let id = tx.last_insert_rowid();

            // Touch session updated_at
            tx.execute(
                &format!(
                    "UPDATE {} SET {} = ?1 WHERE {} = ?2",
                    chat_sessions::TABLE,
                    chat_sessions::UPDATED_AT,
                    chat_sessions::ID
                ),
                params![now, new_message.session_id],
            )?;
            tx.commit()?;

            Ok(ChatMessage {
                id,
                session_id: new_message.session_id,
                message_type: new_message.message_type,
                content: new_message.content,
                metadata,
                created_at: now,
            })
        })
    }

    /// Messages of a session in ascending creation order
    pub fn get_chat_messages(&self, session_row_id: i64) -> Result<Vec<ChatMessage>> {
        self.run("get_chat_messages", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT * FROM {} WHERE {} = ?1 ORDER BY {} ASC, {} ASC",
                chat_messages::TABLE,
                chat_messages::SESSION_ID,
                chat_messages::CREATED_AT,
                chat_messages::ID
            ))?;
            let rows = stmt.query_map(params![session_row_id], map_chat_message)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
    }

    // ── Statistics ──

    /// Row counts for every table
    pub fn stats(&self) -> Result<StoreStats> {
        self.run("stats", |conn| {
            Ok(StoreStats {
                users: count(conn, users::TABLE, None)?,
                businesses: count(conn, businesses::TABLE, None)?,
                documents: count(conn, documents::TABLE, None)?,
                processed_documents: count(
                    conn,
                    documents::TABLE,
                    Some(&format!("{} = 1", documents::PROCESSED)),
                )?,
                vector_chunks: count(conn, vector_chunks::TABLE, None)?,
                chat_sessions: count(conn, chat_sessions::TABLE, None)?,
                chat_messages: count(conn, chat_messages::TABLE, None)?,
            })
        })
    }
}

/// Begin a transaction holding the write lock, so a busy database waits out the busy timeout
fn write_transaction(conn: &mut Connection) -> Result<Transaction<'_>> {
    Ok(conn.transaction_with_behavior(TransactionBehavior::Immediate)?)
}

fn validate_chunk(chunk: &NewVectorChunk) -> Result<()> {
    InputValidator::validate_chunk_index(chunk.chunk_index)?;
    InputValidator::validate_required("content", &chunk.content)?;
    InputValidator::validate_embedding(&chunk.embedding)
}

fn insert_chunk(conn: &Connection, new_chunk: NewVectorChunk) -> Result<VectorChunk> {
    let metadata = new_chunk.metadata.unwrap_or_else(empty_metadata);
    let now = Utc::now();

    conn.execute(
        &format!(
            "INSERT INTO {} ({}, {}, {}, {}, {}, {}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            vector_chunks::TABLE,
            vector_chunks::CHUNK_INDEX,
            vector_chunks::CONTENT,
            vector_chunks::EMBEDDING,
            vector_chunks::METADATA,
            vector_chunks::CREATED_AT,
            vector_chunks::DOCUMENT_ID
        ),
        params![
            new_chunk.chunk_index,
            new_chunk.content,
            serde_json::to_string(&new_chunk.embedding)?,
            serde_json::to_string(&metadata)?,
            now,
            new_chunk.document_id
        ],
    )
    .map_err(|e| match StoreError::from_sqlite(e) {
        StoreError::UniqueViolation(_) => StoreError::UniqueViolation(format!(
            "chunk_index {} already exists for document {}",
            new_chunk.chunk_index, new_chunk.document_id
        )),
        other => other,
    })?;

    Ok(VectorChunk {
        id: conn.last_insert_rowid(),
        document_id: new_chunk.document_id,
        chunk_index: new_chunk.chunk_index,
        content: new_chunk.content,
        embedding: new_chunk.embedding,
        metadata,
        created_at: now,
    })
}

fn find_business(conn: &Connection, business_id: i64) -> Result<Option<Business>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT * FROM {} WHERE {} = ?1",
                businesses::TABLE,
                businesses::ID
            ),
            params![business_id],
            map_business,
        )
        .optional()?)
}

fn find_document(conn: &Connection, document_id: i64) -> Result<Option<Document>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT * FROM {} WHERE {} = ?1",
                documents::TABLE,
                documents::ID
            ),
            params![document_id],
            map_document,
        )
        .optional()?)
}

fn query_documents(conn: &Connection, business_id: i64, unprocessed_only: bool) -> Result<Vec<Document>> {
    let mut query = format!(
        "SELECT * FROM {} WHERE {} = ?1",
        documents::TABLE,
        documents::BUSINESS_ID
    );
    if unprocessed_only {
        query.push_str(&format!(" AND {} = 0", documents::PROCESSED));
    }
    query.push_str(&format!(
        " ORDER BY {} ASC, {} ASC",
        documents::CREATED_AT,
        documents::ID
    ));

    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map(params![business_id], map_document)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Set one document column (`assignment` binds `?1`) and refresh `updated_at`
fn update_document(
    conn: &Connection,
    document_id: i64,
    assignment: &str,
    value: impl rusqlite::ToSql,
) -> Result<Document> {
    let changed = conn
        .execute(
            &format!(
                "UPDATE {} SET {}, {} = ?2 WHERE {} = ?3",
                documents::TABLE,
                assignment,
                documents::UPDATED_AT,
                documents::ID
            ),
            params![value, Utc::now(), document_id],
        )
        .map_err(StoreError::from_sqlite)?;
    if changed == 0 {
        return Err(StoreError::NotFound(format!("document {document_id}")));
    }

    find_document(conn, document_id)?
        .ok_or_else(|| StoreError::NotFound(format!("document {document_id}")))
}

fn find_chat_session(conn: &Connection, session_id: &str) -> Result<Option<ChatSession>> {
    Ok(conn
        .query_row(
            &format!(
                "SELECT * FROM {} WHERE {} = ?1",
                chat_sessions::TABLE,
                chat_sessions::SESSION_ID
            ),
            params![session_id],
            map_chat_session,
        )
        .optional()?)
}

fn delete_by_id(conn: &Connection, table: &str, id_column: &str, id: i64) -> Result<bool> {
    let deleted = conn
        .execute(
            &format!("DELETE FROM {table} WHERE {id_column} = ?1"),
            params![id],
        )
        .map_err(StoreError::from_sqlite)?;
    if deleted > 0 {
        info!(table, id, "Deleted row and dependents");
    }
    Ok(deleted > 0)
}

fn count(conn: &Connection, table: &str, filter: Option<&str>) -> Result<usize> {
    let query = filter.map_or_else(
        || format!("SELECT COUNT(*) FROM {table}"),
        |condition| format!("SELECT COUNT(*) FROM {table} WHERE {condition}"),
    );
    let total: i64 = conn.query_row(&query, [], |row| row.get(0))?;
    Ok(usize::try_from(total).unwrap_or_default())
}

/// Decode a JSON text column
fn json_column<T: DeserializeOwned>(row: &Row, column: &str) -> rusqlite::Result<T> {
    let raw: String = row.get(column)?;
    serde_json::from_str(&raw).map_err(|e| {
        let index = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(e))
    })
}

/// Map a database row to a User
fn map_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(users::ID)?,
        username: row.get(users::USERNAME)?,
        email: row.get(users::EMAIL)?,
        date_joined: row.get(users::DATE_JOINED)?,
    })
}

/// Map a database row to a Business
fn map_business(row: &Row) -> rusqlite::Result<Business> {
    Ok(Business {
        id: row.get(businesses::ID)?,
        name: row.get(businesses::NAME)?,
        description: row.get(businesses::DESCRIPTION)?,
        created_at: row.get(businesses::CREATED_AT)?,
        updated_at: row.get(businesses::UPDATED_AT)?,
        is_active: row.get(businesses::IS_ACTIVE)?,
        owner_id: row.get(businesses::OWNER_ID)?,
    })
}

/// Map a database row to a Document
fn map_document(row: &Row) -> rusqlite::Result<Document> {
    Ok(Document {
        id: row.get(documents::ID)?,
        business_id: row.get(documents::BUSINESS_ID)?,
        title: row.get(documents::TITLE)?,
        file: row.get(documents::FILE)?,
        content: row.get(documents::CONTENT)?,
        processed: row.get(documents::PROCESSED)?,
        created_at: row.get(documents::CREATED_AT)?,
        updated_at: row.get(documents::UPDATED_AT)?,
    })
}

/// Map a database row to a VectorChunk
fn map_vector_chunk(row: &Row) -> rusqlite::Result<VectorChunk> {
    Ok(VectorChunk {
        id: row.get(vector_chunks::ID)?,
        document_id: row.get(vector_chunks::DOCUMENT_ID)?,
        chunk_index: row.get(vector_chunks::CHUNK_INDEX)?,
        content: row.get(vector_chunks::CONTENT)?,
        embedding: json_column(row, vector_chunks::EMBEDDING)?,
        metadata: json_column::<Metadata>(row, vector_chunks::METADATA)?,
        created_at: row.get(vector_chunks::CREATED_AT)?,
    })
}

/// Map a database row to a ChatSession
fn map_chat_session(row: &Row) -> rusqlite::Result<ChatSession> {
    Ok(ChatSession {
        id: row.get(chat_sessions::ID)?,
        business_id: row.get(chat_sessions::BUSINESS_ID)?,
        session_id: row.get(chat_sessions::SESSION_ID)?,
        customer_name: row.get(chat_sessions::CUSTOMER_NAME)?,
        customer_email: row.get(chat_sessions::CUSTOMER_EMAIL)?,
        created_at: row.get(chat_sessions::CREATED_AT)?,
        updated_at: row.get(chat_sessions::UPDATED_AT)?,
        is_active: row.get(chat_sessions::IS_ACTIVE)?,
    })
}

/// Map a database row to a ChatMessage
fn map_chat_message(row: &Row) -> rusqlite::Result<ChatMessage> {
    let created_at: DateTime<Utc> = row.get(chat_messages::CREATED_AT)?;
    Ok(ChatMessage {
        id: row.get(chat_messages::ID)?,
        session_id: row.get(chat_messages::SESSION_ID)?,
        message_type: row.get(chat_messages::MESSAGE_TYPE)?,
        content: row.get(chat_messages::CONTENT)?,
        metadata: json_column(row, chat_messages::METADATA)?,
        created_at,
    })
}
