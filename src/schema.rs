//! Database schema definitions
//!
//! Table and column name constants used when building SQL with rusqlite. The
//! DDL itself lives in the `migrations/` directory.

/// Migration ledger table schema
pub mod schema_migrations {
    /// Table name
    pub const TABLE: &str = "schema_migrations";
    /// Primary key column
    pub const ID: &str = "id";
    /// Owning app label column
    pub const APP: &str = "app";
    /// Migration name column
    pub const NAME: &str = "name";
    /// Application timestamp column
    pub const APPLIED_AT: &str = "applied_at";
}

/// Users table schema (tenant owners)
pub mod users {
    /// Table name
    pub const TABLE: &str = "users";
    /// Primary key column
    pub const ID: &str = "id";
    /// Login name column
    pub const USERNAME: &str = "username";
    /// Email address column
    pub const EMAIL: &str = "email";
    /// Account creation timestamp column
    pub const DATE_JOINED: &str = "date_joined";
}

/// Businesses table schema
pub mod businesses {
    /// Table name
    pub const TABLE: &str = "businesses";
    /// Primary key column
    pub const ID: &str = "id";
    /// Display name column
    pub const NAME: &str = "name";
    /// Free-form description column
    pub const DESCRIPTION: &str = "description";
    /// Creation timestamp column
    pub const CREATED_AT: &str = "created_at";
    /// Last update timestamp column
    pub const UPDATED_AT: &str = "updated_at";
    /// Active flag column
    pub const IS_ACTIVE: &str = "is_active";
    /// Foreign key to users table
    pub const OWNER_ID: &str = "owner_id";
}

/// Documents table schema
pub mod documents {
    /// Table name
    pub const TABLE: &str = "documents";
    /// Primary key column
    pub const ID: &str = "id";
    /// Document title column
    pub const TITLE: &str = "title";
    /// Stored upload path column
    pub const FILE: &str = "file";
    /// Extracted text column
    pub const CONTENT: &str = "content";
    /// Chunking/embedding completion flag column
    pub const PROCESSED: &str = "processed";
    /// Creation timestamp column
    pub const CREATED_AT: &str = "created_at";
    /// Last update timestamp column
    pub const UPDATED_AT: &str = "updated_at";
    /// Foreign key to businesses table
    pub const BUSINESS_ID: &str = "business_id";
}

/// Vector chunks table schema
pub mod vector_chunks {
    /// Table name
    pub const TABLE: &str = "vector_chunks";
    /// Primary key column
    pub const ID: &str = "id";
    /// Zero-based position within the document
    pub const CHUNK_INDEX: &str = "chunk_index";
    /// Chunk text column
    pub const CONTENT: &str = "content";
    /// JSON-encoded embedding vector column
    pub const EMBEDDING: &str = "embedding";
    /// JSON metadata column
    pub const METADATA: &str = "metadata";
    /// Creation timestamp column
    pub const CREATED_AT: &str = "created_at";
    /// Foreign key to documents table
    pub const DOCUMENT_ID: &str = "document_id";
}

/// Chat sessions table schema
pub mod chat_sessions {
    /// Table name
    pub const TABLE: &str = "chat_sessions";
    /// Primary key column
    pub const ID: &str = "id";
    /// Externally visible session identifier column
    pub const SESSION_ID: &str = "session_id";
    /// Customer display name column
    pub const CUSTOMER_NAME: &str = "customer_name";
    /// Customer email column
    pub const CUSTOMER_EMAIL: &str = "customer_email";
    /// Creation timestamp column
    pub const CREATED_AT: &str = "created_at";
    /// Last update timestamp column
    pub const UPDATED_AT: &str = "updated_at";
    /// Active flag column
    pub const IS_ACTIVE: &str = "is_active";
    /// Foreign key to businesses table
    pub const BUSINESS_ID: &str = "business_id";
}

/// Chat messages table schema
pub mod chat_messages {
    /// Table name
    pub const TABLE: &str = "chat_messages";
    /// Primary key column
    pub const ID: &str = "id";
    /// Author role column (user, assistant, system)
    pub const MESSAGE_TYPE: &str = "message_type";
    /// Message text column
    pub const CONTENT: &str = "content";
    /// JSON metadata column
    pub const METADATA: &str = "metadata";
    /// Creation timestamp column
    pub const CREATED_AT: &str = "created_at";
    /// Foreign key to chat_sessions table (row id, not the external session id)
    pub const SESSION_ID: &str = "session_id";
}

/// Tables created by the initial supportal migration, parents first.
pub const SUPPORTAL_TABLES: [&str; 5] = [
    businesses::TABLE,
    documents::TABLE,
    vector_chunks::TABLE,
    chat_sessions::TABLE,
    chat_messages::TABLE,
];
