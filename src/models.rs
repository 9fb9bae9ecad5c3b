//! Data models for tenants, documents, vector chunks and chat logs
//!
//! Row types (`Business`, `Document`, ...) mirror what is stored; the `New*`
//! types carry what a caller supplies on insert. Timestamps and defaults are
//! filled in by [`crate::db::Database`].

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Free-form JSON stored alongside chunks and messages
pub type Metadata = serde_json::Value;

/// Default metadata: an empty JSON object
#[must_use]
pub fn empty_metadata() -> Metadata {
    serde_json::Value::Object(serde_json::Map::new())
}

/// Storage prefix for uploaded documents
pub const UPLOAD_PREFIX: &str = "documents/";

/// File extensions accepted for document uploads
pub const ALLOWED_DOCUMENT_EXTENSIONS: [&str; 3] = ["pdf", "docx", "txt"];

/// A tenant owner account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Database primary key
    pub id: i64,
    /// Unique login name
    pub username: String,
    /// Email address (may be empty)
    pub email: String,
    /// When the account was created
    pub date_joined: DateTime<Utc>,
}

/// Data for creating a new user
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Unique login name
    pub username: String,
    /// Email address
    pub email: Option<String>,
}

/// A tenant; every document and chat session belongs to exactly one
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Business {
    /// Database primary key
    pub id: i64,
    /// Display name
    pub name: String,
    /// Free-form description (empty when not given)
    pub description: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Whether the tenant is active
    pub is_active: bool,
    /// Foreign key to the owning user
    pub owner_id: i64,
}

/// Data for creating a new business
#[derive(Debug, Clone)]
pub struct NewBusiness {
    /// Owning user
    pub owner_id: i64,
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: Option<String>,
}

/// Partial update for a business; `None` fields are left untouched
#[derive(Debug, Clone, Default)]
pub struct BusinessUpdate {
    /// New display name
    pub name: Option<String>,
    /// New description
    pub description: Option<String>,
    /// New active flag
    pub is_active: Option<bool>,
}

impl BusinessUpdate {
    /// True when no field would change
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none() && self.is_active.is_none()
    }
}

/// Stored location of an uploaded document, always under [`UPLOAD_PREFIX`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentFile(String);

impl DocumentFile {
    /// Build the storage path for an uploaded file name.
    ///
    /// Directory components are discarded and the extension must be one of
    /// [`ALLOWED_DOCUMENT_EXTENSIONS`] (compared case-insensitively).
    pub fn upload(file_name: &str) -> Result<Self> {
        let base = Path::new(file_name)
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::trim)
            .unwrap_or_default();
        if base.is_empty() {
            return Err(StoreError::NotNull("file".to_string()));
        }
        crate::validation::InputValidator::validate_file_extension(base)?;
        Ok(Self(format!("{UPLOAD_PREFIX}{base}")))
    }

    /// Full stored path, e.g. `documents/manual.pdf`
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name without the storage prefix
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.strip_prefix(UPLOAD_PREFIX).unwrap_or(&self.0)
    }

    /// Lowercased extension
    #[must_use]
    pub fn extension(&self) -> String {
        Path::new(self.file_name())
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default()
    }
}

impl fmt::Display for DocumentFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl ToSql for DocumentFile {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for DocumentFile {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        String::column_result(value).map(Self)
    }
}

/// An uploaded knowledge-base document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Database primary key
    pub id: i64,
    /// Owning business
    pub business_id: i64,
    /// Document title
    pub title: String,
    /// Stored upload path
    pub file: DocumentFile,
    /// Extracted text (empty until extraction runs)
    pub content: String,
    /// True once chunking and embedding have completed
    pub processed: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

/// Data for creating a new document
#[derive(Debug, Clone)]
pub struct NewDocument {
    /// Owning business
    pub business_id: i64,
    /// Document title
    pub title: String,
    /// Name of the uploaded file; only its base name is kept
    pub file_name: String,
    /// Extracted text, if already available
    pub content: Option<String>,
}

/// A segment of a document's text paired with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorChunk {
    /// Database primary key
    pub id: i64,
    /// Owning document
    pub document_id: i64,
    /// Zero-based position within the document
    pub chunk_index: i32,
    /// Chunk text
    pub content: String,
    /// Embedding vector
    pub embedding: Vec<f32>,
    /// Arbitrary metadata
    pub metadata: Metadata,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Data for creating a new vector chunk
#[derive(Debug, Clone)]
pub struct NewVectorChunk {
    /// Owning document
    pub document_id: i64,
    /// Zero-based position within the document
    pub chunk_index: i32,
    /// Chunk text
    pub content: String,
    /// Embedding vector
    pub embedding: Vec<f32>,
    /// Arbitrary metadata (defaults to an empty object)
    pub metadata: Option<Metadata>,
}

/// A customer conversation scoped to a business
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Database primary key
    pub id: i64,
    /// Owning business
    pub business_id: i64,
    /// Globally unique external session identifier
    pub session_id: String,
    /// Customer display name (may be empty)
    pub customer_name: String,
    /// Customer email (may be empty)
    pub customer_email: String,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
    /// Whether the session is still open
    pub is_active: bool,
}

/// Data for creating a new chat session
#[derive(Debug, Clone)]
pub struct NewChatSession {
    /// Owning business
    pub business_id: i64,
    /// Globally unique external session identifier
    pub session_id: String,
    /// Customer display name
    pub customer_name: Option<String>,
    /// Customer email
    pub customer_email: Option<String>,
}

/// Author role of a chat message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    /// Sent by the customer
    User,
    /// Generated by the assistant
    Assistant,
    /// System prompt or notice
    System,
}

impl MessageType {
    /// Every accepted value, in declaration order
    pub const ALL: [Self; 3] = [Self::User, Self::Assistant, Self::System];

    /// Stored string form
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| StoreError::InvalidChoice {
                field: "message_type".to_string(),
                value: s.to_string(),
            })
    }
}

impl ToSql for MessageType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for MessageType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let raw = value.as_str()?;
        raw.parse().map_err(|e: StoreError| FromSqlError::Other(Box::new(e)))
    }
}

/// A single message within a chat session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Database primary key
    pub id: i64,
    /// Owning chat session (row id)
    pub session_id: i64,
    /// Author role
    pub message_type: MessageType,
    /// Message text
    pub content: String,
    /// Arbitrary metadata
    pub metadata: Metadata,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Data for creating a new chat message
#[derive(Debug, Clone)]
pub struct NewChatMessage {
    /// Owning chat session (row id)
    pub session_id: i64,
    /// Author role
    pub message_type: MessageType,
    /// Message text
    pub content: String,
    /// Arbitrary metadata (defaults to an empty object)
    pub metadata: Option<Metadata>,
}

/// Row counts per table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Number of users
    pub users: usize,
    /// Number of businesses
    pub businesses: usize,
    /// Number of documents
    pub documents: usize,
    /// Documents with `processed = true`
    pub processed_documents: usize,
    /// Number of vector chunks
    pub vector_chunks: usize,
    /// Number of chat sessions
    pub chat_sessions: usize,
    /// Number of chat messages
    pub chat_messages: usize,
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Store Statistics:")?;
        writeln!(f, "  Users: {}", self.users)?;
        writeln!(f, "  Businesses: {}", self.businesses)?;
        writeln!(
            f,
            "  Documents: {} ({} processed)",
            self.documents, self.processed_documents
        )?;
        writeln!(f, "  Vector chunks: {}", self.vector_chunks)?;
        writeln!(f, "  Chat sessions: {}", self.chat_sessions)?;
        write!(f, "  Chat messages: {}", self.chat_messages)
    }
}
