//! Supportal Store - Multi-tenant Support Assistant Persistence
//!
//! A Rust library for storing the data behind a document-grounded customer
//! support assistant: businesses and their owners, uploaded documents, the
//! vector chunks derived from them, and chat sessions with their messages.
//!
//! # Features
//!
//! - Versioned SQLite migrations with dependency checks
//! - Column-level validation mirrored by database constraints
//! - Cascading deletes from owner down to chat messages
//! - Transcript export to multiple formats (TXT, CSV, JSON)
//! - Structured logging and metrics

/// Configuration management
pub mod config;
/// Database operations and connection pooling
pub mod db;
/// Error types
pub mod error;
/// Transcript export
pub mod export;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Schema migrations
pub mod migrations;
/// Data models and structures
pub mod models;
/// Database schema definitions
pub mod schema;
/// Input validation
pub mod validation;

// Re-export key components for easier access
pub use db::Database;
pub use error::{Result, StoreError};
pub use export::OutputFormat;
pub use migrations::{Migration, Migrator};
pub use models::{
    Business, ChatMessage, ChatSession, Document, MessageType, User, VectorChunk,
};
