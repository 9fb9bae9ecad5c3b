use std::path::Path;

use crate::error::{Result, StoreError};
use crate::models::ALLOWED_DOCUMENT_EXTENSIONS;

/// Maximum length of short text columns (names, titles, session ids)
pub const MAX_CHAR_LENGTH: usize = 255;

/// Maximum length of an email address
pub const MAX_EMAIL_LENGTH: usize = 254;

/// Maximum length of a username
pub const MAX_USERNAME_LENGTH: usize = 150;

/// Validation utilities run before every write
#[derive(Debug, Copy, Clone)]
pub struct InputValidator;

impl InputValidator {
    /// Reject blank values for a required field
    pub fn validate_required(field: &str, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(StoreError::NotNull(field.to_string()));
        }
        Ok(())
    }

    /// Reject values longer than `max` characters
    pub fn validate_max_length(field: &str, value: &str, max: usize) -> Result<()> {
        if value.chars().count() > max {
            return Err(StoreError::TooLong {
                field: field.to_string(),
                max,
            });
        }
        Ok(())
    }

    /// Validate a required short text column (≤255 characters)
    pub fn validate_char_field(field: &str, value: &str) -> Result<()> {
        Self::validate_required(field, value)?;
        Self::validate_max_length(field, value, MAX_CHAR_LENGTH)
    }

    /// Validate username
    pub fn validate_username(username: &str) -> Result<()> {
        Self::validate_required("username", username)?;
        Self::validate_max_length("username", username, MAX_USERNAME_LENGTH)?;

        if username.contains('\0') || username.contains('\r') || username.contains('\n') {
            return Err(StoreError::Validation(
                "username contains invalid characters".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate business name
    pub fn validate_business_name(name: &str) -> Result<()> {
        Self::validate_char_field("name", name)
    }

    /// Validate document title
    pub fn validate_document_title(title: &str) -> Result<()> {
        Self::validate_char_field("title", title)
    }

    /// Validate the extension of an uploaded file name
    pub fn validate_file_extension(file_name: &str) -> Result<()> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        if !ALLOWED_DOCUMENT_EXTENSIONS.contains(&extension.as_str()) {
            return Err(StoreError::InvalidFileExtension { extension });
        }

        Ok(())
    }

    /// Validate external chat session identifier
    pub fn validate_session_id(session_id: &str) -> Result<()> {
        Self::validate_char_field("session_id", session_id)?;

        if session_id.chars().any(char::is_control) {
            return Err(StoreError::Validation(
                "session_id contains control characters".to_string(),
            ));
        }

        Ok(())
    }

    /// Validate optional customer name
    pub fn validate_customer_name(name: &str) -> Result<()> {
        Self::validate_max_length("customer_name", name, MAX_CHAR_LENGTH)
    }

    /// Validate email format; an empty string is accepted for optional fields
    pub fn validate_email(field: &str, email: &str) -> Result<()> {
        if email.is_empty() {
            return Ok(());
        }

        Self::validate_max_length(field, email, MAX_EMAIL_LENGTH)?;

        let Some((local_part, domain_part)) = email.split_once('@') else {
            return Err(StoreError::Validation(format!("{field} must contain @ symbol")));
        };

        if domain_part.contains('@') {
            return Err(StoreError::Validation(format!(
                "{field} must have exactly one @ symbol"
            )));
        }

        if local_part.is_empty() || local_part.len() > 64 {
            return Err(StoreError::Validation(format!("{field} local part invalid")));
        }

        if domain_part.is_empty()
            || !domain_part.contains('.')
            || domain_part.starts_with('.')
            || domain_part.ends_with('.')
        {
            return Err(StoreError::Validation(format!("{field} domain invalid")));
        }

        if email.chars().any(char::is_whitespace) {
            return Err(StoreError::Validation(format!("{field} contains whitespace")));
        }

        Ok(())
    }

    /// Validate chunk position
    pub fn validate_chunk_index(chunk_index: i32) -> Result<()> {
        if chunk_index < 0 {
            return Err(StoreError::Validation(format!(
                "chunk_index must be zero or greater, got {chunk_index}"
            )));
        }
        Ok(())
    }

    /// Validate an embedding vector
    pub fn validate_embedding(embedding: &[f32]) -> Result<()> {
        if embedding.is_empty() {
            return Err(StoreError::NotNull("embedding".to_string()));
        }

        if let Some(position) = embedding.iter().position(|v| !v.is_finite()) {
            return Err(StoreError::Validation(format!(
                "embedding contains a non-finite value at position {position}"
            )));
        }

        Ok(())
    }

    /// Validate message content
    pub fn validate_message_content(content: &str) -> Result<()> {
        Self::validate_required("content", content)
    }

    /// Validate database URL
    pub fn validate_database_url(url: &str) -> Result<()> {
        if url.trim().is_empty() {
            return Err(StoreError::InvalidConfig("Database URL cannot be empty".to_string()));
        }

        if url != ":memory:" && !url.starts_with("sqlite:") {
            return Err(StoreError::InvalidConfig(
                "Only SQLite databases are supported".to_string(),
            ));
        }

        if url.len() > 1000 {
            return Err(StoreError::InvalidConfig("Database URL too long".to_string()));
        }

        Ok(())
    }
}
