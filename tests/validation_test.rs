//! Comprehensive unit tests for validation.rs module

use proptest::prelude::*;
use supportal_store::models::DocumentFile;
use supportal_store::validation::{InputValidator, MAX_CHAR_LENGTH, MAX_EMAIL_LENGTH};
use supportal_store::StoreError;

#[test]
fn test_validate_business_name_valid() {
    assert!(InputValidator::validate_business_name("Acme Support").is_ok());
}

#[test]
fn test_validate_business_name_empty() {
    assert!(matches!(
        InputValidator::validate_business_name(""),
        Err(StoreError::NotNull(_))
    ));
}

#[test]
fn test_validate_business_name_whitespace_only() {
    assert!(InputValidator::validate_business_name("   ").is_err());
}

#[test]
fn test_validate_business_name_exactly_255_chars() {
    assert!(InputValidator::validate_business_name(&"a".repeat(MAX_CHAR_LENGTH)).is_ok());
}

#[test]
fn test_validate_business_name_counts_characters() {
    // 255 multi-byte characters are still 255 characters
    assert!(InputValidator::validate_business_name(&"é".repeat(MAX_CHAR_LENGTH)).is_ok());
}

#[test]
fn test_validate_document_title_too_long() {
    let err = InputValidator::validate_document_title(&"t".repeat(256)).unwrap_err();
    assert!(matches!(err, StoreError::TooLong { ref field, max: 255 } if field == "title"));
}

#[test]
fn test_validate_username_too_long() {
    assert!(InputValidator::validate_username(&"u".repeat(151)).is_err());
    assert!(InputValidator::validate_username(&"u".repeat(150)).is_ok());
}

#[test]
fn test_validate_username_with_newline() {
    assert!(InputValidator::validate_username("al\nice").is_err());
}

#[test]
fn test_validate_session_id_control_characters() {
    assert!(InputValidator::validate_session_id("abc\u{7}").is_err());
    assert!(InputValidator::validate_session_id("5f0c-42e1").is_ok());
}

#[test]
fn test_validate_customer_name_optional() {
    assert!(InputValidator::validate_customer_name("").is_ok());
    assert!(InputValidator::validate_customer_name(&"n".repeat(256)).is_err());
}

#[test]
fn test_validate_email_valid() {
    assert!(InputValidator::validate_email("email", "ann@example.com").is_ok());
}

#[test]
fn test_validate_email_empty_allowed() {
    assert!(InputValidator::validate_email("customer_email", "").is_ok());
}

#[test]
fn test_validate_email_invalid() {
    for email in ["annexample.com", "ann@@example.com", "@example.com", "ann@example", "a nn@example.com"] {
        assert!(
            InputValidator::validate_email("email", email).is_err(),
            "{email} accepted"
        );
    }
}

#[test]
fn test_validate_email_too_long() {
    let email = format!("{}@example.com", "a".repeat(MAX_EMAIL_LENGTH));
    assert!(matches!(
        InputValidator::validate_email("email", &email),
        Err(StoreError::TooLong { .. })
    ));
}

#[test]
fn test_validate_chunk_index() {
    assert!(InputValidator::validate_chunk_index(0).is_ok());
    assert!(InputValidator::validate_chunk_index(-1).is_err());
}

#[test]
fn test_validate_embedding() {
    assert!(InputValidator::validate_embedding(&[0.5, -0.5]).is_ok());
    assert!(InputValidator::validate_embedding(&[]).is_err());
    assert!(InputValidator::validate_embedding(&[f32::INFINITY]).is_err());
}

#[test]
fn test_validate_message_content() {
    assert!(InputValidator::validate_message_content("Hi").is_ok());
    assert!(InputValidator::validate_message_content(" \n").is_err());
}

#[test]
fn test_validate_database_url() {
    assert!(InputValidator::validate_database_url("sqlite:data/supportal.db").is_ok());
    assert!(InputValidator::validate_database_url("sqlite:///tmp/a.db").is_ok());
    assert!(InputValidator::validate_database_url(":memory:").is_ok());
    assert!(InputValidator::validate_database_url("").is_err());
    assert!(InputValidator::validate_database_url("mysql://localhost").is_err());
}

#[test]
fn test_validate_file_extension_missing() {
    let err = InputValidator::validate_file_extension("README").unwrap_err();
    assert!(matches!(err, StoreError::InvalidFileExtension { ref extension } if extension.is_empty()));
}

proptest! {
    #[test]
    fn allowed_extensions_accepted_in_any_case(
        stem in "[a-zA-Z0-9_-]{1,40}",
        ext in prop::sample::select(vec!["pdf", "PDF", "Pdf", "docx", "DOCX", "txt", "TxT"]),
    ) {
        let name = format!("{stem}.{ext}");
        prop_assert!(InputValidator::validate_file_extension(&name).is_ok());

        let file = DocumentFile::upload(&name).unwrap();
        prop_assert!(file.as_str().starts_with("documents/"));
        prop_assert_eq!(file.extension(), ext.to_ascii_lowercase());
    }

    #[test]
    fn other_extensions_rejected(
        stem in "[a-z]{1,20}",
        ext in "[a-z]{1,5}",
    ) {
        prop_assume!(!["pdf", "docx", "txt"].contains(&ext.as_str()));
        let name = format!("{stem}.{ext}");
        let is_invalid_extension = matches!(
            DocumentFile::upload(&name),
            Err(StoreError::InvalidFileExtension { .. })
        );
        prop_assert!(is_invalid_extension);
    }

    #[test]
    fn char_fields_accept_up_to_limit(len in 1usize..=300) {
        let value = "x".repeat(len);
        prop_assert_eq!(
            InputValidator::validate_char_field("name", &value).is_ok(),
            len <= MAX_CHAR_LENGTH
        );
    }
}
