//! # Validation Module
//!
//! Input validation for documents, remote records and credentials.
//!
//! ## Validation Points
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Points                                  │
//! │                                                                         │
//! │  login(email, password)                                                │
//! │  └── validate_email / validate_password before any network call        │
//! │                                                                         │
//! │  download_documents()                                                  │
//! │  └── validate_remote_document per record; a bad record is counted as   │
//! │      failed and the rest of the batch continues                        │
//! │                                                                         │
//! │  SQLite                                                                │
//! │  └── NOT NULL / UNIQUE constraints catch the rest                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::types::RemoteDocument;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a document filename (the natural join key).
///
/// Only emptiness is checked. Remote filenames are stored exactly as the
/// server sent them, separators and all.
///
/// ## Example
/// ```rust
/// use folio_core::validation::validate_filename;
///
/// assert!(validate_filename("scan-001.png").is_ok());
/// assert!(validate_filename("inbox/scan-002.png").is_ok());
/// assert!(validate_filename("  ").is_err());
/// ```
pub fn validate_filename(filename: &str) -> ValidationResult<()> {
    if filename.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "filename".to_string(),
        });
    }
    Ok(())
}

/// Validates a login email.
///
/// Only a shape check; the server is the authority.
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }

    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(ValidationError::InvalidFormat {
            field: "email".to_string(),
            reason: "must look like name@host".to_string(),
        }),
    }
}

/// Validates a login password.
pub fn validate_password(password: &str) -> ValidationResult<()> {
    if password.is_empty() {
        return Err(ValidationError::Required {
            field: "password".to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Record Validators
// =============================================================================

/// Validates a record received from `GET /documents/sync`.
///
/// The server is authoritative: scores, sizes and filenames are taken as
/// sent. A record is refused only when it has no id or no filename, since
/// neither lookup key could be stored.
pub fn validate_remote_document(doc: &RemoteDocument) -> ValidationResult<()> {
    if doc.id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    validate_filename(&doc.filename)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remote(id: &str, filename: &str) -> RemoteDocument {
        RemoteDocument {
            id: id.to_string(),
            filename: filename.to_string(),
            file_type: None,
            size: None,
            processed_data: None,
            extracted_text: None,
            confidence_score: None,
            status: None,
        }
    }

    #[test]
    fn test_validate_filename() {
        assert!(validate_filename("receipt.jpg").is_ok());
        assert!(validate_filename("inbox/receipt.jpg").is_ok());
        assert!(validate_filename(&"a".repeat(300)).is_ok());
        assert!(validate_filename("").is_err());
        assert!(validate_filename("   ").is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ops@example.com").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@example.com").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("hunter2").is_ok());
        assert!(validate_password("").is_err());
    }

    #[test]
    fn test_validate_remote_document() {
        assert!(validate_remote_document(&remote("1", "a.pdf")).is_ok());
        assert!(validate_remote_document(&remote("", "a.pdf")).is_err());
        assert!(validate_remote_document(&remote("1", "")).is_err());
    }

    #[test]
    fn test_validate_remote_document_accepts_server_values() {
        let mut doc = remote("1", "inbox\\b.pdf");
        doc.confidence_score = Some(95.0);
        doc.size = Some(-1);
        assert!(validate_remote_document(&doc).is_ok());
    }
}
