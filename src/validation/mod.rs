//! Input validation module
//!
//! Field rules for the complaint form. `status` is only required once the
//! user is signed in: anonymous submitters cannot set a resolution status.

use crate::models::Complaint;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' is required")]
    Required { field: &'static str },

    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Invalid file type: {mime_type}")]
    InvalidFileType { mime_type: String },

    #[error("File too large (max {max_mb} MB)")]
    FileTooLarge { max_mb: usize },
}

/// Verdict for a single form field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldVerdict {
    pub field: &'static str,
    pub error: Option<ValidationError>,
}

impl FieldVerdict {
    fn check(field: &'static str, result: Result<(), ValidationError>) -> Self {
        Self {
            field,
            error: result.err(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-field validity of one complaint, in form order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    verdicts: Vec<FieldVerdict>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.verdicts.iter().all(FieldVerdict::is_valid)
    }

    pub fn field(&self, name: &str) -> Option<&FieldVerdict> {
        self.verdicts.iter().find(|v| v.field == name)
    }

    pub fn missing_fields(&self) -> Vec<&'static str> {
        self.verdicts
            .iter()
            .filter(|v| matches!(v.error, Some(ValidationError::Required { .. })))
            .map(|v| v.field)
            .collect()
    }

    pub fn errors(&self) -> impl Iterator<Item = &ValidationError> {
        self.verdicts.iter().filter_map(|v| v.error.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldVerdict> {
        self.verdicts.iter()
    }
}

fn required_text(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required { field });
    }
    Ok(())
}

fn required_value<T>(field: &'static str, value: Option<&T>) -> Result<(), ValidationError> {
    value.map(|_| ()).ok_or(ValidationError::Required { field })
}

/// Validate a complaint for the current authentication state.
///
/// Pure: call it as often as needed, nothing is cached between calls.
pub fn validate_complaint(complaint: &Complaint, authenticated: bool) -> ValidationReport {
    let status = if authenticated {
        required_value("status", complaint.status.as_ref())
    } else {
        Ok(())
    };

    let email = match complaint.submitter_email.as_deref().map(str::trim) {
        Some(email) if !email.is_empty() && !validator::validate_email(email) => {
            Err(ValidationError::InvalidEmail)
        }
        _ => Ok(()),
    };

    ValidationReport {
        verdicts: vec![
            FieldVerdict::check("title", required_text("title", &complaint.title)),
            FieldVerdict::check(
                "description",
                required_text("description", &complaint.description),
            ),
            FieldVerdict::check(
                "created_at",
                required_value("created_at", complaint.created_at.as_ref()),
            ),
            FieldVerdict::check("response_deadline", Ok(())),
            FieldVerdict::check("status", status),
            FieldVerdict::check("responding_office", Ok(())),
            FieldVerdict::check("submitter_email", email),
        ],
    }
}

// =============================================================================
// Staged files
// =============================================================================

/// MIME types accepted by the CLI before a file is staged
const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.oasis.opendocument.text",
    "application/rtf",
    "image/jpeg",
    "image/png",
    "text/plain",
];

/// Extensions that must never reach the attachment store
const DANGEROUS_EXTENSIONS: &[&str] = &[
    ".exe", ".bat", ".cmd", ".com", ".msi", ".dll", ".sh", ".ps1", ".js", ".php", ".jar",
];

/// Check a local file before staging it.
///
/// The uploader itself stages anything it is given; this is the opt-in
/// filter callers apply first.
pub fn validate_staged_file(
    filename: &str,
    mime_type: &str,
    file_size: usize,
    max_size_bytes: usize,
) -> Result<(), ValidationError> {
    if file_size > max_size_bytes {
        return Err(ValidationError::FileTooLarge {
            max_mb: max_size_bytes / (1024 * 1024),
        });
    }

    if !ALLOWED_MIME_TYPES.contains(&mime_type) {
        return Err(ValidationError::InvalidFileType {
            mime_type: mime_type.to_string(),
        });
    }

    // Catches both "x.exe" and "x.exe.pdf"
    let lower = filename.to_lowercase();
    if let Some(ext) = DANGEROUS_EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext) || lower.contains(&format!("{}.", ext)))
    {
        return Err(ValidationError::InvalidFileType {
            mime_type: format!("filename contains dangerous extension: {}", ext),
        });
    }

    Ok(())
}
