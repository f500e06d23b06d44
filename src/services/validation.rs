//! Client-side validation: file type acceptance and metadata limits.
//!
//! Everything here runs before any collaborator call.

use serde::Deserialize;
use thiserror::Error;

pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;
pub const CATEGORY_MAX_CHARS: usize = 50;

const PDF_MIME: &str = "application/pdf";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("No file selected")]
    MissingFile,
    #[error("Please upload an image (PNG, JPG, etc.) or a PDF file.")]
    UnsupportedFileType(String),
    #[error("Title is required")]
    TitleRequired,
    #[error("Title must be at most 100 characters")]
    TitleTooLong,
    #[error("Description must be at most 500 characters")]
    DescriptionTooLong,
    #[error("Category must be at most 50 characters")]
    CategoryTooLong,
}

/// Images of any subtype and PDFs are accepted.
pub fn is_accepted_file_type(mime: &str) -> bool {
    mime.starts_with("image/") || mime == PDF_MIME
}

pub fn ensure_accepted_file_type(mime: &str) -> Result<(), ValidationError> {
    if is_accepted_file_type(mime) {
        Ok(())
    } else {
        Err(ValidationError::UnsupportedFileType(mime.to_string()))
    }
}

/// Metadata as typed by the submitter.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct UploadMetadata {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
}

/// Metadata that passed validation. Blank optional fields are `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidMetadata {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
}

impl UploadMetadata {
    /// Check fields in order title, description, category and report the
    /// first violation. Lengths count characters, not bytes.
    pub fn validate(&self) -> Result<ValidMetadata, ValidationError> {
        let title_len = self.title.chars().count();
        if title_len == 0 {
            return Err(ValidationError::TitleRequired);
        }
        if title_len > TITLE_MAX_CHARS {
            return Err(ValidationError::TitleTooLong);
        }

        let description = non_empty(self.description.as_deref());
        if exceeds(description, DESCRIPTION_MAX_CHARS) {
            return Err(ValidationError::DescriptionTooLong);
        }

        let category = non_empty(self.category.as_deref());
        if exceeds(category, CATEGORY_MAX_CHARS) {
            return Err(ValidationError::CategoryTooLong);
        }

        Ok(ValidMetadata {
            title: self.title.clone(),
            description: description.map(str::to_string),
            category: category.map(str::to_string),
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn exceeds(value: Option<&str>, max: usize) -> bool {
    value.is_some_and(|v| v.chars().count() > max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn titled(title: &str) -> UploadMetadata {
        UploadMetadata {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn title_length_boundaries() {
        assert_eq!(titled("").validate(), Err(ValidationError::TitleRequired));
        assert!(titled("a").validate().is_ok());
        assert!(titled(&"a".repeat(100)).validate().is_ok());
        assert_eq!(
            titled(&"a".repeat(101)).validate(),
            Err(ValidationError::TitleTooLong)
        );
    }

    #[test]
    fn lengths_count_characters() {
        assert!(titled(&"é".repeat(100)).validate().is_ok());
    }

    #[test]
    fn first_violation_wins() {
        let metadata = UploadMetadata {
            title: String::new(),
            description: Some("d".repeat(501)),
            category: Some("c".repeat(51)),
        };
        assert_eq!(metadata.validate(), Err(ValidationError::TitleRequired));

        let metadata = UploadMetadata {
            title: "ok".into(),
            description: Some("d".repeat(501)),
            category: Some("c".repeat(51)),
        };
        assert_eq!(metadata.validate(), Err(ValidationError::DescriptionTooLong));

        let metadata = UploadMetadata {
            title: "ok".into(),
            description: Some("d".repeat(500)),
            category: Some("c".repeat(51)),
        };
        assert_eq!(metadata.validate(), Err(ValidationError::CategoryTooLong));
    }

    #[test]
    fn blank_optionals_become_none() {
        let metadata = UploadMetadata {
            title: "Receipt".into(),
            description: Some(String::new()),
            category: Some("Invoice".into()),
        };
        let valid = metadata.validate().unwrap();
        assert_eq!(valid.description, None);
        assert_eq!(valid.category.as_deref(), Some("Invoice"));
    }

    #[test]
    fn accepted_file_types() {
        assert!(is_accepted_file_type("image/png"));
        assert!(is_accepted_file_type("image/svg+xml"));
        assert!(is_accepted_file_type("application/pdf"));
        assert!(!is_accepted_file_type("application/pdf+zip"));
        assert!(!is_accepted_file_type("text/plain"));
        assert!(!is_accepted_file_type(""));
        assert_eq!(
            ensure_accepted_file_type("video/mp4"),
            Err(ValidationError::UnsupportedFileType("video/mp4".into()))
        );
    }
}
