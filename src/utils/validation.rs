use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::mime;

// One rule set for uploads, field edits and the error messages quoting them.
pub const MAX_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
pub const MAX_FILE_COUNT: usize = 10;
pub const ALLOWED_TYPES: [&str; 5] = [mime::PDF, mime::DOCX, mime::XLSX, mime::JPEG, mime::PNG];
pub const FILE_NAME_MAX_CHARS: usize = 255;
pub const DESCRIPTION_MAX_CHARS: usize = 500;
pub const TAG_NAME_MAX_CHARS: usize = 50;
pub const KEYWORD_MAX_CHARS: usize = 100;

const BYTES_PER_MIB: u64 = 1024 * 1024;

/// The parts of a file that validation looks at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCandidate {
    pub name: String,
    pub mime_type: String,
    pub size: u64,
}

impl FileCandidate {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, size: u64) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationConfig {
    pub allowed_types: Vec<String>,
    pub max_size_bytes: u64,
    pub max_count: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            allowed_types: ALLOWED_TYPES.iter().map(|t| t.to_string()).collect(),
            max_size_bytes: MAX_FILE_SIZE_BYTES,
            max_count: MAX_FILE_COUNT,
        }
    }
}

impl ValidationConfig {
    pub fn with_max_count(mut self, max_count: usize) -> Self {
        self.max_count = max_count;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Checks upload candidates against the configured limits.
///
/// Too many files yields a single aggregate error and skips the per-file
/// checks. Otherwise every file contributes at most one type error and one
/// size error.
pub fn validate_files(files: &[FileCandidate], config: &ValidationConfig) -> ValidationResult {
    if files.len() > config.max_count {
        return ValidationResult::from_errors(vec![format!(
            "Too many files: up to {} files can be uploaded at once",
            config.max_count
        )]);
    }

    let mut errors = Vec::new();
    for file in files {
        if !config.allowed_types.iter().any(|t| t == &file.mime_type) {
            errors.push(format!(
                "{}: unsupported file format ({})",
                file.name, file.mime_type
            ));
        }
        if file.size > config.max_size_bytes {
            errors.push(format!(
                "{}: file exceeds the {} size limit",
                file.name,
                format_mib(config.max_size_bytes)
            ));
        }
    }
    ValidationResult::from_errors(errors)
}

pub fn validate_file(file: &FileCandidate, config: &ValidationConfig) -> ValidationResult {
    validate_files(std::slice::from_ref(file), config)
}

fn format_mib(bytes: u64) -> String {
    if bytes % BYTES_PER_MIB == 0 {
        format!("{}MB", bytes / BYTES_PER_MIB)
    } else {
        format!("{:.1}MB", bytes as f64 / BYTES_PER_MIB as f64)
    }
}

fn check_length(field: &str, value: &str, min: usize, max: usize) -> Result<(), String> {
    let len = value.chars().count();
    if len < min {
        Err(format!("{} must not be empty", field))
    } else if len > max {
        Err(format!("{} must be at most {} characters", field, max))
    } else {
        Ok(())
    }
}

pub fn validate_file_name(name: &str) -> Result<(), String> {
    check_length("File name", name.trim(), 1, FILE_NAME_MAX_CHARS)
}

pub fn validate_description(description: &str) -> Result<(), String> {
    check_length("Description", description, 0, DESCRIPTION_MAX_CHARS)
}

pub fn validate_tag_name(name: &str) -> Result<(), String> {
    check_length("Tag name", name.trim(), 1, TAG_NAME_MAX_CHARS)
}

pub fn validate_keyword(keyword: &str) -> Result<(), String> {
    check_length("Keyword", keyword, 0, KEYWORD_MAX_CHARS)
}

pub fn validate_date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Result<(), String> {
    match (from, to) {
        (Some(from), Some(to)) if from > to => {
            Err(format!("Start date {} is after end date {}", from, to))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf(name: &str, size: u64) -> FileCandidate {
        FileCandidate::new(name, mime::PDF, size)
    }

    #[test]
    fn accepts_allowed_file_within_limit() {
        let config = ValidationConfig::default();
        for size in [0, 1, MAX_FILE_SIZE_BYTES - 1, MAX_FILE_SIZE_BYTES] {
            let result = validate_file(&pdf("document.pdf", size), &config);
            assert!(result.valid, "size {} should pass", size);
            assert!(result.errors.is_empty());
        }
    }

    #[test]
    fn rejects_oversized_file_with_limit_in_message() {
        let config = ValidationConfig::default();
        for size in [MAX_FILE_SIZE_BYTES + 1, 11 * BYTES_PER_MIB] {
            let result = validate_file(&pdf("big.pdf", size), &config);
            assert!(!result.valid);
            assert_eq!(result.errors.len(), 1);
            assert!(result.errors[0].contains("10MB"), "{}", result.errors[0]);
        }
    }

    #[test]
    fn rejects_text_files_as_unsupported() {
        let candidate = FileCandidate::new("notes.txt", mime::guess_mime_type("notes.txt"), 12);
        let result = validate_file(&candidate, &ValidationConfig::default());
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("unsupported file format"));
    }

    #[test]
    fn every_allowed_type_passes() {
        let config = ValidationConfig::default();
        for name in ["a.pdf", "b.docx", "c.xlsx", "d.jpg", "e.jpeg", "f.png"] {
            let candidate = FileCandidate::new(name, mime::guess_mime_type(name), 100);
            assert!(validate_file(&candidate, &config).valid, "{} rejected", name);
        }
    }

    #[test]
    fn bad_type_and_size_report_both_errors() {
        let candidate = FileCandidate::new("movie.txt", "text/plain", 20 * BYTES_PER_MIB);
        let result = validate_file(&candidate, &ValidationConfig::default());
        assert_eq!(result.errors.len(), 2);
    }

    #[test]
    fn too_many_files_short_circuits() {
        let config = ValidationConfig::default().with_max_count(2);
        // Every file would fail per-file checks too; only the aggregate error is reported.
        let files = vec![
            FileCandidate::new("a.txt", "text/plain", 20 * BYTES_PER_MIB),
            FileCandidate::new("b.txt", "text/plain", 20 * BYTES_PER_MIB),
            FileCandidate::new("c.txt", "text/plain", 20 * BYTES_PER_MIB),
        ];
        let result = validate_files(&files, &config);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].contains("up to 2 files"));
    }

    #[test]
    fn exactly_max_count_is_allowed() {
        let config = ValidationConfig::default().with_max_count(2);
        let files = vec![pdf("a.pdf", 1), pdf("b.pdf", 1)];
        assert!(validate_files(&files, &config).valid);
    }

    #[test]
    fn validation_is_deterministic() {
        let config = ValidationConfig::default();
        let files = vec![pdf("a.pdf", 11 * BYTES_PER_MIB), FileCandidate::new("b.gif", "image/gif", 1)];
        assert_eq!(validate_files(&files, &config), validate_files(&files, &config));
    }

    #[test]
    fn non_integral_limits_keep_a_decimal() {
        let config = ValidationConfig {
            max_size_bytes: BYTES_PER_MIB + BYTES_PER_MIB / 2,
            ..ValidationConfig::default()
        };
        let result = validate_file(&pdf("a.pdf", 2 * BYTES_PER_MIB), &config);
        assert!(result.errors[0].contains("1.5MB"));
    }

    #[test]
    fn field_limits() {
        assert!(validate_file_name("a").is_ok());
        assert!(validate_file_name("   ").is_err());
        assert!(validate_file_name(&"x".repeat(255)).is_ok());
        assert!(validate_file_name(&"x".repeat(256)).is_err());
        assert!(validate_description("").is_ok());
        assert!(validate_description(&"d".repeat(501)).is_err());
        assert!(validate_tag_name(&"t".repeat(50)).is_ok());
        assert!(validate_tag_name(&"t".repeat(51)).is_err());
        assert!(validate_keyword(&"k".repeat(101)).is_err());
    }

    #[test]
    fn date_range_order() {
        let jan = NaiveDate::from_ymd_opt(2024, 1, 1);
        let feb = NaiveDate::from_ymd_opt(2024, 2, 1);
        assert!(validate_date_range(jan, feb).is_ok());
        assert!(validate_date_range(feb, jan).is_err());
        assert!(validate_date_range(None, jan).is_ok());
    }
}
