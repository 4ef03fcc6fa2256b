use crate::error::{BoundaryError, Result};
use crate::formats::FormatValidation;
use std::path::Path;

/// Largest upload accepted, in megabytes
pub const MAX_UPLOAD_MB: u64 = 50;

pub struct FormatValidator;

impl FormatValidator {
    /// Validate that a file exists and is readable
    pub fn validate_file_exists(path: &Path) -> FormatValidation {
        let mut validation = FormatValidation::default();

        if !path.exists() {
            validation.errors.push(format!("File not found: {}", path.display()));
            return validation;
        }
        if let Err(e) = std::fs::metadata(path) {
            validation.errors.push(format!("Cannot access file: {}", e));
        }

        validation
    }

    /// Validate that a file has one of the accepted extensions
    pub fn validate_extension(path: &Path, accepted: &[&str]) -> FormatValidation {
        let mut validation = FormatValidation::default();

        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if accepted.iter().any(|a| ext.eq_ignore_ascii_case(a)) => {}
            Some(ext) => {
                validation.errors.push(format!(
                    "Unexpected file extension: .{} (expected .{})",
                    ext,
                    accepted.join(" or .")
                ));
            }
            None => {
                validation
                    .errors
                    .push(format!("File has no extension (expected .{})", accepted.join(" or .")));
            }
        }

        validation
    }

    /// Validate file size is within the upload limit
    pub fn validate_file_size(path: &Path, max_size_mb: u64) -> FormatValidation {
        let mut validation = FormatValidation::default();

        match std::fs::metadata(path) {
            Ok(metadata) => {
                let size_mb = metadata.len() / (1024 * 1024);
                if metadata.len() == 0 {
                    validation.errors.push("File is empty".to_string());
                } else if size_mb > max_size_mb {
                    validation.errors.push(format!(
                        "File size ({} MB) exceeds maximum allowed size ({} MB)",
                        size_mb, max_size_mb
                    ));
                } else if size_mb > max_size_mb / 2 {
                    validation
                        .warnings
                        .push(format!("Large file ({} MB) may take longer to process", size_mb));
                }
            }
            Err(e) => {
                validation.errors.push(format!("Cannot read file metadata: {}", e));
            }
        }

        validation
    }

    /// Validate XML structure by attempting to parse
    pub fn validate_xml_structure(path: &Path) -> FormatValidation {
        let mut validation = FormatValidation::default();

        match std::fs::read_to_string(path) {
            Ok(content) => {
                use quick_xml::Reader;
                let mut reader = Reader::from_str(&content);
                reader.config_mut().trim_text(true);

                let mut saw_element = false;
                let mut depth = 0usize;
                loop {
                    match reader.read_event() {
                        Ok(quick_xml::events::Event::Eof) => {
                            if depth > 0 {
                                validation.errors.push(format!(
                                    "Invalid XML structure: {} unclosed element(s)",
                                    depth
                                ));
                            }
                            break;
                        }
                        Ok(quick_xml::events::Event::Start(_)) => {
                            saw_element = true;
                            depth += 1;
                        }
                        Ok(quick_xml::events::Event::End(_)) => depth = depth.saturating_sub(1),
                        Ok(quick_xml::events::Event::Empty(_)) => saw_element = true,
                        Err(e) => {
                            validation.errors.push(format!("Invalid XML structure: {}", e));
                            break;
                        }
                        _ => {}
                    }
                }

                if validation.is_valid() && !saw_element {
                    validation.errors.push("Invalid XML structure: no root element".to_string());
                }
            }
            Err(e) => {
                validation.errors.push(format!("Cannot read file: {}", e));
            }
        }

        validation
    }

    /// Validate JSON structure by attempting to parse
    pub fn validate_json_structure(path: &Path) -> FormatValidation {
        let mut validation = FormatValidation::default();

        match std::fs::read_to_string(path) {
            Ok(content) => {
                if let Err(e) = serde_json::from_str::<serde_json::Value>(&content) {
                    validation.errors.push(format!("Invalid JSON structure: {}", e));
                }
            }
            Err(e) => {
                validation.errors.push(format!("Cannot read file: {}", e));
            }
        }

        validation
    }

    /// Merge multiple validation results
    pub fn merge_validations(validations: Vec<FormatValidation>) -> FormatValidation {
        let mut merged = FormatValidation::default();

        for validation in validations {
            merged.errors.extend(validation.errors);
            merged.warnings.extend(validation.warnings);
        }

        merged
    }

    /// Convert a validation result to a Result type
    pub fn validation_to_result(validation: &FormatValidation, path: &Path) -> Result<()> {
        if !validation.is_valid() {
            Err(BoundaryError::geometry(
                path.file_name().and_then(|n| n.to_str()).unwrap_or("upload"),
                validation.errors.join("; "),
            ))
        } else {
            Ok(())
        }
    }
}

/// Checks shared by every reader before it parses anything
pub fn pre_read_validation(path: &Path, accepted_extensions: &[&str]) -> FormatValidation {
    let exists = FormatValidator::validate_file_exists(path);
    if !exists.is_valid() {
        return exists;
    }

    FormatValidator::merge_validations(vec![
        exists,
        FormatValidator::validate_extension(path, accepted_extensions),
        FormatValidator::validate_file_size(path, MAX_UPLOAD_MB),
    ])
}
