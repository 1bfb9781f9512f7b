use crate::error::StorageError;
use unicode_normalization::UnicodeNormalization;

/// Derives a safe, bare file name from an untrusted string.
///
/// Surrounding whitespace is trimmed, inner spaces become `_`, the text is NFKD-normalized and
/// everything outside `[A-Za-z0-9._-]` is dropped. The result never carries path semantics.
///
/// # Errors
///
/// Returns [`StorageError::InvalidName`] if nothing usable is left (empty, `.` or `..`).
///
/// # Example
///
/// ```rust
/// use depot_storage::sanitize;
///
/// assert_eq!(sanitize("  my résumé (final).pdf ").unwrap(), "my_resume_final.pdf");
/// assert!(sanitize("..").is_err());
/// ```
pub fn sanitize(raw: &str) -> Result<String, StorageError> {
    let name: String = raw
        .trim()
        .replace(' ', "_")
        .nfkd()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        .collect();

    if matches!(name.as_str(), "" | "." | "..") {
        return Err(StorageError::InvalidName {
            message: format!("Could not derive file name from '{raw}'").into(),
            context: None,
        });
    }

    Ok(name)
}
