use std::borrow::Cow;
use tokio::task::JoinError;

/// A specialized [`Result`](std::result::Result) alias for storage operations.
pub type Result<T, E = StorageError> = std::result::Result<T, E>;

/// A specialized [`StorageError`] enum of this crate.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Invalid file name{}: {message}", format_context(.context))]
    InvalidName { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Path traversal security violation{}: {message}", format_context(.context))]
    PathTraversal { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("File name space exhausted{}: {message}", format_context(.context))]
    ExhaustedNameSpace { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Storage is misconfigured{}: {message}", format_context(.context))]
    Misconfigured { message: Cow<'static, str>, context: Option<Cow<'static, str>> },

    #[error("Hardware I/O failure{}: {source}", format_context(.context))]
    Io { source: std::io::Error, context: Option<Cow<'static, str>> },

    #[error("Blocking task failure{}: {source}", format_context(.context))]
    Task { source: JoinError, context: Option<Cow<'static, str>> },
}

impl StorageError {
    /// Returns `true` for errors that indicate an attempt to escape the storage root.
    ///
    /// Callers are expected to report these separately from ordinary validation failures.
    #[must_use]
    pub const fn is_security_violation(&self) -> bool {
        matches!(self, Self::PathTraversal { .. })
    }

    fn context_mut(&mut self) -> &mut Option<Cow<'static, str>> {
        match self {
            Self::InvalidName { context, .. }
            | Self::PathTraversal { context, .. }
            | Self::ExhaustedNameSpace { context, .. }
            | Self::Misconfigured { context, .. }
            | Self::Io { context, .. }
            | Self::Task { context, .. } => context,
        }
    }
}

/// Adds `.context(...)` to results that can be turned into a [`StorageError`].
pub trait StorageErrorExt<T> {
    /// Attaches a human-readable context to the error, if any.
    ///
    /// # Errors
    /// Returns the (converted) original error with the context attached.
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, StorageError>;
}

impl<T> StorageErrorExt<T> for Result<T, StorageError> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Self {
        self.map_err(|mut e| {
            *e.context_mut() = Some(context.into());
            e
        })
    }
}

impl<T> StorageErrorExt<T> for Result<T, std::io::Error> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, StorageError> {
        self.map_err(|source| StorageError::Io { source, context: Some(context.into()) })
    }
}

impl<T> StorageErrorExt<T> for Result<T, JoinError> {
    #[inline]
    fn context(self, context: impl Into<Cow<'static, str>>) -> Result<T, StorageError> {
        self.map_err(|source| StorageError::Task { source, context: Some(context.into()) })
    }
}

impl From<std::io::Error> for StorageError {
    #[inline]
    fn from(source: std::io::Error) -> Self {
        Self::Io { source, context: None }
    }
}

impl From<JoinError> for StorageError {
    #[inline]
    fn from(source: JoinError) -> Self {
        Self::Task { source, context: None }
    }
}

#[allow(clippy::ref_option)]
fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_is_rendered() {
        let err: Result<()> = Err(StorageError::InvalidName { message: "..".into(), context: None });
        let err = err.context("Sanitizing upload").unwrap_err();
        assert_eq!(err.to_string(), "Invalid file name (Sanitizing upload): ..");
    }

    #[test]
    fn test_io_error_conversion() {
        let io: std::result::Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"));
        let err = io.context("Writing /tmp/x").unwrap_err();
        assert!(matches!(err, StorageError::Io { .. }));
        assert!(err.to_string().contains("(Writing /tmp/x)"));
        assert!(!err.is_security_violation());
    }

    #[test]
    fn test_security_violation_flag() {
        let err = StorageError::PathTraversal { message: "../etc".into(), context: None };
        assert!(err.is_security_violation());
    }
}
