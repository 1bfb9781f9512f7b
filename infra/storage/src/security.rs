use crate::error::StorageError;
use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};
use tracing::warn;

/// Confines relative file names to a canonical root directory.
///
/// The root is canonicalized exactly once, when the guard is created. Every [`PathGuard::join`]
/// then resolves the requested name against that root and refuses anything that ends up outside
/// of it, whether through `..` segments, absolute paths or symlinks.
#[derive(Debug, Clone)]
pub struct PathGuard {
    root: PathBuf,
}

impl PathGuard {
    /// Creates a guard for an existing directory.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if the root does not exist or cannot be resolved.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref();
        let canonical = root.canonicalize().map_err(|source| StorageError::Io {
            source,
            context: Some(format!("Failed to resolve storage root: {}", root.display()).into()),
        })?;
        Ok(Self::from_canonical(canonical))
    }

    /// Wraps a root that the caller has already canonicalized.
    pub(crate) const fn from_canonical(root: PathBuf) -> Self {
        Self { root }
    }

    /// The canonical root directory of this guard.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Joins `filename` onto the root and canonicalizes the result.
    ///
    /// Resolution is lenient about missing entries: the deepest existing ancestor is
    /// canonicalized and the missing tail is appended to it, so names that do not exist yet
    /// resolve just like existing ones. An empty name resolves to the root itself.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::PathTraversal`] if the name is absolute, contains a `..` segment,
    /// or resolves (e.g. through a symlink) outside the root.
    /// Returns [`StorageError::Io`] if the root itself can no longer be resolved.
    pub fn join(&self, filename: impl AsRef<Path>) -> Result<PathBuf, StorageError> {
        let filename = filename.as_ref();
        let relative = normalize_relative(filename)?;
        let resolved = canonicalize_lenient(&self.root, &self.root.join(relative))?;

        if resolved.starts_with(&self.root) {
            Ok(resolved)
        } else {
            warn!(
                name = %filename.display(),
                resolved = %resolved.display(),
                "Rejected file name resolving outside the storage root"
            );
            Err(StorageError::PathTraversal {
                message: resolved.display().to_string().into(),
                context: Some("Path resolves outside the storage root".into()),
            })
        }
    }

    /// Locates the directory entry named by `filename` without following it.
    ///
    /// The parent directories are resolved (and confined) like [`PathGuard::join`]; the final
    /// component is appended as is, so a symlink there designates the link itself.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidName`] if the name has no final component (e.g. `""`).
    /// Returns [`StorageError::PathTraversal`] under the same conditions as [`PathGuard::join`].
    pub fn join_entry(&self, filename: impl AsRef<Path>) -> Result<PathBuf, StorageError> {
        let filename = filename.as_ref();
        let relative = normalize_relative(filename)?;
        let Some(entry) = relative.file_name() else {
            return Err(StorageError::InvalidName {
                message: format!("Could not derive file name from '{}'", filename.display())
                    .into(),
                context: None,
            });
        };

        let parent = relative.parent().unwrap_or_else(|| Path::new(""));
        Ok(self.join(parent)?.join(entry))
    }
}

/// Checks the logical shape of a file name without touching the filesystem.
///
/// With `allow_relative` unset only bare names are accepted; with it set, nested relative
/// names are fine as long as they are not absolute and never mention `..`.
///
/// # Errors
///
/// Returns [`StorageError::InvalidName`] if the last component is empty, `.` or `..`, or if a
/// bare name was required and `filename` has directory parts.
/// Returns [`StorageError::PathTraversal`] if a relative name is absolute or contains `..`.
pub fn validate_filename(filename: &str, allow_relative: bool) -> Result<&str, StorageError> {
    let path = Path::new(filename);

    if path.file_name().is_none() {
        return Err(StorageError::InvalidName {
            message: format!("Could not derive file name from '{filename}'").into(),
            context: None,
        });
    }

    if allow_relative {
        if path.has_root()
            || path.is_absolute()
            || path.components().any(|c| matches!(c, Component::ParentDir))
        {
            warn!(name = filename, "Rejected path traversal attempt");
            return Err(StorageError::PathTraversal {
                message: filename.to_owned().into(),
                context: Some("Relative names must stay below the storage root".into()),
            });
        }
    } else if path.components().filter(|c| !matches!(c, Component::CurDir)).count() > 1 {
        return Err(StorageError::InvalidName {
            message: filename.to_owned().into(),
            context: Some("File name includes path elements".into()),
        });
    }

    Ok(filename)
}

/// Strips `.` segments and refuses anything that could climb out of the root.
fn normalize_relative(path: &Path) -> Result<PathBuf, StorageError> {
    let mut out = PathBuf::new();

    for c in path.components() {
        match c {
            Component::CurDir => {},
            Component::Normal(seg) => out.push(seg),
            Component::ParentDir => {
                warn!(name = %path.display(), "Rejected '..' segment in file name");
                return Err(StorageError::PathTraversal {
                    message: path.display().to_string().into(),
                    context: Some("Path attempted to escape sandbox via '..'".into()),
                });
            },
            Component::RootDir | Component::Prefix(_) => {
                warn!(name = %path.display(), "Rejected absolute file name");
                return Err(StorageError::PathTraversal {
                    message: path.display().to_string().into(),
                    context: Some("Absolute paths are not allowed in sandbox".into()),
                });
            },
        }
    }

    Ok(out)
}

/// Canonicalizes the deepest existing ancestor of `joined` and re-appends the missing tail.
///
/// `joined` must be `root` followed by plain segments only.
fn canonicalize_lenient(root: &Path, joined: &Path) -> Result<PathBuf, StorageError> {
    let mut missing: Vec<&OsStr> = Vec::new();
    let mut current = joined;

    loop {
        match current.canonicalize() {
            Ok(mut canonical) => {
                canonical.extend(missing.iter().rev());
                return Ok(canonical);
            },
            Err(source) if current == root => {
                return Err(StorageError::Io {
                    source,
                    context: Some(format!("Failed to resolve storage root: {}", root.display()).into()),
                });
            },
            Err(_) => {
                let (Some(parent), Some(name)) = (current.parent(), current.file_name()) else {
                    return Err(StorageError::PathTraversal {
                        message: joined.display().to_string().into(),
                        context: Some("No valid parent directory found within sandbox".into()),
                    });
                };
                missing.push(name);
                current = parent;
            },
        }
    }
}
