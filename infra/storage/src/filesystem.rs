//! Local filesystem backend.
//!
//! Files live directly under a canonical root at their relative name. Path checks and `lstat`
//! calls run on tokio's blocking pool; byte I/O goes through [`tokio::fs`].

use crate::backend::StorageBackend;
use crate::builder::FileSystemStorageBuilder;
use crate::error::{StorageError, StorageErrorExt};
use crate::resolver::NameResolver;
use crate::security::{PathGuard, validate_filename};
use std::io::ErrorKind;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncRead;
use tracing::{debug, warn};

/// The internal shared state of a [`FileSystemStorage`] instance.
#[derive(Debug)]
pub struct FileSystemInner {
    /// Confines every name to the canonical root.
    pub(crate) guard: PathGuard,
    /// Public base URL without trailing slashes.
    pub(crate) base_url: Option<String>,
    /// Collision policy used by `save`.
    pub(crate) resolver: NameResolver,
}

/// A thread-safe handle to a directory of uploads.
///
/// Every name is checked by a [`PathGuard`] before it reaches the filesystem, new files are
/// created exclusively (an existing entry is never overwritten) and colliding names are
/// replaced by random alternatives. No lock is taken: two concurrent saves of the same name
/// race on the exclusive create and the loser simply resolves another name.
///
/// This handle is internally reference-counted (`Arc`) and can be cheaply cloned
/// across threads or tasks.
///
/// # Example
///
/// ```rust
/// use depot_storage::{FileSystemStorage, StorageBackend, StorageError};
///
/// #[tokio::main]
/// async fn main() -> Result<(), StorageError> {
///     # let tmp = tempfile::tempdir().unwrap();
///     # let root = tmp.path().join("uploads");
///     let storage = FileSystemStorage::builder()
///         .root(&root)
///         .base_url("https://cdn.example.com/uploads/")
///         .connect()
///         .await?;
///
///     let first = storage.save("avatar.png", &b"png"[..], 0).await?;
///     let second = storage.save("avatar.png", &b"png"[..], 0).await?;
///     assert_eq!(first, "avatar.png");
///     assert_ne!(first, second);
///
///     assert_eq!(storage.url(&first)?, "https://cdn.example.com/uploads/avatar.png");
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    pub(crate) inner: Arc<FileSystemInner>,
}

impl Deref for FileSystemStorage {
    type Target = FileSystemInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl FileSystemStorage {
    #[must_use = "The storage is not initialized until you call .connect()"]
    pub fn builder() -> FileSystemStorageBuilder {
        FileSystemStorageBuilder::new()
    }

    /// The canonical root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        self.guard.root()
    }

    /// The public base URL, without trailing slashes.
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Resolves `filename` to its entry inside the root. A symlink in the final position is not
    /// followed, so the path designates the link itself.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::PathTraversal`] if the name escapes the root.
    /// Returns [`StorageError::InvalidName`] if the name has no final component.
    pub async fn path(&self, filename: &str) -> Result<PathBuf, StorageError> {
        let filename = filename.to_owned();
        self.blocking(move |guard| guard.join_entry(&filename)).await
    }

    /// Runs a path-checking job on the blocking pool.
    async fn blocking<T, F>(&self, job: F) -> Result<T, StorageError>
    where
        F: FnOnce(&PathGuard) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || job(&inner.guard))
            .await
            .context("Blocking filesystem task failed")?
    }
}

impl StorageBackend for FileSystemStorage {
    fn resolver(&self) -> &NameResolver {
        &self.inner.resolver
    }

    /// Checks for an entry without following a final symlink, so dangling links count.
    async fn exists(&self, filename: &str) -> Result<bool, StorageError> {
        let filename = filename.to_owned();
        self.blocking(move |guard| {
            let path = guard.join_entry(&filename)?;
            Ok(path.symlink_metadata().is_ok())
        })
        .await
    }

    async fn store<R>(
        &self,
        desired: &str,
        available: String,
        mut data: R,
        max_len: usize,
    ) -> Result<String, StorageError>
    where
        R: AsyncRead + Unpin + Send,
    {
        let mut filename = available;
        let mut collisions = 0;

        loop {
            let path = self.path(&filename).await?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).await.context(format!(
                    "Failed to create parent directories for {}",
                    path.display()
                ))?;
            }

            match fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => {
                    let written = write_new(file, &mut data, &path).await?;
                    debug!(path = %path.display(), bytes = written, "File saved");
                    return Ok(filename);
                },
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    collisions += 1;
                    if collisions > self.resolver.max_attempts() {
                        return Err(StorageError::ExhaustedNameSpace {
                            message: desired.to_owned().into(),
                            context: Some(
                                format!("Lost {collisions} create races in a row").into(),
                            ),
                        });
                    }
                    debug!(name = %filename, collisions, "File name taken during write, resolving again");
                    filename = self.get_available_filename(desired, max_len).await?;
                },
                Err(source) => {
                    return Err(StorageError::Io {
                        source,
                        context: Some(format!("Failed to create {}", path.display()).into()),
                    });
                },
            }
        }
    }

    async fn delete(&self, filename: &str) -> Result<(), StorageError> {
        let filename = filename.to_owned();
        self.blocking(move |guard| {
            let path = guard.join_entry(&filename)?;
            if path.symlink_metadata().is_err() {
                return Ok(());
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), "File deleted");
                    Ok(())
                },
                Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
                Err(source) => Err(StorageError::Io {
                    source,
                    context: Some(format!("Failed to delete: {}", path.display()).into()),
                }),
            }
        })
        .await
    }

    fn url(&self, filename: &str) -> Result<String, StorageError> {
        let Some(base_url) = self.base_url() else {
            return Err(StorageError::Misconfigured {
                message: "Public base URL is not set".into(),
                context: Some(format!("Building URL for '{filename}'").into()),
            });
        };
        validate_filename(filename, true)?;
        Ok(format!("{base_url}/{}", filename.trim_start_matches('/')))
    }
}

/// Streams `data` into a freshly created file and syncs it.
///
/// On failure the partial file is removed (best effort) before the error is returned.
async fn write_new<R>(mut file: fs::File, data: &mut R, path: &Path) -> Result<u64, StorageError>
where
    R: AsyncRead + Unpin + Send,
{
    let result = async {
        let written = tokio::io::copy(data, &mut file).await?;
        file.sync_all().await?;
        Ok::<_, std::io::Error>(written)
    }
    .await;

    match result {
        Ok(written) => Ok(written),
        Err(source) => {
            drop(file);
            if let Err(err) = fs::remove_file(path).await {
                warn!(path = %path.display(), error = %err, "Failed to remove partially written file");
            }
            Err(StorageError::Io {
                source,
                context: Some(format!("Write failed: {}", path.display()).into()),
            })
        },
    }
}
