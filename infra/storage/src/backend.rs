//! The capability set shared by every storage backend.

use crate::error::StorageError;
use crate::resolver::NameResolver;
use crate::security::validate_filename;
use std::future::Future;
use tokio::io::AsyncRead;

/// A place where uploads are persisted under collision-free, traversal-safe names.
///
/// Backends implement the primitive operations ([`exists`](Self::exists),
/// [`store`](Self::store), [`delete`](Self::delete), [`url`](Self::url)); name resolution and
/// the `save` sequence are provided on top of them:
///
/// 1. [`get_available_filename`](Self::get_available_filename) picks a free name, probing
///    [`exists`](Self::exists) through the backend's [`NameResolver`].
/// 2. [`store`](Self::store) writes the bytes, re-resolving if the name gets taken in between.
/// 3. The stored name is validated once more before it is handed back.
pub trait StorageBackend: Send + Sync {
    /// The collision policy of this backend.
    fn resolver(&self) -> &NameResolver;

    /// Reports whether `filename` is taken.
    ///
    /// Missing entries are simply `false`; only malformed names are errors.
    fn exists(&self, filename: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;

    /// Writes `data` under `available` without ever overwriting an existing entry.
    ///
    /// `desired` and `max_len` are what the caller originally asked for; backends use them to
    /// resolve a new name when `available` is claimed by someone else before the write. Returns
    /// the name the data was actually stored under.
    fn store<R>(
        &self,
        desired: &str,
        available: String,
        data: R,
        max_len: usize,
    ) -> impl Future<Output = Result<String, StorageError>> + Send
    where
        R: AsyncRead + Unpin + Send;

    /// Removes `filename`. Missing entries are not an error.
    fn delete(&self, filename: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Public URL of `filename`.
    ///
    /// # Errors
    /// Returns [`StorageError::Misconfigured`] if the backend has no public base URL.
    fn url(&self, filename: &str) -> Result<String, StorageError>;

    /// Persists `data` under a free name derived from `filename` and returns that name.
    ///
    /// `max_len` caps the stored name length in characters; `0` means unbounded.
    fn save<R>(
        &self,
        filename: &str,
        data: R,
        max_len: usize,
    ) -> impl Future<Output = Result<String, StorageError>> + Send
    where
        R: AsyncRead + Unpin + Send,
    {
        async move {
            let available = self.get_available_filename(filename, max_len).await?;
            let stored = self.store(filename, available, data, max_len).await?;
            validate_filename(&stored, true)?;
            Ok(stored)
        }
    }

    /// Returns `filename` itself if it is free and fits `max_len`, otherwise a free alternative.
    fn get_available_filename(
        &self,
        filename: &str,
        max_len: usize,
    ) -> impl Future<Output = Result<String, StorageError>> + Send {
        async move {
            self.resolver()
                .resolve(filename, max_len, move |candidate| async move {
                    self.exists(&candidate).await
                })
                .await
        }
    }

    /// Returns `stem` followed by the backend's separator and a random suffix.
    fn get_alternative_stem(&self, stem: &str) -> String {
        self.resolver().alternative_stem(stem)
    }
}
