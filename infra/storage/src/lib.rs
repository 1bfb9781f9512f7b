//! Safe persistence of uploads under attacker-controlled file names.
//!
//! Uploaded content usually arrives with a file name chosen by whoever sent it. This crate turns
//! such names into something that can be written to disk without surprises: it cleans them up,
//! keeps them inside a storage root, and picks a fresh name when the desired one is taken.
//!
//! # Core Features
//!
//! - **Sanitization**: [`sanitize`] reduces any string to a bare `[A-Za-z0-9._-]` file name.
//! - **Sandbox Security**: [`PathGuard`] confines names to a canonical root; `..`, absolute paths
//!   and escaping symlinks are rejected as [`StorageError::PathTraversal`].
//! - **Collision Avoidance**: [`NameResolver`] appends cryptographically random suffixes and, under
//!   a length budget, truncates the original stem until the name fits.
//! - **Race Safety**: [`FileSystemStorage`] writes with exclusive create and re-resolves the name
//!   if another writer wins the race, so no lock is needed.
//!
//! # Architectural Overview
//!
//! 1.  **[`StorageBackend`]**: The capability set every backend provides.
//! 2.  **[`FileSystemStorage`]**: The local filesystem backend.
//! 3.  **[`FileSystemStorageBuilder`]**: A type-safe fluent builder for configuration.
//!
//! # Examples
//!
//! ```rust
//! use depot_storage::{FileSystemStorage, StorageBackend, StorageError, sanitize};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), StorageError> {
//!     // Use a temp directory for examples/tests
//!     # let tmp = tempfile::tempdir().unwrap();
//!     # let root = tmp.path().join("uploads");
//!     let storage = FileSystemStorage::builder().root(&root).create(true).connect().await?;
//!
//!     let name = sanitize("Quarterly report.pdf")?;
//!     let stored = storage.save(&name, &b"%PDF-1.7"[..], 0).await?;
//!     assert_eq!(stored, "Quarterly_report.pdf");
//!     assert!(storage.exists(&stored).await?);
//!
//!     // Escaping the root is refused before anything touches the disk.
//!     let err = storage.save("../outside.txt", &b""[..], 0).await.unwrap_err();
//!     assert!(err.is_security_violation());
//!
//!     storage.delete(&stored).await?;
//!     Ok(())
//! }
//! ```

mod backend;
mod builder;
mod config;
mod error;
mod filesystem;
mod resolver;
mod sanitize;
mod security;

pub use backend::StorageBackend;
pub use builder::FileSystemStorageBuilder;
pub use config::FileSystemStorageConfig;
pub use error::{Result, StorageError, StorageErrorExt};
pub use filesystem::{FileSystemInner, FileSystemStorage};
pub use resolver::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RANDOM_LENGTH, DEFAULT_SEPARATOR, NameResolver,
    RANDOM_STRING_CHARS, get_alternative_stem,
};
pub use sanitize::sanitize;
pub use security::{PathGuard, validate_filename};
