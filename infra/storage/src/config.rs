use crate::resolver::{DEFAULT_MAX_ATTEMPTS, DEFAULT_RANDOM_LENGTH, DEFAULT_SEPARATOR};
use serde::Deserialize;
use std::path::PathBuf;

/// Deserializable settings of a [`FileSystemStorage`](crate::FileSystemStorage).
///
/// Only `root` is required:
///
/// ```toml
/// [storage]
/// root = "/var/lib/depot/uploads"
/// base_url = "https://cdn.example.com/uploads/"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileSystemStorageConfig {
    /// Directory all files are stored under.
    pub root: PathBuf,
    /// Public location the root is served from; required only for `url`.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Create the root on connect if it is missing.
    #[serde(default = "default_create")]
    pub create: bool,
    #[serde(default = "default_random_length")]
    pub random_length: usize,
    #[serde(default = "default_separator")]
    pub separator: String,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

impl FileSystemStorageConfig {
    /// Settings with defaults for everything but the root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base_url: None,
            create: default_create(),
            random_length: default_random_length(),
            separator: default_separator(),
            max_attempts: default_max_attempts(),
        }
    }
}

const fn default_create() -> bool {
    true
}

const fn default_random_length() -> usize {
    DEFAULT_RANDOM_LENGTH
}

fn default_separator() -> String {
    DEFAULT_SEPARATOR.to_owned()
}

const fn default_max_attempts() -> usize {
    DEFAULT_MAX_ATTEMPTS
}
