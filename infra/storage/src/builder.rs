use crate::config::FileSystemStorageConfig;
use crate::error::{StorageError, StorageErrorExt};
use crate::filesystem::{FileSystemInner, FileSystemStorage};
use crate::resolver::NameResolver;
use crate::security::PathGuard;
use private::Sealed;
use std::borrow::Cow;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tracing::info;

#[derive(Debug, Clone)]
struct BuilderConfig {
    base_url: Option<String>,
    create: bool,
    resolver: NameResolver,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self { base_url: None, create: true, resolver: NameResolver::default() }
    }
}

#[derive(Debug, Default)]
pub struct NoRoot;
#[derive(Debug)]
pub struct WithRoot(PathBuf);

mod private {
    pub(super) trait Sealed {}
}
impl Sealed for NoRoot {}
impl Sealed for WithRoot {}

#[allow(private_bounds)]
#[derive(Debug, Default)]
pub struct FileSystemStorageBuilder<S: Sealed = NoRoot> {
    state: S,
    config: BuilderConfig,
}

#[allow(private_bounds)]
impl<S: Sealed> FileSystemStorageBuilder<S> {
    /// Sets the public location the storage root is served from.
    ///
    /// Empty values leave the storage without a base URL.
    #[must_use = "Sets the public base URL used by url()"]
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.config.base_url = (!base_url.is_empty()).then_some(base_url);
        self
    }

    #[must_use = "Sets whether the storage root should be created if it does not exist"]
    pub const fn create(mut self, enable: bool) -> Self {
        self.config.create = enable;
        self
    }

    #[must_use = "Sets the number of random characters used to resolve collisions"]
    pub fn random_length(mut self, random_length: usize) -> Self {
        self.config.resolver = self.config.resolver.with_random_length(random_length);
        self
    }

    #[must_use = "Sets the separator placed before random suffixes"]
    pub fn separator(mut self, separator: impl Into<Cow<'static, str>>) -> Self {
        self.config.resolver = self.config.resolver.with_separator(separator);
        self
    }

    #[must_use = "Sets how many candidate names are tried before giving up"]
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.config.resolver = self.config.resolver.with_max_attempts(max_attempts);
        self
    }

    fn transition<N: Sealed>(self, state: N) -> FileSystemStorageBuilder<N> {
        FileSystemStorageBuilder { state, config: self.config }
    }
}

impl FileSystemStorageBuilder<NoRoot> {
    #[must_use = "Creates a new storage builder with default configuration"]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "Sets the root directory path for the storage"]
    pub fn root(self, path: impl Into<PathBuf>) -> FileSystemStorageBuilder<WithRoot> {
        self.transition(WithRoot(path.into()))
    }

    /// Applies a whole [`FileSystemStorageConfig`], root included.
    #[must_use = "Applies deserialized settings to the storage builder"]
    pub fn config(self, config: FileSystemStorageConfig) -> FileSystemStorageBuilder<WithRoot> {
        let FileSystemStorageConfig { root, base_url, create, random_length, separator, max_attempts } =
            config;

        let builder = self
            .create(create)
            .random_length(random_length)
            .separator(separator)
            .max_attempts(max_attempts);
        let builder = match base_url {
            Some(base_url) => builder.base_url(base_url),
            None => builder,
        };
        builder.root(root)
    }
}

impl FileSystemStorageBuilder<WithRoot> {
    /// Consumes the configuration and opens the storage.
    ///
    /// 1. **Bootstrapping**: Creates the root directory if `create(true)` was set.
    /// 2. **Canonicalization**: Resolves the root to an absolute, physical path once; every
    ///    later path check is made against this value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Io`] if:
    /// - The root directory does not exist and `create` is false.
    /// - The process lacks permissions to create or resolve the root directory.
    ///
    /// Returns [`StorageError::Misconfigured`] if the root exists but is not a directory.
    pub async fn connect(self) -> Result<FileSystemStorage, StorageError> {
        let root = &self.state.0;

        if self.config.create {
            fs::create_dir_all(root)
                .await
                .context(format!("Failed to bootstrap storage root: {}", root.display()))?;
            info!(path = %root.display(), "Bootstrapped storage root directory");
        }

        let canonical = fs::canonicalize(root)
            .await
            .context(format!("Failed to resolve storage root: {}", root.display()))?;

        let metadata = fs::metadata(&canonical)
            .await
            .context(format!("Failed to inspect storage root: {}", canonical.display()))?;
        if !metadata.is_dir() {
            return Err(StorageError::Misconfigured {
                message: canonical.display().to_string().into(),
                context: Some("Storage root is not a directory".into()),
            });
        }

        let base_url = self.config.base_url.map(|url| url.trim_end_matches('/').to_owned());

        Ok(FileSystemStorage {
            inner: Arc::new(FileSystemInner {
                guard: PathGuard::from_canonical(canonical),
                base_url,
                resolver: self.config.resolver,
            }),
        })
    }
}
