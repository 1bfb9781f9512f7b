use crate::error::StorageError;
use crate::security::validate_filename;
use std::borrow::Cow;
use std::future::Future;
use std::path::{Component, Path};
use tracing::debug;

/// Alphabet of the random suffix: ASCII letters and digits.
pub const RANDOM_STRING_CHARS: &[char; 62] = &[
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
    't', 'u', 'v', 'w', 'x', 'y', 'z', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L',
    'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', '0', '1', '2', '3', '4',
    '5', '6', '7', '8', '9',
];

pub const DEFAULT_RANDOM_LENGTH: usize = 7;
pub const DEFAULT_SEPARATOR: &str = "_";
/// Upper bound on candidates tried for a single desired name.
pub const DEFAULT_MAX_ATTEMPTS: usize = 100;

/// Appends `sep` and `random_length` random alphanumeric characters to `stem`.
///
/// The suffix is drawn from an OS-seeded CSPRNG with rejection sampling, so every character of
/// [`RANDOM_STRING_CHARS`] is equally likely and stored names cannot be predicted.
#[must_use]
pub fn get_alternative_stem(stem: &str, random_length: usize, sep: &str) -> String {
    if random_length == 0 {
        return format!("{stem}{sep}");
    }
    let suffix = nanoid::format(nanoid::rngs::default, RANDOM_STRING_CHARS, random_length);
    format!("{stem}{sep}{suffix}")
}

/// Collision resolution policy for desired file names.
///
/// A resolver proposes `stem + separator + random` alternatives for a desired name until one
/// is free and, when a length budget is given, short enough. Over-long candidates are
/// shortened by cutting the *original* stem, never a previously randomized one.
///
/// # Example
///
/// ```rust
/// use depot_storage::{NameResolver, StorageError};
///
/// #[tokio::main]
/// async fn main() -> Result<(), StorageError> {
///     let resolver = NameResolver::default();
///
///     // Only "x.txt" is taken.
///     let name = resolver
///         .resolve("x.txt", 0, |candidate| async move { Ok::<_, StorageError>(candidate == "x.txt") })
///         .await?;
///
///     assert!(name.starts_with("x_") && name.ends_with(".txt"));
///     assert_eq!(name.len(), "x.txt".len() + 8);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameResolver {
    random_length: usize,
    separator: Cow<'static, str>,
    max_attempts: usize,
}

impl Default for NameResolver {
    fn default() -> Self {
        Self {
            random_length: DEFAULT_RANDOM_LENGTH,
            separator: Cow::Borrowed(DEFAULT_SEPARATOR),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl NameResolver {
    #[must_use = "Sets the number of random characters appended to colliding stems"]
    pub const fn with_random_length(mut self, random_length: usize) -> Self {
        self.random_length = random_length;
        self
    }

    #[must_use = "Sets the separator placed between a stem and its random suffix"]
    pub fn with_separator(mut self, separator: impl Into<Cow<'static, str>>) -> Self {
        self.separator = separator.into();
        self
    }

    #[must_use = "Sets how many candidates are tried before giving up"]
    pub const fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub const fn random_length(&self) -> usize {
        self.random_length
    }

    #[must_use]
    pub fn separator(&self) -> &str {
        &self.separator
    }

    #[must_use]
    pub const fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Returns `stem` with a fresh random suffix, using this resolver's settings.
    #[must_use]
    pub fn alternative_stem(&self, stem: &str) -> String {
        get_alternative_stem(stem, self.random_length, &self.separator)
    }

    /// Finds the first available name for `desired`.
    ///
    /// `exists` is checked for every candidate; `max_len` caps the candidate length in
    /// characters (`0` disables the cap). The desired name is normalized first (`.` segments,
    /// repeated and trailing `/` dropped); if that form is free and fits, it is returned as is.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::PathTraversal`] if `desired` is absolute or contains a `..` segment.
    /// Returns [`StorageError::InvalidName`] if no file name is left after normalization.
    /// Returns [`StorageError::ExhaustedNameSpace`] if truncation would consume the whole stem
    /// or no free candidate turned up within the attempt limit.
    /// Any error reported by `exists` is passed through.
    pub async fn resolve<F, Fut>(
        &self,
        desired: &str,
        max_len: usize,
        mut exists: F,
    ) -> Result<String, StorageError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<bool, StorageError>>,
    {
        let origin = DesiredName::parse(desired)?;
        let mut candidate = origin.normalized.clone();
        let mut attempts = 0;

        while exists(candidate.clone()).await? || exceeds(&candidate, max_len) {
            attempts += 1;
            if attempts > self.max_attempts {
                return Err(StorageError::ExhaustedNameSpace {
                    message: desired.to_owned().into(),
                    context: Some(
                        format!("No available file name after {} attempts", self.max_attempts)
                            .into(),
                    ),
                });
            }

            candidate = origin.alternative(self, max_len)?;
            debug!(desired, candidate = %candidate, attempts, "Trying alternative file name");
        }

        Ok(candidate)
    }
}

fn exceeds(candidate: &str, max_len: usize) -> bool {
    max_len > 0 && candidate.chars().count() > max_len
}

/// A desired name split into `<dir/><stem><.ext>`.
#[derive(Debug)]
struct DesiredName {
    /// Normalized form: no `.` segments, no repeated or trailing separators.
    normalized: String,
    dir: String,
    stem: String,
    extension: String,
}

impl DesiredName {
    fn parse(desired: &str) -> Result<Self, StorageError> {
        let mut segments = Vec::new();
        for c in Path::new(desired).components() {
            match c {
                Component::Normal(seg) => segments.push(seg.to_string_lossy()),
                Component::CurDir => {},
                Component::ParentDir => {
                    return Err(StorageError::PathTraversal {
                        message: desired.to_owned().into(),
                        context: Some("Detected path traversal in desired file name".into()),
                    });
                },
                Component::RootDir | Component::Prefix(_) => {
                    return Err(StorageError::PathTraversal {
                        message: desired.to_owned().into(),
                        context: Some("Desired file name is absolute".into()),
                    });
                },
            }
        }

        let Some(file) = segments.pop() else {
            return Err(StorageError::InvalidName {
                message: format!("Could not derive file name from '{desired}'").into(),
                context: None,
            });
        };
        validate_filename(&file, false)?;

        let dir: String = segments.iter().map(|seg| format!("{seg}/")).collect();

        // A leading dot does not start an extension, neither does a trailing one.
        let (stem, extension) = match file.rfind('.') {
            Some(i) if i > 0 && i + 1 < file.len() => file.split_at(i),
            _ => (&*file, ""),
        };

        Ok(Self {
            normalized: format!("{dir}{file}"),
            stem: stem.to_owned(),
            extension: extension.to_owned(),
            dir,
        })
    }

    fn with_stem(&self, stem: &str) -> String {
        format!("{}{stem}{}", self.dir, self.extension)
    }

    fn alternative(&self, resolver: &NameResolver, max_len: usize) -> Result<String, StorageError> {
        let candidate = self.with_stem(&resolver.alternative_stem(&self.stem));
        if max_len == 0 {
            return Ok(candidate);
        }

        let length = candidate.chars().count();
        if length <= max_len {
            return Ok(candidate);
        }

        let truncation = length - max_len;
        let keep = self.stem.chars().count().saturating_sub(truncation);
        if keep == 0 {
            return Err(StorageError::ExhaustedNameSpace {
                message: self.normalized.clone().into(),
                context: Some(
                    format!("Stem cannot be truncated to fit within {max_len} characters").into(),
                ),
            });
        }

        let cut = self.stem.char_indices().nth(keep).map_or(self.stem.len(), |(i, _)| i);
        Ok(self.with_stem(&resolver.alternative_stem(&self.stem[..cut])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn never(_: String) -> std::future::Ready<Result<bool, StorageError>> {
        std::future::ready(Ok(false))
    }

    fn is_random_part(s: &str) -> bool {
        s.chars().all(|c| RANDOM_STRING_CHARS.contains(&c))
    }

    #[test]
    fn test_alternative_stem_shape() {
        let stem = get_alternative_stem("report", 7, "_");
        let (head, random) = stem.split_at("report_".len());
        assert_eq!(head, "report_");
        assert_eq!(random.len(), 7);
        assert!(is_random_part(random));

        assert_eq!(get_alternative_stem("report", 0, "-"), "report-");
    }

    #[test]
    fn test_alternative_stems_differ() {
        let stems: HashSet<String> = (0..64).map(|_| get_alternative_stem("a", 7, "_")).collect();
        assert_eq!(stems.len(), 64);
    }

    #[tokio::test]
    async fn test_free_name_is_unchanged() {
        let resolver = NameResolver::default();
        assert_eq!(resolver.resolve("a.txt", 0, never).await.unwrap(), "a.txt");
        assert_eq!(resolver.resolve("dir/a.txt", 0, never).await.unwrap(), "dir/a.txt");
    }

    #[tokio::test]
    async fn test_desired_name_is_normalized() {
        let resolver = NameResolver::default();
        assert_eq!(resolver.resolve("./a.txt", 0, never).await.unwrap(), "a.txt");
        assert_eq!(resolver.resolve("dir/", 0, never).await.unwrap(), "dir");
        assert_eq!(resolver.resolve("a//./b.txt", 0, never).await.unwrap(), "a/b.txt");
        assert_eq!(resolver.resolve("a/.", 0, never).await.unwrap(), "a");

        let name = resolver
            .resolve("./up/x.txt", 0, |c| async move { Ok::<_, StorageError>(c == "up/x.txt") })
            .await
            .unwrap();
        assert!(name.starts_with("up/x_") && name.ends_with(".txt"), "{name}");
    }

    #[tokio::test]
    async fn test_collision_gets_random_suffix() {
        let resolver = NameResolver::default();
        let name = resolver
            .resolve("x.txt", 0, |c| async move { Ok::<_, StorageError>(c == "x.txt") })
            .await
            .unwrap();

        assert_ne!(name, "x.txt");
        let random = name.strip_prefix("x_").unwrap().strip_suffix(".txt").unwrap();
        assert_eq!(random.len(), 7);
        assert!(is_random_part(random));
    }

    #[tokio::test]
    async fn test_collision_keeps_directory_and_extension() {
        let resolver = NameResolver::default().with_separator("-").with_random_length(4);
        let name = resolver
            .resolve("up/archive.tar.gz", 0, |c| async move { Ok::<_, StorageError>(c == "up/archive.tar.gz") })
            .await
            .unwrap();

        assert!(name.starts_with("up/archive.tar-"), "{name}");
        assert!(name.ends_with(".gz"));
        assert_eq!(name.len(), "up/archive.tar.gz".len() + 5);
    }

    #[tokio::test]
    async fn test_dotfile_has_no_extension() {
        let resolver = NameResolver::default();
        let name =
            resolver.resolve(".env", 0, |c| async move { Ok::<_, StorageError>(c == ".env") }).await.unwrap();
        assert!(name.starts_with(".env_"));
        assert_eq!(name.len(), ".env".len() + 8);
    }

    #[tokio::test]
    async fn test_budget_truncates_original_stem() {
        let resolver = NameResolver::default();
        let desired = "verylongfilename.txt";
        let name = resolver.resolve(desired, 15, never).await.unwrap();

        assert_eq!(name.chars().count(), 15);
        assert!(name.starts_with("ver_"), "{name}");
        assert!(name.ends_with(".txt"));
    }

    #[tokio::test]
    async fn test_budget_with_collisions_stays_within_limit() {
        let resolver = NameResolver::default();
        let mut checks = 0;
        let name = resolver
            .resolve("photograph.jpeg", 16, |_| {
                checks += 1;
                let taken = checks < 4;
                async move { Ok::<_, StorageError>(taken) }
            })
            .await
            .unwrap();

        assert!(name.chars().count() <= 16);
        assert!(name.starts_with("pho_"), "{name}");
    }

    #[tokio::test]
    async fn test_budget_exhausted_for_short_stem() {
        let resolver = NameResolver::default();
        let err = resolver.resolve("a.txt", 3, never).await.unwrap_err();
        assert!(matches!(err, StorageError::ExhaustedNameSpace { .. }));
    }

    #[tokio::test]
    async fn test_attempt_limit() {
        let resolver = NameResolver::default().with_max_attempts(5);
        let err = resolver
            .resolve("busy.txt", 0, |_| async { Ok::<_, StorageError>(true) })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ExhaustedNameSpace { .. }));
    }

    #[tokio::test]
    async fn test_rejects_traversal_and_bad_names() {
        let resolver = NameResolver::default();

        let err = resolver.resolve("../etc/passwd", 0, never).await.unwrap_err();
        assert!(err.is_security_violation());

        let err = resolver.resolve("a/b/../c.txt", 0, never).await.unwrap_err();
        assert!(err.is_security_violation());

        let err = resolver.resolve("/etc/passwd", 0, never).await.unwrap_err();
        assert!(err.is_security_violation());

        for desired in ["", ".", "./"] {
            let err = resolver.resolve(desired, 0, never).await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidName { .. }), "{desired:?}");
        }
    }

    #[tokio::test]
    async fn test_existence_errors_are_propagated() {
        let resolver = NameResolver::default();
        let err = resolver
            .resolve("a.txt", 0, |c| async move {
                Err::<bool, _>(StorageError::Misconfigured { message: c.into(), context: None })
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Misconfigured { .. }));
    }
}
