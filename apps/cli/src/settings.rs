use config::{Config, Environment, File};
use depot_storage::FileSystemStorageConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_FILE: &str = "depot";
const ENV_PREFIX: &str = "DEPOT";

/// Settings of the `depot` binary.
///
/// ```toml
/// [storage]
/// root = "/var/lib/depot/uploads"
/// base_url = "https://cdn.example.com/uploads/"
///
/// [log]
/// path = "/var/log/depot"
/// json = true
/// ```
#[derive(Debug, Default, Deserialize)]
pub(crate) struct Settings {
    /// Absent until a root is configured somewhere.
    #[serde(default)]
    pub(crate) storage: Option<FileSystemStorageConfig>,
    #[serde(default)]
    pub(crate) log: LogSettings,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct LogSettings {
    /// Directive string replacing `RUST_LOG`, e.g. `depot_storage=debug`.
    pub(crate) filter: Option<String>,
    /// Directory for rolling log files; console only when unset.
    pub(crate) path: Option<PathBuf>,
    #[serde(default)]
    pub(crate) json: bool,
    pub(crate) max_files: Option<usize>,
}

/// Command-line values that take precedence over every other source.
#[derive(Debug, Default)]
pub(crate) struct Overrides {
    pub(crate) root: Option<PathBuf>,
    pub(crate) base_url: Option<String>,
}

/// Loads [`Settings`] in layers, later layers winning:
///
/// 1. **File**: `path` if given (then it must exist), otherwise an optional `depot.{toml,yaml,json}`
///    in the working directory.
/// 2. **Environment**: variables prefixed `DEPOT__`, nested with `__`
///    (e.g. `DEPOT__STORAGE__ROOT` maps to `storage.root`).
/// 3. **Overrides**: values passed on the command line.
///
/// # Errors
///
/// Returns an error if an explicit file is missing, a source is malformed, or the merged
/// values do not match [`Settings`].
pub(crate) fn load_config(
    path: Option<&Path>,
    overrides: Overrides,
) -> Result<Settings, config::ConfigError> {
    let file = path.map_or_else(
        || File::with_name(DEFAULT_CONFIG_FILE).required(false),
        |path| File::from(path).required(true),
    );

    Config::builder()
        .add_source(file)
        .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
        .set_override_option(
            "storage.root",
            overrides.root.map(|root| root.to_string_lossy().into_owned()),
        )?
        .set_override_option("storage.base_url", overrides.base_url)?
        .build()?
        .try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_file_and_overrides() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("custom.toml");
        fs::write(
            &file,
            "[storage]\nroot = \"/from/file\"\nbase_url = \"http://h/static/\"\nrandom_length = 4\n\n\
             [log]\njson = true\n",
        )
        .unwrap();

        let settings = load_config(Some(&file), Overrides::default()).unwrap();
        let storage = settings.storage.unwrap();
        assert_eq!(storage.root, Path::new("/from/file"));
        assert_eq!(storage.base_url.as_deref(), Some("http://h/static/"));
        assert_eq!(storage.random_length, 4);
        assert_eq!(storage.separator, "_");
        assert!(storage.create);
        assert!(settings.log.json);

        let overrides =
            Overrides { root: Some(PathBuf::from("/from/cli")), base_url: Some("http://cli".into()) };
        let storage = load_config(Some(&file), overrides).unwrap().storage.unwrap();
        assert_eq!(storage.root, Path::new("/from/cli"));
        assert_eq!(storage.base_url.as_deref(), Some("http://cli"));
        assert_eq!(storage.random_length, 4);
    }

    #[test]
    fn test_missing_explicit_file_fails() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("nope.toml");
        assert!(load_config(Some(&missing), Overrides::default()).is_err());
    }
}
