use crate::args::Command;
use anyhow::{Context, Result, bail};
use depot_storage::{
    FileSystemStorage, FileSystemStorageConfig, StorageBackend, StorageError, sanitize,
};
use std::path::Path;
use tracing::{info, warn};

/// Executes one subcommand and prints its result to stdout.
pub(crate) async fn run(command: Command, storage: Option<FileSystemStorageConfig>) -> Result<()> {
    if let Command::Sanitize { raw } = &command {
        println!("{}", sanitize(raw).context("Nothing usable is left of the name")?);
        return Ok(());
    }

    let Some(config) = storage else {
        bail!("No storage root configured; pass --root or set DEPOT__STORAGE__ROOT");
    };
    let storage = FileSystemStorage::builder()
        .config(config)
        .connect()
        .await
        .context("Failed to open storage")?;

    match command {
        Command::Save { source, name, max_len, raw } => {
            let desired = desired_name(&source, name, raw)?;
            let stored = save(&storage, &source, &desired, max_len).await?;
            info!(
                source = %source.display(),
                desired = %desired,
                stored = %stored,
                "Upload stored"
            );
            println!("{stored}");
        },
        Command::Exists { name } => {
            let exists = audit(storage.exists(&name).await, &name)
                .with_context(|| format!("Failed to check '{name}'"))?;
            println!("{exists}");
        },
        Command::Delete { name } => {
            audit(storage.delete(&name).await, &name)
                .with_context(|| format!("Failed to delete '{name}'"))?;
        },
        Command::Url { name } => {
            let url = audit(storage.url(&name), &name)
                .with_context(|| format!("Failed to build URL for '{name}'"))?;
            println!("{url}");
        },
        Command::Available { name, max_len } => {
            let available = audit(storage.get_available_filename(&name, max_len).await, &name)
                .with_context(|| format!("No available name for '{name}'"))?;
            println!("{available}");
        },
        Command::Sanitize { .. } => {},
    }

    Ok(())
}

/// Picks the name to store `source` under, sanitized unless `raw` is set.
fn desired_name(source: &Path, name: Option<String>, raw: bool) -> Result<String> {
    let name = match name {
        Some(name) => name,
        None if is_stdin(source) => bail!("Reading from stdin requires --name"),
        None => source
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .with_context(|| format!("Cannot derive a name from '{}'", source.display()))?,
    };

    if raw {
        return Ok(name);
    }
    sanitize(&name).with_context(|| format!("Nothing usable is left of '{name}'"))
}

async fn save(
    storage: &FileSystemStorage,
    source: &Path,
    desired: &str,
    max_len: usize,
) -> Result<String> {
    let result = if is_stdin(source) {
        storage.save(desired, tokio::io::stdin(), max_len).await
    } else {
        let file = tokio::fs::File::open(source)
            .await
            .with_context(|| format!("Failed to open '{}'", source.display()))?;
        storage.save(desired, file, max_len).await
    };

    audit(result, desired).with_context(|| format!("Failed to save '{desired}'"))
}

fn is_stdin(source: &Path) -> bool {
    source.as_os_str() == "-"
}

/// Reports attempts to escape the storage root as security events.
fn audit<T>(result: Result<T, StorageError>, name: &str) -> Result<T, StorageError> {
    if let Err(err) = &result
        && err.is_security_violation()
    {
        warn!(target: "depot::security", name, error = %err, "Blocked path traversal attempt");
    }
    result
}
