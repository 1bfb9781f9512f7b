//! # CLI Argument Definitions
//!
//! Command-line structure of the `depot` binary, built with `clap` derive.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// The main CLI structure parsing command-line arguments.
#[derive(Debug, Parser)]
#[command(name = "depot")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(arg_required_else_help = true)]
#[command(about = "Store uploads under safe, collision-free file names")]
pub(crate) struct Cli {
    /// Configuration file (defaults to `depot.toml` in the working directory, if present)
    #[arg(short, long, global = true, value_name = "PATH")]
    pub(crate) config: Option<PathBuf>,

    /// Storage root directory, overrides `storage.root`
    #[arg(short, long, global = true, value_name = "DIR")]
    pub(crate) root: Option<PathBuf>,

    /// Public base URL of the root, overrides `storage.base_url`
    #[arg(long, global = true, value_name = "URL")]
    pub(crate) base_url: Option<String>,

    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub(crate) verbose: u8,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Store a local file (or stdin with `-`) and print the name it was saved under
    Save {
        /// File to upload, `-` reads from stdin
        source: PathBuf,

        /// Desired name, defaults to the source's file name
        #[arg(short, long)]
        name: Option<String>,

        /// Maximum length of the stored name in characters (0 disables the limit)
        #[arg(short, long, default_value_t = 0)]
        max_len: usize,

        /// Keep the desired name as given instead of sanitizing it
        #[arg(long)]
        raw: bool,
    },
    /// Print whether a stored name is taken
    Exists { name: String },
    /// Remove a stored file (missing files are ignored)
    Delete { name: String },
    /// Print the public URL of a stored name
    Url { name: String },
    /// Print the name `save` would use right now
    Available {
        name: String,

        /// Maximum length of the name in characters (0 disables the limit)
        #[arg(short, long, default_value_t = 0)]
        max_len: usize,
    },
    /// Print the sanitized form of a raw file name
    Sanitize { raw: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["depot", "save", "a.txt", "--root", "/srv", "-vv", "-m", "12"])
                .unwrap();
        assert_eq!(cli.root.as_deref(), Some(std::path::Path::new("/srv")));
        assert_eq!(cli.verbose, 2);
        assert!(matches!(cli.command, Command::Save { max_len: 12, raw: false, .. }));
    }
}
