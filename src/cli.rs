use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use kbsearch::search::DEFAULT_SEARCH_LIMIT;

#[derive(Debug, Parser)]
#[command(
    name = "kbsearch",
    about = "Index a directory tree by entry name and search it"
)]
pub struct Cli {
    /// Override the XDG data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Walk a directory tree and index every entry name
    Index(IndexArgs),
    /// Search indexed names
    Search(SearchArgs),
    /// Show index statistics
    Status(StatusArgs),
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Index --

#[derive(Debug, Parser)]
pub struct IndexArgs {
    /// Root of the tree to index
    pub path: PathBuf,

    /// Logical root used as the prefix of indexed paths
    /// (defaults to the canonical path of the tree)
    #[arg(long)]
    pub root: Option<String>,
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query
    pub query: String,

    /// Number of results to return
    #[arg(short = 'n', long, default_value_t = DEFAULT_SEARCH_LIMIT)]
    pub limit: usize,

    /// Output results as JSON
    #[arg(long)]
    pub json: bool,

    /// Output only paths (one per line)
    #[arg(long)]
    pub files: bool,
}

// -- Status --

#[derive(Debug, Parser)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "kbsearch",
            &mut std::io::stdout(),
        );
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn parse_search_defaults() {
        let cli = Cli::parse_from(["kbsearch", "search", "report"]);
        match cli.command {
            Command::Search(args) => {
                assert_eq!(args.query, "report");
                assert_eq!(args.limit, DEFAULT_SEARCH_LIMIT);
                assert!(!args.json);
                assert!(!args.files);
            }
            _ => panic!("expected search command"),
        }
    }

    #[test]
    fn parse_index_with_root() {
        let cli = Cli::parse_from([
            "kbsearch",
            "-vv",
            "index",
            "/tmp/tree",
            "--root",
            "root",
        ]);
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Index(args) => {
                assert_eq!(args.path, PathBuf::from("/tmp/tree"));
                assert_eq!(args.root.as_deref(), Some("root"));
            }
            _ => panic!("expected index command"),
        }
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
