//! Command-line interface definitions for snapchat_dl.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Most options can also be provided through environment variables.

use crate::fetcher::DEFAULT_ENDPOINT;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Strategy used to find the embedded story payload in a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExtractorKind {
    /// Pattern-match the raw HTML.
    Regex,
    /// Parse the document and query for the script element.
    Html,
}

/// Command-line arguments for snapchat_dl.
///
/// # Examples
///
/// ```sh
/// # Download the current stories of two users into ./stories
/// snapchat_dl -P ./stories alice bob
///
/// # Read usernames from a file, four workers, keep metadata
/// snapchat_dl -u users.txt -t 4 --dump-json
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Usernames whose stories should be downloaded
    pub usernames: Vec<String>,

    /// File with one username per line (`#` starts a comment)
    #[arg(short = 'u', long)]
    pub input_file: Option<PathBuf>,

    /// Directory stories are saved under
    #[arg(short = 'P', long, env = "SNAPCHAT_DL_DIR", default_value = ".")]
    pub directory_prefix: PathBuf,

    /// Maximum number of concurrent downloads
    #[arg(short = 't', long, default_value_t = 2)]
    pub max_workers: usize,

    /// Download at most this many stories per user
    #[arg(short = 'l', long)]
    pub limit_story: Option<usize>,

    /// Seconds to wait after each download
    #[arg(short = 's', long, default_value_t = 1.0)]
    pub sleep_interval: f64,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Save each story's metadata as JSON next to the media file
    #[arg(short = 'j', long)]
    pub dump_json: bool,

    /// Base URL of the story site
    #[arg(long, env = "SNAPCHAT_DL_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// How to locate the story payload inside the page
    #[arg(long, value_enum, default_value_t = ExtractorKind::Regex)]
    pub extractor: ExtractorKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "snapchat_dl",
            "--directory-prefix",
            "/tmp/stories",
            "--max-workers",
            "4",
            "--limit-story",
            "3",
            "--dump-json",
            "alice",
            "bob",
        ]);

        assert_eq!(cli.usernames, vec!["alice", "bob"]);
        assert_eq!(cli.directory_prefix, PathBuf::from("/tmp/stories"));
        assert_eq!(cli.max_workers, 4);
        assert_eq!(cli.limit_story, Some(3));
        assert!(cli.dump_json);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from([
            "snapchat_dl",
            "-P",
            "out",
            "-t",
            "8",
            "-s",
            "0.5",
            "-q",
            "-j",
            "-u",
            "users.txt",
        ]);

        assert!(cli.usernames.is_empty());
        assert_eq!(cli.input_file, Some(PathBuf::from("users.txt")));
        assert_eq!(cli.directory_prefix, PathBuf::from("out"));
        assert_eq!(cli.max_workers, 8);
        assert_eq!(cli.sleep_interval, 0.5);
        assert!(cli.quiet);
        assert!(cli.dump_json);
    }

    #[test]
    fn test_cli_extractor_choice() {
        let cli = Cli::parse_from(["snapchat_dl", "--extractor", "html", "alice"]);
        assert_eq!(cli.extractor, ExtractorKind::Html);
    }
}
