//! Helpers for username input, log previews, and output directory checks.

use itertools::Itertools;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are cut to at most `max` bytes (on a character boundary) with
/// `"…(+N bytes)"` appended.
///
/// # Arguments
///
/// * `s` - The text to shorten
/// * `max` - Maximum number of bytes kept from `s`
///
/// # Returns
///
/// `s` unchanged when it fits, otherwise its prefix plus a count of the dropped bytes.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Parse a username list: one per line, `#` starts a comment, blanks ignored.
pub fn parse_username_list(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Merge usernames from the command line and an optional file, dropping
/// duplicates while keeping first-seen order.
///
/// # Arguments
///
/// * `from_args` - Usernames given positionally
/// * `input_file` - Optional file parsed with [`parse_username_list`]
///
/// # Returns
///
/// The combined list, or the I/O error from reading `input_file`.
pub async fn collect_usernames(
    from_args: &[String],
    input_file: Option<&Path>,
) -> Result<Vec<String>, Box<dyn Error>> {
    let mut names = from_args
        .iter()
        .map(|s| s.trim().trim_start_matches('@').to_string())
        .collect::<Vec<_>>();

    if let Some(path) = input_file {
        let text = fs::read_to_string(path).await?;
        names.extend(
            parse_username_list(&text)
                .into_iter()
                .map(|s| s.trim_start_matches('@').to_string()),
        );
    }

    Ok(names
        .into_iter()
        .filter(|s| !s.is_empty())
        .unique()
        .collect())
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then writes and removes a probe file.
///
/// # Arguments
///
/// * `path` - Output root to check
///
/// # Returns
///
/// `Ok(())` when the directory exists and accepts writes, otherwise the
/// underlying I/O error.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe = path.join("..__probe_write__");
    fs::write(&probe, b"").await?;
    let _ = fs::remove_file(&probe).await;
    info!("Output directory is writable");
    Ok(())
}
