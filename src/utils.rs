//! Small string and file system helpers shared across the pipeline.
//!
//! - CDATA unwrapping for feed fields
//! - Character-safe truncation for bodies and log previews
//! - Slugification for published file names
//! - Output directory validation

use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Appended to text cut by [`truncate_chars`].
pub const TRUNCATION_MARKER: &str = "...";

/// Strip a literal `<![CDATA[ ... ]]>` wrapper, trimming whitespace on both
/// sides. Text without the wrapper is returned trimmed.
pub fn unwrap_cdata(s: &str) -> &str {
    let trimmed = s.trim();
    trimmed
        .strip_prefix("<![CDATA[")
        .and_then(|rest| rest.strip_suffix("]]>"))
        .map(str::trim)
        .unwrap_or(trimmed)
}

/// Keep at most `max` characters of `s`, appending [`TRUNCATION_MARKER`]
/// when anything was cut.
///
/// Counts `char`s rather than bytes; feed text is mostly Hangul.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}{}", &s[..idx], TRUNCATION_MARKER),
        None => s.to_string(),
    }
}

/// Truncate a string for logging purposes.
///
/// Long strings are cut to `max` characters with an ellipsis and a count of
/// the remaining bytes appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…(+{} bytes)", &s[..idx], s.len() - idx),
        None => s.to_string(),
    }
}

/// Convert a title to a file-name friendly slug.
///
/// Lowercases, drops punctuation, and joins words with hyphens. Hangul is
/// alphanumeric and survives as-is.
///
/// ```ignore
/// assert_eq!(slugify_title("Hello World"), "hello-world");
/// assert_eq!(slugify_title("청년 정책, 이렇게 바뀐다!"), "청년-정책-이렇게-바뀐다");
/// ```
pub fn slugify_title(title: &str) -> String {
    title
        .to_lowercase()
        .replace(|c: char| !c.is_alphanumeric() && c != ' ' && c != '-', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Ensure a directory exists and is writable.
///
/// Creates the directory if needed, then creates and removes a probe file.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_dir(path: &Path) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(path).await?;
    let probe_path = path.join("..__probe_write__");
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Output directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
