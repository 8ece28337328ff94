//! In-place localhost rewrite for dotenv files
//!
//! Works line by line so comments, blank lines, `export` prefixes and quoting
//! survive untouched; only the value part of a recognized assignment changes.

use super::resolver::RoleAssignment;
use super::rewrite::rewrite_host_literals;
use super::{backup_once, ComposeError};
use std::path::Path;
use tracing::debug;

/// Env files checked in every compose project, relative to the manifest
pub const CONVENTIONAL_ENV_FILES: &[&str] = &[
    ".env",
    ".env.local",
    ".env.development",
    "backend/.env",
    "server/.env",
    "api/.env",
];

/// Rewrites one `KEY=VALUE` line. `None` for comments, blanks, and lines that
/// need no change.
fn rewrite_line(line: &str, roles: &RoleAssignment) -> Option<String> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }

    let body = trimmed.strip_prefix("export ").unwrap_or(trimmed);
    let (key, value) = body.split_once('=')?;
    let key = key.trim();
    if key.is_empty() || key.contains(char::is_whitespace) {
        return None;
    }

    let new_value = rewrite_host_literals(key, value, roles)?;
    let prefix_len = line.len() - value.len();
    Some(format!("{}{}", &line[..prefix_len], new_value))
}

/// Returns the rewritten text, or `None` when nothing matched
pub fn rewrite_env_text(text: &str, roles: &RoleAssignment) -> Option<String> {
    let mut changed = false;
    let mut out = String::with_capacity(text.len());

    for raw in text.split_inclusive('\n') {
        let (line, ending) = match raw.strip_suffix("\r\n") {
            Some(line) => (line, "\r\n"),
            None => match raw.strip_suffix('\n') {
                Some(line) => (line, "\n"),
                None => (raw, ""),
            },
        };
        match rewrite_line(line, roles) {
            Some(new_line) => {
                changed = true;
                out.push_str(&new_line);
            }
            None => out.push_str(line),
        }
        out.push_str(ending);
    }

    changed.then_some(out)
}

/// Patches `path` in place, keeping a one-time backup. Returns whether the
/// file changed.
pub fn patch_env_file(path: &Path, roles: &RoleAssignment) -> Result<bool, ComposeError> {
    let text = std::fs::read_to_string(path).map_err(|source| ComposeError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let Some(rewritten) = rewrite_env_text(&text, roles) else {
        return Ok(false);
    };

    backup_once(path)?;
    std::fs::write(path, rewritten).map_err(|source| ComposeError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "Patched env file");
    Ok(true)
}
