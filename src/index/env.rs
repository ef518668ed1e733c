//! Scanner for environment variables.
//!
//! Laravel loads env files in priority order: values in .env override
//! .env.local, which overrides .env.example. A variable that ends up
//! commented out in the winning file counts as undefined, so commenting a
//! line in .env surfaces everywhere the variable is read.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::warn;

use super::{read_source, Entry, EntrySet};

/// A single variable definition in one env file.
#[derive(Debug, Clone)]
pub struct EnvVariable {
    pub name: String,
    /// Empty string when defined as `VAR=` with no value.
    pub value: String,
    pub file_path: PathBuf,
    /// Zero-based line where defined.
    pub line: u32,
    pub is_commented: bool,
}

/// Env files in reverse priority order; later files overwrite earlier
/// ones when merged.
const ENV_FILES: [&str; 3] = [".env.example", ".env.local", ".env"];

pub fn scan(root: &Path) -> EntrySet {
    let mut merged: HashMap<String, EnvVariable> = HashMap::new();

    for name in ENV_FILES {
        let path = root.join(name);
        if !path.exists() {
            continue;
        }
        let content = match read_source(&path) {
            Ok(content) => content,
            Err(err) => {
                warn!("{err}");
                continue;
            }
        };
        for var in parse_env_content(&content, &path) {
            merged.insert(var.name.clone(), var);
        }
    }

    let entries = merged
        .into_iter()
        .filter(|(_, var)| !var.is_commented)
        .map(|(name, var)| {
            (
                name,
                Entry::with_value(var.file_path, var.line, var.value),
            )
        })
        .collect();
    EntrySet::from_entries(entries)
}

/// Parse env content into variable definitions. Commented definitions are
/// kept and flagged, so they can shadow active ones from lower-priority
/// files.
pub fn parse_env_content(content: &str, file_path: &Path) -> Vec<EnvVariable> {
    let mut variables = Vec::new();

    for (line_idx, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }

        let is_commented = line.trim_start().starts_with('#');
        let working_line = if is_commented {
            line.trim_start().trim_start_matches('#').trim_start()
        } else {
            line
        };

        if let Some((name_part, value_part)) = working_line.split_once('=') {
            let name = name_part.trim();
            if name.is_empty() || name.contains(' ') {
                continue;
            }

            variables.push(EnvVariable {
                name: name.to_string(),
                value: parse_env_value(value_part),
                file_path: file_path.to_path_buf(),
                line: line_idx as u32,
                is_commented,
            });
        }
    }

    variables
}

/// Strip inline comments and surrounding quotes from a raw value.
///
/// .env values come in several shapes:
/// - APP_NAME=Laravel
/// - APP_NAME="My Application"
/// - APP_KEY='base64:abc123'
/// - DB_PASSWORD=secret # inline comment
fn parse_env_value(raw_value: &str) -> String {
    let trimmed = raw_value.trim();

    let value_before_comment = match find_comment_position(trimmed) {
        Some(comment_pos) => &trimmed[..comment_pos],
        None => trimmed,
    };

    let value = value_before_comment.trim();

    if value.len() >= 2 {
        if value.starts_with('"') && value.ends_with('"') {
            return value[1..value.len() - 1].to_string();
        }
        if value.starts_with('\'') && value.ends_with('\'') {
            return value[1..value.len() - 1].to_string();
        }
    }

    value.to_string()
}

/// Position of an inline `#` comment that is not inside quotes.
fn find_comment_position(s: &str) -> Option<usize> {
    let mut in_double_quotes = false;
    let mut in_single_quotes = false;

    for (i, ch) in s.char_indices() {
        match ch {
            '"' if !in_single_quotes => in_double_quotes = !in_double_quotes,
            '\'' if !in_double_quotes => in_single_quotes = !in_single_quotes,
            '#' if !in_double_quotes && !in_single_quotes => return Some(i),
            _ => {}
        }
    }

    None
}
