//! Connection-string parsing and `.env` file synchronisation.
//!
//! Connection strings are line-delimited `KEY=value` text. Parsing splits
//! on the first `=` only (values may themselves contain `=`) and skips
//! lines without one, which also drops the empty segment a trailing
//! newline produces.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::debug;

use crate::types::{AzureError, AzureErrorKind, AzureResult};

pub fn parse_connection_string(raw: &str) -> Vec<(String, String)> {
    raw.split('\n')
        .filter_map(|line| {
            line.split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
        })
        .collect()
}

pub fn to_map(pairs: &[(String, String)]) -> HashMap<String, String> {
    pairs.iter().cloned().collect()
}

/// Merges settings into existing env-file content. Lines whose key matches
/// a setting are rewritten in place; everything else (comments, blanks,
/// unrelated keys) is kept; settings with no matching line are appended.
pub fn merge_env(existing: &str, settings: &[(String, String)]) -> String {
    let mut replaced: Vec<&str> = Vec::new();
    let mut out = String::new();

    for line in existing.lines() {
        match line.split_once('=') {
            Some((key, _)) => {
                if let Some((k, v)) = settings.iter().find(|(k, _)| k == key) {
                    out.push_str(k);
                    out.push('=');
                    out.push_str(v);
                    replaced.push(k);
                } else {
                    out.push_str(line);
                }
            }
            None => out.push_str(line),
        }
        out.push('\n');
    }

    for (key, value) in settings {
        if !replaced.contains(&key.as_str()) {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
    }
    out
}

/// Writes the parsed connection string into the env file at `path`,
/// creating the file when absent and preserving unrelated content.
pub fn sync_env_file(path: &Path, connection_string: &str) -> AzureResult<()> {
    let settings = parse_connection_string(connection_string);
    if settings.is_empty() {
        debug!("Connection string has no settings, leaving {} untouched", path.display());
        return Ok(());
    }

    let existing = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(AzureError::new(AzureErrorKind::Io, e.to_string())),
    };

    let merged = merge_env(&existing, &settings);
    fs::write(path, merged).map_err(|e| AzureError::new(AzureErrorKind::Io, e.to_string()))?;
    debug!("Wrote {} settings to {}", settings.len(), path.display());
    Ok(())
}

// ─── Tests ──────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_pairs() {
        let pairs = parse_connection_string("A=1\nB=2\n");
        assert_eq!(
            pairs,
            vec![("A".to_string(), "1".to_string()), ("B".to_string(), "2".to_string())]
        );
    }

    #[test]
    fn parses_without_trailing_newline() {
        let pairs = parse_connection_string("A=1\nB=2");
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1], ("B".to_string(), "2".to_string()));
    }

    #[test]
    fn splits_on_first_equals_only() {
        let pairs = parse_connection_string("A=x=y\n");
        assert_eq!(pairs, vec![("A".to_string(), "x=y".to_string())]);
    }

    #[test]
    fn skips_lines_without_equals() {
        let pairs = parse_connection_string("plain text\nA=1\n\n");
        assert_eq!(pairs, vec![("A".to_string(), "1".to_string())]);
    }

    #[test]
    fn merge_replaces_and_appends() {
        let existing = "# comment\nA=old\nUNRELATED=keep\n";
        let settings = vec![
            ("A".to_string(), "new".to_string()),
            ("B".to_string(), "2".to_string()),
        ];
        let merged = merge_env(existing, &settings);
        assert_eq!(merged, "# comment\nA=new\nUNRELATED=keep\nB=2\n");
    }

    #[test]
    fn merge_into_empty_file() {
        let settings = vec![("A".to_string(), "1".to_string())];
        assert_eq!(merge_env("", &settings), "A=1\n");
    }

    #[test]
    fn sync_creates_and_updates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");

        sync_env_file(&path, "COSMOSDB_URI=https://acct.documents.azure.com\nCOSMOSDB_PRIMARY_KEY=k1\n")
            .unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("COSMOSDB_URI=https://acct.documents.azure.com"));
        assert!(content.contains("COSMOSDB_PRIMARY_KEY=k1"));

        // Re-sync with a rotated key rewrites in place.
        sync_env_file(&path, "COSMOSDB_PRIMARY_KEY=k2\n").unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("COSMOSDB_PRIMARY_KEY=k2"));
        assert!(!content.contains("k1"));
        assert_eq!(content.matches("COSMOSDB_URI").count(), 1);
    }
}
