//! Offline name rules: validation, normalization and generation.
//!
//! Validation mirrors the ARM naming restrictions per resource kind so
//! obviously bad names are rejected without a network call. Generation
//! derives a conservative candidate from the project name (lowercase
//! alphanumerics and hyphens work for every kind) and appends a clock
//! suffix; uniqueness is only ever confirmed by live validation.

use chrono::Utc;

use crate::types::ResourceKind;

struct NameRules {
    min: usize,
    max: usize,
}

impl NameRules {
    fn for_kind(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::AppService | ResourceKind::Functions => Self { min: 2, max: 60 },
            ResourceKind::CosmosDb => Self { min: 3, max: 44 },
            ResourceKind::ResourceGroup => Self { min: 1, max: 90 },
        }
    }
}

fn fallback_base(kind: ResourceKind) -> &'static str {
    match kind {
        ResourceKind::AppService => "app",
        ResourceKind::CosmosDb => "cosmos",
        ResourceKind::Functions => "function",
        ResourceKind::ResourceGroup => "rg",
    }
}

/// Checks a name against the offline rules for its kind. Returns `None`
/// when the name is well formed, otherwise a human-readable reason.
pub fn check(kind: ResourceKind, name: &str) -> Option<String> {
    let rules = NameRules::for_kind(kind);
    if name.len() < rules.min || name.len() > rules.max {
        return Some(format!(
            "Name must be between {} and {} characters",
            rules.min, rules.max
        ));
    }

    match kind {
        ResourceKind::AppService | ResourceKind::Functions => {
            if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
                return Some("Name may only contain letters, numbers, and hyphens".into());
            }
            if name.starts_with('-') || name.ends_with('-') {
                return Some("Name must not start or end with a hyphen".into());
            }
        }
        ResourceKind::CosmosDb => {
            if !name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            {
                return Some("Name may only contain lowercase letters, numbers, and hyphens".into());
            }
            if name.starts_with('-') || name.ends_with('-') {
                return Some("Name must not start or end with a hyphen".into());
            }
        }
        ResourceKind::ResourceGroup => {
            if !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '(' | ')' | '.'))
            {
                return Some(
                    "Name may only contain letters, numbers, hyphens, underscores, periods, and parentheses"
                        .into(),
                );
            }
            if name.ends_with('.') {
                return Some("Name must not end with a period".into());
            }
        }
    }
    None
}

/// Lowercases the project name, maps separators to hyphens, drops anything
/// else, and falls back to a per-kind base when nothing survives.
pub fn normalize(kind: ResourceKind, project: &str) -> String {
    let mut out = String::with_capacity(project.len());
    for c in project.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if matches!(c, ' ' | '_' | '-' | '.') && !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    let out = out.trim_matches('-').to_string();
    if out.is_empty() {
        fallback_base(kind).to_string()
    } else {
        out
    }
}

/// Builds a candidate from a normalized core plus a given suffix, keeping
/// the whole name inside the kind's length bound.
pub fn candidate(kind: ResourceKind, project: &str, suffix: &str) -> String {
    let rules = NameRules::for_kind(kind);
    let mut core = normalize(kind, project);
    let limit = rules.max.saturating_sub(suffix.len() + 1);
    core.truncate(limit);
    let core = core.trim_end_matches('-');
    format!("{}-{}", core, suffix)
}

/// Generates a well-formed candidate name for the kind. The caller is
/// expected to run it through live validation before use.
pub fn generate(kind: ResourceKind, project: &str) -> String {
    candidate(kind, project, &clock_suffix())
}

/// Six-digit suffix from the wall clock, enough to dodge collisions
/// between generations of the same project name.
fn clock_suffix() -> String {
    let secs = Utc::now().timestamp().unsigned_abs();
    format!("{:06}", secs % 1_000_000)
}

// ─── Tests ──────────────────────────────────────────────────────────
