//! Canonical folder path resolution and legacy-scheme detection.
//!
//! Pure functions; the only failure mode is defaulting empty inputs to
//! fallback tokens. Every read of a stored path must go through
//! [`is_legacy_path`] so values produced by the deprecated scheme are
//! nulled out and re-resolved instead of trusted.

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

/// Path resolution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathConfig {
    /// Root folder under which all customer folders live.
    #[serde(default = "default_root")]
    pub root: String,
    /// Prefixes produced by the deprecated naming scheme.
    #[serde(default = "default_legacy_prefixes")]
    pub legacy_prefixes: Vec<String>,
}

fn default_root() -> String {
    "/FinFlow".to_string()
}

fn default_legacy_prefixes() -> Vec<String> {
    vec!["/finflow/".to_string()]
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            legacy_prefixes: default_legacy_prefixes(),
        }
    }
}

const FALLBACK_NAME: &str = "customer";
const FALLBACK_CODE: &str = "unknown";

/// Build the canonical folder path for a customer:
/// `<root>/customers/<code>-<slug>`.
#[must_use]
pub fn build_folder_path(code: &str, display_name: &str, config: &PathConfig) -> String {
    let code = code.trim();
    let code = if code.is_empty() { FALLBACK_CODE } else { code };

    let slug = slugify(display_name);
    let slug = if slug.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        slug
    };

    format!("{}/customers/{code}-{slug}", config.root)
}

/// True iff `path` was produced by the deprecated naming scheme.
///
/// Matching is case-insensitive: the schemes differed in casing as well as
/// structure, and remote paths are case-insensitive anyway.
#[must_use]
pub fn is_legacy_path(path: &str, config: &PathConfig) -> bool {
    let lower = path.to_lowercase();
    let canonical_prefix = format!("{}/customers/", config.root.to_lowercase());
    config
        .legacy_prefixes
        .iter()
        .any(|prefix| lower.starts_with(&prefix.to_lowercase()))
        && !lower.starts_with(&canonical_prefix)
}

/// Slugify a display name: NFKD-normalize, drop combining marks and
/// punctuation, collapse whitespace runs to `-`, lower-case.
fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_separator = false;

    for c in name.nfkd() {
        if c.is_whitespace() {
            if !slug.is_empty() {
                pending_separator = true;
            }
            continue;
        }
        if !c.is_alphanumeric() {
            // Combining marks (stripped diacritics) and punctuation.
            continue;
        }
        if pending_separator {
            slug.push('-');
            pending_separator = false;
        }
        slug.extend(c.to_lowercase());
    }

    slug
}
