//! Configuration loading from environment variables.

use std::path::PathBuf;

pub const SEGMENT_BYTES_VAR: &str = "SEGLINE_SEGMENT_BYTES";
pub const SCRATCH_DIR_VAR: &str = "SEGLINE_SCRATCH_DIR";
pub const READ_ONLY_VAR: &str = "SEGLINE_READ_ONLY";

/// Runtime configuration shared by every document in a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorConfig {
    /// Byte budget at which loading closes a segment early.
    pub segment_bytes: u64,
    /// Directory for the scratch store; the system temp dir when unset.
    pub scratch_dir: Option<PathBuf>,
    /// Open every document read-only.
    pub read_only: bool,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            segment_bytes: editor_core::segment_chain::DEFAULT_SEGMENT_BYTES,
            scratch_dir: None,
            read_only: false,
        }
    }
}

/// Parse a boolean-like environment flag value.
///
/// - Truthy: `1`, `true`, `yes`, `on`
/// - Falsy: `0`, `false`, `no`, `off`, empty string
///
/// Matching is case-insensitive and ignores surrounding whitespace.
/// Unrecognised values give `None`.
#[must_use]
pub fn parse_env_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "" | "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn resolve_home_dir(lookup: &impl Fn(&str) -> Option<String>) -> Option<PathBuf> {
    ["HOME", "USERPROFILE"]
        .into_iter()
        .filter_map(lookup)
        .find(|home| !home.trim().is_empty())
        .map(PathBuf::from)
}

/// Expand a leading `~/` to the user's home directory.
fn expand_tilde(path: String, lookup: &impl Fn(&str) -> Option<String>) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = resolve_home_dir(lookup)
    {
        return home.join(rest);
    }

    PathBuf::from(path)
}

impl EditorConfig {
    /// Load configuration from the process environment, applying defaults
    /// for anything missing or unparsable.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`EditorConfig::from_env`] with a custom variable source.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let segment_bytes = match lookup(SEGMENT_BYTES_VAR) {
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(bytes) => bytes.max(1),
                Err(e) => {
                    tracing::warn!(value = %raw, error = %e, "ignoring {SEGMENT_BYTES_VAR}");
                    defaults.segment_bytes
                }
            },
            None => defaults.segment_bytes,
        };

        let scratch_dir = lookup(SCRATCH_DIR_VAR)
            .filter(|dir| !dir.trim().is_empty())
            .map(|dir| expand_tilde(dir, &lookup));

        let read_only = lookup(READ_ONLY_VAR)
            .and_then(|value| parse_env_flag(&value))
            .unwrap_or(defaults.read_only);

        Self {
            segment_bytes,
            scratch_dir,
            read_only,
        }
    }
}
