use std::env;
use std::path::{Path, PathBuf};

// ── Environment keys ────────────────────────────────────────────────────

/// Input JSONL used when the command line names none.
pub const ENV_INPUT: &str = "AEGIS_INPUT";

/// Output JSONL used when the command line names none.
pub const ENV_OUTPUT: &str = "AEGIS_OUTPUT";

/// Seed for the normalize-mode shuffle; unset means a fresh random order.
pub const ENV_SHUFFLE_SEED: &str = "AEGIS_SHUFFLE_SEED";

/// Whether normalize mode shuffles at all.
pub const ENV_SHUFFLE: &str = "AEGIS_SHUFFLE";

const DEFAULT_SHUFFLE: bool = true;

// ── Config struct ───────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PrepConfig {
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub shuffle: bool,
    pub shuffle_seed: Option<u64>,
}

impl PrepConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Resolve from an arbitrary key lookup, so tests need not touch the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let home = dirs::home_dir();
        let path = |key: &str| {
            lookup(key)
                .filter(|val| !val.trim().is_empty())
                .map(|val| expand_tilde(val.trim(), home.as_deref()))
        };

        Self {
            input: path(ENV_INPUT),
            output: path(ENV_OUTPUT),
            shuffle: lookup(ENV_SHUFFLE)
                .map(|val| parse_bool(&val))
                .unwrap_or(DEFAULT_SHUFFLE),
            shuffle_seed: lookup(ENV_SHUFFLE_SEED).and_then(|val| val.trim().parse::<u64>().ok()),
        }
    }
}

fn parse_bool(val: &str) -> bool {
    matches!(
        val.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn expand_tilde(input: &str, home: Option<&Path>) -> PathBuf {
    if let (Some(rest), Some(home)) = (input.strip_prefix("~/"), home) {
        return home.join(rest);
    }
    PathBuf::from(input)
}
