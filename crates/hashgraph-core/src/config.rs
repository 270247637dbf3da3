use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Environment variable overriding [`HashGraphConfig::semantics`].
pub const SEMANTICS_ENV: &str = "HASHGRAPH_SEMANTICS";

/// How many concurrent vertices a single policy call sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticsType {
    /// Exactly two vertices per call.
    Pair,
    /// A maximal mutually-concurrent set per call.
    #[default]
    Multiple,
}

impl SemanticsType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pair => "pair",
            Self::Multiple => "multiple",
        }
    }
}

impl fmt::Display for SemanticsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SemanticsType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pair" => Ok(Self::Pair),
            "multiple" => Ok(Self::Multiple),
            other => bail!("unknown semantics '{other}': expected pair or multiple"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashGraphConfig {
    #[serde(default)]
    pub semantics: SemanticsType,
    /// Starting bit-vector capacity for the causal index. Rounded up to a
    /// power of two; doubled whenever the graph outgrows it.
    #[serde(default = "default_bitset_capacity")]
    pub initial_bitset_capacity: usize,
}

impl Default for HashGraphConfig {
    fn default() -> Self {
        Self {
            semantics: SemanticsType::default(),
            initial_bitset_capacity: default_bitset_capacity(),
        }
    }
}

/// Load a config file. A missing file yields the defaults.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(path: &Path) -> Result<HashGraphConfig> {
    if !path.exists() {
        return Ok(HashGraphConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<HashGraphConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Load `<config_dir>/hashgraph/config.toml`, then apply environment overrides.
///
/// # Errors
///
/// Returns an error if the file is malformed or the override is not a known
/// semantics name.
pub fn load_user_config() -> Result<HashGraphConfig> {
    let config = match dirs::config_dir() {
        Some(dir) => load_config(&dir.join("hashgraph/config.toml"))?,
        None => HashGraphConfig::default(),
    };
    apply_overrides(config, env::var(SEMANTICS_ENV).ok())
}

fn apply_overrides(
    mut config: HashGraphConfig,
    env_semantics: Option<String>,
) -> Result<HashGraphConfig> {
    if let Some(raw) = env_semantics {
        config.semantics = raw
            .parse()
            .with_context(|| format!("Invalid {SEMANTICS_ENV}"))?;
    }
    Ok(config)
}

const fn default_bitset_capacity() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let cfg = load_config(&dir.path().join("absent.toml")).expect("load should succeed");
        assert_eq!(cfg, HashGraphConfig::default());
        assert_eq!(cfg.semantics, SemanticsType::Multiple);
        assert_eq!(cfg.initial_bitset_capacity, 1);
    }

    #[test]
    fn parses_partial_file() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "semantics = \"pair\"\n").expect("write config");

        let cfg = load_config(&path).expect("load should succeed");
        assert_eq!(cfg.semantics, SemanticsType::Pair);
        assert_eq!(cfg.initial_bitset_capacity, 1);
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "semantics = \"sideways\"\n").expect("write config");

        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn env_override_wins() {
        let cfg = apply_overrides(HashGraphConfig::default(), Some(" Pair ".to_string()))
            .expect("override should apply");
        assert_eq!(cfg.semantics, SemanticsType::Pair);
    }

    #[test]
    fn bad_env_override_is_rejected() {
        let err = apply_overrides(HashGraphConfig::default(), Some("triple".to_string()))
            .unwrap_err();
        assert!(err.to_string().contains(SEMANTICS_ENV));
    }

    #[test]
    fn semantics_round_trips() {
        for s in [SemanticsType::Pair, SemanticsType::Multiple] {
            assert_eq!(s.as_str().parse::<SemanticsType>().unwrap(), s);
        }
    }
}
