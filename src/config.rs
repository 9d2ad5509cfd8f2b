use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Pipeline configuration, read from `depcorpus.toml` when present.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CorpusConfig {
    pub github: GithubConfig,
    pub git: GitConfig,
    pub extractor: ExtractorConfig,
    pub line_counter: LineCounterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub api_base: String,
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            user_agent: concat!("depcorpus/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    pub program: String,
    pub clone_base_url: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            program: "git".to_string(),
            clone_base_url: "https://github.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub program: String,
    pub language: String,
    pub memory_flag: String,
    pub memory_ceiling: String,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            program: "neodepends".to_string(),
            language: "java".to_string(),
            memory_flag: "depends-xmx".to_string(),
            memory_ceiling: "12G".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LineCounterConfig {
    pub program: String,
    pub chunk_size: usize,
}

impl Default for LineCounterConfig {
    fn default() -> Self {
        Self {
            program: "scc".to_string(),
            chunk_size: 128,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("depcorpus.toml")
}

/// Load the config file; an absent file yields the defaults
pub fn load_config(path: Option<&Path>) -> anyhow::Result<CorpusConfig> {
    let explicit = path.is_some();
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        if explicit {
            anyhow::bail!("config file not found at {}", path.display());
        }
        return Ok(CorpusConfig::default());
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: CorpusConfig = toml::from_str(&contents)?;
    if config.line_counter.chunk_size == 0 {
        anyhow::bail!("line_counter.chunk_size must be at least 1");
    }
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_default_config_yields_defaults() {
        let config = CorpusConfig::default();
        assert_eq!(config.extractor.program, "neodepends");
        assert_eq!(config.extractor.memory_ceiling, "12G");
        assert_eq!(config.line_counter.chunk_size, 128);
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("depcorpus.toml");
        std::fs::write(&path, "[extractor]\nlanguage = \"python\"\n").unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.extractor.language, "python");
        assert_eq!(config.extractor.program, "neodepends");
        assert_eq!(config.git.program, "git");
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
