use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use strata::net::CommOptions;
use thiserror::Error;

#[derive(Debug, Default)]
pub struct CliConfig {
    path: Option<PathBuf>,
    data: RawConfig,
}

impl CliConfig {
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        let data = match path.as_ref() {
            Some(config_path) if config_path.exists() => read_file(config_path)?,
            _ => RawConfig::default(),
        };
        Ok(Self { path, data })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn comm(&self) -> CommOptions {
        self.data.comm.clone()
    }

    pub fn num_hops(&self) -> Option<usize> {
        self.data.partition.num_hops
    }

    pub fn num_parts(&self) -> Option<u64> {
        self.data.partition.num_parts
    }
}

fn read_file(path: &Path) -> Result<RawConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    comm: CommOptions,
    #[serde(default)]
    partition: PartitionSection,
}

#[derive(Debug, Default, Deserialize)]
struct PartitionSection {
    num_hops: Option<usize>,
    num_parts: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read CLI config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse CLI config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("strata").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_comm_and_partition_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[comm]\nqueue_capacity = 4096\n\n[partition]\nnum_hops = 2\nnum_parts = 3\n",
        )
        .unwrap();
        let cfg = CliConfig::load(Some(path)).unwrap();
        assert_eq!(cfg.comm().queue_capacity, 4096);
        assert!(cfg.comm().tcp_nodelay);
        assert_eq!(cfg.num_hops(), Some(2));
        assert_eq!(cfg.num_parts(), Some(3));
    }

    #[test]
    fn missing_file_means_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = CliConfig::load(Some(dir.path().join("absent.toml"))).unwrap();
        assert_eq!(cfg.comm(), CommOptions::default());
        assert_eq!(cfg.num_hops(), None);
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[comm\n").unwrap();
        assert!(matches!(
            CliConfig::load(Some(path)),
            Err(ConfigError::Parse { .. })
        ));
    }
}
