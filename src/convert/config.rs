//! Conversion configuration.
//!
//! Settings come from an optional TOML file and are then overridden by
//! command-line flags. Policy entries in the file replace the built-in
//! entries for the same device and bandwidth.

use crate::extraction::OutputKind;
use crate::policy::{PolicyEntry, SubcarrierPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for a directory conversion run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Directory scanned for capture files.
    pub input_dir: PathBuf,
    /// Directory arrays are written to.
    pub output_dir: PathBuf,
    /// Output kinds written for every file.
    pub kinds: Vec<OutputKind>,
    /// Keep interpolated subcarriers in tensor outputs.
    pub interpolate: bool,
    /// Capture file extension; the decoder's own when unset.
    pub input_extension: Option<String>,
    /// Also write timestamps as RFC 3339 text.
    pub timestamp_text: bool,
    /// Place each file's outputs in a directory named after its first frame time.
    pub group_by_start_time: bool,
    /// Stop at the first file that fails.
    pub fail_fast: bool,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("in"),
            output_dir: PathBuf::from("out"),
            kinds: OutputKind::ALL.to_vec(),
            interpolate: false,
            input_extension: None,
            timestamp_text: false,
            group_by_start_time: false,
            fail_fast: false,
        }
    }
}

impl ConvertConfig {
    /// Creates a configuration converting `input_dir` into `output_dir`.
    pub fn with_dirs(input_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            ..Default::default()
        }
    }

    /// Validates the configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kinds.is_empty() {
            return Err(ConfigError::NoKinds);
        }
        if let Some(extension) = &self.input_extension {
            let extension = extension.trim_start_matches('.');
            if extension.is_empty() || extension.contains(['/', '\\']) {
                return Err(ConfigError::InvalidExtension(extension.to_string()));
            }
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// No output kind is selected.
    #[error("no output kinds selected")]
    NoKinds,
    /// The capture extension is empty or contains a path separator.
    #[error("invalid input extension {0:?}")]
    InvalidExtension(String),
    /// A policy override lists no interpolated subcarriers.
    #[error("policy entry for {device} lists no interpolated subcarriers at {bandwidth} MHz")]
    EmptyPolicyEntry {
        /// Device model name of the entry.
        device: String,
        /// Channel bandwidth of the entry in MHz.
        bandwidth: u16,
    },
    /// The configuration file could not be read.
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    /// The configuration file is not valid TOML for this format.
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Policy overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Entries added to or replacing built-in ones.
    #[serde(default)]
    pub entries: Vec<PolicyEntry>,
}

impl PolicyConfig {
    /// Validates the override entries.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.entries.iter().find(|entry| entry.interpolated.is_empty()) {
            Some(entry) => Err(ConfigError::EmptyPolicyEntry {
                device: entry.device.to_string(),
                bandwidth: entry.bandwidth,
            }),
            None => Ok(()),
        }
    }

    /// Returns the built-in table with these overrides applied.
    pub fn build(&self) -> SubcarrierPolicy {
        SubcarrierPolicy::builtin().with_entries(self.entries.iter().cloned())
    }
}

/// Full configuration file format.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileConfig {
    /// The `[convert]` table.
    #[serde(default)]
    pub convert: ConvertConfig,
    /// The `[policy]` table.
    #[serde(default)]
    pub policy: PolicyConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.convert.validate()?;
        config.policy.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::DeviceModel;

    #[test]
    fn test_default_config_valid() {
        let config = ConvertConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.kinds, OutputKind::ALL.to_vec());
        assert_eq!(config.input_dir, PathBuf::from("in"));
        assert_eq!(config.output_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_no_kinds_invalid() {
        let config = ConvertConfig {
            kinds: Vec::new(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoKinds)));
    }

    #[test]
    fn test_parse_file() {
        let config = FileConfig::from_toml(
            r#"
            [convert]
            input_dir = "captures"
            output_dir = "arrays"
            kinds = ["csi", "mag", "timestamp"]
            group_by_start_time = true

            [[policy.entries]]
            device = "AX210"
            bandwidth = 160
            interpolated = [-1, 0, 1]
            "#,
        )
        .unwrap();

        assert_eq!(config.convert.input_dir, PathBuf::from("captures"));
        assert_eq!(
            config.convert.kinds,
            vec![OutputKind::Csi, OutputKind::Magnitude, OutputKind::Timestamp]
        );
        assert!(config.convert.group_by_start_time);
        assert!(!config.convert.fail_fast);

        let policy = config.policy.build();
        assert_eq!(
            policy.lookup(DeviceModel::Ax210.code(), 160).unwrap(),
            &[-1, 0, 1]
        );
        assert_eq!(policy.lookup(DeviceModel::Ax200.code(), 160).unwrap(), &[0]);
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = FileConfig::from_toml("").unwrap();
        assert_eq!(config, FileConfig::default());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let err = FileConfig::from_toml("[convert]\nkinds = [\"rssi\"]\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_empty_policy_entry_rejected() {
        let err = FileConfig::from_toml(
            "[[policy.entries]]\ndevice = \"USRP\"\nbandwidth = 20\ninterpolated = []\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyPolicyEntry { bandwidth: 20, .. }));
    }
}
