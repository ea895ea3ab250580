//! Output kinds a frame can be extracted into.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::ExtractError;

/// The quantity extracted from each frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// Complex channel estimate.
    Csi,
    /// Channel magnitude.
    #[serde(alias = "mag")]
    Magnitude,
    /// Channel phase in radians.
    Phase,
    /// Capture instant.
    Timestamp,
}

impl OutputKind {
    /// Every kind, in output order.
    pub const ALL: [OutputKind; 4] = [
        OutputKind::Csi,
        OutputKind::Magnitude,
        OutputKind::Phase,
        OutputKind::Timestamp,
    ];

    /// Returns the name used in output file names.
    pub const fn as_str(self) -> &'static str {
        match self {
            OutputKind::Csi => "csi",
            OutputKind::Magnitude => "magnitude",
            OutputKind::Phase => "phase",
            OutputKind::Timestamp => "timestamp",
        }
    }

    /// Returns true for kinds carrying a subcarrier x antenna tensor.
    pub const fn is_tensor(self) -> bool {
        !matches!(self, OutputKind::Timestamp)
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputKind {
    type Err = ExtractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csi" => Ok(OutputKind::Csi),
            "magnitude" | "mag" => Ok(OutputKind::Magnitude),
            "phase" => Ok(OutputKind::Phase),
            "timestamp" => Ok(OutputKind::Timestamp),
            _ => Err(ExtractError::UnsupportedKind(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names_and_alias() {
        for kind in OutputKind::ALL {
            assert_eq!(kind.as_str().parse::<OutputKind>().unwrap(), kind);
        }
        assert_eq!("MAG".parse::<OutputKind>().unwrap(), OutputKind::Magnitude);
    }

    #[test]
    fn test_unsupported_kind() {
        assert_eq!(
            "rssi".parse::<OutputKind>(),
            Err(ExtractError::UnsupportedKind("rssi".to_string()))
        );
    }

    #[test]
    fn test_only_timestamp_is_scalar() {
        let scalar: Vec<_> = OutputKind::ALL.into_iter().filter(|k| !k.is_tensor()).collect();
        assert_eq!(scalar, vec![OutputKind::Timestamp]);
    }
}
