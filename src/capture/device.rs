//! Known CSI-capable radio hardware.
//!
//! Frames carry the raw device code reported by the capture toolchain.
//! Only the models listed here have subcarrier policies; any other code
//! is rejected when the policy table is consulted.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Radio hardware model identified by the frame's device code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceModel {
    /// Intel Wi-Fi 6 AX200.
    Ax200,
    /// Intel Wi-Fi 6E AX210.
    Ax210,
    /// Intel Wireless Link 5300.
    Iwl5300,
    /// Qualcomm Atheros AR9300 family.
    Qca9300,
    /// Ettus USRP software-defined radio.
    Usrp,
}

impl DeviceModel {
    /// Every supported model, in device-code order.
    pub const ALL: [DeviceModel; 5] = [
        DeviceModel::Usrp,
        DeviceModel::Ax200,
        DeviceModel::Ax210,
        DeviceModel::Iwl5300,
        DeviceModel::Qca9300,
    ];

    /// Resolves a raw device code.
    pub const fn from_code(code: u16) -> Option<Self> {
        match code {
            0x2000 => Some(DeviceModel::Ax200),
            0x2100 => Some(DeviceModel::Ax210),
            0x5300 => Some(DeviceModel::Iwl5300),
            0x9300 => Some(DeviceModel::Qca9300),
            0x1234 => Some(DeviceModel::Usrp),
            _ => None,
        }
    }

    /// Returns the raw device code.
    pub const fn code(self) -> u16 {
        match self {
            DeviceModel::Ax200 => 0x2000,
            DeviceModel::Ax210 => 0x2100,
            DeviceModel::Iwl5300 => 0x5300,
            DeviceModel::Qca9300 => 0x9300,
            DeviceModel::Usrp => 0x1234,
        }
    }

    /// Returns the model name used in configuration files.
    pub const fn name(self) -> &'static str {
        match self {
            DeviceModel::Ax200 => "AX200",
            DeviceModel::Ax210 => "AX210",
            DeviceModel::Iwl5300 => "IWL5300",
            DeviceModel::Qca9300 => "QCA9300",
            DeviceModel::Usrp => "USRP",
        }
    }
}

impl fmt::Display for DeviceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for model in DeviceModel::ALL {
            assert_eq!(DeviceModel::from_code(model.code()), Some(model));
        }
    }

    #[test]
    fn test_unknown_code() {
        assert_eq!(DeviceModel::from_code(0xBEEF), None);
    }

    #[test]
    fn test_serde_uses_model_names() {
        let json = serde_json::to_string(&DeviceModel::Qca9300).unwrap();
        assert_eq!(json, "\"QCA9300\"");
    }
}
