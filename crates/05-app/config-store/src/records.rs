//! Fixed-layout records persisted in the `cfg/` directory.

use crate::ConfigError;

/// Log verbosity, persisted as one byte.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Logging disabled.
    None = 0,
    /// Errors only.
    Error = 1,
    /// Informational and above.
    Info = 2,
    /// Debug and above.
    #[default]
    Debug = 3,
    /// Everything.
    Verbose = 4,
}

impl LogLevel {
    fn parse(value: u8) -> Result<Self, ConfigError> {
        Ok(match value {
            0 => LogLevel::None,
            1 => LogLevel::Error,
            2 => LogLevel::Info,
            3 => LogLevel::Debug,
            4 => LogLevel::Verbose,
            _ => return Err(ConfigError::Corrupt("log level out of range")),
        })
    }
}

/// The attached display panel family.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DisplayType {
    /// Parallel RGB panel.
    #[default]
    Rgb = 0,
    /// MIPI-DSI panel.
    Mipi = 1,
}

impl DisplayType {
    fn parse(value: u8) -> Result<Self, ConfigError> {
        Ok(match value {
            0 => DisplayType::Rgb,
            1 => DisplayType::Mipi,
            _ => return Err(ConfigError::Corrupt("display type out of range")),
        })
    }
}

/// Where display frames are routed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DisplayOutput {
    /// The physical panel.
    #[default]
    Panel = 0,
    /// USB video class sink.
    Uvc = 1,
}

impl DisplayOutput {
    fn parse(value: u8) -> Result<Self, ConfigError> {
        Ok(match value {
            0 => DisplayOutput::Panel,
            1 => DisplayOutput::Uvc,
            _ => return Err(ConfigError::Corrupt("display output out of range")),
        })
    }
}

/// The provisioning/connectivity transport.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectivityType {
    /// Bluetooth Low Energy.
    #[default]
    Ble = 0,
    /// Wi-Fi.
    Wifi = 1,
}

impl ConnectivityType {
    fn parse(value: u8) -> Result<Self, ConfigError> {
        Ok(match value {
            0 => ConnectivityType::Ble,
            1 => ConnectivityType::Wifi,
            _ => return Err(ConfigError::Corrupt("connectivity type out of range")),
        })
    }
}

/// The framework-owned config record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FwkConfig {
    /// Log verbosity.
    pub log_level: LogLevel,
    /// Panel family.
    pub display_type: DisplayType,
    /// Frame routing.
    pub display_output: DisplayOutput,
    /// Provisioning transport.
    pub connectivity_type: ConnectivityType,
}

impl FwkConfig {
    /// Encoded size in bytes.
    pub const SIZE: usize = 4;

    /// Serializes the record.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        [
            self.log_level as u8,
            self.display_type as u8,
            self.display_output as u8,
            self.connectivity_type as u8,
        ]
    }

    /// Parses a persisted record.
    pub fn parse(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.len() < Self::SIZE {
            return Err(ConfigError::Corrupt("framework config too short"));
        }
        Ok(Self {
            log_level: LogLevel::parse(bytes[0])?,
            display_type: DisplayType::parse(bytes[1])?,
            display_output: DisplayOutput::parse(bytes[2])?,
            connectivity_type: ConnectivityType::parse(bytes[3])?,
        })
    }
}

/// The metadata record describing both persisted configs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Metadata {
    /// Version of the framework config layout.
    pub fwk_version: u32,
    /// Size of the framework config record.
    pub fwk_size: u32,
    /// Version of the application blob; 0 when absent.
    pub app_version: u32,
    /// Size of the application blob.
    pub app_size: u32,
}

impl Metadata {
    /// Encoded size in bytes.
    pub const SIZE: usize = 16;

    /// Serializes the record.
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut out = [0u8; Self::SIZE];
        out[0..4].copy_from_slice(&self.fwk_version.to_le_bytes());
        out[4..8].copy_from_slice(&self.fwk_size.to_le_bytes());
        out[8..12].copy_from_slice(&self.app_version.to_le_bytes());
        out[12..16].copy_from_slice(&self.app_size.to_le_bytes());
        out
    }

    /// Parses a persisted record.
    pub fn parse(bytes: &[u8]) -> Result<Self, ConfigError> {
        if bytes.len() < Self::SIZE {
            return Err(ConfigError::Corrupt("metadata too short"));
        }
        let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        Ok(Self {
            fwk_version: word(0),
            fwk_size: word(4),
            app_version: word(8),
            app_size: word(12),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fwk_config_encode_parse_is_identity() {
        let cfg = FwkConfig {
            log_level: LogLevel::Verbose,
            display_type: DisplayType::Mipi,
            display_output: DisplayOutput::Uvc,
            connectivity_type: ConnectivityType::Wifi,
        };
        assert_eq!(FwkConfig::parse(&cfg.encode()).unwrap(), cfg);
    }

    #[test]
    fn metadata_encode_parse_is_identity() {
        let meta = Metadata {
            fwk_version: 0x0201,
            fwk_size: 4,
            app_version: 9,
            app_size: 128,
        };
        assert_eq!(Metadata::parse(&meta.encode()).unwrap(), meta);
    }

    #[test]
    fn out_of_range_bytes_are_rejected() {
        assert!(FwkConfig::parse(&[9, 0, 0, 0]).is_err());
        assert!(FwkConfig::parse(&[0, 9, 0, 0]).is_err());
        assert!(Metadata::parse(&[0u8; 8]).is_err());
    }
}
