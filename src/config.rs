//! Analyzer configuration

use crate::{Error, Result};

/// How decoded address bytes are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AddressDisplay {
    /// Full 8 bits, read/write bit included.
    #[default]
    WithDirection8,
    /// 8-bit form with the read/write bit masked off.
    NoDirection8,
    /// Bare 7-bit address, shifted down.
    NoDirection7,
}

impl AddressDisplay {
    /// Render an address byte's value for display.
    pub fn format_address(self, value: u8) -> String {
        match self {
            AddressDisplay::WithDirection8 => format!("{value:#04x}"),
            AddressDisplay::NoDirection8 => format!("{:#04x}", value & 0xfe),
            AddressDisplay::NoDirection7 => format!("{:#04x}", value >> 1),
        }
    }
}

/// Capture-wide analyzer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerConfig {
    pub sda_channel: u8,
    pub scl_channel: u8,
    pub address_display: AddressDisplay,
    /// Shell-style command line for the enrichment process, if any.
    pub enrichment_command: Option<String>,
}

impl AnalyzerConfig {
    pub fn new(sda_channel: u8, scl_channel: u8) -> Self {
        Self {
            sda_channel,
            scl_channel,
            address_display: AddressDisplay::default(),
            enrichment_command: None,
        }
    }

    pub fn with_enrichment_command(mut self, command: impl Into<String>) -> Self {
        self.enrichment_command = Some(command.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.sda_channel == self.scl_channel {
            return Err(Error::Config(
                "SDA and SCL can't be assigned to the same input.".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distinct_channels_are_valid() {
        assert!(AnalyzerConfig::new(0, 1).validate().is_ok());
    }

    #[test]
    fn test_shared_channel_is_rejected() {
        let err = AnalyzerConfig::new(3, 3).validate().unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_address_display_variants() {
        // 0xa1: address 0x50, read bit set
        assert_eq!(AddressDisplay::WithDirection8.format_address(0xa1), "0xa1");
        assert_eq!(AddressDisplay::NoDirection8.format_address(0xa1), "0xa0");
        assert_eq!(AddressDisplay::NoDirection7.format_address(0xa1), "0x50");
    }
}
