//! Network-processor configuration.
//!
//! Start-up values for the serial link and event buffering. The host can
//! change most of them at run time; these are what the device comes up with.

use serde::{Deserialize, Serialize};

use crate::buffering::{BUFFERING_CLASS_ALL, BufferingSettings};
use crate::error::ConfigError;
use crate::proto::command::APP_VERSION_SIZE;
use crate::proto::ids::CHANNEL_NUMBER_MASK;
use crate::serial::{BaudRate, BitRate};

/// Serial link parameters. Rates are stored as the host-facing table indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Async baud-rate index.
    pub baud_rate: u8,
    /// Sync bit-rate index, used when no strap pin selects one.
    pub bit_rate: u8,
    /// How long the sync link polls SRDY before sleeping, in microseconds.
    pub srdy_sleep_delay_us: u16,
}

impl SerialConfig {
    pub fn baud_rate(&self) -> Result<BaudRate, ConfigError> {
        BaudRate::from_index(self.baud_rate).ok_or(ConfigError::UnsupportedBaudRate(self.baud_rate))
    }

    pub fn bit_rate(&self) -> Result<BitRate, ConfigError> {
        BitRate::from_index(self.bit_rate).ok_or(ConfigError::UnsupportedBitRate(self.bit_rate))
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: BaudRate::B57600.index(),
            bit_rate: BitRate::M1.index(),
            srdy_sleep_delay_us: 50,
        }
    }
}

/// Event buffering at start-up. All zero: every event goes straight out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferingConfig {
    pub class: u8,
    pub size_threshold: u16,
    /// 10 ms units.
    pub time_threshold: u16,
}

impl From<BufferingConfig> for BufferingSettings {
    fn from(c: BufferingConfig) -> Self {
        Self {
            class: c.class,
            size_threshold: c.size_threshold,
            time_threshold: c.time_threshold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkProcessorConfig {
    pub serial: SerialConfig,
    pub buffering: BufferingConfig,
    /// Channel count assumed when the radio stack cannot report its own.
    pub max_channels: u8,
    /// Reported for a version request on channel 0. NUL padded.
    pub app_version: [u8; APP_VERSION_SIZE],
}

impl Default for NetworkProcessorConfig {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            buffering: BufferingConfig::default(),
            max_channels: 8,
            app_version: *b"ANTNP1.00\0\0",
        }
    }
}

impl NetworkProcessorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.serial.baud_rate()?;
        self.serial.bit_rate()?;
        if self.serial.srdy_sleep_delay_us == 0 {
            return Err(ConfigError::SrdyDelay);
        }
        if self.buffering.class > BUFFERING_CLASS_ALL {
            return Err(ConfigError::BufferingClass(self.buffering.class));
        }
        // Channel numbers share their byte with the burst sequence bits.
        if self.max_channels == 0 || self.max_channels > CHANNEL_NUMBER_MASK + 1 {
            return Err(ConfigError::ChannelCount(self.max_channels));
        }
        Ok(())
    }
}
