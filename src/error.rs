//! Unified error types for the network-processor core.
//!
//! Host-visible failures (bad commands, sequence errors) are not Rust errors;
//! they travel back to the host as [`ResponseCode`](crate::proto::ids::ResponseCode)s.
//! The types here cover what the platform glue has to act on: serial
//! hardware faults, link-level reset requests and bad configuration.
//! All variants are `Copy`.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The serial link failed or the host asked for a reset.
    Link(LinkError),
    /// Configuration is invalid.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Serial link errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// SPI byte exchange failed.
    Bus,
    /// A handshake or mode line could not be read or driven.
    Pin,
    /// UART write failed.
    Uart,
    /// The host drove the handshake lines in the reset pattern.
    ResetRequested,
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus => write!(f, "SPI exchange failed"),
            Self::Pin => write!(f, "GPIO access failed"),
            Self::Uart => write!(f, "UART write failed"),
            Self::ResetRequested => write!(f, "host requested reset"),
        }
    }
}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Baud-rate index outside the supported table.
    UnsupportedBaudRate(u8),
    /// Sync bit-rate index outside the supported table.
    UnsupportedBitRate(u8),
    /// Channel count is zero or beyond what the sequence bits can address.
    ChannelCount(u8),
    /// SRDY sleep delay is zero.
    SrdyDelay,
    /// Buffering class the event buffer does not know.
    BufferingClass(u8),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedBaudRate(i) => write!(f, "unsupported baud rate index {i}"),
            Self::UnsupportedBitRate(i) => write!(f, "unsupported bit rate index {i}"),
            Self::ChannelCount(n) => write!(f, "invalid channel count {n}"),
            Self::SrdyDelay => write!(f, "SRDY sleep delay must be nonzero"),
            Self::BufferingClass(c) => write!(f, "unknown buffering class {c}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
