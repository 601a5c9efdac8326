//! Application boundary.
//!
//! [`ports`] defines the traits the platform implements for the core:
//!
//! | Port               | Context   | Implemented by            |
//! |--------------------|-----------|---------------------------|
//! | `RadioPort`        | thread    | radio stack bindings      |
//! | `RadioEventSource` | interrupt | radio stack event queue   |
//! | `SystemPort`       | thread    | SoC reset / power control |
//! | `TimerPort`        | any       | RTC-backed 32 kHz clock   |

pub mod ports;
