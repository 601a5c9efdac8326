//! ANT serial network-processor core.
//!
//! Bridges a host controller, talking the ANT serial message protocol over a
//! UART or a byte-clocked synchronous link, to an on-chip ANT radio stack.
//! Hardware and radio-stack access go through the traits in [`app::ports`]
//! and [`serial`]; everything here is plain logic and runs on the host for
//! testing.

#![cfg_attr(not(test), no_std)]
#![deny(unused_must_use)]

pub mod app;
pub mod buffering;
pub mod config;
pub mod error;
pub mod fifo;
pub mod proto;
pub mod scheduler;
pub mod serial;

pub use error::{ConfigError, Error, LinkError, Result};
