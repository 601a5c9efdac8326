//! Host protocol: ids, framing and command dispatch.
//!
//! ```text
//!   serial bytes ──▶ codec ──▶ wire::Message ──▶ command ──▶ RadioPort
//!                                                   │
//!   serial bytes ◀── wire::encode_frame ◀───────────┘ response / reply
//! ```

pub mod burst;
pub mod codec;
pub mod command;
pub mod ids;
pub mod wire;
