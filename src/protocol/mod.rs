//! Protocol module - MySensors-style serial protocol over UDP
//!
//! The wire format is plain text, one message per datagram:
//! - six fields joined by `;` in fixed order
//! - decimal integers everywhere except the free-form payload
//! - no length prefix, no terminator beyond the datagram boundary

mod message;
pub mod codec;

pub use message::*;

/// Default discovery endpoint nodes broadcast to
pub const DEFAULT_ENDPOINT: &str = "255.255.255.255:9009";

/// Number of fields in a wire message
pub const FIELD_COUNT: usize = 6;

/// Field separator on the wire
pub const FIELD_SEPARATOR: char = ';';

/// Node ID reserved for the gateway itself
pub const GATEWAY_NODE_ID: u32 = 0;
