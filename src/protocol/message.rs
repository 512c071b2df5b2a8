//! Protocol message definitions
//!
//! Defines the message types exchanged with sensor nodes and the typed views
//! over the textual wire fields.

use std::num::ParseIntError;
use thiserror::Error;

/// Error raised when a wire field that must be numeric cannot be parsed.
///
/// A message can be structurally valid (six non-empty fields) while still
/// carrying garbage where an integer is required; this is the one protocol
/// deviation that is not silently absorbed.
#[derive(Error, Debug)]
#[error("field '{field}' is not a number: '{value}'")]
pub struct FieldError {
    pub field: &'static str,
    pub value: String,
    #[source]
    pub source: ParseIntError,
}

/// Top-level command category of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Node announces a child sensor and its type
    Presentation,
    /// Node reports (or is told) a sensor value
    Set,
    /// Firmware/stream transfer (unhandled by this gateway)
    Stream,
    /// Protocol-internal exchange (ID assignment etc.)
    Internal,
    /// Any command code outside the known set
    Unknown(u8),
}

impl Command {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Command::Presentation,
            1 => Command::Set,
            2 => Command::Stream,
            3 => Command::Internal,
            other => Command::Unknown(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Command::Presentation => 0,
            Command::Set => 1,
            Command::Stream => 2,
            Command::Internal => 3,
            Command::Unknown(code) => *code,
        }
    }
}

/// Subtypes of [`Command::Internal`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalType {
    /// Node asks the gateway for a node ID; payload is its hardware unique ID
    IdRequest,
    /// Gateway reply; payload is the assigned node ID
    IdResponse,
    Unknown(u8),
}

impl InternalType {
    pub fn from_code(code: u8) -> Self {
        match code {
            3 => InternalType::IdRequest,
            4 => InternalType::IdResponse,
            other => InternalType::Unknown(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            InternalType::IdRequest => 3,
            InternalType::IdResponse => 4,
            InternalType::Unknown(code) => *code,
        }
    }
}

/// Sensor types a node may announce under [`Command::Presentation`].
///
/// Codes follow the standard sensor-type enumeration of the protocol family;
/// only the types this gateway registers are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorType {
    Temperature,
    Humidity,
    Barometer,
    Unknown(u8),
}

impl SensorType {
    pub fn from_code(code: u8) -> Self {
        match code {
            6 => SensorType::Temperature,
            7 => SensorType::Humidity,
            8 => SensorType::Barometer,
            other => SensorType::Unknown(other),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            SensorType::Temperature => 6,
            SensorType::Humidity => 7,
            SensorType::Barometer => 8,
            SensorType::Unknown(code) => *code,
        }
    }

    /// Human-readable label used for device names and logs
    pub fn label(&self) -> &'static str {
        match self {
            SensorType::Temperature => "Temperature",
            SensorType::Humidity => "Humidity",
            SensorType::Barometer => "Barometer",
            SensorType::Unknown(_) => "Unknown",
        }
    }
}

/// The six wire fields of a structurally valid message.
///
/// Fields are kept in their textual wire form; numeric interpretation is
/// deferred to the typed accessors so that a parse can never fail, only
/// produce [`Message::Invalid`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Addressed node; 0 is the gateway itself
    pub node_id: String,
    /// Child sensor within the node; 0 is the node itself
    pub child_sensor_id: String,
    /// Command code, see [`Command`]
    pub command: String,
    /// "1" if the sender requests an acknowledgment
    pub ack: String,
    /// Command-specific subtype code
    pub sub_type: String,
    /// Opaque payload; semantics depend on command and subtype
    pub payload: String,
}

impl Frame {
    pub fn node_id(&self) -> Result<u32, FieldError> {
        parse_field("nodeID", &self.node_id)
    }

    pub fn child_sensor_id(&self) -> Result<u32, FieldError> {
        parse_field("childSensorID", &self.child_sensor_id)
    }

    pub fn command(&self) -> Result<Command, FieldError> {
        parse_field("command", &self.command).map(Command::from_code)
    }

    pub fn ack_requested(&self) -> Result<bool, FieldError> {
        parse_field::<u8>("ack", &self.ack).map(|v| v != 0)
    }

    pub fn sub_type(&self) -> Result<u8, FieldError> {
        parse_field("subType", &self.sub_type)
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

fn parse_field<T: std::str::FromStr<Err = ParseIntError>>(
    field: &'static str,
    value: &str,
) -> Result<T, FieldError> {
    value.parse().map_err(|source| FieldError {
        field,
        value: value.to_string(),
        source,
    })
}

/// A wire message: either a complete six-field frame or an explicit
/// invalid marker.
///
/// An invalid message carries no usable data and must be rejected before
/// dispatch; it is never partially processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Frame(Frame),
    Invalid,
}

impl Message {
    /// True iff all six fields are present and non-empty
    pub fn is_valid(&self) -> bool {
        matches!(self, Message::Frame(_))
    }

    /// The frame, if this message is valid
    pub fn frame(&self) -> Option<&Frame> {
        match self {
            Message::Frame(frame) => Some(frame),
            Message::Invalid => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_codes() {
        assert_eq!(Command::from_code(0), Command::Presentation);
        assert_eq!(Command::from_code(1), Command::Set);
        assert_eq!(Command::from_code(2), Command::Stream);
        assert_eq!(Command::from_code(3), Command::Internal);
        assert_eq!(Command::from_code(9), Command::Unknown(9));
        assert_eq!(Command::Internal.code(), 3);
    }

    #[test]
    fn test_internal_type_codes() {
        assert_eq!(InternalType::from_code(3), InternalType::IdRequest);
        assert_eq!(InternalType::from_code(4), InternalType::IdResponse);
        assert_eq!(InternalType::IdResponse.code(), 4);
    }

    #[test]
    fn test_sensor_type_codes() {
        assert_eq!(SensorType::from_code(6), SensorType::Temperature);
        assert_eq!(SensorType::from_code(7), SensorType::Humidity);
        assert_eq!(SensorType::from_code(8), SensorType::Barometer);
        assert_eq!(SensorType::from_code(99), SensorType::Unknown(99));
    }

    #[test]
    fn test_frame_accessors() {
        let frame = Frame {
            node_id: "12".to_string(),
            child_sensor_id: "0".to_string(),
            command: "3".to_string(),
            ack: "1".to_string(),
            sub_type: "4".to_string(),
            payload: "hello".to_string(),
        };
        assert_eq!(frame.node_id().unwrap(), 12);
        assert_eq!(frame.command().unwrap(), Command::Internal);
        assert!(frame.ack_requested().unwrap());
        assert_eq!(frame.sub_type().unwrap(), 4);
        assert_eq!(frame.payload(), "hello");
    }

    #[test]
    fn test_frame_bad_number() {
        let frame = Frame {
            node_id: "x".to_string(),
            child_sensor_id: "0".to_string(),
            command: "3".to_string(),
            ack: "0".to_string(),
            sub_type: "4".to_string(),
            payload: "p".to_string(),
        };
        let err = frame.node_id().unwrap_err();
        assert_eq!(err.field, "nodeID");
        assert_eq!(err.value, "x");
    }
}
