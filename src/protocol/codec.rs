//! Protocol codec for the semicolon-delimited wire format
//!
//! One message per datagram, US-ASCII/UTF-8 text, six fields joined by `;`:
//!
//! ```text
//! <nodeID>;<childSensorID>;<command>;<ack>;<subType>;<payload>
//! ```
//!
//! Parsing never fails loudly: anything that does not split into exactly six
//! non-empty fields becomes [`Message::Invalid`], and validity is checked
//! explicitly downstream.

use super::{Command, Frame, Message, FIELD_COUNT, FIELD_SEPARATOR};

/// Parse a raw datagram into a [`Message`].
///
/// Wrong field count or any empty field yields [`Message::Invalid`]; a
/// payload containing `;` therefore also invalidates the message, since the
/// split produces more than six fields.
pub fn parse(raw: &str) -> Message {
    let fields: Vec<&str> = raw.split(FIELD_SEPARATOR).collect();
    if fields.len() != FIELD_COUNT || fields.iter().any(|f| f.is_empty()) {
        return Message::Invalid;
    }
    Message::Frame(Frame {
        node_id: fields[0].to_string(),
        child_sensor_id: fields[1].to_string(),
        command: fields[2].to_string(),
        ack: fields[3].to_string(),
        sub_type: fields[4].to_string(),
        payload: fields[5].to_string(),
    })
}

/// Serialize a [`Message`] to its wire form.
///
/// An invalid message serializes to the empty string; callers must not
/// transmit an empty string, so the dispatcher only serializes messages
/// constructed through [`build`].
pub fn serialize(msg: &Message) -> String {
    match msg {
        Message::Frame(frame) => [
            frame.node_id.as_str(),
            frame.child_sensor_id.as_str(),
            frame.command.as_str(),
            frame.ack.as_str(),
            frame.sub_type.as_str(),
            frame.payload.as_str(),
        ]
        .join(";"),
        Message::Invalid => String::new(),
    }
}

/// Build a valid [`Message`] from typed inputs, coercing each field to its
/// canonical decimal wire representation.
pub fn build(
    node_id: u32,
    child_sensor_id: u32,
    command: Command,
    ack: bool,
    sub_type: u8,
    payload: &str,
) -> Message {
    Message::Frame(Frame {
        node_id: node_id.to_string(),
        child_sensor_id: child_sensor_id.to_string(),
        command: command.code().to_string(),
        ack: if ack { "1" } else { "0" }.to_string(),
        sub_type: sub_type.to_string(),
        payload: payload.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::InternalType;

    #[test]
    fn test_parse_valid() {
        let msg = parse("0;0;3;0;3;AA:BB:CC:DD:EE:FF");
        let frame = msg.frame().expect("should be valid");
        assert_eq!(frame.node_id, "0");
        assert_eq!(frame.command().unwrap(), Command::Internal);
        assert_eq!(
            InternalType::from_code(frame.sub_type().unwrap()),
            InternalType::IdRequest
        );
        assert_eq!(frame.payload(), "AA:BB:CC:DD:EE:FF");
    }

    #[test]
    fn test_parse_garbage() {
        assert!(!parse("garbage").is_valid());
        assert!(!parse("").is_valid());
    }

    #[test]
    fn test_parse_wrong_field_count() {
        // five fields
        assert!(!parse("0;0;3;0;3").is_valid());
        // seven fields (payload containing a separator)
        assert!(!parse("0;0;3;0;3;a;b").is_valid());
    }

    #[test]
    fn test_parse_empty_field() {
        assert!(!parse("0;0;;0;3;payload").is_valid());
        assert!(!parse("0;0;3;0;3;").is_valid());
    }

    #[test]
    fn test_serialize_invalid_is_empty() {
        assert_eq!(serialize(&Message::Invalid), "");
    }

    #[test]
    fn test_build_serialize() {
        let msg = build(0, 0, Command::Internal, false, 4, "20");
        assert_eq!(serialize(&msg), "0;0;3;0;4;20");
    }

    #[test]
    fn test_roundtrip() {
        let original = build(42, 7, Command::Presentation, true, 8, "1013.25");
        let reparsed = parse(&serialize(&original));
        assert_eq!(reparsed, original);
    }
}
