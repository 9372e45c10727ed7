//! Outbound command framing.
//!
//! Every frame sent to the server is a flat JSON object carrying the
//! reserved `command` key next to caller-defined payload fields.
//!
//! # Format
//!
//! ```json
//! {
//!   "command": "CreateEntity",
//!   "id": 7,
//!   "name": "Drone"
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::Serialize;
use serde_json::{Map, Value, to_string, to_value};

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Reserved key holding the command name.
pub const COMMAND_KEY: &str = "command";

// ============================================================================
// Types
// ============================================================================

/// Payload of a command message: field name to JSON value.
pub type CommandData = Map<String, Value>;

// ============================================================================
// Framing
// ============================================================================

/// Sets `data["command"]` to `command`, overwriting any previous value.
#[inline]
pub fn inject_command(command: &str, data: &mut CommandData) {
    data.insert(COMMAND_KEY.to_string(), Value::String(command.to_string()));
}

/// Injects the command name and encodes the payload as JSON text.
///
/// `data` is modified in place; callers must not rely on it being
/// unchanged afterwards.
///
/// # Errors
///
/// Returns [`Error::Json`] if serialization fails.
pub fn encode_command(command: &str, data: &mut CommandData) -> Result<String> {
    inject_command(command, data);
    Ok(to_string(&*data)?)
}

/// Converts a serializable payload into command data.
///
/// # Errors
///
/// - [`Error::Json`] if the payload cannot be serialized
/// - [`Error::InvalidArgument`] if it does not serialize to a JSON object
pub fn payload_to_data<T: Serialize + ?Sized>(payload: &T) -> Result<CommandData> {
    match to_value(payload)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::invalid_argument(format!(
            "command payload must be a JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;
    use serde_json::{from_str, json};

    fn data(value: Value) -> CommandData {
        match value {
            Value::Object(map) => map,
            _ => panic!("test data must be an object"),
        }
    }

    #[test]
    fn test_inject_adds_command() {
        let mut payload = data(json!({ "seq": 1 }));
        inject_command("ping", &mut payload);
        assert_eq!(Value::Object(payload), json!({ "seq": 1, "command": "ping" }));
    }

    #[test]
    fn test_inject_overwrites_existing_command() {
        let mut payload = data(json!({ "command": "old", "x": true }));
        inject_command("new", &mut payload);
        assert_eq!(payload[COMMAND_KEY], json!("new"));
        assert_eq!(payload.len(), 2);
    }

    #[test]
    fn test_encode_command_is_valid_json() {
        let mut payload = data(json!({ "name": "Drone", "position": [1.0, 2.0, 3.0] }));
        let text = encode_command("CreateEntity", &mut payload).expect("encode");

        let decoded: Value = from_str(&text).expect("decode");
        assert_eq!(
            decoded,
            json!({ "name": "Drone", "position": [1.0, 2.0, 3.0], "command": "CreateEntity" })
        );
    }

    #[test]
    fn test_encode_mutates_caller_data() {
        let mut payload = CommandData::new();
        let _ = encode_command("stop", &mut payload).expect("encode");
        assert_eq!(payload[COMMAND_KEY], json!("stop"));
    }

    #[derive(Serialize)]
    struct ScheduleTrip {
        name: String,
        start: [f64; 2],
    }

    #[test]
    fn test_payload_to_data_struct() {
        let trip = ScheduleTrip {
            name: "trip-1".into(),
            start: [0.0, 1.5],
        };
        let map = payload_to_data(&trip).expect("object payload");
        assert_eq!(map["name"], json!("trip-1"));
        assert_eq!(map["start"], json!([0.0, 1.5]));
    }

    #[test]
    fn test_payload_to_data_rejects_non_object() {
        let err = payload_to_data(&[1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert!(err.to_string().contains("an array"));
    }

    proptest! {
        #[test]
        fn prop_encoded_frame_is_payload_plus_command(
            command in "[A-Za-z]{1,16}",
            fields in proptest::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..8),
        ) {
            let mut payload: CommandData = fields
                .iter()
                .map(|(k, v)| (k.clone(), json!(v)))
                .collect();
            let mut expected = payload.clone();
            expected.insert(COMMAND_KEY.to_string(), json!(command));

            let text = encode_command(&command, &mut payload).unwrap();
            let decoded: CommandData = from_str(&text).unwrap();

            prop_assert_eq!(&decoded, &expected);
            prop_assert_eq!(&payload, &expected);
        }
    }
}
