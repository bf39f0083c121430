//! Optional envelope unwrapping applied before routing-key extraction.

use crate::extraction::routing_expression::ExtractionError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::Value;
use std::borrow::Cow;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const MQTT_PAYLOAD_FIELD: &str = "payload";

/// How an inbound payload wraps the JSON document the routing key is read from.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PayloadEnvelope {
    /// The payload is the JSON document.
    #[default]
    Raw,
    /// The payload is a JSON-serialized MQTT message; its `payload` field holds
    /// the document, either base64-encoded or as an array of byte values.
    MqttJson,
}

/// Unknown envelope name in configuration.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnknownEnvelopeError(pub(crate) String);

impl Display for UnknownEnvelopeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown payload envelope '{}', expected 'raw' or 'mqtt-json'",
            self.0
        )
    }
}

impl Error for UnknownEnvelopeError {}

impl FromStr for PayloadEnvelope {
    type Err = UnknownEnvelopeError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "raw" => Ok(PayloadEnvelope::Raw),
            "mqtt-json" | "mqtt_json" | "mqtt" => Ok(PayloadEnvelope::MqttJson),
            _ => Err(UnknownEnvelopeError(name.to_string())),
        }
    }
}

impl PayloadEnvelope {
    /// Returns the bytes of the document carried by `payload`.
    pub fn inner_document<'a>(
        &self,
        payload: &'a [u8],
    ) -> Result<Cow<'a, [u8]>, ExtractionError> {
        match self {
            PayloadEnvelope::Raw => Ok(Cow::Borrowed(payload)),
            PayloadEnvelope::MqttJson => Self::unwrap_mqtt_json(payload).map(Cow::Owned),
        }
    }

    fn unwrap_mqtt_json(payload: &[u8]) -> Result<Vec<u8>, ExtractionError> {
        let envelope: Value = serde_json::from_slice(payload)
            .map_err(|err| ExtractionError::MalformedEnvelope(err.to_string()))?;

        match envelope.get(MQTT_PAYLOAD_FIELD) {
            Some(Value::String(encoded)) => STANDARD
                .decode(encoded)
                .map_err(|err| ExtractionError::MalformedEnvelope(err.to_string())),
            Some(Value::Array(values)) => values
                .iter()
                .map(|value| {
                    value
                        .as_u64()
                        .and_then(|byte| u8::try_from(byte).ok())
                        .ok_or_else(|| {
                            ExtractionError::MalformedEnvelope(format!(
                                "payload element {value} is not a byte"
                            ))
                        })
                })
                .collect(),
            Some(other) => Err(ExtractionError::MalformedEnvelope(format!(
                "payload field has unsupported type: {other}"
            ))),
            None => Err(ExtractionError::MalformedEnvelope(
                "payload field missing".to_string(),
            )),
        }
    }
}

impl Display for PayloadEnvelope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            PayloadEnvelope::Raw => f.write_str("raw"),
            PayloadEnvelope::MqttJson => f.write_str("mqtt-json"),
        }
    }
}
