/********************************************************************************
 * Copyright (c) 2024 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/


use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use channel_fork::BytesMessage;
use serde_json::json;

/// Sensor reading routed by `$.sensoridentifier`.
pub fn sensor_payload(sensor: &str, value: i64) -> BytesMessage {
    BytesMessage::from(
        json!({
            "sensoridentifier": sensor,
            "reading": { "value": value, "unit": "C" },
        })
        .to_string()
        .as_str(),
    )
}

/// Sensor reading that lacks the routing field entirely.
pub fn sensor_payload_without_key(value: i64) -> BytesMessage {
    BytesMessage::from(json!({ "reading": { "value": value } }).to_string().as_str())
}

/// Wraps `inner` the way an MQTT bridge serializes a received message: a JSON
/// object whose `payload` field holds the base64-encoded original bytes.
pub fn mqtt_envelope(topic: &str, inner: &BytesMessage) -> BytesMessage {
    BytesMessage::from(
        json!({
            "topic": topic,
            "qos": 1,
            "retained": false,
            "payload": STANDARD.encode(inner.bytes()),
        })
        .to_string()
        .as_str(),
    )
}
