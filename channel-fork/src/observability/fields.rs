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

//! Canonical structured field keys and value-format helpers.

use crate::api::message::BytesMessage;

pub const EVENT: &str = "event";
pub const COMPONENT: &str = "component";
pub const MODULE_ID: &str = "module_id";
pub const DISPATCH_ID: &str = "dispatch_id";
pub const PAYLOAD_LEN: &str = "payload_len";
pub const INBOUND: &str = "inbound";
pub const DESTINATION: &str = "destination";
pub const ROUTING_KEY: &str = "routing_key";
pub const MESSAGE_FILTER: &str = "message_filter";
pub const STATE: &str = "state";
pub const REASON: &str = "reason";
pub const ERR: &str = "err";

pub const NONE: &str = "none";
pub const REASON_EMPTY_KEY: &str = "empty_routing_key";
pub const REASON_MISSING_FIELD: &str = "missing_field";
pub const MAX_PREVIEW_LEN: usize = 64;

/// Formats an optional value for a log field.
pub fn or_none(value: Option<&str>) -> &str {
    value.unwrap_or(NONE)
}

/// Lossy UTF-8 preview of a payload, truncated for log lines.
pub fn format_payload_preview(message: &BytesMessage) -> String {
    let bytes = message.bytes();
    let end = bytes.len().min(MAX_PREVIEW_LEN);
    let mut preview = String::from_utf8_lossy(&bytes[..end]).into_owned();
    if bytes.len() > MAX_PREVIEW_LEN {
        preview.push_str("...");
    }
    preview
}

#[cfg(test)]
mod tests {
    use super::{format_payload_preview, or_none, MAX_PREVIEW_LEN, NONE};
    use crate::api::message::BytesMessage;

    #[test]
    fn payload_preview_is_truncated() {
        let message = BytesMessage::new(vec![b'a'; MAX_PREVIEW_LEN + 10]);

        let preview = format_payload_preview(&message);

        assert!(preview.ends_with("..."));
        assert_eq!(preview.len(), MAX_PREVIEW_LEN + 3);
    }

    #[test]
    fn short_payload_preview_is_unchanged() {
        assert_eq!(format_payload_preview(&BytesMessage::from("{}")), "{}");
    }

    #[test]
    fn or_none_falls_back_when_absent() {
        assert_eq!(or_none(None), NONE);
        assert_eq!(or_none(Some("S1")), "S1");
    }
}
