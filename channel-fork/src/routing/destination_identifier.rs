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

//! Destination identifier derivation and channel-name joining.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Delimiter placed between the inbound identity and the routing key.
pub const IDENTIFIER_SEPARATOR: char = '/';
/// Suffix appended to the node default identity for the fallback destination.
pub const DEFAULT_DESTINATION_SUFFIX: &str = "/DEFAULT-DATA";

const FORBIDDEN_CHARS: &[char] = &['"', '<', '>', '\\', '^', '`', '{', '|', '}'];

/// An identifier cannot be used as a channel name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InvalidIdentifierError {
    pub(crate) identifier: String,
    pub(crate) reason: &'static str,
}

impl Display for InvalidIdentifierError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid channel identifier '{}': {}",
            self.identifier, self.reason
        )
    }
}

impl Error for InvalidIdentifierError {}

/// Name of an output channel; unique and stable per routing key.
///
/// ```
/// use channel_fork::DestinationIdentifier;
///
/// let identifier = DestinationIdentifier::for_routing_key("ndn:/test-fork", "S1").unwrap();
/// assert_eq!(identifier.as_str(), "ndn:/test-fork/S1");
///
/// let fallback = DestinationIdentifier::default_for_node("ndn:/node-1");
/// assert_eq!(fallback.as_str(), "ndn:/node-1/DEFAULT-DATA");
/// ```
#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DestinationIdentifier(String);

impl DestinationIdentifier {
    /// Builds `<inbound><separator><routing_key>`.
    pub fn for_routing_key(
        inbound_identity: &str,
        routing_key: &str,
    ) -> Result<Self, InvalidIdentifierError> {
        let identifier = format!("{inbound_identity}{IDENTIFIER_SEPARATOR}{routing_key}");
        if routing_key.is_empty() {
            return Err(InvalidIdentifierError {
                identifier,
                reason: "empty routing key",
            });
        }
        validate_identifier(&identifier)?;
        Ok(Self(identifier))
    }

    /// Builds the fallback identifier `<node-default><DEFAULT_DESTINATION_SUFFIX>`.
    pub fn default_for_node(node_default_identity: &str) -> Self {
        Self(format!("{node_default_identity}{DEFAULT_DESTINATION_SUFFIX}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl Display for DestinationIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rejects names that cannot appear unescaped in a channel URI.
pub(crate) fn validate_identifier(identifier: &str) -> Result<(), InvalidIdentifierError> {
    let reason = if identifier.is_empty() {
        Some("empty identifier")
    } else if identifier.chars().any(char::is_whitespace) {
        Some("contains whitespace")
    } else if identifier.chars().any(char::is_control) {
        Some("contains control characters")
    } else if identifier.contains(FORBIDDEN_CHARS) {
        Some("contains characters not allowed in a channel URI")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(InvalidIdentifierError {
            identifier: identifier.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Resolves a configured channel name against the node default identity.
///
/// Names carrying their own scheme (`ndn:/x`) are absolute and kept as-is;
/// anything else is appended to `base` with exactly one separator. A trailing
/// separator is dropped so derived identifiers never contain `//`.
pub fn join_identity(base: &str, name: &str) -> String {
    let name = name.trim();
    let joined = if has_scheme(name) {
        name.to_string()
    } else {
        let base = base.trim_end_matches(IDENTIFIER_SEPARATOR);
        let relative = name.trim_start_matches(IDENTIFIER_SEPARATOR);
        format!("{base}{IDENTIFIER_SEPARATOR}{relative}")
    };

    match joined.strip_suffix(IDENTIFIER_SEPARATOR) {
        Some(stripped) if !stripped.ends_with(':') => stripped.to_string(),
        _ => joined,
    }
}

fn has_scheme(name: &str) -> bool {
    let Some((scheme, _)) = name.split_once(':') else {
        return false;
    };
    let mut chars = scheme.chars();
    matches!(chars.next(), Some(first) if first.is_ascii_alphabetic())
        && chars.all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.'))
}
