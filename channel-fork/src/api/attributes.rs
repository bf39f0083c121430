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

//! Key/value attribute store used for configuration and externally visible state.

use crate::api::module_state::EngineState;
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Name of the required inbound channel attribute.
pub const INCOMING_CHANNEL: &str = "incoming-channel";
/// Name of the optional routing-key expression attribute.
pub const MESSAGE_FILTER: &str = "message-filter";
/// Name of the optional payload envelope attribute (`raw` or `mqtt-json`).
pub const PAYLOAD_ENVELOPE: &str = "payload-envelope";
/// Name of the attribute exposing every forked channel identifier.
pub const FORKED_CHANNELS: &str = "forked-channels";
/// Name of the attribute exposing the module lifecycle state.
pub const MODULE_STATE: &str = "module-state";

/// Typed attribute value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AttributeValue {
    Text(String),
    /// Ordered list; the fork engine always writes it sorted and de-duplicated.
    TextList(Vec<String>),
    State(EngineState),
}

impl AttributeValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_text_list(&self) -> Option<&[String]> {
        match self {
            AttributeValue::TextList(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_state(&self) -> Option<EngineState> {
        match self {
            AttributeValue::State(state) => Some(*state),
            _ => None,
        }
    }
}

/// Failures reported by an [`Attributes`] store.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum AttributeError {
    NotFound(String),
    NotWriteable(String),
    Registration { name: String, reason: String },
    TypeMismatch { name: String, expected: &'static str },
    Unavailable(String),
}

impl Display for AttributeError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeError::NotFound(name) => write!(f, "attribute '{name}' not found"),
            AttributeError::NotWriteable(name) => write!(f, "attribute '{name}' is not writeable"),
            AttributeError::Registration { name, reason } => {
                write!(f, "unable to register attribute '{name}': {reason}")
            }
            AttributeError::TypeMismatch { name, expected } => {
                write!(f, "attribute '{name}' is not of type {expected}")
            }
            AttributeError::Unavailable(reason) => {
                write!(f, "attribute store unavailable: {reason}")
            }
        }
    }
}

impl Error for AttributeError {}

/// Attribute store shared by a module and its host.
///
/// `get` distinguishes an unregistered attribute (`Err(NotFound)`) from a
/// registered attribute without a value (`Ok(None)`).
#[async_trait]
pub trait Attributes: Send + Sync {
    /// Registers a writeable attribute with no value.
    async fn add(&self, name: &str) -> Result<(), AttributeError>;

    async fn has(&self, name: &str) -> bool;

    async fn get(&self, name: &str) -> Result<Option<AttributeValue>, AttributeError>;

    async fn set(&self, name: &str, value: AttributeValue) -> Result<(), AttributeError>;

    /// Reads a required text attribute.
    async fn get_text(&self, name: &str) -> Result<String, AttributeError> {
        match self.get(name).await? {
            Some(AttributeValue::Text(text)) => Ok(text),
            Some(_) => Err(AttributeError::TypeMismatch {
                name: name.to_string(),
                expected: "text",
            }),
            None => Err(AttributeError::NotFound(name.to_string())),
        }
    }

    /// Reads an optional text attribute; unregistered and unset both map to `None`.
    async fn get_optional_text(&self, name: &str) -> Result<Option<String>, AttributeError> {
        match self.get(name).await {
            Ok(Some(AttributeValue::Text(text))) => Ok(Some(text)),
            Ok(Some(_)) => Err(AttributeError::TypeMismatch {
                name: name.to_string(),
                expected: "text",
            }),
            Ok(None) | Err(AttributeError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }
}
