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

//! Startup configuration read from the attribute store.

use crate::api::attributes::{
    AttributeError, Attributes, FORKED_CHANNELS, INCOMING_CHANNEL, MESSAGE_FILTER,
    PAYLOAD_ENVELOPE,
};
use crate::api::status::ChannelError;
use crate::extraction::payload_envelope::{PayloadEnvelope, UnknownEnvelopeError};
use crate::extraction::routing_expression::{ExpressionError, RoutingExpression};
use crate::extraction::FieldExtractor;
use crate::routing::destination_identifier::{
    join_identity, validate_identifier, InvalidIdentifierError,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Failures that keep a module from reaching RUNNING.
#[derive(Debug)]
pub enum StartupError {
    AlreadyStarted,
    AttributeRegistration(AttributeError),
    AttributeRead(AttributeError),
    MissingInboundChannel,
    InvalidExpression(ExpressionError),
    InvalidEnvelope(UnknownEnvelopeError),
    InvalidInboundIdentity(InvalidIdentifierError),
    InboundOpenFailed(ChannelError),
    SubscribeFailed(ChannelError),
}

impl Display for StartupError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StartupError::AlreadyStarted => write!(f, "module has already been run"),
            StartupError::AttributeRegistration(err) => {
                write!(f, "failed to register module attributes: {err}")
            }
            StartupError::AttributeRead(err) => {
                write!(f, "failed to read module configuration: {err}")
            }
            StartupError::MissingInboundChannel => {
                write!(f, "attribute '{INCOMING_CHANNEL}' is required")
            }
            StartupError::InvalidExpression(err) => write!(f, "invalid message filter: {err}"),
            StartupError::InvalidEnvelope(err) => write!(f, "invalid payload envelope: {err}"),
            StartupError::InvalidInboundIdentity(err) => {
                write!(f, "invalid inbound channel: {err}")
            }
            StartupError::InboundOpenFailed(err) => {
                write!(f, "failed to open inbound channel: {err}")
            }
            StartupError::SubscribeFailed(err) => {
                write!(f, "failed to subscribe to inbound channel: {err}")
            }
        }
    }
}

impl Error for StartupError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StartupError::AttributeRegistration(err) | StartupError::AttributeRead(err) => {
                Some(err)
            }
            StartupError::InvalidExpression(err) => Some(err),
            StartupError::InvalidEnvelope(err) => Some(err),
            StartupError::InvalidInboundIdentity(err) => Some(err),
            StartupError::InboundOpenFailed(err) | StartupError::SubscribeFailed(err) => {
                Some(err)
            }
            StartupError::AlreadyStarted | StartupError::MissingInboundChannel => None,
        }
    }
}

/// Everything the router needs, resolved and validated.
#[derive(Debug)]
pub(crate) struct ModuleConfig {
    pub(crate) inbound_identity: String,
    pub(crate) extractor: Option<FieldExtractor>,
}

impl ModuleConfig {
    /// Registers `forked-channels` and reads the routing configuration.
    pub(crate) async fn load(
        node_default_identity: &str,
        attributes: &dyn Attributes,
    ) -> Result<Self, StartupError> {
        if !attributes.has(FORKED_CHANNELS).await {
            attributes
                .add(FORKED_CHANNELS)
                .await
                .map_err(StartupError::AttributeRegistration)?;
        }

        let incoming = attributes
            .get_optional_text(INCOMING_CHANNEL)
            .await
            .map_err(StartupError::AttributeRead)?
            .filter(|incoming| !incoming.trim().is_empty())
            .ok_or(StartupError::MissingInboundChannel)?;

        let filter = attributes
            .get_optional_text(MESSAGE_FILTER)
            .await
            .map_err(StartupError::AttributeRead)?;
        let expression = RoutingExpression::from_config(filter.as_deref())
            .map_err(StartupError::InvalidExpression)?;

        let envelope = match attributes
            .get_optional_text(PAYLOAD_ENVELOPE)
            .await
            .map_err(StartupError::AttributeRead)?
        {
            Some(name) => name
                .parse::<PayloadEnvelope>()
                .map_err(StartupError::InvalidEnvelope)?,
            None => PayloadEnvelope::default(),
        };

        let inbound_identity = join_identity(node_default_identity, &incoming);
        validate_identifier(&inbound_identity).map_err(StartupError::InvalidInboundIdentity)?;

        Ok(Self {
            inbound_identity,
            extractor: expression.map(|expression| FieldExtractor::new(expression, envelope)),
        })
    }
}
