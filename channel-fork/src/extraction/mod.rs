//! Routing-key extraction.
//!
//! Combines an optional [`PayloadEnvelope`] with a compiled
//! [`RoutingExpression`] into the [`FieldExtractor`] the router consults once
//! per message.

pub(crate) mod payload_envelope;
pub(crate) mod routing_expression;

use crate::api::message::BytesMessage;
use payload_envelope::PayloadEnvelope;
use routing_expression::{ExtractionError, RoutingExpression};

/// Envelope decoding followed by expression evaluation.
#[derive(Debug)]
pub struct FieldExtractor {
    expression: RoutingExpression,
    envelope: PayloadEnvelope,
}

impl FieldExtractor {
    pub fn new(expression: RoutingExpression, envelope: PayloadEnvelope) -> Self {
        Self {
            expression,
            envelope,
        }
    }

    pub fn expression(&self) -> &RoutingExpression {
        &self.expression
    }

    pub fn envelope(&self) -> PayloadEnvelope {
        self.envelope
    }

    /// Returns the routing key of `message`, or `None` when the field is absent.
    pub fn extract(&self, message: &BytesMessage) -> Result<Option<String>, ExtractionError> {
        let document = self.envelope.inner_document(message.bytes())?;
        self.expression.extract(&document)
    }
}
