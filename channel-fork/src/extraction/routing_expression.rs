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

//! Compiled JSONPath routing-key expression.

use serde_json::Value;
use serde_json_path::JsonPath;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

/// The configured expression could not be compiled.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ExpressionError {
    pub(crate) expression: String,
    pub(crate) reason: String,
}

impl Display for ExpressionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid routing expression '{}': {}",
            self.expression, self.reason
        )
    }
}

impl Error for ExpressionError {}

/// Per-message extraction failures. None of them are fatal to the engine.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ExtractionError {
    MalformedPayload(String),
    MalformedEnvelope(String),
    NonScalarMatch(&'static str),
    AmbiguousMatch(usize),
}

impl Display for ExtractionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionError::MalformedPayload(reason) => {
                write!(f, "payload is not a JSON document: {reason}")
            }
            ExtractionError::MalformedEnvelope(reason) => {
                write!(f, "unable to decode payload envelope: {reason}")
            }
            ExtractionError::NonScalarMatch(kind) => {
                write!(f, "routing expression matched a JSON {kind}, expected a scalar")
            }
            ExtractionError::AmbiguousMatch(count) => {
                write!(f, "routing expression matched {count} nodes, expected one")
            }
        }
    }
}

impl Error for ExtractionError {}

/// A JSONPath expression evaluated read-only against each payload.
///
/// Expressions without a leading `$` are rooted implicitly, so `sensoridentifier`
/// and `$.sensoridentifier` select the same field.
///
/// ```
/// use channel_fork::RoutingExpression;
///
/// let expression = RoutingExpression::parse("$.sensoridentifier").unwrap();
/// let payload = br#"{"sensoridentifier":"S1","type":"sensor"}"#;
///
/// assert_eq!(expression.extract(payload).unwrap(), Some("S1".to_string()));
/// assert_eq!(expression.extract(br#"{"type":"sensor"}"#).unwrap(), None);
/// ```
pub struct RoutingExpression {
    source: String,
    path: JsonPath,
}

impl RoutingExpression {
    pub fn parse(expression: &str) -> Result<Self, ExpressionError> {
        let trimmed = expression.trim();
        let rooted = if trimmed.starts_with('$') {
            trimmed.to_string()
        } else if trimmed.starts_with('[') {
            format!("${trimmed}")
        } else {
            format!("$.{trimmed}")
        };

        let path = JsonPath::parse(&rooted).map_err(|err| ExpressionError {
            expression: expression.to_string(),
            reason: err.to_string(),
        })?;

        Ok(Self {
            source: trimmed.to_string(),
            path,
        })
    }

    /// Compiles an optional configured expression; absent or blank means "no filter".
    pub fn from_config(expression: Option<&str>) -> Result<Option<Self>, ExpressionError> {
        match expression {
            Some(expression) if !expression.trim().is_empty() => Self::parse(expression).map(Some),
            _ => Ok(None),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Parses `document` as JSON and evaluates the expression against it.
    pub fn extract(&self, document: &[u8]) -> Result<Option<String>, ExtractionError> {
        let value: Value = serde_json::from_slice(document)
            .map_err(|err| ExtractionError::MalformedPayload(err.to_string()))?;
        self.extract_value(&value)
    }

    /// Evaluates the expression against an already decoded document.
    ///
    /// No match and a `null` match both mean "not found". Strings are returned
    /// verbatim, numbers and booleans as their JSON text.
    pub fn extract_value(&self, value: &Value) -> Result<Option<String>, ExtractionError> {
        let nodes = self.path.query(value).all();
        let node = match nodes.as_slice() {
            [] => return Ok(None),
            [node] => *node,
            many => return Err(ExtractionError::AmbiguousMatch(many.len())),
        };

        match node {
            Value::Null => Ok(None),
            Value::String(text) => Ok(Some(text.clone())),
            Value::Number(number) => Ok(Some(number.to_string())),
            Value::Bool(flag) => Ok(Some(flag.to_string())),
            Value::Array(_) => Err(ExtractionError::NonScalarMatch("array")),
            Value::Object(_) => Err(ExtractionError::NonScalarMatch("object")),
        }
    }
}

impl Debug for RoutingExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("RoutingExpression")
            .field(&self.source)
            .finish()
    }
}

impl Display for RoutingExpression {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}
