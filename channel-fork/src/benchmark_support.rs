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

//! Deterministic benchmark fixtures for the Criterion harness.

use crate::api::attributes::{AttributeError, AttributeValue, Attributes};
use crate::api::channel::{Channel, ChannelListener, ChannelNode, Persistence};
use crate::api::message::BytesMessage;
use crate::api::status::ChannelError;
use crate::extraction::payload_envelope::PayloadEnvelope;
use crate::extraction::routing_expression::{ExpressionError, RoutingExpression};
use crate::extraction::FieldExtractor;
use crate::routing::fork_router::ForkRouter;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const BENCH_NODE: &str = "ndn:/bench-node";
const BENCH_INBOUND: &str = "ndn:/bench-node/fork-in";
const BENCH_FILTER: &str = "$.sensoridentifier";

fn sensor_payload(index: usize) -> BytesMessage {
    BytesMessage::from(
        format!(r#"{{"sensoridentifier":"S{index}","reading":{{"value":{index},"unit":"C"}}}}"#)
            .as_str(),
    )
}

struct CountingChannel {
    name: String,
    published: Arc<AtomicUsize>,
}

#[async_trait]
impl Channel for CountingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_open(&self) -> bool {
        true
    }

    async fn publish(&self, _message: BytesMessage) -> Result<(), ChannelError> {
        self.published.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn subscribe(&self, _listener: Arc<dyn ChannelListener>) -> Result<(), ChannelError> {
        Ok(())
    }

    async fn close(&self) -> Result<(), ChannelError> {
        Ok(())
    }
}

struct CountingNode {
    published: Arc<AtomicUsize>,
}

#[async_trait]
impl ChannelNode for CountingNode {
    fn default_identity(&self) -> &str {
        BENCH_NODE
    }

    async fn open_channel(
        &self,
        identifier: &str,
        _persistence: Persistence,
    ) -> Result<Arc<dyn Channel>, ChannelError> {
        Ok(Arc::new(CountingChannel {
            name: identifier.to_string(),
            published: self.published.clone(),
        }))
    }
}

struct DiscardAttributes;

#[async_trait]
impl Attributes for DiscardAttributes {
    async fn add(&self, _name: &str) -> Result<(), AttributeError> {
        Ok(())
    }

    async fn has(&self, _name: &str) -> bool {
        true
    }

    async fn get(&self, _name: &str) -> Result<Option<AttributeValue>, AttributeError> {
        Ok(None)
    }

    async fn set(&self, _name: &str, _value: AttributeValue) -> Result<(), AttributeError> {
        Ok(())
    }
}

/// Pre-built payloads evaluated against a compiled routing expression.
pub struct ExtractionFixture {
    extractor: FieldExtractor,
    payloads: Vec<BytesMessage>,
}

impl ExtractionFixture {
    pub fn new(payload_count: usize) -> Result<Self, ExpressionError> {
        Ok(Self {
            extractor: FieldExtractor::new(
                RoutingExpression::parse(BENCH_FILTER)?,
                PayloadEnvelope::Raw,
            ),
            payloads: (0..payload_count).map(sensor_payload).collect(),
        })
    }

    /// Number of payloads that produced a routing key.
    pub fn extract_count(&self) -> usize {
        self.payloads
            .iter()
            .filter(|payload| matches!(self.extractor.extract(payload), Ok(Some(_))))
            .count()
    }
}

/// A router over an in-process counting transport.
pub struct DispatchFixture {
    router: ForkRouter,
    payloads: Vec<BytesMessage>,
    published: Arc<AtomicUsize>,
}

impl DispatchFixture {
    /// Forking router cycling through `key_count` distinct routing keys.
    pub fn forked(key_count: usize) -> Result<Self, ExpressionError> {
        let extractor =
            FieldExtractor::new(RoutingExpression::parse(BENCH_FILTER)?, PayloadEnvelope::Raw);
        Ok(Self::build(Some(extractor), key_count))
    }

    /// Router without a routing expression.
    pub fn default_path(payload_count: usize) -> Self {
        Self::build(None, payload_count)
    }

    fn build(extractor: Option<FieldExtractor>, payload_count: usize) -> Self {
        let published = Arc::new(AtomicUsize::new(0));
        let node = Arc::new(CountingNode {
            published: published.clone(),
        });
        Self {
            router: ForkRouter::new(
                "bench",
                BENCH_INBOUND,
                extractor,
                node,
                Arc::new(DiscardAttributes),
            ),
            payloads: (0..payload_count.max(1)).map(sensor_payload).collect(),
            published,
        }
    }

    /// Dispatches every payload once and returns how many were delivered.
    pub async fn dispatch_round(&self) -> usize {
        let mut delivered = 0;
        for payload in &self.payloads {
            if self.router.dispatch(payload.clone()).await.is_delivered() {
                delivered += 1;
            }
        }
        delivered
    }

    pub fn published(&self) -> usize {
        self.published.load(Ordering::Relaxed)
    }
}
