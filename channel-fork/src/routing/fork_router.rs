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

//! Per-message dispatch: extract, resolve, publish, record.

use crate::api::attributes::Attributes;
use crate::api::channel::{Channel, ChannelNode, Persistence};
use crate::api::message::BytesMessage;
use crate::data_plane::default_destination::DefaultDestination;
use crate::data_plane::destination_registry::DestinationRegistry;
use crate::data_plane::known_destinations::KnownDestinations;
use crate::extraction::routing_expression::ExtractionError;
use crate::extraction::FieldExtractor;
use crate::observability::{events, fields};
use crate::routing::destination_identifier::DestinationIdentifier;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn, Level};

const COMPONENT: &str = "fork_router";

/// What happened to a single inbound message.
///
/// Every variant other than [`DispatchOutcome::Forked`] and
/// [`DispatchOutcome::DefaultPublished`] means the message was dropped.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DispatchOutcome {
    /// Published to the forked channel with this identifier.
    Forked(DestinationIdentifier),
    /// Published to the default destination.
    DefaultPublished,
    /// The routing field was absent, null or empty.
    NoRoutingKey,
    /// The payload or its envelope could not be evaluated.
    ExtractionFailed,
    /// The destination identifier was invalid or its channel could not be opened.
    DestinationUnavailable,
    /// The destination channel rejected the publish.
    PublishFailed,
    /// The router is shutting down.
    Rejected,
}

impl DispatchOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(
            self,
            DispatchOutcome::Forked(_) | DispatchOutcome::DefaultPublished
        )
    }
}

pub(crate) struct ForkRouter {
    module_id: String,
    inbound_identity: String,
    extractor: Option<FieldExtractor>,
    node: Arc<dyn ChannelNode>,
    registry: DestinationRegistry,
    default_destination: DefaultDestination,
    known_destinations: KnownDestinations,
    next_dispatch_id: AtomicU64,
    accepting: AtomicBool,
}

impl ForkRouter {
    pub(crate) fn new(
        module_id: &str,
        inbound_identity: &str,
        extractor: Option<FieldExtractor>,
        node: Arc<dyn ChannelNode>,
        attributes: Arc<dyn Attributes>,
    ) -> Self {
        let default_identifier = DestinationIdentifier::default_for_node(node.default_identity());
        Self {
            module_id: module_id.to_string(),
            inbound_identity: inbound_identity.to_string(),
            extractor,
            registry: DestinationRegistry::new(node.clone(), Persistence::Persistent),
            default_destination: DefaultDestination::new(
                default_identifier,
                Persistence::Persistent,
            ),
            known_destinations: KnownDestinations::new(attributes),
            node,
            next_dispatch_id: AtomicU64::new(0),
            accepting: AtomicBool::new(true),
        }
    }

    /// Routes one message. Never fails; every drop is logged and reported
    /// through the returned outcome.
    pub(crate) async fn dispatch(&self, message: BytesMessage) -> DispatchOutcome {
        let dispatch_id = self.next_dispatch_id.fetch_add(1, Ordering::Relaxed);

        if tracing::enabled!(Level::DEBUG) {
            debug!(
                event = events::DISPATCH_RECEIVE,
                component = COMPONENT,
                module_id = self.module_id.as_str(),
                dispatch_id,
                payload_len = message.len(),
                payload = fields::format_payload_preview(&message).as_str(),
                "received inbound message"
            );
        }

        if !self.accepting.load(Ordering::Acquire) {
            debug!(
                event = events::DISPATCH_RECEIVE,
                component = COMPONENT,
                module_id = self.module_id.as_str(),
                dispatch_id,
                reason = "shutting_down",
                "router stopped, dropping message"
            );
            return DispatchOutcome::Rejected;
        }

        match self.extractor.as_ref() {
            None => self.publish_default(dispatch_id, message).await,
            Some(extractor) => self.publish_forked(dispatch_id, extractor, message).await,
        }
    }

    async fn publish_forked(
        &self,
        dispatch_id: u64,
        extractor: &FieldExtractor,
        message: BytesMessage,
    ) -> DispatchOutcome {
        let routing_key = match extractor.extract(&message) {
            Ok(key) => key,
            Err(err) => {
                let event = match &err {
                    ExtractionError::MalformedEnvelope(_) => {
                        events::DISPATCH_ENVELOPE_DECODE_FAILED
                    }
                    _ => events::DISPATCH_EXTRACTION_FAILED,
                };
                warn!(
                    event,
                    component = COMPONENT,
                    module_id = self.module_id.as_str(),
                    dispatch_id,
                    message_filter = extractor.expression().as_str(),
                    err = %err,
                    "unable to extract routing key, dropping message"
                );
                return DispatchOutcome::ExtractionFailed;
            }
        };

        let routing_key = match routing_key {
            Some(key) if !key.is_empty() => key,
            other => {
                let reason = if other.is_some() {
                    fields::REASON_EMPTY_KEY
                } else {
                    fields::REASON_MISSING_FIELD
                };
                debug!(
                    event = events::DISPATCH_NO_ROUTING_KEY,
                    component = COMPONENT,
                    module_id = self.module_id.as_str(),
                    dispatch_id,
                    message_filter = extractor.expression().as_str(),
                    routing_key = fields::or_none(other.as_deref()),
                    reason,
                    "no routing key, dropping message"
                );
                return DispatchOutcome::NoRoutingKey;
            }
        };

        let identifier =
            match DestinationIdentifier::for_routing_key(&self.inbound_identity, &routing_key) {
                Ok(identifier) => identifier,
                Err(err) => {
                    warn!(
                        event = events::DISPATCH_INVALID_IDENTIFIER,
                        component = COMPONENT,
                        module_id = self.module_id.as_str(),
                        dispatch_id,
                        routing_key = routing_key.as_str(),
                        err = %err,
                        "routing key does not form a valid channel identifier, dropping message"
                    );
                    return DispatchOutcome::DestinationUnavailable;
                }
            };

        let channel = match self.registry.resolve(&identifier).await {
            Ok(channel) => channel,
            Err(_) => return DispatchOutcome::DestinationUnavailable,
        };

        if let Err(err) = channel.publish(message).await {
            warn!(
                event = events::DISPATCH_FORK_PUBLISH_FAILED,
                component = COMPONENT,
                module_id = self.module_id.as_str(),
                dispatch_id,
                destination = identifier.as_str(),
                err = %err,
                "unable to publish to forked channel, dropping message"
            );
            return DispatchOutcome::PublishFailed;
        }

        debug!(
            event = events::DISPATCH_FORK_PUBLISH_OK,
            component = COMPONENT,
            module_id = self.module_id.as_str(),
            dispatch_id,
            destination = identifier.as_str(),
            routing_key = routing_key.as_str(),
            "forked message"
        );
        self.known_destinations.record(&identifier).await;
        DispatchOutcome::Forked(identifier)
    }

    async fn publish_default(&self, dispatch_id: u64, message: BytesMessage) -> DispatchOutcome {
        let destination = self.default_destination.identifier().as_str();
        let channel = match self.default_destination.get_or_open(self.node.as_ref()).await {
            Ok(channel) => channel,
            Err(_) => return DispatchOutcome::DestinationUnavailable,
        };

        match channel.publish(message).await {
            Ok(()) => {
                debug!(
                    event = events::DISPATCH_DEFAULT_PUBLISH_OK,
                    component = COMPONENT,
                    module_id = self.module_id.as_str(),
                    dispatch_id,
                    destination,
                    "published message to default destination"
                );
                DispatchOutcome::DefaultPublished
            }
            Err(err) => {
                warn!(
                    event = events::DISPATCH_DEFAULT_PUBLISH_FAILED,
                    component = COMPONENT,
                    module_id = self.module_id.as_str(),
                    dispatch_id,
                    destination,
                    err = %err,
                    "unable to publish to default destination, dropping message"
                );
                DispatchOutcome::PublishFailed
            }
        }
    }

    /// Stops accepting new dispatches. Dispatches already past the check run
    /// to completion.
    pub(crate) fn stop_accepting(&self) {
        self.accepting.store(false, Ordering::Release);
    }

    /// Refuses further forked opens and returns every forked channel created.
    /// An open still in flight closes its own channel when it completes.
    pub(crate) async fn close_forked_channels(&self) -> Vec<(String, Arc<dyn Channel>)> {
        self.registry
            .close()
            .await
            .into_iter()
            .map(|(identifier, channel)| (identifier.into_string(), channel))
            .collect()
    }

    /// Refuses a late default open and returns the default channel, if a
    /// message ever took the default path.
    pub(crate) async fn close_default_channel(&self) -> Option<(String, Arc<dyn Channel>)> {
        self.default_destination
            .close()
            .await
            .map(|channel| (self.default_destination.identifier().to_string(), channel))
    }

    pub(crate) async fn destination_count(&self) -> usize {
        self.registry.len().await
    }

    pub(crate) async fn known_destinations(&self) -> Vec<String> {
        self.known_destinations.snapshot().await
    }

    pub(crate) fn dispatched(&self) -> u64 {
        self.next_dispatch_id.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::{DispatchOutcome, ForkRouter};
    use crate::api::attributes::{AttributeError, AttributeValue, Attributes, FORKED_CHANNELS};
    use crate::api::channel::{Channel, ChannelListener, ChannelNode, Persistence};
    use crate::api::message::BytesMessage;
    use crate::api::status::{ChannelError, ChannelErrorCode};
    use crate::extraction::payload_envelope::PayloadEnvelope;
    use crate::extraction::routing_expression::RoutingExpression;
    use crate::extraction::FieldExtractor;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::Mutex;

    const INBOUND: &str = "ndn:/test-fork";

    struct RecordingChannel {
        name: String,
        reject_publish: bool,
        published: Mutex<Vec<BytesMessage>>,
    }

    #[async_trait]
    impl Channel for RecordingChannel {
        fn name(&self) -> &str {
            &self.name
        }

        fn is_open(&self) -> bool {
            true
        }

        async fn publish(&self, message: BytesMessage) -> Result<(), ChannelError> {
            if self.reject_publish {
                return Err(ChannelError::fail_with_code(
                    ChannelErrorCode::Unavailable,
                    "publish rejected",
                ));
            }
            self.published.lock().await.push(message);
            Ok(())
        }

        async fn subscribe(&self, _listener: Arc<dyn ChannelListener>) -> Result<(), ChannelError> {
            Ok(())
        }

        async fn close(&self) -> Result<(), ChannelError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct MockNode {
        reject_publish: AtomicBool,
        opened: Mutex<Vec<String>>,
        channels: Mutex<HashMap<String, Arc<RecordingChannel>>>,
    }

    impl MockNode {
        async fn open_count(&self, identifier: &str) -> usize {
            self.opened
                .lock()
                .await
                .iter()
                .filter(|opened| opened.as_str() == identifier)
                .count()
        }

        async fn published_to(&self, identifier: &str) -> usize {
            match self.channels.lock().await.get(identifier) {
                Some(channel) => channel.published.lock().await.len(),
                None => 0,
            }
        }
    }

    #[async_trait]
    impl ChannelNode for MockNode {
        fn default_identity(&self) -> &str {
            "ndn:/node"
        }

        async fn open_channel(
            &self,
            identifier: &str,
            _persistence: Persistence,
        ) -> Result<Arc<dyn Channel>, ChannelError> {
            self.opened.lock().await.push(identifier.to_string());
            let channel = Arc::new(RecordingChannel {
                name: identifier.to_string(),
                reject_publish: self.reject_publish.load(Ordering::SeqCst),
                published: Mutex::new(Vec::new()),
            });
            self.channels
                .lock()
                .await
                .insert(identifier.to_string(), channel.clone());
            Ok(channel)
        }
    }

    #[derive(Default)]
    struct ListAttributes {
        forked: Mutex<Option<Vec<String>>>,
    }

    #[async_trait]
    impl Attributes for ListAttributes {
        async fn add(&self, _name: &str) -> Result<(), AttributeError> {
            Ok(())
        }

        async fn has(&self, name: &str) -> bool {
            name == FORKED_CHANNELS
        }

        async fn get(&self, name: &str) -> Result<Option<AttributeValue>, AttributeError> {
            if name == FORKED_CHANNELS {
                return Ok(self.forked.lock().await.clone().map(AttributeValue::TextList));
            }
            Err(AttributeError::NotFound(name.to_string()))
        }

        async fn set(&self, name: &str, value: AttributeValue) -> Result<(), AttributeError> {
            match (name, value) {
                (FORKED_CHANNELS, AttributeValue::TextList(list)) => {
                    *self.forked.lock().await = Some(list);
                    Ok(())
                }
                _ => Err(AttributeError::NotWriteable(name.to_string())),
            }
        }
    }

    fn sensor_router(
        node: Arc<MockNode>,
        attributes: Arc<ListAttributes>,
    ) -> ForkRouter {
        let extractor = FieldExtractor::new(
            RoutingExpression::parse("$.sensoridentifier").unwrap(),
            PayloadEnvelope::Raw,
        );
        ForkRouter::new("test", INBOUND, Some(extractor), node, attributes)
    }

    fn sensor_message(sensor: &str) -> BytesMessage {
        BytesMessage::from(format!(r#"{{"sensoridentifier":"{sensor}","value":1}}"#).as_str())
    }

    #[tokio::test]
    async fn repeated_key_reuses_destination() {
        let node = Arc::new(MockNode::default());
        let attributes = Arc::new(ListAttributes::default());
        let router = sensor_router(node.clone(), attributes.clone());

        for sensor in ["S1", "S2", "S1"] {
            let outcome = router.dispatch(sensor_message(sensor)).await;
            assert!(outcome.is_delivered());
        }

        assert_eq!(node.opened.lock().await.len(), 2);
        assert_eq!(node.open_count("ndn:/test-fork/S1").await, 1);
        assert_eq!(node.open_count("ndn:/test-fork/S2").await, 1);
        assert_eq!(node.published_to("ndn:/test-fork/S1").await, 2);
        assert_eq!(node.published_to("ndn:/test-fork/S2").await, 1);
        assert_eq!(
            *attributes.forked.lock().await,
            Some(vec![
                "ndn:/test-fork/S1".to_string(),
                "ndn:/test-fork/S2".to_string()
            ])
        );
        assert_eq!(router.dispatched(), 3);
    }

    #[tokio::test]
    async fn forked_outcome_names_destination() {
        let node = Arc::new(MockNode::default());
        let router = sensor_router(node, Arc::new(ListAttributes::default()));

        let outcome = router.dispatch(sensor_message("S1")).await;

        match outcome {
            DispatchOutcome::Forked(identifier) => {
                assert_eq!(identifier.as_str(), "ndn:/test-fork/S1")
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_and_missing_keys_are_dropped() {
        let node = Arc::new(MockNode::default());
        let attributes = Arc::new(ListAttributes::default());
        let router = sensor_router(node.clone(), attributes.clone());

        let empty = router.dispatch(sensor_message("")).await;
        let missing = router
            .dispatch(BytesMessage::from(r#"{"value":1}"#))
            .await;
        let null = router
            .dispatch(BytesMessage::from(r#"{"sensoridentifier":null}"#))
            .await;

        assert_eq!(empty, DispatchOutcome::NoRoutingKey);
        assert_eq!(missing, DispatchOutcome::NoRoutingKey);
        assert_eq!(null, DispatchOutcome::NoRoutingKey);
        assert!(node.opened.lock().await.is_empty());
        assert_eq!(*attributes.forked.lock().await, None);
    }

    #[tokio::test]
    async fn malformed_payload_is_dropped() {
        let node = Arc::new(MockNode::default());
        let router = sensor_router(node.clone(), Arc::new(ListAttributes::default()));

        let outcome = router.dispatch(BytesMessage::from("not json")).await;

        assert_eq!(outcome, DispatchOutcome::ExtractionFailed);
        assert!(node.opened.lock().await.is_empty());
    }

    #[tokio::test]
    async fn invalid_identifier_is_dropped() {
        let node = Arc::new(MockNode::default());
        let router = sensor_router(node.clone(), Arc::new(ListAttributes::default()));

        let outcome = router.dispatch(sensor_message("has space")).await;

        assert_eq!(outcome, DispatchOutcome::DestinationUnavailable);
        assert!(node.opened.lock().await.is_empty());
    }

    #[tokio::test]
    async fn failed_publish_does_not_record_destination() {
        let node = Arc::new(MockNode::default());
        node.reject_publish.store(true, Ordering::SeqCst);
        let attributes = Arc::new(ListAttributes::default());
        let router = sensor_router(node.clone(), attributes.clone());

        let outcome = router.dispatch(sensor_message("S1")).await;

        assert_eq!(outcome, DispatchOutcome::PublishFailed);
        assert_eq!(*attributes.forked.lock().await, None);
        assert!(router.known_destinations().await.is_empty());
        // the channel stays registered so teardown still closes it
        assert_eq!(router.close_forked_channels().await.len(), 1);
    }

    #[tokio::test]
    async fn default_path_uses_single_channel() {
        let node = Arc::new(MockNode::default());
        let attributes = Arc::new(ListAttributes::default());
        let router = ForkRouter::new("test", INBOUND, None, node.clone(), attributes.clone());

        for sensor in ["S1", "S2", ""] {
            assert_eq!(
                router.dispatch(sensor_message(sensor)).await,
                DispatchOutcome::DefaultPublished
            );
        }

        assert_eq!(*node.opened.lock().await, vec!["ndn:/node/DEFAULT-DATA"]);
        assert_eq!(node.published_to("ndn:/node/DEFAULT-DATA").await, 3);
        assert_eq!(*attributes.forked.lock().await, None);
        assert_eq!(router.destination_count().await, 0);
        assert!(router.close_forked_channels().await.is_empty());
        assert_eq!(
            router.close_default_channel().await.map(|(identifier, _)| identifier),
            Some("ndn:/node/DEFAULT-DATA".to_string())
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_default_dispatch_opens_once() {
        let node = Arc::new(MockNode::default());
        let router = Arc::new(ForkRouter::new(
            "test",
            INBOUND,
            None,
            node.clone(),
            Arc::new(ListAttributes::default()),
        ));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let router = router.clone();
                tokio::spawn(async move { router.dispatch(sensor_message("S1")).await })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.await.unwrap(), DispatchOutcome::DefaultPublished);
        }

        assert_eq!(node.opened.lock().await.len(), 1);
        assert_eq!(node.published_to("ndn:/node/DEFAULT-DATA").await, 16);
    }

    #[tokio::test]
    async fn stopped_router_rejects_messages() {
        let node = Arc::new(MockNode::default());
        let router = sensor_router(node.clone(), Arc::new(ListAttributes::default()));

        router.stop_accepting();

        assert_eq!(
            router.dispatch(sensor_message("S1")).await,
            DispatchOutcome::Rejected
        );
        assert!(node.opened.lock().await.is_empty());
    }
}
