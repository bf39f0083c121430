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

mod support;

use attributes_static_file::AttributesStaticFile;
use async_trait::async_trait;
use channel_fork::{
    AttributeValue, Attributes, BytesMessage, Channel, ChannelError, ChannelNode, EngineState,
    ForkModule, Persistence, StartupError, StopReason, FORKED_CHANNELS, MODULE_STATE,
};
use integration_test_utils::sensor_payload;
use memory_channel_node::MemoryNode;
use std::sync::Arc;
use tokio::sync::Notify;
use support::{fork_attributes, start_fork, start_fork_on, INBOUND_IDENTITY, NODE_IDENTITY};

async fn reported_state(attributes: &dyn Attributes) -> Option<EngineState> {
    match attributes.get(MODULE_STATE).await {
        Ok(Some(value)) => value.as_state(),
        _ => None,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_reports_stopped_and_closes_every_channel() {
    let fork = start_fork(Some("$.sensoridentifier"), None).await;
    let inbound = fork.inbound().await;
    inbound.publish(sensor_payload("S1", 1)).await.unwrap();
    inbound.publish(sensor_payload("S2", 1)).await.unwrap();

    assert_eq!(
        reported_state(fork.attributes.as_ref()).await,
        Some(EngineState::Running)
    );

    let node = fork.node.clone();
    let module = fork.module.clone();
    let attributes = fork.attributes.clone();
    assert_eq!(fork.stop().await, EngineState::Stopped);

    assert_eq!(reported_state(attributes.as_ref()).await, Some(EngineState::Stopped));
    for name in [
        "ndn:/node/test-fork/S1",
        "ndn:/node/test-fork/S2",
        INBOUND_IDENTITY,
    ] {
        let channel = node.channel(name).await.unwrap();
        assert!(!channel.is_open(), "{name} should be closed");
        assert_eq!(channel.close_calls(), 1);
    }
    let report = module.teardown_report().await.unwrap();
    assert_eq!(report.closed, 3);
    assert_eq!(report.failed, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn default_destination_is_closed_on_stop() {
    let fork = start_fork(None, None).await;
    fork.inbound()
        .await
        .publish(BytesMessage::from("..."))
        .await
        .unwrap();
    let node = fork.node.clone();

    fork.stop().await;

    let default = node.channel("ndn:/node/DEFAULT-DATA").await.unwrap();
    assert!(!default.is_open());
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_close_does_not_abort_teardown() {
    let node = Arc::new(MemoryNode::new(NODE_IDENTITY));
    node.fail_closes_for("ndn:/node/test-fork/S1").await;
    let fork = start_fork_on(node.clone(), Some("$.sensoridentifier"), None).await;
    let inbound = fork.inbound().await;
    inbound.publish(sensor_payload("S1", 1)).await.unwrap();
    inbound.publish(sensor_payload("S2", 1)).await.unwrap();
    let module = fork.module.clone();

    assert_eq!(fork.stop().await, EngineState::Stopped);

    assert!(!node.channel("ndn:/node/test-fork/S2").await.unwrap().is_open());
    assert!(!node.channel(INBOUND_IDENTITY).await.unwrap().is_open());
    let report = module.teardown_report().await.unwrap();
    assert_eq!(report.failed, 1);
    assert_eq!(report.closed, 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn messages_after_stop_are_not_forked() {
    let fork = start_fork(Some("$.sensoridentifier"), None).await;
    let inbound = fork.inbound().await;
    let node = fork.node.clone();

    fork.stop().await;
    // the inbound channel is closed, so nothing reaches the router any more
    assert!(inbound.publish(sensor_payload("S9", 1)).await.is_err());
    assert!(node.channel("ndn:/node/test-fork/S9").await.is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn forked_channels_attribute_is_registered_on_start() {
    let fork = start_fork(Some(""), None).await;

    assert!(fork.attributes.has(FORKED_CHANNELS).await);
    assert!(fork.attributes.has(MODULE_STATE).await);

    fork.stop().await;
}

#[tokio::test]
async fn missing_inbound_channel_is_a_startup_error() {
    integration_test_utils::init_logging();
    let module = ForkModule::new("fork-test");
    let attributes = Arc::new(AttributesStaticFile::default());

    let err = module
        .run(Arc::new(MemoryNode::new(NODE_IDENTITY)), attributes.clone())
        .await
        .unwrap_err();

    assert!(matches!(err, StartupError::MissingInboundChannel));
    assert_eq!(module.state().await, EngineState::Error);
    assert_eq!(
        reported_state(attributes.as_ref()).await,
        Some(EngineState::Error)
    );
}

#[tokio::test]
async fn read_only_forked_channels_attribute_does_not_stop_routing() {
    integration_test_utils::init_logging();
    let node = Arc::new(MemoryNode::new(NODE_IDENTITY));
    let attributes = Arc::new(fork_attributes(Some("$.sensoridentifier"), None));
    attributes.add(FORKED_CHANNELS).await.unwrap();
    attributes.mark_read_only(FORKED_CHANNELS).await;
    let module = Arc::new(ForkModule::new("fork-test"));

    let run = tokio::spawn({
        let module = module.clone();
        let node = node.clone();
        let attributes = attributes.clone();
        async move { module.run(node, attributes).await }
    });
    integration_test_utils::wait_for_state(
        &module,
        EngineState::Running,
        support::STARTUP_TIMEOUT,
    )
    .await;

    let inbound: Arc<dyn Channel> = node.channel(INBOUND_IDENTITY).await.unwrap();
    inbound.publish(sensor_payload("S1", 1)).await.unwrap();

    assert_eq!(
        node.channel("ndn:/node/test-fork/S1")
            .await
            .unwrap()
            .published_count(),
        1
    );
    assert_eq!(attributes.get(FORKED_CHANNELS).await.unwrap(), None);
    assert_eq!(
        module.known_destinations().await,
        vec!["ndn:/node/test-fork/S1"]
    );

    module.stop(StopReason::UserDirected).await;
    assert_eq!(run.await.unwrap().unwrap(), EngineState::Stopped);
}

#[tokio::test]
async fn unreachable_inbound_moves_module_to_error() {
    integration_test_utils::init_logging();
    let node = Arc::new(MemoryNode::new(NODE_IDENTITY));
    node.fail_opens_for(INBOUND_IDENTITY).await;
    let module = ForkModule::new("fork-test");
    let attributes = Arc::new(fork_attributes(None, None));

    let err = module.run(node, attributes.clone()).await.unwrap_err();

    assert!(matches!(err, StartupError::InboundOpenFailed(_)));
    assert_eq!(
        reported_state(attributes.as_ref()).await,
        Some(EngineState::Error)
    );
    assert_eq!(
        attributes.get(FORKED_CHANNELS).await.unwrap(),
        None::<AttributeValue>
    );
}

/// Delegates to a [`MemoryNode`] but holds opens of one identifier until released.
struct GatedNode {
    inner: Arc<MemoryNode>,
    gated: &'static str,
    open_started: Notify,
    release: Notify,
}

#[async_trait]
impl ChannelNode for GatedNode {
    fn default_identity(&self) -> &str {
        self.inner.default_identity()
    }

    async fn open_channel(
        &self,
        identifier: &str,
        persistence: Persistence,
    ) -> Result<Arc<dyn Channel>, ChannelError> {
        if identifier == self.gated {
            self.open_started.notify_one();
            self.release.notified().await;
        }
        self.inner.open_channel(identifier, persistence).await
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn destination_opened_during_teardown_is_closed() {
    integration_test_utils::init_logging();
    let memory = Arc::new(MemoryNode::new(NODE_IDENTITY));
    let node = Arc::new(GatedNode {
        inner: memory.clone(),
        gated: "ndn:/node/test-fork/SLOW",
        open_started: Notify::new(),
        release: Notify::new(),
    });
    let attributes = Arc::new(fork_attributes(Some("$.sensoridentifier"), None));
    let module = Arc::new(ForkModule::new("fork-test"));

    let run = tokio::spawn({
        let module = module.clone();
        let node = node.clone();
        let attributes = attributes.clone();
        async move { module.run(node, attributes).await }
    });
    integration_test_utils::wait_for_state(
        &module,
        EngineState::Running,
        support::STARTUP_TIMEOUT,
    )
    .await;

    let inbound = memory.channel(INBOUND_IDENTITY).await.unwrap();
    assert_eq!(inbound.subscriber_count().await, 1);
    let publisher = tokio::spawn({
        let inbound = inbound.clone();
        async move { inbound.publish(sensor_payload("SLOW", 1)).await }
    });
    node.open_started.notified().await;

    module.stop(StopReason::UserDirected).await;
    assert_eq!(run.await.unwrap().unwrap(), EngineState::Stopped);
    node.release.notify_one();
    publisher.await.unwrap().unwrap();

    let slow = memory.channel("ndn:/node/test-fork/SLOW").await.unwrap();
    assert!(!slow.is_open());
    assert_eq!(slow.persistence(), Persistence::Persistent);
    assert_eq!(slow.published_count(), 0);
    assert!(!inbound.is_open());
    assert_eq!(inbound.subscriber_count().await, 0);
    assert_eq!(memory.total_opens().await, 2);
    assert!(module.known_destinations().await.is_empty());
    let report = module.teardown_report().await.unwrap();
    assert_eq!(report.closed, 1);
    assert_eq!(report.failed, 0);
}

#[tokio::test]
async fn stop_before_run_opens_no_channels() {
    integration_test_utils::init_logging();
    let node = Arc::new(MemoryNode::new(NODE_IDENTITY));
    let attributes = Arc::new(fork_attributes(Some("$.sensoridentifier"), None));
    let module = ForkModule::new("fork-test");

    module.stop(StopReason::UserDirected).await;
    let state = module.run(node.clone(), attributes.clone()).await.unwrap();

    assert_eq!(state, EngineState::Stopped);
    assert_eq!(node.total_opens().await, 0);
    assert!(node.channel_names().await.is_empty());
    assert!(attributes.has(FORKED_CHANNELS).await);
    let report = module.teardown_report().await.unwrap();
    assert_eq!(report.closed, 0);
}
