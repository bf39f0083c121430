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

//! # channel-fork
//!
//! `channel-fork` is a content-based fan-out router. It subscribes to one
//! inbound channel, evaluates a JSONPath routing expression against every
//! payload, and republishes the message onto a channel named
//! `<inbound>/<routing-key>`. Without a routing expression every message goes
//! to the node's `<default>/DEFAULT-DATA` channel.
//!
//! The transport and the attribute store are consumed through the
//! [`ChannelNode`] / [`Channel`] / [`ChannelListener`] and [`Attributes`]
//! traits. [`ForkModule`] ties them together and owns the lifecycle.
//!
//! ## Quick start
//!
//! ```
//! use std::sync::Arc;
//! use channel_fork::{
//!     AttributeValue, Attributes, BytesMessage, Channel, ChannelNode, EngineState, ForkModule,
//!     Persistence, StopReason, INCOMING_CHANNEL, MESSAGE_FILTER,
//! };
//! use attributes_static_file::AttributesStaticFile;
//! use memory_channel_node::MemoryNode;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let node = Arc::new(MemoryNode::new("ndn:/node"));
//! let attributes = Arc::new(AttributesStaticFile::default());
//! attributes.add(INCOMING_CHANNEL).await.unwrap();
//! attributes
//!     .set(INCOMING_CHANNEL, AttributeValue::Text("ndn:/test-fork".into()))
//!     .await
//!     .unwrap();
//! attributes.add(MESSAGE_FILTER).await.unwrap();
//! attributes
//!     .set(MESSAGE_FILTER, AttributeValue::Text("$.sensoridentifier".into()))
//!     .await
//!     .unwrap();
//!
//! let module = Arc::new(ForkModule::new("quick-start"));
//! let run = tokio::spawn({
//!     let module = module.clone();
//!     let node = node.clone();
//!     async move { module.run(node, attributes).await }
//! });
//! while module.state().await != EngineState::Running {
//!     tokio::task::yield_now().await;
//! }
//!
//! let inbound = node
//!     .open_channel("ndn:/test-fork", Persistence::Persistent)
//!     .await
//!     .unwrap();
//! inbound
//!     .publish(BytesMessage::from(r#"{"sensoridentifier":"S1"}"#))
//!     .await
//!     .unwrap();
//! assert_eq!(module.known_destinations().await, vec!["ndn:/test-fork/S1"]);
//!
//! module.stop(StopReason::UserDirected).await;
//! assert_eq!(run.await.unwrap().unwrap(), EngineState::Stopped);
//! # });
//! ```
//!
//! ## Routing contract
//!
//! - A destination channel is opened once per distinct routing key and reused
//!   for the lifetime of the module.
//! - Messages whose routing field is missing, `null` or empty are dropped.
//! - Every successful fork publish republishes the sorted list of known
//!   destinations under the `forked-channels` attribute.
//! - Stopping the module closes every forked channel, the default destination
//!   and the inbound channel.
//!
//! ## Logging
//!
//! Library code emits `tracing` events and never installs a global subscriber.
//! Binaries and tests initialize `tracing_subscriber` once at the process
//! boundary.

mod api;
pub use api::attributes::{
    AttributeError, AttributeValue, Attributes, FORKED_CHANNELS, INCOMING_CHANNEL,
    MESSAGE_FILTER, MODULE_STATE, PAYLOAD_ENVELOPE,
};
pub use api::channel::{Channel, ChannelListener, ChannelNode, Persistence};
pub use api::message::BytesMessage;
pub use api::module_state::{EngineState, StopReason};
pub use api::status::{ChannelError, ChannelErrorCode};

mod control_plane;
pub use control_plane::module_config::StartupError;
pub use control_plane::teardown::TeardownReport;

mod data_plane;
pub use data_plane::destination_registry::RegistryError;

mod extraction;
pub use extraction::payload_envelope::{PayloadEnvelope, UnknownEnvelopeError};
pub use extraction::routing_expression::{ExpressionError, ExtractionError, RoutingExpression};
pub use extraction::FieldExtractor;

mod routing;
pub use routing::destination_identifier::{
    join_identity, DestinationIdentifier, InvalidIdentifierError, DEFAULT_DESTINATION_SUFFIX,
};
pub use routing::fork_router::DispatchOutcome;

mod fork_module;
pub use fork_module::ForkModule;

#[doc(hidden)]
pub mod benchmark_support;
#[doc(hidden)]
pub mod observability;
