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

//! Pub-sub channel transport consumed by the fork engine.

use crate::api::message::BytesMessage;
use crate::api::status::ChannelError;
use async_trait::async_trait;
use std::sync::Arc;

/// Delivery mode requested when opening a channel.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum Persistence {
    /// Messages are only delivered to currently attached subscribers.
    Volatile,
    /// The transport retains published messages according to its own policy.
    #[default]
    Persistent,
}

/// Callback installed on a channel; invoked once per delivered message.
///
/// Implementations must tolerate concurrent invocation from several delivery
/// tasks.
#[async_trait]
pub trait ChannelListener: Send + Sync {
    async fn on_receive(&self, message: BytesMessage);
}

/// Handle to one open channel.
///
/// ```
/// use std::sync::Arc;
/// use async_trait::async_trait;
/// use channel_fork::{BytesMessage, Channel, ChannelError, ChannelListener};
///
/// struct DiscardChannel;
///
/// #[async_trait]
/// impl Channel for DiscardChannel {
///     fn name(&self) -> &str {
///         "ndn:/discard"
///     }
///
///     fn is_open(&self) -> bool {
///         true
///     }
///
///     async fn publish(&self, _message: BytesMessage) -> Result<(), ChannelError> {
///         Ok(())
///     }
///
///     async fn subscribe(&self, _listener: Arc<dyn ChannelListener>) -> Result<(), ChannelError> {
///         Ok(())
///     }
///
///     async fn close(&self) -> Result<(), ChannelError> {
///         Ok(())
///     }
/// }
///
/// let channel: Arc<dyn Channel> = Arc::new(DiscardChannel);
/// assert_eq!(channel.name(), "ndn:/discard");
/// ```
#[async_trait]
pub trait Channel: Send + Sync {
    /// External identity the channel was opened with.
    fn name(&self) -> &str;

    fn is_open(&self) -> bool;

    async fn publish(&self, message: BytesMessage) -> Result<(), ChannelError>;

    async fn subscribe(&self, listener: Arc<dyn ChannelListener>) -> Result<(), ChannelError>;

    /// Closes the channel. Calling it more than once must not fail.
    async fn close(&self) -> Result<(), ChannelError>;
}

/// Node able to open channels by identifier.
#[async_trait]
pub trait ChannelNode: Send + Sync {
    /// Identity that relative channel names are joined onto.
    fn default_identity(&self) -> &str;

    async fn open_channel(
        &self,
        identifier: &str,
        persistence: Persistence,
    ) -> Result<Arc<dyn Channel>, ChannelError>;
}
