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

//! In-process [`ChannelNode`] for tests, benches and the `configurable-fork`
//! binary.
//!
//! Channels are shared by name: every `open_channel` call for the same
//! identifier returns the same [`MemoryChannel`] until it is closed, after
//! which the next open creates a fresh one. Publishing delivers to every
//! subscriber before returning.

mod memory_channel;
pub use memory_channel::MemoryChannel;

use async_trait::async_trait;
use channel_fork::{Channel, ChannelError, ChannelErrorCode, ChannelNode, Persistence};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Default)]
struct NodeState {
    channels: HashMap<String, Arc<MemoryChannel>>,
    open_counts: HashMap<String, usize>,
    failing_opens: HashSet<String>,
    failing_publishes: HashSet<String>,
    failing_closes: HashSet<String>,
}

pub struct MemoryNode {
    default_identity: String,
    state: Mutex<NodeState>,
}

impl MemoryNode {
    pub fn new(default_identity: &str) -> Self {
        Self {
            default_identity: default_identity.to_string(),
            state: Mutex::new(NodeState::default()),
        }
    }

    /// Number of `open_channel` calls made for `identifier`, failed ones included.
    pub async fn open_count(&self, identifier: &str) -> usize {
        self.state
            .lock()
            .await
            .open_counts
            .get(identifier)
            .copied()
            .unwrap_or_default()
    }

    pub async fn total_opens(&self) -> usize {
        self.state.lock().await.open_counts.values().sum()
    }

    /// Identifiers of every channel ever created, sorted.
    pub async fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.lock().await.channels.keys().cloned().collect();
        names.sort();
        names
    }

    /// The channel currently registered under `identifier`.
    pub async fn channel(&self, identifier: &str) -> Option<Arc<MemoryChannel>> {
        self.state.lock().await.channels.get(identifier).cloned()
    }

    /// Makes every later `open_channel` for `identifier` fail.
    pub async fn fail_opens_for(&self, identifier: &str) {
        self.state
            .lock()
            .await
            .failing_opens
            .insert(identifier.to_string());
    }

    /// Channels opened for `identifier` from now on reject publishes.
    pub async fn fail_publishes_for(&self, identifier: &str) {
        self.state
            .lock()
            .await
            .failing_publishes
            .insert(identifier.to_string());
    }

    /// Channels opened for `identifier` from now on fail to close.
    pub async fn fail_closes_for(&self, identifier: &str) {
        self.state
            .lock()
            .await
            .failing_closes
            .insert(identifier.to_string());
    }
}

#[async_trait]
impl ChannelNode for MemoryNode {
    fn default_identity(&self) -> &str {
        &self.default_identity
    }

    async fn open_channel(
        &self,
        identifier: &str,
        persistence: Persistence,
    ) -> Result<Arc<dyn Channel>, ChannelError> {
        let mut state = self.state.lock().await;
        *state.open_counts.entry(identifier.to_string()).or_default() += 1;

        if state.failing_opens.contains(identifier) {
            return Err(ChannelError::fail_with_code(
                ChannelErrorCode::Unavailable,
                format!("open of '{identifier}' refused"),
            ));
        }

        if let Some(existing) = state.channels.get(identifier) {
            if existing.is_open() {
                debug!("MemoryNode: reusing open channel {identifier}");
                return Ok(existing.clone());
            }
        }

        let channel = Arc::new(MemoryChannel::new(
            identifier,
            persistence,
            state.failing_publishes.contains(identifier),
            state.failing_closes.contains(identifier),
        ));
        debug!("MemoryNode: created channel {identifier} ({persistence:?})");
        state
            .channels
            .insert(identifier.to_string(), channel.clone());
        Ok(channel)
    }
}
