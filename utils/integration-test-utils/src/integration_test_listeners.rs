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


use async_trait::async_trait;
use channel_fork::{BytesMessage, ChannelListener};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Records every message delivered to it.
#[derive(Clone, Default)]
pub struct CollectingListener {
    message_store: Arc<Mutex<Vec<BytesMessage>>>,
}

impl CollectingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retrieve_message_store(&self) -> Arc<Mutex<Vec<BytesMessage>>> {
        self.message_store.clone()
    }

    pub async fn received(&self) -> usize {
        self.message_store.lock().await.len()
    }
}

#[async_trait]
impl ChannelListener for CollectingListener {
    async fn on_receive(&self, message: BytesMessage) {
        debug!("within collecting listener! msg: {message:?}");
        self.message_store.lock().await.push(message);
    }
}
