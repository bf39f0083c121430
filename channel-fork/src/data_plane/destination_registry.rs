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

//! Registry of forked output channels keyed by destination identifier.

use crate::api::channel::{Channel, ChannelNode, Persistence};
use crate::api::status::{ChannelError, ChannelErrorCode};
use crate::observability::events;
use crate::routing::destination_identifier::DestinationIdentifier;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info, warn};

const COMPONENT: &str = "destination_registry";

/// Opening a destination channel failed; nothing was recorded for it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RegistryError {
    pub(crate) identifier: String,
    pub(crate) source: ChannelError,
}

impl Display for RegistryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "failed to open destination channel '{}': {}",
            self.identifier, self.source
        )
    }
}

impl Error for RegistryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.source)
    }
}

type DestinationSlot = Arc<OnceCell<Arc<dyn Channel>>>;

#[derive(Default)]
struct Destinations {
    slots: HashMap<DestinationIdentifier, DestinationSlot>,
    /// Channels handed out so far; the set teardown closes.
    opened: HashMap<DestinationIdentifier, Arc<dyn Channel>>,
    closed: bool,
}

/// Creates each destination channel at most once and reuses it afterwards.
///
/// The map lock is held only to find or insert a slot; the `open` call itself
/// runs under the slot's own once-cell, so creation is serialized per
/// identifier while other identifiers resolve independently. A channel is
/// recorded in `opened` under the map lock, so after [`DestinationRegistry::close`]
/// every open either was returned by it or is closed by its own resolver.
pub(crate) struct DestinationRegistry {
    node: Arc<dyn ChannelNode>,
    persistence: Persistence,
    destinations: Mutex<Destinations>,
}

impl DestinationRegistry {
    pub(crate) fn new(node: Arc<dyn ChannelNode>, persistence: Persistence) -> Self {
        Self {
            node,
            persistence,
            destinations: Mutex::new(Destinations::default()),
        }
    }

    /// Returns the channel for `identifier`, opening it on first use.
    pub(crate) async fn resolve(
        &self,
        identifier: &DestinationIdentifier,
    ) -> Result<Arc<dyn Channel>, RegistryError> {
        let slot = {
            let mut destinations = self.destinations.lock().await;
            if destinations.closed {
                return Err(RegistryError {
                    identifier: identifier.to_string(),
                    source: registry_closed(),
                });
            }
            destinations
                .slots
                .entry(identifier.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        if let Some(channel) = slot.get() {
            debug!(
                event = events::DESTINATION_REUSE,
                component = COMPONENT,
                destination = identifier.as_str(),
                "reusing destination channel"
            );
            return Ok(channel.clone());
        }

        let opened = slot
            .get_or_try_init(|| async {
                let channel = self
                    .node
                    .open_channel(identifier.as_str(), self.persistence)
                    .await?;
                self.record_opened(identifier, channel).await
            })
            .await;

        match opened {
            Ok(channel) => Ok(channel.clone()),
            Err(err) => {
                warn!(
                    event = events::DESTINATION_CREATE_FAILED,
                    component = COMPONENT,
                    destination = identifier.as_str(),
                    err = %err,
                    "unable to open destination channel"
                );
                self.discard_empty_slot(identifier, slot).await;
                Err(RegistryError {
                    identifier: identifier.to_string(),
                    source: err,
                })
            }
        }
    }

    /// Hands a freshly opened channel to the registry, or closes it again if
    /// the registry was closed while the open was in flight.
    async fn record_opened(
        &self,
        identifier: &DestinationIdentifier,
        channel: Arc<dyn Channel>,
    ) -> Result<Arc<dyn Channel>, ChannelError> {
        let mut destinations = self.destinations.lock().await;
        if destinations.closed {
            drop(destinations);
            warn!(
                event = events::DESTINATION_OPENED_AFTER_CLOSE,
                component = COMPONENT,
                destination = identifier.as_str(),
                "destination opened during teardown, closing it"
            );
            if let Err(err) = channel.close().await {
                warn!(
                    event = events::TEARDOWN_CLOSE_FAILED,
                    component = COMPONENT,
                    destination = identifier.as_str(),
                    err = %err,
                    "unable to close late destination channel"
                );
            }
            return Err(registry_closed());
        }
        destinations.opened.insert(identifier.clone(), channel.clone());
        info!(
            event = events::DESTINATION_CREATE,
            component = COMPONENT,
            destination = identifier.as_str(),
            "opened destination channel"
        );
        Ok(channel)
    }

    /// Drops a slot left uninitialized by a failed open, unless another caller
    /// still holds it. Slots are only cloned under the map lock, so the
    /// reference count check is race-free while that lock is held.
    async fn discard_empty_slot(&self, identifier: &DestinationIdentifier, slot: DestinationSlot) {
        let mut destinations = self.destinations.lock().await;
        let removable = destinations.slots.get(identifier).is_some_and(|current| {
            Arc::ptr_eq(current, &slot) && !current.initialized() && Arc::strong_count(&slot) == 2
        });
        if removable {
            destinations.slots.remove(identifier);
        }
    }

    /// Refuses further opens and returns every channel created so far.
    pub(crate) async fn close(&self) -> Vec<(DestinationIdentifier, Arc<dyn Channel>)> {
        let mut destinations = self.destinations.lock().await;
        destinations.closed = true;
        destinations
            .opened
            .iter()
            .map(|(identifier, channel)| (identifier.clone(), channel.clone()))
            .collect()
    }

    pub(crate) async fn len(&self) -> usize {
        self.destinations.lock().await.opened.len()
    }
}

fn registry_closed() -> ChannelError {
    ChannelError::fail_with_code(ChannelErrorCode::Closed, "destination registry is closed")
}
