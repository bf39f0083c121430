//! Sorted set of every destination that received a successful publish.

use crate::api::attributes::{AttributeValue, Attributes, FORKED_CHANNELS};
use crate::observability::events;
use crate::routing::destination_identifier::DestinationIdentifier;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

const COMPONENT: &str = "known_destinations";

/// Grow-only set mirrored into the `forked-channels` attribute.
///
/// Each insertion republishes the full snapshot while still holding the set
/// lock, so the attribute store observes snapshots in insertion order and a
/// later snapshot is always a superset of an earlier one.
pub(crate) struct KnownDestinations {
    attributes: Arc<dyn Attributes>,
    destinations: Mutex<BTreeSet<String>>,
}

impl KnownDestinations {
    pub(crate) fn new(attributes: Arc<dyn Attributes>) -> Self {
        Self {
            attributes,
            destinations: Mutex::new(BTreeSet::new()),
        }
    }

    /// Adds `identifier` and republishes the snapshot. Publishing failures are
    /// logged; the in-memory set keeps the entry either way.
    pub(crate) async fn record(&self, identifier: &DestinationIdentifier) {
        let mut destinations = self.destinations.lock().await;
        destinations.insert(identifier.to_string());
        let snapshot: Vec<String> = destinations.iter().cloned().collect();
        let count = snapshot.len();

        match self
            .attributes
            .set(FORKED_CHANNELS, AttributeValue::TextList(snapshot))
            .await
        {
            Ok(()) => debug!(
                event = events::KNOWN_DESTINATIONS_PUBLISH_OK,
                component = COMPONENT,
                destination = identifier.as_str(),
                count,
                "published known destinations"
            ),
            Err(err) => warn!(
                event = events::KNOWN_DESTINATIONS_PUBLISH_FAILED,
                component = COMPONENT,
                destination = identifier.as_str(),
                err = %err,
                "unable to publish known destinations"
            ),
        }
    }

    pub(crate) async fn snapshot(&self) -> Vec<String> {
        self.destinations.lock().await.iter().cloned().collect()
    }
}
