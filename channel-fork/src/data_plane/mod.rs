//! Data-plane layer.
//!
//! Owns the output side of the fork: the per-key destination registry, the
//! single default destination, the known-destinations set mirrored into the
//! attribute store, and the listener adapter installed on the inbound channel.

pub(crate) mod default_destination;
pub(crate) mod destination_registry;
pub(crate) mod fork_listener;
pub(crate) mod known_destinations;
