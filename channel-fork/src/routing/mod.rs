//! Routing layer.
//!
//! Turns an inbound message into a destination decision: the identifier
//! model for forked channels and the per-message dispatch procedure.

pub(crate) mod destination_identifier;
pub(crate) mod fork_router;
