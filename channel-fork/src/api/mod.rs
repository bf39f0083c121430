//! Outward API surface.
//!
//! Traits for the collaborators the fork engine consumes (channel transport and
//! attribute store) and the value types exchanged with them.

pub(crate) mod attributes;
pub(crate) mod channel;
pub(crate) mod message;
pub(crate) mod module_state;
pub(crate) mod status;
