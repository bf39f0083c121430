//! Structured logging vocabulary.
//!
//! Library code emits `tracing` events using the names in [`events`] and the
//! field keys in [`fields`]; it never installs a global subscriber.

pub mod events;
pub mod fields;
