//! Control-plane layer.
//!
//! Owns module lifecycle semantics: reading and validating configuration from
//! the attribute store, the validated engine state machine reported through
//! the `module-state` attribute, and best-effort teardown of every channel the
//! module opened.

pub(crate) mod engine_state;
pub(crate) mod module_config;
pub(crate) mod teardown;
