//! Canonical structured event names used across `channel-fork`.

// Router (ingress dispatch) events.
pub const DISPATCH_RECEIVE: &str = "dispatch_receive";
pub const DISPATCH_ENVELOPE_DECODE_FAILED: &str = "dispatch_envelope_decode_failed";
pub const DISPATCH_EXTRACTION_FAILED: &str = "dispatch_extraction_failed";
pub const DISPATCH_NO_ROUTING_KEY: &str = "dispatch_no_routing_key";
pub const DISPATCH_INVALID_IDENTIFIER: &str = "dispatch_invalid_identifier";
pub const DISPATCH_FORK_PUBLISH_OK: &str = "dispatch_fork_publish_ok";
pub const DISPATCH_FORK_PUBLISH_FAILED: &str = "dispatch_fork_publish_failed";
pub const DISPATCH_DEFAULT_PUBLISH_OK: &str = "dispatch_default_publish_ok";
pub const DISPATCH_DEFAULT_PUBLISH_FAILED: &str = "dispatch_default_publish_failed";

// Destination bookkeeping events.
pub const DESTINATION_CREATE: &str = "destination_create";
pub const DESTINATION_REUSE: &str = "destination_reuse";
pub const DESTINATION_CREATE_FAILED: &str = "destination_create_failed";
pub const DESTINATION_OPENED_AFTER_CLOSE: &str = "destination_opened_after_close";
pub const DEFAULT_DESTINATION_CREATE: &str = "default_destination_create";
pub const DEFAULT_DESTINATION_CREATE_FAILED: &str = "default_destination_create_failed";
pub const KNOWN_DESTINATIONS_PUBLISH_OK: &str = "known_destinations_publish_ok";
pub const KNOWN_DESTINATIONS_PUBLISH_FAILED: &str = "known_destinations_publish_failed";

// Lifecycle events.
pub const MODULE_START: &str = "module_start";
pub const MODULE_START_SKIPPED: &str = "module_start_skipped";
pub const MODULE_CONFIG_FAILED: &str = "module_config_failed";
pub const MODULE_INBOUND_OPEN_OK: &str = "module_inbound_open_ok";
pub const MODULE_INBOUND_OPEN_FAILED: &str = "module_inbound_open_failed";
pub const MODULE_SUBSCRIBE_OK: &str = "module_subscribe_ok";
pub const MODULE_SUBSCRIBE_FAILED: &str = "module_subscribe_failed";
pub const MODULE_STATE_CHANGE: &str = "module_state_change";
pub const MODULE_STATE_REJECTED: &str = "module_state_rejected";
pub const MODULE_STATE_REPORT_FAILED: &str = "module_state_report_failed";
pub const MODULE_STOP_REQUESTED: &str = "module_stop_requested";

// Teardown events.
pub const TEARDOWN_START: &str = "teardown_start";
pub const TEARDOWN_CLOSE_OK: &str = "teardown_close_ok";
pub const TEARDOWN_CLOSE_FAILED: &str = "teardown_close_failed";
pub const TEARDOWN_DONE: &str = "teardown_done";
