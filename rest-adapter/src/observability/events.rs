//! Canonical structured event names used across `rest-adapter`.

// Scheduler events.
pub const SCHEDULER_CYCLE_COMPLETE: &str = "scheduler_cycle_complete";

// Steady-state polling events.
pub const POLL_REQUEST_START: &str = "poll_request_start";
pub const POLL_REQUEST_OK: &str = "poll_request_ok";
pub const POLL_REQUEST_FAILED: &str = "poll_request_failed";
pub const POLL_RESULT_DISCARDED: &str = "poll_result_discarded";
pub const POLL_PUBLISH_OK: &str = "poll_publish_ok";
pub const POLL_PUBLISH_FAILED: &str = "poll_publish_failed";
pub const POLL_METRICS_SUMMARY: &str = "poll_metrics_summary";

// Service session events.
pub const SESSION_START: &str = "session_start";
pub const SESSION_STOP: &str = "session_stop";
pub const SESSION_ENDPOINT_ADD: &str = "session_endpoint_add";
pub const SESSION_ENDPOINT_DUPLICATE: &str = "session_endpoint_duplicate";
pub const SESSION_ENDPOINT_CONFLICT: &str = "session_endpoint_conflict";
pub const SESSION_IGNORED: &str = "session_ignored";
pub const SESSION_ENDPOINT_SCHEDULE: &str = "session_endpoint_schedule";

// Endpoint initialisation events.
pub const ENDPOINT_INIT_START: &str = "endpoint_init_start";
pub const ENDPOINT_INIT_OK: &str = "endpoint_init_ok";
pub const ENDPOINT_INIT_FAILED: &str = "endpoint_init_failed";
pub const ENDPOINT_INIT_SKIPPED: &str = "endpoint_init_skipped";
pub const ENDPOINT_TOPIC_EXISTS: &str = "endpoint_topic_exists";

// Service management events.
pub const SERVICE_START: &str = "service_start";
pub const SERVICE_START_FAILED: &str = "service_start_failed";
pub const SERVICE_ACTIVE: &str = "service_active";
pub const SERVICE_STANDBY: &str = "service_standby";
pub const SERVICE_CLOSE: &str = "service_close";
pub const SERVICE_REMOVE_FAILED: &str = "service_remove_failed";
pub const SERVICES_RECONFIGURE_START: &str = "services_reconfigure_start";
pub const SERVICES_RECONFIGURE_OK: &str = "services_reconfigure_ok";
pub const SERVICES_RECONFIGURE_FAILED: &str = "services_reconfigure_failed";

// Adapter lifecycle events.
pub const LIFECYCLE_RECONFIGURE: &str = "lifecycle_reconfigure";
pub const LIFECYCLE_TRANSITION: &str = "lifecycle_transition";
pub const LIFECYCLE_IGNORED: &str = "lifecycle_ignored";
pub const LIFECYCLE_SHUTDOWN: &str = "lifecycle_shutdown";
pub const BROKER_CONNECT_START: &str = "broker_connect_start";
pub const BROKER_CONNECT_OK: &str = "broker_connect_ok";
pub const BROKER_CONNECT_FAILED: &str = "broker_connect_failed";
pub const BROKER_SESSION_DISCARDED: &str = "broker_session_discarded";
pub const BROKER_SESSION_LOST: &str = "broker_session_lost";
pub const BROKER_SESSION_CLOSED: &str = "broker_session_closed";
pub const TLS_CONTEXT_FAILED: &str = "tls_context_failed";
pub const HTTP_LAYER_CREATE: &str = "http_layer_create";
pub const HTTP_LAYER_FAILED: &str = "http_layer_failed";

// Update source events.
pub const UPDATE_SOURCE_TRANSITION: &str = "update_source_transition";

// Binary and log-only broker events.
pub const ADAPTER_START: &str = "adapter_start";
pub const ADAPTER_EXIT: &str = "adapter_exit";
pub const CONFIG_LOAD_OK: &str = "config_load_ok";
pub const CONFIG_LOAD_FAILED: &str = "config_load_failed";
pub const CONFIG_RECONFIGURE_FAILED: &str = "config_reconfigure_failed";
pub const LOG_BROKER_SESSION_OPEN: &str = "log_broker_session_open";
pub const LOG_BROKER_SESSION_CLOSE: &str = "log_broker_session_close";
pub const LOG_BROKER_TOPIC_ADD: &str = "log_broker_topic_add";
pub const LOG_BROKER_UPDATE: &str = "log_broker_update";
pub const LOG_BROKER_SERVICE_REMOVE: &str = "log_broker_service_remove";
