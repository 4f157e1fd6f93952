//! Constants for the sweeper agent
//!
//! Centralizing constants makes them easy to find, modify, and test.

// ============================================================================
// SCHEDULING
// ============================================================================

/// Default interval between log verification runs (1 hour)
pub const DEFAULT_LOG_VERIFICATION_INTERVAL_SECS: u64 = 3600;

/// Default interval between temporary build cleanup runs (24 hours)
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 86_400;

/// Default age after which temporary builds are deleted
pub const DEFAULT_TEMPORARY_BUILD_LIFESPAN_DAYS: i64 = 14;

// ============================================================================
// HTTP CLIENTS
// ============================================================================

/// Default timeout for a single request to the orchestrator or log store
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Page size used when listing builds from the orchestrator
pub const ORCHESTRATOR_PAGE_SIZE: u32 = 200;

/// Upper bound on pages fetched for one orchestrator listing
pub const ORCHESTRATOR_MAX_PAGES: u32 = 500;

/// Orchestrator listing of temporary builds outside any group build
pub const INDEPENDENT_TEMPORARY_BUILDS_PATH: &str = "builds/independent-temporary-older-than-timestamp";

/// Logger that carries the user-facing build log in the log store
pub const BUILD_LOG_LOGGER_NAME: &str = "org.jboss.pnc._userlog_.build-log";

/// Service name used in remote error reports
pub const ORCHESTRATOR_SERVICE: &str = "orchestrator";

/// Service name used in remote error reports
pub const LOG_STORE_SERVICE: &str = "log-store";

// ============================================================================
// SERVER
// ============================================================================

/// Default bind host
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default bind port
pub const DEFAULT_PORT: u16 = 8080;

/// Development application URL handed out in callback URLs
pub const DEV_APPLICATION_URL: &str = "http://localhost:8080";
