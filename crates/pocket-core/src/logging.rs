//! Structured logging field name constants.
//!
//! All crates use these names so log queries work the same way across
//! subsystems.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), operation completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated from the `x-request-id` header.
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "inference", "storage"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "pool", "galaxies", "categorizer", "gemini", "filesystem"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "find_or_create", "categorize", "record", "put"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

pub const USER_ID: &str = "user_id";
pub const GALAXY_ID: &str = "galaxy_id";
pub const PLANET_ID: &str = "planet_id";
pub const IMAGE_ID: &str = "image_id";
pub const OBJECT_KEY: &str = "object_key";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Byte length of a prompt.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

/// Rows touched by a statement.
pub const ROWS_AFFECTED: &str = "rows_affected";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for generation.
pub const MODEL: &str = "model";

/// Finish reason reported by the model.
pub const FINISH_REASON: &str = "finish_reason";

/// Attempt number for retried calls (1-based).
pub const ATTEMPT: &str = "attempt";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Audit-write strategy that succeeded ("typed", "minimal", "adaptive").
pub const WRITE_TIER: &str = "write_tier";

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
