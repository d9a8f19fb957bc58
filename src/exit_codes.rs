//! Exit code constants for the lathe CLI.
//!
//! - 0: Success
//! - 1: User error (bad args, invalid state)
//! - 2: Path or template-structure validation failure
//! - 3: Security violation (traversal, disallowed command)
//! - 4: Template failure (not found, syntax)
//! - 5: Concurrency failure (unknown task, duplicate id, wait timeout)

/// Successful execution.
pub const SUCCESS: i32 = 0;

/// User error: bad arguments or invalid invocation state.
pub const USER_ERROR: i32 = 1;

/// Validation failure: invalid path, invalid name, or structural staging error.
pub const VALIDATION_FAILURE: i32 = 2;

/// Security violation: path traversal, absolute-path injection, or a command
/// rejected by the allow/deny rules.
pub const SECURITY_FAILURE: i32 = 3;

/// Template failure: template not found or template syntax error.
pub const TEMPLATE_FAILURE: i32 = 4;

/// Concurrency failure: duplicate task id, unknown task, or result-wait timeout.
pub const CONCURRENCY_FAILURE: i32 = 5;
