//! Stable exit codes for fixloop CLI commands.

/// The job completed: the fix loop observed RESULT: PASS.
pub const OK: i32 = 0;
/// Invalid arguments or configuration, or an internal error.
pub const INVALID: i32 = 1;
/// The job ended FAILED (attempts exhausted or a stage error).
pub const FAILED: i32 = 2;
