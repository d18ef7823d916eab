//! Exit codes. Part of the CLI contract.

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_PIPELINE_FAILED: i32 = 1; // Any stage error
pub const EXIT_CONFIG_ERROR: i32 = 2; // Bad config, mapping or arguments
pub const EXIT_VERIFY_FAILED: i32 = 4; // Signature does not verify
