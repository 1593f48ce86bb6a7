//! Process exit codes. Scripts driving the merger rely on them.

pub const SUCCESS: i32 = 0;
pub const MERGE_FAILED: i32 = 1; // Bundle could not be cut or written
pub const CONFIG_ERROR: i32 = 2; // Bad flags, config file or input stream
