//! Process exit codes (§4.12). The outcome engine (`pmg_common::Outcome`) owns the
//! mapping for a completed run; this module only covers the fatal paths that never
//! reach it (CLI parse failure, config load failure, engine construction failure).

/// A structured error surfaced before the guard/proxy engine could run at all.
pub const EXIT_FATAL: i32 = 1;
