#![forbid(unsafe_code)]

//! Frame-timing diagnostics controlled by environment variable.
//!
//! Set `NUMERDASH_DEBUG_TRACE=1` before launching to get timestamped lines
//! on stderr for every frame and input dispatch. When disabled (the default)
//! each check is a single static bool load.
//!
//! Stderr is used rather than `tracing` so the output is available even when
//! no subscriber is installed.

use std::sync::LazyLock;
use std::time::Instant;

static DEBUG_TRACE_ENABLED: LazyLock<bool> = LazyLock::new(|| {
    std::env::var("NUMERDASH_DEBUG_TRACE")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
});

static START_TIME: LazyLock<Instant> = LazyLock::new(Instant::now);

/// Whether debug tracing is enabled.
#[inline]
pub fn is_enabled() -> bool {
    *DEBUG_TRACE_ENABLED
}

/// Milliseconds since the first trace call.
#[inline]
pub fn elapsed_ms() -> u64 {
    START_TIME.elapsed().as_millis() as u64
}

/// Print a timestamped line to stderr when `NUMERDASH_DEBUG_TRACE=1`.
#[macro_export]
macro_rules! debug_trace {
    ($($arg:tt)*) => {
        if $crate::debug_trace::is_enabled() {
            eprintln!(
                "[numerdash {:>8}ms] {}",
                $crate::debug_trace::elapsed_ms(),
                format_args!($($arg)*)
            );
        }
    };
}
