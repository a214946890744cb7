// Logging shims: `tracing` with the `telemetry` feature, stderr otherwise.

macro_rules! warn_event {
    ($($arg:tt)+) => {{
        #[cfg(feature = "telemetry")]
        {
            tracing::warn!($($arg)+);
        }
        #[cfg(not(feature = "telemetry"))]
        {
            eprintln!($($arg)+);
        }
    }};
}

// Debug output only exists with `telemetry`.
#[cfg(feature = "telemetry")]
macro_rules! debug_event {
    ($($arg:tt)+) => {
        tracing::debug!($($arg)+)
    };
}

#[cfg(not(feature = "telemetry"))]
macro_rules! debug_event {
    ($($arg:tt)+) => {};
}
