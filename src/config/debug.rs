//! Debugging feature flags.

pub struct LogFlags {
    /// Log every planned window and every window result.
    pub log_windows: bool,

    /// Log Johnson-SU optimiser progress and final parameters.
    pub log_fit: bool,

    /// Log cache hits/misses and store write-backs.
    pub log_cache: bool,

    /// Activate trace_time macro (for cool scope-level timing)
    pub log_performance: bool,
}

pub const DF: LogFlags = LogFlags {
    log_windows: false,
    log_fit: false,
    log_cache: true,
    log_performance: false,
};

pub const LOG_PERFORMANCE: bool = DF.log_performance;
