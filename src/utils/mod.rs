pub(crate) mod maths_utils;
mod perf;
pub mod time_utils;

pub use maths_utils::{linspace, percentile_sorted, sorted_copy};
pub use time_utils::{AppInstant, TimeUtils, epoch_ms_to_utc, now_timestamp_ms, parse_utc};
