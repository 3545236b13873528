//! Download configuration constants

use std::time::Duration;

/// Attempts per HTTP call before the call is reported as failed.
pub const MAX_TRIES: u32 = 3;

/// Fixed pause between attempts of the same call.
pub const RETRY_DELAY: Duration = Duration::from_secs(2);

/// Pause after every encode attempt, successful or not.
/// QuickStats throttles aggressive clients by returning empty handles.
pub const DELAY_BETWEEN_REQUESTS: Duration = Duration::from_secs(1);

/// Encode endpoint timeout
pub const ENCODE_TIMEOUT: Duration = Duration::from_secs(30);

/// Spreadsheet download timeout
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Keyed JSON API timeout
pub const TABLE_TIMEOUT: Duration = Duration::from_secs(40);

/// Soil Data Access timeout
pub const SOIL_TIMEOUT: Duration = Duration::from_secs(30);

/// Default worker pool size
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Upper bound on the worker pool size
pub const MAX_CONCURRENCY: usize = 32;

/// Year range fetched when none is given
pub const DEFAULT_START_YEAR: i32 = 1980;

/// Last year of the default range
pub const DEFAULT_END_YEAR: i32 = 2025;

/// Worker count clamped into `1..=MAX_CONCURRENCY`
pub fn clamp_concurrency(requested: usize) -> usize {
    requested.clamp(1, MAX_CONCURRENCY)
}
