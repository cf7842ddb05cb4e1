use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::date::DateValue;

/// Longest window accepted from the command line or rc file: ten years.
pub const MAX_WINDOW_DAYS: i64 = 3660;

/// Rejects window lengths above [`MAX_WINDOW_DAYS`]. Negative lengths pass
/// through and resolve to an empty window.
pub fn checked_window_days(days: i64) -> anyhow::Result<i64> {
    if days > MAX_WINDOW_DAYS {
        bail!("window of {days} days exceeds the {MAX_WINDOW_DAYS}-day limit");
    }
    Ok(days)
}

/// A contiguous run of calendar days starting at `start`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub start: DateValue,
    pub days: u32,
}

impl AvailabilityWindow {
    /// Negative lengths clamp to an empty window, oversized ones to
    /// [`MAX_WINDOW_DAYS`].
    pub fn new(start: DateValue, days: i64) -> Self {
        let days = u32::try_from(days.clamp(0, MAX_WINDOW_DAYS)).unwrap_or(0);
        Self { start, days }
    }

    pub fn dates(&self) -> Vec<DateValue> {
        generate_window(self.start, i64::from(self.days))
    }
}

/// Expands `start` into `days` consecutive dates, `start` included.
///
/// Zero or negative `days` yields an empty sequence. A window reaching past the
/// last representable date stops there.
pub fn generate_window(start: DateValue, days: i64) -> Vec<DateValue> {
    let len = usize::try_from(days.max(0)).unwrap_or(0);
    std::iter::successors(Some(start), |d| d.succ())
        .take(len)
        .collect()
}
