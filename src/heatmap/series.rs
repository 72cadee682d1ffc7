use chrono::{Datelike, Months, NaiveDate};
use serde::Serialize;

use crate::structs::daily_volume::DailyVolumeMap;

/// How many months the calendar shows by default.
pub const DEFAULT_RANGE_MONTHS: u32 = 3;

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct HeatmapPoint {
    pub day: NaiveDate,
    /// UTC midnight of `day`, in epoch seconds
    pub timestamp: i64,
    pub volume: f64,
}

impl HeatmapPoint {
    pub fn new(day: NaiveDate, volume: f64) -> Self {
        let timestamp = day
            .and_hms_opt(0, 0, 0)
            .map_or(0, |midnight| midnight.and_utc().timestamp());
        Self {
            day,
            timestamp,
            volume,
        }
    }
}

/// Orders the daily volumes by day, oldest first.
pub fn to_heatmap_series(daily: &DailyVolumeMap) -> Vec<HeatmapPoint> {
    let mut series: Vec<HeatmapPoint> = daily
        .0
        .iter()
        .map(|(day, volume)| HeatmapPoint::new(*day, *volume))
        .collect();
    series.sort_unstable_by_key(|point| point.day);
    series
}

/// The months the calendar covers.
///
/// Starts at the month of the earliest day in the series. An empty series has
/// no start, and then nothing should be painted.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatmapDomain {
    pub start: Option<NaiveDate>,
    pub range_months: u32,
}

impl HeatmapDomain {
    pub fn from_series(series: &[HeatmapPoint], range_months: u32) -> Self {
        Self {
            start: series.iter().map(|point| point.day).min(),
            range_months,
        }
    }

    pub const fn is_degenerate(&self) -> bool {
        self.start.is_none() || self.range_months == 0
    }

    /// First day of every month in the window, in order.
    pub fn months(&self) -> Vec<NaiveDate> {
        let Some(first) = self.start.and_then(|start| start.with_day(1)) else {
            return Vec::new();
        };

        (0..self.range_months)
            .map_while(|offset| first.checked_add_months(Months::new(offset)))
            .collect()
    }

    /// Last day shown, inclusive.
    pub fn end(&self) -> Option<NaiveDate> {
        let last_month = *self.months().last()?;
        last_month.checked_add_months(Months::new(1))?.pred_opt()
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        match (self.months().first(), self.end()) {
            (Some(first), Some(end)) => (*first..=end).contains(&day),
            _ => false,
        }
    }
}
