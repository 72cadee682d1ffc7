use std::collections::HashMap;

use chrono::{NaiveDate, TimeZone};
use serde::{Deserialize, Serialize};

use super::drink_point::DrinkPoint;

/// Total volume drank per calendar day. Keys have no particular order.
///
/// The host sends this as a JSON object keyed by `YYYY-MM-DD`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct DailyVolumeMap(pub HashMap<NaiveDate, f64>);

impl DailyVolumeMap {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, day: &NaiveDate) -> Option<f64> {
        self.0.get(day).copied()
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }
}

impl FromIterator<(NaiveDate, f64)> for DailyVolumeMap {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Groups drinks by the calendar day they were logged on in `tz`.
///
/// Points with a timestamp chrono can't represent are skipped.
pub fn group_by_day<Tz: TimeZone>(history: &[DrinkPoint], tz: &Tz) -> DailyVolumeMap {
    let mut grouped_drinks: HashMap<NaiveDate, f64> = HashMap::new();

    for point in history {
        let Some(recorded_at) = point.recorded_at() else {
            continue;
        };
        let day = recorded_at.with_timezone(tz).date_naive();

        *grouped_drinks.entry(day).or_insert(0.0) += point.volume;
    }

    DailyVolumeMap(grouped_drinks)
}
