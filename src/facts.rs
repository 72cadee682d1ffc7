//! Relative-time facts derived from the latest drink.
//!
//! Everything here depends on `now`, so callers recompute on every render
//! instead of caching.

use chrono::{DateTime, Duration, Utc};
use chrono_humanize::HumanTime;

use crate::structs::drink_point::DrinkPoint;

/// How long after a drink the host sends its next reminder.
pub const NOTIFY_INTERVAL_SECS: i64 = 60 * 60;

/// English relative phrase, e.g. "5 minutes ago" or "in an hour".
pub fn format_relative(offset: Duration) -> String {
    HumanTime::from(offset).to_string()
}

/// How long ago the latest drink was, e.g. "5 minutes ago".
pub fn time_since_last_drink(latest: Option<&DrinkPoint>, now: DateTime<Utc>) -> Option<String> {
    let recorded_at = latest?.recorded_at()?;
    Some(format_relative(recorded_at - now))
}

/// Time left until the next reminder; negative once it's already due.
pub fn next_notification_eta(
    latest: Option<&DrinkPoint>,
    now: DateTime<Utc>,
    interval_secs: i64,
) -> Option<Duration> {
    let due = latest?.timestamp.saturating_add(interval_secs);
    Duration::try_seconds(due.saturating_sub(now.timestamp()))
}

/// Whether more than `interval_secs` passed since the latest drink.
///
/// Exactly `interval_secs` is not overdue yet.
pub fn is_overdue(latest: Option<&DrinkPoint>, now: DateTime<Utc>, interval_secs: i64) -> bool {
    latest.is_some_and(|drink| now.timestamp().saturating_sub(drink.timestamp) > interval_secs)
}

/// What the dashboard tells the user about their drinking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrinkStatus {
    NoDrinkYet,
    Overdue { since: String },
    OnTrack { since: String, notify_in: String },
}

impl DrinkStatus {
    pub fn new(latest: Option<&DrinkPoint>, now: DateTime<Utc>, interval_secs: i64) -> Self {
        let Some(since) = time_since_last_drink(latest, now) else {
            return Self::NoDrinkYet;
        };

        if is_overdue(latest, now, interval_secs) {
            return Self::Overdue { since };
        }

        match next_notification_eta(latest, now, interval_secs) {
            Some(eta) => Self::OnTrack {
                since,
                notify_in: format_relative(eta),
            },
            None => Self::NoDrinkYet,
        }
    }

    pub fn lines(&self) -> Vec<String> {
        match self {
            Self::NoDrinkYet => vec!["You haven't drinked. Go take a sip of water!".to_owned()],
            Self::Overdue { since } => vec![
                format!("Your last drink was {since}."),
                "It's been a while since your last drink. Go take a sip of water!".to_owned(),
            ],
            Self::OnTrack { since, notify_in } => vec![
                format!("Your last drink was {since}."),
                format!("You will be notified {notify_in}."),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i64 = 1_704_283_200;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(NOW, 0).unwrap()
    }

    fn drank_ago(secs: i64) -> DrinkPoint {
        DrinkPoint::new(NOW - secs, 200.0)
    }

    #[test]
    fn overdue_boundary_is_exclusive() {
        let at_boundary = drank_ago(NOTIFY_INTERVAL_SECS);
        let past_boundary = drank_ago(NOTIFY_INTERVAL_SECS + 1);

        assert!(!is_overdue(Some(&at_boundary), now(), NOTIFY_INTERVAL_SECS));
        assert!(is_overdue(Some(&past_boundary), now(), NOTIFY_INTERVAL_SECS));
    }

    #[test]
    fn no_drink_yields_no_facts() {
        assert_eq!(time_since_last_drink(None, now()), None);
        assert_eq!(next_notification_eta(None, now(), NOTIFY_INTERVAL_SECS), None);
        assert!(!is_overdue(None, now(), NOTIFY_INTERVAL_SECS));
        assert_eq!(
            DrinkStatus::new(None, now(), NOTIFY_INTERVAL_SECS),
            DrinkStatus::NoDrinkYet
        );
    }

    #[test]
    fn eta_goes_negative_once_due() {
        let drink = drank_ago(4000);

        let eta = next_notification_eta(Some(&drink), now(), NOTIFY_INTERVAL_SECS).unwrap();

        assert_eq!(eta, Duration::try_seconds(-400).unwrap());
    }

    #[test]
    fn relative_phrases() {
        let drink = drank_ago(300);

        assert_eq!(
            time_since_last_drink(Some(&drink), now()).as_deref(),
            Some("5 minutes ago")
        );
        let halfway = drank_ago(1800);
        assert_eq!(
            DrinkStatus::new(Some(&halfway), now(), NOTIFY_INTERVAL_SECS),
            DrinkStatus::OnTrack {
                since: "30 minutes ago".to_owned(),
                notify_in: "in 30 minutes".to_owned(),
            }
        );
    }

    #[test]
    fn overdue_status_nags() {
        let drink = drank_ago(3 * 3600);

        let status = DrinkStatus::new(Some(&drink), now(), NOTIFY_INTERVAL_SECS);

        assert_eq!(
            status.lines(),
            vec![
                "Your last drink was 3 hours ago.".to_owned(),
                "It's been a while since your last drink. Go take a sip of water!".to_owned(),
            ]
        );
    }
}
