use {
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
};

/// A single logged drink, as handed out by the host.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct DrinkPoint {
    /// Timestamp of when the drink was recorded, in epoch seconds
    pub timestamp: i64,

    /// Amount of water drank in milliliters
    #[serde(rename = "amount")]
    pub volume: f64,
}

/// Every drink the host knows about, oldest first.
pub type DrinkHistory = Vec<DrinkPoint>;

impl DrinkPoint {
    pub const fn new(timestamp: i64, volume: f64) -> Self {
        Self { timestamp, volume }
    }

    /// `None` when the timestamp is outside of what chrono can represent.
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp, 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_host_payload() {
        let point: DrinkPoint =
            serde_json::from_str(r#"{ "timestamp": 1704067200, "amount": 200.0 }"#).unwrap();

        assert_eq!(point, DrinkPoint::new(1_704_067_200, 200.0));
        assert_eq!(
            point.recorded_at().unwrap().to_rfc3339(),
            "2024-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn missing_latest_drink_is_null() {
        let latest: Option<DrinkPoint> = serde_json::from_str("null").unwrap();
        assert!(latest.is_none());
    }
}
