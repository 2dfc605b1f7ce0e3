use chrono::{DateTime, TimeZone, Utc};

pub fn utc_from_epoch_seconds_lossy(ts: i64) -> DateTime<Utc> {
    if let Some(dt) = Utc.timestamp_opt(ts, 0).single() {
        return dt;
    }

    log::warn!("Invalid epoch seconds timestamp (ts={ts}); falling back to epoch");
    Utc.timestamp_opt(0, 0).single().unwrap_or_else(Utc::now)
}

pub fn utc_from_epoch_seconds_lossy_opt(ts: Option<i64>) -> Option<DateTime<Utc>> {
    let ts = ts?;

    if let Some(dt) = Utc.timestamp_opt(ts, 0).single() {
        return Some(dt);
    }

    log::warn!("Invalid epoch seconds timestamp (ts={ts}); treating as missing");
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_seconds_roundtrip() {
        let dt = utc_from_epoch_seconds_lossy(1_700_000_000);
        assert_eq!(dt.timestamp(), 1_700_000_000);
    }

    #[test]
    fn missing_optional_stays_missing() {
        assert_eq!(utc_from_epoch_seconds_lossy_opt(None), None);
    }
}
