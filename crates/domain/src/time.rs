//! Time and timestamp helpers.

use chrono::{DateTime, Utc};

/// UTC timestamp used for `last_seen` and status message times.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Convert fractional unix seconds (as emitted by device firmware) into a
/// [`Timestamp`]. Returns `None` for non-finite or out-of-range inputs.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub fn from_unix_secs(secs: f64) -> Option<Timestamp> {
    if !secs.is_finite() {
        return None;
    }
    let millis = (secs * 1000.0).round();
    if millis < i64::MIN as f64 || millis > i64::MAX as f64 {
        return None;
    }
    DateTime::from_timestamp_millis(millis as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_convert_fractional_unix_seconds() {
        let ts = from_unix_secs(1_700_000_000.5).unwrap();
        assert_eq!(ts.timestamp(), 1_700_000_000);
        assert_eq!(ts.timestamp_subsec_millis(), 500);
    }

    #[test]
    fn should_reject_non_finite_seconds() {
        assert!(from_unix_secs(f64::NAN).is_none());
        assert!(from_unix_secs(f64::INFINITY).is_none());
    }
}
