//! Time helpers.

use chrono::{DateTime, Duration, Utc};

/// A timestamp with timezone (always UTC).
pub type Timestamp = DateTime<Utc>;

/// Get the current timestamp.
pub fn now() -> Timestamp {
    Utc::now()
}

/// Age of a past timestamp relative to now.
pub fn age_of(timestamp: Timestamp) -> Duration {
    now() - timestamp
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_age_of() {
        let earlier = now() - Duration::seconds(90);
        let age = age_of(earlier);
        assert!(age >= Duration::seconds(90));
        assert!(age < Duration::seconds(92));
    }
}
