use std::time::Duration;

use super::*;

#[test]
fn durations_should_resolve_from_millis() {
    let config = ReconcilerConfig::default();

    assert_eq!(config.join_timeout(), Duration::from_secs(30));
    assert_eq!(config.backoff_min(), Duration::from_secs(2));
    assert_eq!(config.backoff_max(), Duration::from_secs(60));
    assert_eq!(config.tick(), Duration::from_secs(1));
}

#[test]
fn validation_should_reject_zero_rate() {
    let mut config = ReconcilerConfig::default();
    config.tokens_per_second = 0.0;

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_inverted_backoff_range() {
    let mut config = ReconcilerConfig::default();
    config.backoff_min_in_ms = 120_000;

    assert!(config.validate().is_err());
}

#[test]
fn validation_should_reject_zero_burst() {
    let mut config = ReconcilerConfig::default();
    config.burst = 0;

    assert!(config.validate().is_err());
}
