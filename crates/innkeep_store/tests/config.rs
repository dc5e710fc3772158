// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Loading executor settings from serialized configuration.

use std::time::Duration;

use innkeep_store::{QueryOptions, ResilientExecutor, StoreConfig, StoreError};
use pretty_assertions::assert_eq;
use tick::{Clock, ClockControl};

const CONFIG: &str = r#"{
    "name": "bookings",
    "default_dependency": "postgrest",
    "retry": {
        "max_retries": 1,
        "initial_delay_ms": 250,
        "jitter": false
    },
    "breaker": {
        "failure_threshold": 3,
        "reset_timeout_secs": 60
    },
    "dependencies": {
        "payments": { "failure_threshold": 1, "reset_timeout_secs": 5 }
    }
}"#;

#[test]
fn partial_config_keeps_defaults() {
    let config: StoreConfig = serde_json::from_str(CONFIG).unwrap();

    assert_eq!(config.name, "bookings");
    assert_eq!(config.retry.max_retries, 1);
    assert_eq!(config.retry.initial_delay_ms, 250);
    assert_eq!(config.retry.max_delay_ms, 10_000);
    assert!((config.retry.backoff_multiplier - 2.0).abs() < f64::EPSILON);
    assert_eq!(config.breaker.success_threshold, 2);
    assert_eq!(config.dependencies["payments"].success_threshold, 2);
}

#[test]
fn empty_config_is_default() {
    let config: StoreConfig = serde_json::from_str("{}").unwrap();

    assert_eq!(config, StoreConfig::default());
}

#[test]
fn config_round_trips_through_json() {
    let config: StoreConfig = serde_json::from_str(CONFIG).unwrap();
    let json = serde_json::to_string(&config).unwrap();

    assert_eq!(serde_json::from_str::<StoreConfig>(&json).unwrap(), config);
}

#[test]
fn executor_from_config_uses_breaker_settings() {
    let config: StoreConfig = serde_json::from_str(CONFIG).unwrap();
    let executor = ResilientExecutor::from_config(Clock::new_frozen(), &config);

    assert_eq!(executor.pipeline_name(), "bookings");
    assert_eq!(executor.default_dependency().to_string(), "postgrest");

    let shared = executor.breaker("postgrest");
    assert_eq!(shared.options().get_failure_threshold(), 3);
    assert_eq!(shared.options().get_reset_timeout(), Duration::from_secs(60));

    let payments = executor.breaker("payments");
    assert_eq!(payments.options().get_failure_threshold(), 1);
    assert_eq!(payments.options().get_reset_timeout(), Duration::from_secs(5));
}

#[tokio::test]
async fn executor_from_config_uses_retry_settings() {
    let control = ClockControl::new().auto_advance_timers(true);
    let config: StoreConfig = serde_json::from_str(CONFIG).unwrap();
    let executor = ResilientExecutor::from_config(control.to_clock(), &config);
    let start = control.to_clock().instant();
    let mut calls = 0;

    let output = executor
        .query("listing:1", &QueryOptions::uncached(), || {
            calls += 1;
            async { Err::<u32, _>(StoreError::Timeout("statement timeout".into())) }
        })
        .await;

    assert!(output.error().is_some());
    assert_eq!(calls, 2);
    assert_eq!(control.to_clock().instant() - start, Duration::from_millis(250));
}
