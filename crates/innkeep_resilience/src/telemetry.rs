// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;

/// Names the pipeline an event belongs to. `snake_case`, for example `bookings`.
#[cfg(any(feature = "metrics", test))]
pub(crate) const PIPELINE_NAME: &str = "resilience.pipeline.name";

/// Names the strategy that raised the event, for example `retry` or `circuit_breaker`.
#[cfg(any(feature = "metrics", test))]
pub(crate) const STRATEGY_NAME: &str = "resilience.strategy.name";

/// Names the event itself, for example `retry` or `circuit_opened`.
#[cfg(any(feature = "metrics", test))]
pub(crate) const EVENT_NAME: &str = "resilience.event.name";

/// Identifies the circuit breaker, see [`DependencyId`][crate::breaker::DependencyId].
#[cfg(any(feature = "metrics", test))]
pub(crate) const BREAKER_ID: &str = "resilience.circuit_breaker.id";

/// Retry attempt number, 1-based.
#[cfg(any(feature = "metrics", test))]
pub(crate) const ATTEMPT_NUMBER: &str = "resilience.attempt.number";

#[derive(Debug, Clone)]
pub(crate) struct TelemetryHelper {
    pub(crate) pipeline_name: Cow<'static, str>,
    pub(crate) strategy_name: Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    pub(crate) event_reporter: Option<opentelemetry::metrics::Counter<u64>>,
}

impl TelemetryHelper {
    #[cfg(any(feature = "metrics", test))]
    pub(crate) fn metrics_enabled(&self) -> bool {
        self.event_reporter.is_some()
    }

    /// Adds one `resilience.event` with the pipeline, strategy and event name attached.
    #[cfg(any(feature = "metrics", test))]
    pub(crate) fn report_event(&self, event_name: &'static str, attributes: &[opentelemetry::KeyValue]) {
        use opentelemetry::KeyValue;

        if let Some(reporter) = &self.event_reporter {
            let mut all = Vec::with_capacity(attributes.len() + 3);
            all.push(KeyValue::new(PIPELINE_NAME, self.pipeline_name.clone()));
            all.push(KeyValue::new(STRATEGY_NAME, self.strategy_name.clone()));
            all.push(KeyValue::new(EVENT_NAME, event_name));
            all.extend_from_slice(attributes);

            reporter.add(1, &all);
        }
    }
}
