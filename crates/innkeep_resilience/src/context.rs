// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;

use tick::Clock;

use crate::telemetry::TelemetryHelper;

pub(crate) const DEFAULT_PIPELINE_NAME: &str = "default";

/// Clock and telemetry configuration shared by the retry policy and circuit breakers of one
/// data-access pipeline.
///
/// # Examples
///
/// ```
/// use innkeep_resilience::ResilienceContext;
/// use tick::Clock;
///
/// let context = ResilienceContext::new(Clock::new_frozen()).name("bookings");
/// assert_eq!(context.pipeline_name(), "bookings");
/// ```
#[derive(Debug, Clone)]
pub struct ResilienceContext {
    clock: Clock,
    name: Cow<'static, str>,
    #[cfg(any(feature = "metrics", test))]
    meter: Option<opentelemetry::metrics::Meter>,
}

impl ResilienceContext {
    /// Creates a context named `"default"` that reads time from `clock`.
    pub fn new(clock: impl AsRef<Clock>) -> Self {
        Self {
            clock: clock.as_ref().clone(),
            name: Cow::Borrowed(DEFAULT_PIPELINE_NAME),
            #[cfg(any(feature = "metrics", test))]
            meter: None,
        }
    }

    /// Sets the pipeline name reported in logs and metrics. Prefer `snake_case`.
    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Reports resilience events through the given OpenTelemetry meter provider.
    #[must_use]
    #[cfg(any(feature = "metrics", test))]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    pub fn enable_metrics(self, provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        Self {
            meter: Some(crate::metrics::create_meter(provider)),
            ..self
        }
    }

    /// The clock used for backoff delays and breaker cool-downs.
    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.clock
    }

    /// The pipeline name reported in logs and metrics.
    #[must_use]
    pub fn pipeline_name(&self) -> &str {
        &self.name
    }

    pub(crate) fn create_telemetry(&self, strategy_name: impl Into<Cow<'static, str>>) -> TelemetryHelper {
        TelemetryHelper {
            pipeline_name: self.name.clone(),
            strategy_name: strategy_name.into(),
            #[cfg(any(feature = "metrics", test))]
            event_reporter: self.meter.as_ref().map(crate::metrics::create_resilience_event_counter),
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_uses_default_pipeline_name() {
        let context = ResilienceContext::new(Clock::new_frozen());
        let telemetry = context.create_telemetry("retry");

        assert_eq!(context.pipeline_name(), DEFAULT_PIPELINE_NAME);
        assert_eq!(telemetry.pipeline_name, DEFAULT_PIPELINE_NAME);
        assert_eq!(telemetry.strategy_name, "retry");
        assert!(!telemetry.metrics_enabled());
    }

    #[test]
    fn name_is_propagated_to_telemetry() {
        let context = ResilienceContext::new(Clock::new_frozen()).name(String::from("availability"));
        let telemetry = context.create_telemetry("circuit_breaker");

        assert_eq!(telemetry.pipeline_name, "availability");
    }

    #[test]
    fn enable_metrics_creates_event_reporter() {
        let provider = opentelemetry_sdk::metrics::SdkMeterProvider::builder().build();
        let context = ResilienceContext::new(Clock::new_frozen()).enable_metrics(&provider);

        assert!(context.create_telemetry("retry").metrics_enabled());
    }
}
