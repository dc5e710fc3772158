// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::any::Any;
use std::borrow::Cow;
use std::fmt::Debug;
use std::sync::Arc;

use innkeep_cache::{Freshness, TtlCache};
use innkeep_resilience::breaker::{BreakerOptions, BreakerRegistry, BreakerSnapshot, CircuitBreaker, CircuitState, DependencyId};
use innkeep_resilience::retry::RetryPolicy;
use innkeep_resilience::{Recovery, ResilienceContext};
use tick::Clock;

use crate::config::{DEFAULT_DEPENDENCY, DEFAULT_PIPELINE_NAME};
use crate::{QueryError, QueryOptions, QueryOutput, QuerySource, StoreConfig, StoreError, StoreReply};

type CachedValue = Arc<dyn Any + Send + Sync>;
type ConfigureRetry = Box<dyn FnOnce(RetryPolicy) -> RetryPolicy + Send>;

/// Runs every read and write against the remote store.
///
/// A query goes through these steps:
///
/// 1. If the options cache results, a fresh cache entry is returned without running the
///    operation.
/// 2. Otherwise the operation runs under the retry policy. Unless disabled for the call, the
///    whole retry sequence is guarded by the dependency's circuit breaker, so an exhausted
///    sequence counts as a single breaker failure and an open breaker skips the operation.
/// 3. A success is written to the cache with the call's TTL.
/// 4. A transient failure, including a breaker rejection, falls back to the last cached value
///    for the key however old it is. Permanent failures are never masked.
///
/// The executor is cheap to clone; clones share the cache and the breakers.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use innkeep_store::{QueryOptions, ResilientExecutor, StoreError};
/// use tick::Clock;
///
/// # futures::executor::block_on(async {
/// let executor = ResilientExecutor::builder(Clock::new_frozen()).name("listings").build();
/// let options = QueryOptions::cached(Duration::from_secs(60));
///
/// let live = executor
///     .query("listing:42", &options, || async { Ok::<_, StoreError>("Seaside cottage".to_string()) })
///     .await;
/// assert_eq!(live.value().map(String::as_str), Some("Seaside cottage"));
/// assert!(!live.from_cache());
///
/// let cached = executor
///     .query("listing:42", &options, || async { Err::<String, _>(StoreError::from_message("fetch failed")) })
///     .await;
/// assert!(cached.from_cache());
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct ResilientExecutor {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    cache: TtlCache<String, CachedValue>,
    breakers: BreakerRegistry,
    retry: RetryPolicy,
    default_dependency: DependencyId,
    context: ResilienceContext,
}

impl ResilientExecutor {
    /// Starts building an executor that reads time from `clock`.
    pub fn builder(clock: impl AsRef<Clock>) -> ResilientExecutorBuilder {
        ResilientExecutorBuilder::new(clock.as_ref())
    }

    /// Creates an executor from serialized settings.
    pub fn from_config(clock: impl AsRef<Clock>, config: &StoreConfig) -> Self {
        Self::builder(clock).config(config).build()
    }

    /// Runs `operation` with caching, retries, circuit breaking and stale fallback as configured
    /// by `options`.
    ///
    /// Values are cached per `key` as type `T`. An entry stored under the same key with another
    /// type is treated as a miss.
    ///
    /// Dropping the returned future cancels the query: a pending backoff sleep or operation is
    /// abandoned and nothing is recorded.
    pub async fn query<T, E, F, Fut>(&self, key: &str, options: &QueryOptions, operation: F) -> QueryOutput<T, E>
    where
        T: Clone + Send + Sync + 'static,
        E: Recovery,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let caches = options.caches();

        if caches
            && let Some(value) = self.cached::<T>(key, Freshness::Fresh)
        {
            return QueryOutput::ok(value, QuerySource::Cache);
        }

        let error = match self.invoke(options, operation).await {
            Ok(value) => {
                if caches {
                    let cached: CachedValue = Arc::new(value.clone());
                    self.inner.cache.insert(key.to_string(), cached, options.get_cache_ttl());
                }
                return QueryOutput::ok(value, QuerySource::Live);
            }
            Err(error) => error,
        };

        if caches
            && error.is_transient()
            && let Some(value) = self.cached::<T>(key, Freshness::AllowStale)
        {
            tracing::event!(
                name: "innkeep.cache.stale_fallback",
                tracing::Level::WARN,
                pipeline.name = self.inner.context.pipeline_name(),
                cache.key = key,
                resilience.recovery = %error.recovery(),
                circuit_breaker.open = error.is_circuit_open(),
            );
            return QueryOutput::ok(value, QuerySource::StaleCache);
        }

        QueryOutput::failed(error)
    }

    /// Runs an operation that reports failures in a [`StoreReply`] envelope.
    ///
    /// The reply is converted with [`StoreReply::into_result`] so that in-band errors are
    /// retried and counted by the breaker like any other failure.
    pub async fn query_reply<T, F, Fut>(
        &self,
        key: &str,
        options: &QueryOptions,
        mut operation: F,
    ) -> QueryOutput<Option<T>, StoreError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreReply<T>>,
    {
        self.query(key, options, || {
            let reply = operation();
            async move { reply.await.into_result() }
        })
        .await
    }

    async fn invoke<T, E, F, Fut>(&self, options: &QueryOptions, operation: F) -> Result<T, QueryError<E>>
    where
        E: Recovery,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let retry = match options.get_max_retries() {
            Some(max_retries) => Cow::Owned(self.inner.retry.clone().max_retries(max_retries)),
            None => Cow::Borrowed(&self.inner.retry),
        };
        let retry: &RetryPolicy = &retry;

        if !options.get_use_circuit_breaker() {
            return retry.execute(operation).await.map_err(QueryError::Operation);
        }

        let dependency = options.get_dependency().unwrap_or(&self.inner.default_dependency);
        let breaker = self.inner.breakers.get(dependency);

        breaker
            .execute(|| retry.execute(operation))
            .await
            .map_err(QueryError::from)
    }

    fn cached<T: Clone + 'static>(&self, key: &str, freshness: Freshness) -> Option<T> {
        let entry = self.inner.cache.lookup(key, freshness)?;

        if let Some(value) = (*entry).downcast_ref::<T>() {
            return Some(value.clone());
        }

        tracing::event!(
            name: "innkeep.cache.type_mismatch",
            tracing::Level::DEBUG,
            pipeline.name = self.inner.context.pipeline_name(),
            cache.key = key,
            cache.expected_type = std::any::type_name::<T>(),
        );
        None
    }

    /// Removes the cached value for `key`, typically after a write that changes it. Returns
    /// `true` if an entry was present.
    pub fn invalidate(&self, key: &str) -> bool {
        self.inner.cache.invalidate(key)
    }

    /// Removes every cached value.
    pub fn clear_cache(&self) {
        self.inner.cache.clear();
    }

    /// Removes expired cache entries and returns how many were removed. Expired entries are
    /// the only source of stale fallback, so prune sparingly.
    pub fn prune_cache(&self) -> usize {
        self.inner.cache.prune()
    }

    /// Number of cached entries, expired ones included.
    #[must_use]
    pub fn cache_len(&self) -> usize {
        self.inner.cache.len()
    }

    /// The breaker guarding `dependency`.
    pub fn breaker(&self, dependency: impl Into<DependencyId>) -> Arc<CircuitBreaker> {
        self.inner.breakers.get(dependency)
    }

    /// Current state of the breaker guarding `dependency`.
    pub fn breaker_state(&self, dependency: impl Into<DependencyId>) -> CircuitState {
        self.breaker(dependency).state()
    }

    /// Snapshots of every breaker used so far.
    #[must_use]
    pub fn breaker_snapshots(&self) -> Vec<(DependencyId, BreakerSnapshot)> {
        self.inner.breakers.snapshots()
    }

    /// Dependency whose breaker guards queries that do not name one.
    #[must_use]
    pub fn default_dependency(&self) -> &DependencyId {
        &self.inner.default_dependency
    }

    /// The pipeline name reported in logs and metrics.
    #[must_use]
    pub fn pipeline_name(&self) -> &str {
        self.inner.context.pipeline_name()
    }
}

/// Builder of [`ResilientExecutor`], created by [`ResilientExecutor::builder`].
pub struct ResilientExecutorBuilder {
    context: ResilienceContext,
    configure_retry: Option<ConfigureRetry>,
    breaker_options: BreakerOptions,
    dependency_options: Vec<(DependencyId, BreakerOptions)>,
    default_dependency: DependencyId,
}

impl ResilientExecutorBuilder {
    fn new(clock: &Clock) -> Self {
        Self {
            context: ResilienceContext::new(clock).name(DEFAULT_PIPELINE_NAME),
            configure_retry: None,
            breaker_options: BreakerOptions::default(),
            dependency_options: Vec::new(),
            default_dependency: DependencyId::new(DEFAULT_DEPENDENCY),
        }
    }

    /// Sets the pipeline name reported in logs and metrics.
    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.context = self.context.name(name);
        self
    }

    /// Reports retries and breaker transitions through the given OpenTelemetry meter provider.
    #[must_use]
    #[cfg(feature = "metrics")]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    pub fn enable_metrics(mut self, provider: &dyn opentelemetry::metrics::MeterProvider) -> Self {
        self.context = self.context.enable_metrics(provider);
        self
    }

    /// Customizes the retry policy, starting from the default one. Replaces any earlier
    /// customization.
    ///
    /// ```
    /// use std::time::Duration;
    ///
    /// use innkeep_store::ResilientExecutor;
    /// use tick::Clock;
    ///
    /// let executor = ResilientExecutor::builder(Clock::new_frozen())
    ///     .retry_policy(|policy| policy.max_retries(5).initial_delay(Duration::from_millis(250)))
    ///     .build();
    /// # let _ = executor;
    /// ```
    #[must_use]
    pub fn retry_policy(mut self, configure: impl FnOnce(RetryPolicy) -> RetryPolicy + Send + 'static) -> Self {
        self.configure_retry = Some(Box::new(configure));
        self
    }

    /// Breaker settings of every dependency without its own options.
    #[must_use]
    pub fn breaker_options(mut self, options: BreakerOptions) -> Self {
        self.breaker_options = options;
        self
    }

    /// Breaker settings of one dependency.
    #[must_use]
    pub fn dependency_options(mut self, dependency: impl Into<DependencyId>, options: BreakerOptions) -> Self {
        self.dependency_options.push((dependency.into(), options));
        self
    }

    /// Dependency whose breaker guards queries that do not name one. Defaults to
    /// `"remote_store"`.
    #[must_use]
    pub fn default_dependency(mut self, dependency: impl Into<DependencyId>) -> Self {
        self.default_dependency = dependency.into();
        self
    }

    /// Applies serialized settings.
    #[must_use]
    pub fn config(self, config: &StoreConfig) -> Self {
        let retry = config.retry;
        let mut builder = self
            .name(config.name.clone())
            .retry_policy(move |policy| retry.apply(policy))
            .breaker_options(config.breaker.to_options())
            .default_dependency(config.default_dependency.clone());

        for (dependency, breaker) in &config.dependencies {
            builder = builder.dependency_options(dependency.clone(), breaker.to_options());
        }

        builder
    }

    /// Creates the executor with an empty cache.
    #[must_use]
    pub fn build(self) -> ResilientExecutor {
        let policy = RetryPolicy::new(&self.context);
        let retry = match self.configure_retry {
            Some(configure) => configure(policy),
            None => policy,
        };

        let breakers = BreakerRegistry::new(self.breaker_options, &self.context);
        for (dependency, options) in self.dependency_options {
            breakers.register(dependency, options);
        }

        tracing::event!(
            name: "innkeep.executor.created",
            tracing::Level::DEBUG,
            pipeline.name = self.context.pipeline_name(),
            retry.max_retries = retry.get_max_retries(),
            circuit_breaker.default_id = %self.default_dependency,
        );

        ResilientExecutor {
            inner: Arc::new(Inner {
                cache: TtlCache::new(self.context.clock()),
                breakers,
                retry,
                default_dependency: self.default_dependency,
                context: self.context,
            }),
        }
    }
}

impl Debug for ResilientExecutorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientExecutorBuilder")
            .field("context", &self.context)
            .field("breaker_options", &self.breaker_options)
            .field("dependency_options", &self.dependency_options)
            .field("default_dependency", &self.default_dependency)
            .finish_non_exhaustive()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::time::Duration;

    use innkeep_testing::{LogCapture, Script};
    use tick::ClockControl;

    use super::*;

    static_assertions::assert_impl_all!(ResilientExecutor: Send, Sync, Clone, Debug);
    static_assertions::assert_impl_all!(ResilientExecutorBuilder: Send, Debug);

    fn executor(control: &ClockControl) -> ResilientExecutor {
        ResilientExecutor::builder(control.to_clock())
            .name("test_pipeline")
            .retry_policy(|policy| policy.jitter(false))
            .build()
    }

    async fn run(
        executor: &ResilientExecutor,
        options: &QueryOptions,
        script: &Arc<Script<u32, StoreError>>,
    ) -> QueryOutput<u32, StoreError> {
        executor
            .query("listing:1", options, || {
                let script = Arc::clone(script);
                async move { script.next() }
            })
            .await
    }

    fn connection_error() -> StoreError {
        StoreError::Connection("connection refused".into())
    }

    #[tokio::test]
    async fn zero_ttl_never_touches_cache() {
        let control = ClockControl::new().auto_advance_timers(true);
        let executor = executor(&control);
        let script = Arc::new(Script::new([Ok(1), Err(connection_error())]));
        let options = QueryOptions::uncached().max_retries(0);

        assert_eq!(run(&executor, &options, &script).await.into_value(), Some(1));
        assert_eq!(executor.cache_len(), 0);

        let failed = run(&executor, &options, &script).await;
        assert!(failed.error().is_some());
        assert!(!failed.from_cache());
    }

    #[tokio::test]
    async fn per_call_retry_override() {
        let control = ClockControl::new().auto_advance_timers(true);
        let executor = executor(&control);
        let script = Arc::new(Script::repeat(Err(connection_error())));

        let _ = run(&executor, &QueryOptions::uncached().max_retries(1), &script).await;
        assert_eq!(script.calls(), 2);

        let _ = run(&executor, &QueryOptions::uncached(), &script).await;
        assert_eq!(script.calls(), 6);
    }

    #[tokio::test]
    async fn breaker_disabled_keeps_breaker_untouched() {
        let control = ClockControl::new().auto_advance_timers(true);
        let executor = executor(&control);
        let script = Arc::new(Script::repeat(Err(connection_error())));

        for _ in 0..6 {
            let _ = run(&executor, &QueryOptions::write().max_retries(0), &script).await;
        }

        assert_eq!(script.calls(), 6);
        assert!(executor.breaker_snapshots().is_empty());
    }

    #[tokio::test]
    async fn invalidate_forces_live_call() {
        let control = ClockControl::new();
        let executor = executor(&control);
        let script = Arc::new(Script::new([Ok(1)]));
        let options = QueryOptions::cached(Duration::from_secs(60));

        assert_eq!(run(&executor, &options, &script).await.into_value(), Some(1));
        assert_eq!(run(&executor, &options, &script).await.into_value(), Some(1));

        script.push(Ok(2));
        assert!(executor.invalidate("listing:1"));

        let refreshed = run(&executor, &options, &script).await;
        assert_eq!(refreshed.source(), Some(QuerySource::Live));
        assert_eq!(refreshed.into_value(), Some(2));
        assert_eq!(script.calls(), 2);
    }

    #[tokio::test]
    async fn prune_removes_stale_fallback() {
        let control = ClockControl::new().auto_advance_timers(true);
        let executor = executor(&control);
        let script = Arc::new(Script::new([Ok(1), Err(connection_error())]));
        let options = QueryOptions::cached(Duration::from_secs(1)).max_retries(0);

        let _ = run(&executor, &options, &script).await;
        control.advance(Duration::from_secs(2));
        assert_eq!(executor.prune_cache(), 1);

        let failed = run(&executor, &options, &script).await;
        assert!(matches!(failed.error(), Some(QueryError::Operation(StoreError::Connection(_)))));
    }

    #[tokio::test]
    async fn clear_cache_empties_everything() {
        let control = ClockControl::new();
        let executor = executor(&control);
        let script = Arc::new(Script::repeat(Ok(1)));
        let options = QueryOptions::default();

        let _ = run(&executor, &options, &script).await;
        assert_eq!(executor.cache_len(), 1);

        executor.clear_cache();
        assert_eq!(executor.cache_len(), 0);
    }

    #[tokio::test]
    async fn stale_fallback_emits_log() {
        use tracing_subscriber::util::SubscriberInitExt;

        let log_capture = LogCapture::new();
        let _guard = log_capture.subscriber().set_default();

        let control = ClockControl::new().auto_advance_timers(true);
        let executor = executor(&control);
        let script = Arc::new(Script::new([Ok(1), Err(connection_error())]));
        let options = QueryOptions::cached(Duration::from_secs(1)).max_retries(0);

        let _ = run(&executor, &options, &script).await;
        log_capture.assert_not_contains("circuit_breaker.open");

        control.advance(Duration::from_secs(2));
        let stale = run(&executor, &options, &script).await;

        assert_eq!(stale.source(), Some(QuerySource::StaleCache));
        log_capture.assert_contains("innkeep_store::executor");
        log_capture.assert_contains("test_pipeline");
        log_capture.assert_contains("cache.key=\"listing:1\"");
        log_capture.assert_contains("circuit_breaker.open=false");
    }

    #[tokio::test]
    async fn type_mismatch_is_a_miss() {
        use tracing_subscriber::util::SubscriberInitExt;

        let log_capture = LogCapture::new();
        let _guard = log_capture.subscriber().set_default();

        let control = ClockControl::new();
        let executor = executor(&control);
        let options = QueryOptions::default();

        let _ = executor
            .query("listing:1", &options, || async { Ok::<_, StoreError>("text".to_string()) })
            .await;
        let script = Arc::new(Script::repeat(Ok(5)));
        let number = run(&executor, &options, &script).await;

        assert_eq!(number.source(), Some(QuerySource::Live));
        assert_eq!(number.into_value(), Some(5));
        log_capture.assert_contains("cache.expected_type=\"u32\"");
    }

    #[test]
    fn builder_applies_config() {
        let mut config = StoreConfig::default();
        config.name = "from_config".to_string();
        config.default_dependency = "primary".to_string();
        config.dependencies.insert(
            "payments".to_string(),
            crate::BreakerConfig {
                failure_threshold: 1,
                ..crate::BreakerConfig::default()
            },
        );

        let executor = ResilientExecutor::from_config(Clock::new_frozen(), &config);

        assert_eq!(executor.pipeline_name(), "from_config");
        assert_eq!(executor.default_dependency(), &DependencyId::from("primary"));
        assert_eq!(executor.breaker("payments").options().get_failure_threshold(), 1);
        assert_eq!(executor.breaker("primary").options().get_failure_threshold(), 5);
    }

    #[test]
    fn builder_debug() {
        let builder = ResilientExecutor::builder(Clock::new_frozen()).retry_policy(|p| p.max_retries(1));

        assert!(format!("{builder:?}").starts_with("ResilientExecutorBuilder"));
    }
}
