//! Platform extension wiring instruments, tracers and trace files together.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use observability_config::ObservabilityConfig;
use observability_instruments::{
    Collector, FunctionInventory, Instrument, InstrumentRegistry, MetricsEndpoint, QueueInventory,
    QueueStatistics, RequestCounter, ServiceMetrics, SystemMetrics, TopicStatistics,
    TracingCollector,
};
use observability_kernel::{
    ExtensionState, Lifecycle, LifecycleEvent, PeriodicScheduler, SchedulerHandle,
};
use observability_primitives::SessionId;
use observability_tracing::{
    CompositeInvocationHooks, EVENT_SOURCE_TRACES, EventSourceTracer, FlushOutcome,
    INVOCATION_TRACES, InvocationHooks, InvocationTracer, TraceFileLogger, TracingInvocationHooks,
};
use tracing::{debug, info, warn};

use crate::notify::{EventIdentifiers, NotificationRouter, TracerId};

const EXTENSION_NAME: &str = "platform-observability";

/// Assembles an [`ObservabilityExtension`].
pub struct ObservabilityExtensionBuilder {
    config: ObservabilityConfig,
    session: Option<SessionId>,
    queues: Option<Arc<dyn QueueInventory>>,
    functions: Option<Arc<dyn FunctionInventory>>,
}

impl fmt::Debug for ObservabilityExtensionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservabilityExtensionBuilder")
            .field("config", &self.config)
            .field("session", &self.session)
            .field("queues", &self.queues.is_some())
            .field("functions", &self.functions.is_some())
            .finish()
    }
}

impl ObservabilityExtensionBuilder {
    /// Starts from `config`.
    #[must_use]
    pub fn new(config: ObservabilityConfig) -> Self {
        Self {
            config,
            session: None,
            queues: None,
            functions: None,
        }
    }

    /// Names the trace files after `session` instead of a random id.
    #[must_use]
    pub fn session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    /// Source of queue depths; enables the `queues` instrument.
    #[must_use]
    pub fn queue_inventory(mut self, inventory: Arc<dyn QueueInventory>) -> Self {
        self.queues = Some(inventory);
        self
    }

    /// Source of the function count; together with a queue inventory enables
    /// the `service_metrics` instrument.
    #[must_use]
    pub fn function_inventory(mut self, inventory: Arc<dyn FunctionInventory>) -> Self {
        self.functions = Some(inventory);
        self
    }

    /// Validates the configuration and builds the extension.
    ///
    /// # Errors
    ///
    /// Fails when the configuration is invalid.
    pub fn build(self) -> anyhow::Result<ObservabilityExtension> {
        self.config
            .validate()
            .context("invalid observability configuration")?;
        let session = self.session.unwrap_or_default();

        let requests = Arc::new(RequestCounter::new(self.config.request_filter().iter()));
        let topics = Arc::new(TopicStatistics::new());

        let mut registry = InstrumentRegistry::new();
        registry.register(Arc::clone(&requests) as Arc<dyn Instrument>)?;
        if let (Some(queues), Some(functions)) = (&self.queues, &self.functions) {
            registry.register(Arc::new(ServiceMetrics::new(
                Arc::clone(queues),
                Arc::clone(functions),
            )))?;
        }
        registry.register(Arc::new(SystemMetrics::new()))?;
        if let Some(queues) = self.queues {
            registry.register(Arc::new(QueueStatistics::new(queues)))?;
        }
        registry.register(Arc::clone(&topics) as Arc<dyn Instrument>)?;

        let invocations = Arc::new(InvocationTracer::new());
        let event_sources = Arc::new(EventSourceTracer::new());
        let invocation_log = Arc::new(TraceFileLogger::for_session(
            self.config.cache_root(),
            INVOCATION_TRACES,
            session,
            Arc::clone(&invocations),
        ));
        let event_source_log = Arc::new(TraceFileLogger::for_session(
            self.config.cache_root(),
            EVENT_SOURCE_TRACES,
            session,
            Arc::clone(&event_sources),
        ));

        let hooks: Arc<dyn InvocationHooks> = if self.config.debug() {
            Arc::new(CompositeInvocationHooks::new([
                Arc::clone(&invocations) as Arc<dyn InvocationHooks>,
                Arc::new(TracingInvocationHooks) as Arc<dyn InvocationHooks>,
            ]))
        } else {
            Arc::clone(&invocations) as Arc<dyn InvocationHooks>
        };
        let router = NotificationRouter::new()
            .with_invocation_tracer(Arc::clone(&invocations))
            .with_event_source_tracer(Arc::clone(&event_sources));

        debug!(%session, instruments = registry.len(), "observability extension built");
        Ok(ObservabilityExtension {
            config: self.config,
            session,
            requests,
            topics,
            endpoint: Arc::new(MetricsEndpoint::new(registry)),
            invocations,
            event_sources,
            hooks,
            invocation_log,
            event_source_log,
            router,
            lifecycle: Lifecycle::new(EXTENSION_NAME),
            scheduler: None,
        })
    }
}

/// Observability layer of the platform, driven by the host's lifecycle.
///
/// The host feeds [`Self::requests`], [`Self::topics`], the tracers and
/// [`Self::notify_event`] while running; trace files are flushed on a
/// background scheduler between [`Self::on_platform_start`] and
/// [`Self::on_platform_shutdown`].
pub struct ObservabilityExtension {
    config: ObservabilityConfig,
    session: SessionId,
    requests: Arc<RequestCounter>,
    topics: Arc<TopicStatistics>,
    endpoint: Arc<MetricsEndpoint>,
    invocations: Arc<InvocationTracer>,
    event_sources: Arc<EventSourceTracer>,
    hooks: Arc<dyn InvocationHooks>,
    invocation_log: Arc<TraceFileLogger<InvocationTracer>>,
    event_source_log: Arc<TraceFileLogger<EventSourceTracer>>,
    router: NotificationRouter,
    lifecycle: Lifecycle,
    scheduler: Option<SchedulerHandle>,
}

impl fmt::Debug for ObservabilityExtension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservabilityExtension")
            .field("session", &self.session)
            .field("state", &self.state())
            .field("endpoint", &self.endpoint)
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl ObservabilityExtension {
    /// Shortcut for [`ObservabilityExtensionBuilder::new`].
    #[must_use]
    pub fn builder(config: ObservabilityConfig) -> ObservabilityExtensionBuilder {
        ObservabilityExtensionBuilder::new(config)
    }

    /// The host loaded the extension.
    ///
    /// # Errors
    ///
    /// Fails unless the extension was just constructed.
    pub fn on_extension_load(&mut self) -> anyhow::Result<()> {
        self.lifecycle.transition(LifecycleEvent::Load)?;
        info!(
            session = %self.session,
            cache_root = %self.config.cache_root().display(),
            "observability extension loaded"
        );
        Ok(())
    }

    /// The platform is up: prepares the trace files and starts the flush
    /// scheduler.
    ///
    /// The extension only becomes running once both trace files are ready,
    /// so a failed start can be retried.
    ///
    /// # Errors
    ///
    /// Fails on an invalid lifecycle transition or when a trace file cannot
    /// be created.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub async fn on_platform_start(&mut self) -> anyhow::Result<()> {
        self.lifecycle.check(LifecycleEvent::Start)?;

        self.invocation_log.init().await.with_context(|| {
            format!("failed to prepare {}", self.invocation_log.path().display())
        })?;
        self.event_source_log.init().await.with_context(|| {
            format!("failed to prepare {}", self.event_source_log.path().display())
        })?;

        let mut scheduler = PeriodicScheduler::new();
        let period = self.config.flush_interval();
        let invocation_log = Arc::clone(&self.invocation_log);
        scheduler.schedule(INVOCATION_TRACES, period, move || {
            let logger = Arc::clone(&invocation_log);
            async move { report_flush(INVOCATION_TRACES, logger.flush().await) }
        })?;
        let event_source_log = Arc::clone(&self.event_source_log);
        scheduler.schedule(EVENT_SOURCE_TRACES, period, move || {
            let logger = Arc::clone(&event_source_log);
            async move { report_flush(EVENT_SOURCE_TRACES, logger.flush().await) }
        })?;
        if let Some(interval) = self.config.metrics_log_interval() {
            let endpoint = Arc::clone(&self.endpoint);
            scheduler.schedule("metrics-log", interval, move || {
                let endpoint = Arc::clone(&endpoint);
                async move { log_metrics(&endpoint) }
            })?;
        }

        self.lifecycle.transition(LifecycleEvent::Start)?;
        self.scheduler = Some(scheduler.start());
        info!(flush_interval = ?period, "observability extension running");
        Ok(())
    }

    /// The platform is stopping: waits for the in-flight tick, then writes
    /// out whatever is still buffered.
    ///
    /// Repeated calls are no-ops apart from the final flush.
    ///
    /// # Errors
    ///
    /// Fails when the scheduler worker did not exit cleanly. Trace files are
    /// closed regardless.
    pub async fn on_platform_shutdown(&mut self) -> anyhow::Result<()> {
        self.lifecycle.transition(LifecycleEvent::Shutdown)?;

        let stopped = match self.scheduler.take() {
            Some(handle) => handle.shutdown().await,
            None => Ok(()),
        };
        let invocations = self.invocation_log.close().await;
        let event_sources = self.event_source_log.close().await;
        info!(?invocations, ?event_sources, "observability extension stopped");

        stopped.context("flush scheduler did not stop cleanly")
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ExtensionState {
        self.lifecycle.state()
    }

    /// Session the trace files are named after.
    #[must_use]
    pub const fn session(&self) -> SessionId {
        self.session
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &ObservabilityConfig {
        &self.config
    }

    /// The `requests` instrument.
    #[must_use]
    pub fn requests(&self) -> &Arc<RequestCounter> {
        &self.requests
    }

    /// The `topics` instrument.
    #[must_use]
    pub fn topics(&self) -> &Arc<TopicStatistics> {
        &self.topics
    }

    /// Snapshot queries over every registered instrument.
    #[must_use]
    pub fn endpoint(&self) -> &Arc<MetricsEndpoint> {
        &self.endpoint
    }

    /// Invocation lifecycle hooks; logs each call as well when debug is on.
    #[must_use]
    pub fn invocation_hooks(&self) -> &Arc<dyn InvocationHooks> {
        &self.hooks
    }

    /// The invocation tracer.
    #[must_use]
    pub fn invocation_tracer(&self) -> &Arc<InvocationTracer> {
        &self.invocations
    }

    /// The queue-to-function pipeline tracer.
    #[must_use]
    pub fn event_source_tracer(&self) -> &Arc<EventSourceTracer> {
        &self.event_sources
    }

    /// Path of the invocation trace file.
    #[must_use]
    pub fn invocation_trace_file(&self) -> &Path {
        self.invocation_log.path()
    }

    /// Path of the event source trace file.
    #[must_use]
    pub fn event_source_trace_file(&self) -> &Path {
        self.event_source_log.path()
    }

    /// Host notification boundary; see [`NotificationRouter::notify_event`].
    pub fn notify_event(
        &self,
        tracer: TracerId,
        kind: &str,
        ids: &EventIdentifiers<'_>,
        failure_cause: Option<&str>,
    ) {
        self.router.notify_event(tracer, kind, ids, failure_cause);
    }
}

fn report_flush(subsystem: &str, outcome: FlushOutcome) {
    match outcome {
        FlushOutcome::Written { records } => debug!(subsystem, records, "trace batch written"),
        FlushOutcome::Dropped { records } => warn!(subsystem, records, "trace batch dropped"),
        FlushOutcome::Empty | FlushOutcome::NotReady => {}
    }
}

fn log_metrics(endpoint: &MetricsEndpoint) {
    match endpoint.get_all_metrics::<&str>(&[]) {
        Ok(snapshot) => TracingCollector.put(snapshot),
        Err(err) => warn!(%err, "metrics snapshot failed"),
    }
}

#[cfg(test)]
mod tests {
    use observability_instruments::{InstrumentResult, QueueState};
    use uuid::Uuid;

    use super::*;

    struct Inventory;

    impl QueueInventory for Inventory {
        fn queues(&self) -> InstrumentResult<Vec<QueueState>> {
            let mut jobs = QueueState::new("arn:aws:sqs:us-east-1:000000000000:jobs");
            jobs.visible = 3;
            Ok(vec![jobs])
        }
    }

    impl FunctionInventory for Inventory {
        fn function_count(&self) -> InstrumentResult<usize> {
            Ok(2)
        }
    }

    fn temp_config() -> ObservabilityConfig {
        ObservabilityConfig::default()
            .with_cache_root(std::env::temp_dir().join(format!("observability-{}", Uuid::new_v4())))
    }

    #[test]
    fn registry_follows_the_available_inventories() {
        let extension = ObservabilityExtension::builder(temp_config()).build().unwrap();
        let names: Vec<_> = extension.endpoint().registry().names().collect();
        assert_eq!(names, ["requests", "system_metrics", "topics"]);

        let inventory = Arc::new(Inventory);
        let extension = ObservabilityExtension::builder(temp_config())
            .queue_inventory(Arc::clone(&inventory) as Arc<dyn QueueInventory>)
            .function_inventory(inventory)
            .build()
            .unwrap();
        let names: Vec<_> = extension.endpoint().registry().names().collect();
        assert_eq!(
            names,
            ["requests", "service_metrics", "system_metrics", "queues", "topics"]
        );
    }

    #[test]
    fn trace_files_follow_the_configured_layout() {
        let config = temp_config();
        let session = SessionId::random();
        let extension = ObservabilityExtension::builder(config.clone())
            .session(session)
            .build()
            .unwrap();

        assert_eq!(
            extension.invocation_trace_file(),
            config.trace_file(INVOCATION_TRACES, session)
        );
        assert_eq!(
            extension.event_source_trace_file(),
            config.trace_file(EVENT_SOURCE_TRACES, session)
        );
    }

    #[test]
    fn invalid_configuration_is_rejected() {
        let config = temp_config().with_request_filter(["sqs"]);
        assert!(ObservabilityExtension::builder(config).build().is_err());
    }

    #[tokio::test]
    async fn failed_start_can_be_retried() {
        let root = std::env::temp_dir().join(format!("observability-{}", Uuid::new_v4()));
        std::fs::write(&root, b"not a directory").unwrap();
        let config = ObservabilityConfig::default().with_cache_root(&root);
        let mut extension = ObservabilityExtension::builder(config).build().unwrap();
        extension.on_extension_load().unwrap();

        assert!(extension.on_platform_start().await.is_err());
        assert_eq!(extension.state(), ExtensionState::Loaded);

        std::fs::remove_file(&root).unwrap();
        extension.on_platform_start().await.unwrap();
        assert_eq!(extension.state(), ExtensionState::Running);
        assert!(extension.invocation_trace_file().exists());

        extension.on_platform_shutdown().await.unwrap();
        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn start_requires_load() {
        let mut extension = ObservabilityExtension::builder(temp_config()).build().unwrap();
        assert!(extension.on_platform_start().await.is_err());
        assert_eq!(extension.state(), ExtensionState::Constructed);

        extension.on_platform_shutdown().await.unwrap();
        assert_eq!(extension.state(), ExtensionState::Stopped);
    }
}
