use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use settle_api::{Analyzer, BatchControl, FlushOutcome, FlushReport, Message, RegistryStatus};

use crate::config::BatchingConfig;
use crate::error::EngineError;
use crate::flush::FlushProcessor;
use crate::registry::{BatchRegistry, FlushTrigger};
use crate::timer::TimerFired;

struct EngineInner {
    registry: BatchRegistry,
    processor: FlushProcessor,
    /// Timer-driven flushes, awaited on shutdown.
    flushes: TaskTracker,
}

impl EngineInner {
    /// Detach and analyze the channel's batch.
    ///
    /// Holds the channel's drain gate from detach to release, so a second
    /// flush of the same channel waits for this one to finish.
    async fn flush(&self, channel_id: &str, trigger: FlushTrigger) -> Option<FlushReport> {
        let mut lease = self.registry.lease(channel_id)?;
        let gate = lease.drain_gate();
        let _drain = gate.lock().await;

        let report = match self.registry.take_for_flush(&mut lease, trigger) {
            Some(batch) => Some(self.processor.process(batch).await),
            None => None,
        };
        self.registry.release(lease);
        report
    }
}

/// The running batching engine: registry, timer dispatcher and flush tasks.
pub struct Engine {
    inner: Arc<EngineInner>,
    token: CancellationToken,
    dispatcher: JoinHandle<()>,
    shutdown_grace: Duration,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("registry", &self.inner.registry)
            .field("shutdown_grace", &self.shutdown_grace)
            .finish()
    }
}

impl Engine {
    /// Start the engine. Must be called from within a tokio runtime.
    pub fn start(config: &BatchingConfig, analyzer: Arc<dyn Analyzer>) -> Result<Self, EngineError> {
        config.validate()?;

        let (fired_tx, fired_rx) = mpsc::unbounded_channel();
        let inner = Arc::new(EngineInner {
            registry: BatchRegistry::new(config.timeout(), fired_tx),
            processor: FlushProcessor::new(analyzer),
            flushes: TaskTracker::new(),
        });

        let token = CancellationToken::new();
        let dispatcher = tokio::spawn(dispatch_timers(inner.clone(), fired_rx, token.clone()));

        tracing::info!(timeout_secs = config.timeout_secs, "batching engine started");
        Ok(Self {
            inner,
            token,
            dispatcher,
            shutdown_grace: config.shutdown_grace(),
        })
    }

    /// Cloneable handle for the API server and other producers.
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            inner: self.inner.clone(),
        }
    }

    pub fn add_message(&self, channel_id: &str, message: Message) {
        self.inner.registry.add_message(channel_id, message);
    }

    pub fn status(&self, channel_id: Option<&str>) -> RegistryStatus {
        self.inner.registry.snapshot_status(channel_id)
    }

    pub async fn force_flush(&self, channel_id: &str) -> FlushOutcome {
        force_flush(&self.inner, channel_id).await
    }

    /// Apply a reloaded batching config. The new timeout affects batches
    /// created afterwards; running batches keep theirs.
    pub fn reconfigure(&mut self, config: &BatchingConfig) -> Result<(), EngineError> {
        config.validate()?;
        let old = self.inner.registry.timeout();
        self.inner.registry.set_timeout(config.timeout());
        self.shutdown_grace = config.shutdown_grace();
        if old != config.timeout() {
            tracing::info!(
                old_secs = old.as_secs(),
                new_secs = config.timeout_secs,
                "debounce timeout changed"
            );
        }
        Ok(())
    }

    /// Stop timers, drop unflushed batches and wait for running flushes.
    ///
    /// Batches still waiting for their quiet period are lost: nothing is
    /// persisted. Each one is logged with its message count.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.dispatcher.await {
            tracing::error!(error = %e, "timer dispatcher task failed");
        }

        for (channel, messages) in self.inner.registry.clear() {
            tracing::warn!(channel = %channel, messages, "dropping unflushed batch on shutdown");
        }

        self.inner.flushes.close();
        if tokio::time::timeout(self.shutdown_grace, self.inner.flushes.wait())
            .await
            .is_err()
        {
            tracing::warn!(
                in_flight = self.inner.flushes.len(),
                "flushes still running after shutdown grace period"
            );
        }
        tracing::info!("batching engine stopped");
    }
}

/// Shared, cloneable access to a running [`Engine`].
#[derive(Clone)]
pub struct EngineHandle {
    inner: Arc<EngineInner>,
}

impl BatchControl for EngineHandle {
    fn ingest(&self, channel_id: &str, message: Message) {
        self.inner.registry.add_message(channel_id, message);
    }

    fn status(&self, channel_id: Option<&str>) -> RegistryStatus {
        self.inner.registry.snapshot_status(channel_id)
    }

    fn force_flush<'a>(
        &'a self,
        channel_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = FlushOutcome> + Send + 'a>> {
        Box::pin(force_flush(&self.inner, channel_id))
    }
}

/// Run a forced flush as a tracked task and wait for it.
///
/// Dropping the returned future only abandons the wait: the drain keeps
/// running until every detached message has been analyzed and the lease is
/// released.
async fn force_flush(inner: &Arc<EngineInner>, channel_id: &str) -> FlushOutcome {
    tracing::info!(channel = %channel_id, "force-flush requested");
    let task_inner = inner.clone();
    let channel = channel_id.to_string();
    let drain = inner
        .flushes
        .spawn(async move { task_inner.flush(&channel, FlushTrigger::Forced).await });

    match drain.await {
        Ok(Some(report)) => FlushOutcome::processed(report),
        Ok(None) => {
            tracing::info!(channel = %channel_id, "force-flush: no active batch");
            FlushOutcome::nothing_to_flush(channel_id)
        }
        Err(e) => {
            tracing::error!(channel = %channel_id, error = %e, "force-flush task failed");
            FlushOutcome {
                success: false,
                message: format!("force-flush of channel {channel_id} failed: {e}"),
                report: None,
            }
        }
    }
}

/// Turn timer firings into flush tasks until cancelled.
async fn dispatch_timers(
    inner: Arc<EngineInner>,
    mut fired_rx: mpsc::UnboundedReceiver<TimerFired>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            fired = fired_rx.recv() => {
                match fired {
                    Some(TimerFired { channel_id, generation }) => {
                        tracing::debug!(channel = %channel_id, generation, "debounce timer fired");
                        let task_inner = inner.clone();
                        inner.flushes.spawn(async move {
                            task_inner
                                .flush(&channel_id, FlushTrigger::Timer { generation })
                                .await;
                        });
                    }
                    None => break,
                }
            }
            _ = token.cancelled() => break,
        }
    }
    tracing::debug!("timer dispatcher stopped");
}
