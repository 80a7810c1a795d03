//! Channel → batch registry.
//!
//! The channel map is only write-locked to insert or remove a slot. All
//! per-channel work (append, rearm, detach) happens under the slot's own
//! mutex, so independent channels never wait on each other. Each slot also
//! carries an async drain gate that lets exactly one flush analyze the
//! channel at a time.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::mpsc;

use settle_api::{ChannelStatus, Message, RegistryStatus};

use crate::record::BatchRecord;
use crate::timer::{DebounceTimer, TimerFired};

/// Why a batch is being detached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushTrigger {
    /// A debounce timer fired for the given generation.
    Timer { generation: u64 },
    /// Explicit force-flush request.
    Forced,
}

#[derive(Debug, Default)]
struct SlotState {
    batch: Option<BatchRecord>,
    timer: Option<DebounceTimer>,
    /// Bumped on every append; a timer firing with an older value is stale.
    generation: u64,
    /// Outstanding [`FlushLease`]s.
    leases: usize,
    /// A detached batch of this channel is being analyzed.
    draining: bool,
    /// Removed from the map; appenders holding it must look up again.
    retired: bool,
}

#[derive(Debug, Default)]
struct ChannelSlot {
    state: Mutex<SlotState>,
    drain: Arc<tokio::sync::Mutex<()>>,
}

impl ChannelSlot {
    fn lock_state(&self) -> MutexGuard<'_, SlotState> {
        match self.state.lock() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("channel slot lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

/// Right to flush one channel. Keeps the slot alive until released.
#[derive(Debug)]
pub struct FlushLease {
    channel_id: String,
    slot: Arc<ChannelSlot>,
    took: bool,
}

impl FlushLease {
    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    /// The channel's drain gate. Hold it from detach until release.
    pub fn drain_gate(&self) -> Arc<tokio::sync::Mutex<()>> {
        self.slot.drain.clone()
    }
}

/// Process-wide map of channel id → batch slot.
#[derive(Debug)]
pub struct BatchRegistry {
    slots: RwLock<HashMap<String, Arc<ChannelSlot>>>,
    timeout_ms: AtomicU64,
    fired_tx: mpsc::UnboundedSender<TimerFired>,
}

impl BatchRegistry {
    /// Create a registry whose timers report to `fired_tx`.
    pub fn new(timeout: Duration, fired_tx: mpsc::UnboundedSender<TimerFired>) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            timeout_ms: AtomicU64::new(timeout.as_millis() as u64),
            fired_tx,
        }
    }

    /// Timeout applied to batches created from now on.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.load(Ordering::Relaxed))
    }

    /// Change the timeout for new batches. Existing batches keep theirs.
    pub fn set_timeout(&self, timeout: Duration) {
        self.timeout_ms
            .store(timeout.as_millis() as u64, Ordering::Relaxed);
    }

    fn read_slots(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<ChannelSlot>>> {
        match self.slots.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("batch registry read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_slots(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<ChannelSlot>>> {
        match self.slots.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("batch registry write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn get_slot(&self, channel_id: &str) -> Option<Arc<ChannelSlot>> {
        self.read_slots().get(channel_id).cloned()
    }

    fn slot_or_insert(&self, channel_id: &str) -> Arc<ChannelSlot> {
        if let Some(slot) = self.get_slot(channel_id) {
            return slot;
        }
        self.write_slots()
            .entry(channel_id.to_string())
            .or_default()
            .clone()
    }

    /// Append a message to the channel's batch, creating the batch if needed,
    /// and (re)arm the channel's debounce timer.
    pub fn add_message(&self, channel_id: &str, message: Message) {
        loop {
            let slot = self.slot_or_insert(channel_id);
            let mut state = slot.lock_state();
            if state.retired {
                continue;
            }

            state.generation += 1;
            let generation = state.generation;
            let draining = state.draining;

            let timeout = match state.batch.as_mut() {
                Some(batch) => {
                    batch.push(message);
                    tracing::debug!(
                        channel = %channel_id,
                        messages = batch.len(),
                        generation,
                        "message appended to batch"
                    );
                    batch.timeout()
                }
                None => {
                    let batch = BatchRecord::new(channel_id, message, self.timeout());
                    let timeout = batch.timeout();
                    state.batch = Some(batch);
                    tracing::debug!(
                        channel = %channel_id,
                        timeout_secs = timeout.as_secs(),
                        draining,
                        "batch created"
                    );
                    timeout
                }
            };

            if let Some(previous) = state.timer.take() {
                previous.cancel();
            }
            state.timer = Some(DebounceTimer::arm(
                channel_id.to_string(),
                generation,
                timeout,
                self.fired_tx.clone(),
            ));
            return;
        }
    }

    /// Obtain the right to flush `channel_id`. `None` if the channel has no slot.
    pub fn lease(&self, channel_id: &str) -> Option<FlushLease> {
        let slot = self.get_slot(channel_id)?;
        {
            let mut state = slot.lock_state();
            if state.retired {
                return None;
            }
            state.leases += 1;
        }
        Some(FlushLease {
            channel_id: channel_id.to_string(),
            slot,
            took: false,
        })
    }

    /// Atomically detach the channel's active batch.
    ///
    /// The record leaves the registry in [`BatchState::Flushing`] and its
    /// timer is cancelled; the next `add_message` starts a new batch.
    /// Returns `None` when there is no batch, or when a timer trigger is
    /// stale because the batch was appended to after that timer was armed.
    ///
    /// [`BatchState::Flushing`]: crate::record::BatchState::Flushing
    pub fn take_for_flush(
        &self,
        lease: &mut FlushLease,
        trigger: FlushTrigger,
    ) -> Option<BatchRecord> {
        let mut state = lease.slot.lock_state();

        if let FlushTrigger::Timer { generation } = trigger {
            if generation != state.generation {
                tracing::debug!(
                    channel = %lease.channel_id,
                    fired = generation,
                    current = state.generation,
                    "stale timer ignored"
                );
                return None;
            }
        }

        let mut batch = state.batch.take()?;
        if let Some(timer) = state.timer.take() {
            timer.cancel();
        }
        batch.mark_flushing();
        state.draining = true;
        lease.took = true;
        Some(batch)
    }

    /// Return a lease. Prunes the slot when nothing else refers to it.
    pub fn release(&self, lease: FlushLease) {
        let prunable = {
            let mut state = lease.slot.lock_state();
            state.leases -= 1;
            if lease.took {
                state.draining = false;
            }
            Self::is_prunable(&state)
        };
        if !prunable {
            return;
        }

        // Lock order: map before slot, same as slot_or_insert → lock_state.
        let mut slots = self.write_slots();
        let mut state = lease.slot.lock_state();
        if !Self::is_prunable(&state) {
            return;
        }
        state.retired = true;
        let current = slots
            .get(&lease.channel_id)
            .is_some_and(|s| Arc::ptr_eq(s, &lease.slot));
        if current {
            slots.remove(&lease.channel_id);
        }
    }

    fn is_prunable(state: &SlotState) -> bool {
        state.batch.is_none() && state.leases == 0 && !state.retired
    }

    /// Read-only status of one channel, or of every channel with a batch.
    pub fn snapshot_status(&self, channel_id: Option<&str>) -> RegistryStatus {
        let slots: Vec<(String, Arc<ChannelSlot>)> = self
            .read_slots()
            .iter()
            .map(|(id, slot)| (id.clone(), slot.clone()))
            .collect();

        let mut channels = BTreeMap::new();
        let mut active_channels = 0;
        for (id, slot) in slots {
            let state = slot.lock_state();
            let Some(batch) = state.batch.as_ref() else {
                continue;
            };
            active_channels += 1;
            if channel_id.is_none_or(|wanted| wanted == id) {
                channels.insert(id, ChannelStatus::Active(batch.snapshot(state.draining)));
            }
        }

        if let Some(wanted) = channel_id {
            channels
                .entry(wanted.to_string())
                .or_insert(ChannelStatus::NoBatch);
        }

        RegistryStatus {
            active_channels,
            batch_timeout_seconds: self.timeout().as_secs(),
            channels,
        }
    }

    /// Number of channel slots, including ones that are only draining.
    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.read_slots().len()
    }

    /// Drop every batch and cancel every timer. Returns `(channel, messages)`
    /// for each batch that was discarded.
    pub fn clear(&self) -> Vec<(String, usize)> {
        let mut slots = self.write_slots();
        let mut dropped = Vec::new();
        for (id, slot) in slots.drain() {
            let mut state = slot.lock_state();
            if let Some(timer) = state.timer.take() {
                timer.cancel();
            }
            if let Some(batch) = state.batch.take() {
                dropped.push((id, batch.len()));
            }
            state.retired = true;
        }
        dropped.sort();
        dropped
    }
}
