//! Process-variable subscription.
//!
//! The provider delivers two positionally correlated sequences per poll:
//! variable metadata and values. [`Subscription::poll`] checks that they
//! line up and hands out `(name, value)` records; nothing past this module
//! sees the two sequences.
//!
//! ```text
//! create ─► add_variable × N ─► subscribe ─► poll … poll ─► delete
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use fbio::io::PortName;
use fbio::variant::{ValueKind, Variant};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SubscriptionConfig;

// ─── Types ──────────────────────────────────────────────────────────

/// Provider-side delivery class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionKind {
    /// Buffered, consistent per task cycle.
    #[default]
    HighPerformance,
    /// Sampled in the producer's RT context.
    RealTime,
    /// Read on demand, no buffering.
    DirectRead,
    /// Every sample recorded.
    Recording,
}

/// Provider handle of an open subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wrap a raw provider id.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw provider id.
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Metadata entry of a poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableInfo {
    /// Fully qualified variable name.
    pub name: String,
    /// Declared type.
    pub kind: ValueKind,
}

/// One correlated `(name, value)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionRecord {
    /// Fully qualified variable name.
    pub name: String,
    /// Sampled value, [`Variant::Void`] until the first sample.
    pub value: Variant,
}

/// Subscription failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SubscriptionError {
    /// A provider call failed.
    #[error("subscription {operation} failed: {message}")]
    Provider {
        /// Provider operation.
        operation: &'static str,
        /// Provider message.
        message: String,
    },

    /// A variable was rejected by the provider.
    #[error("cannot add variable {name}: {message}")]
    AddVariable {
        /// Variable name.
        name: String,
        /// Provider message.
        message: String,
    },

    /// Metadata and value sequences differ in length.
    #[error("subscription returned {infos} variable infos but {values} values")]
    LengthMismatch {
        /// Metadata count.
        infos: usize,
        /// Value count.
        values: usize,
    },

    /// Poll on a closed subscription.
    #[error("subscription is not open")]
    NotOpen,
}

/// External subscription service.
pub trait SubscriptionProvider: Send + Sync {
    /// Create an empty subscription.
    fn create_subscription(&self, kind: SubscriptionKind) -> Result<SubscriptionId, SubscriptionError>;

    /// Track `name`. Must precede [`Self::subscribe`].
    fn add_variable(&self, id: SubscriptionId, name: &str) -> Result<(), SubscriptionError>;

    /// Start sampling at `sample_interval`.
    fn subscribe(&self, id: SubscriptionId, sample_interval: Duration) -> Result<(), SubscriptionError>;

    /// Metadata and values, in the same order.
    fn poll(&self, id: SubscriptionId) -> Result<(Vec<VariableInfo>, Vec<Variant>), SubscriptionError>;

    /// Delete the subscription.
    fn delete_subscription(&self, id: SubscriptionId) -> Result<(), SubscriptionError>;
}

// ─── Subscription ───────────────────────────────────────────────────

/// An open subscription. Deleted on [`Subscription::close`] or drop.
pub struct Subscription {
    provider: Arc<dyn SubscriptionProvider>,
    id: Option<SubscriptionId>,
}

impl Subscription {
    /// Create, add every variable, and subscribe.
    ///
    /// A failure at any step deletes what was created.
    pub fn open(
        provider: Arc<dyn SubscriptionProvider>,
        kind: SubscriptionKind,
        variables: &[PortName],
        sample_interval: Duration,
    ) -> Result<Self, SubscriptionError> {
        let id = provider.create_subscription(kind)?;
        let subscription = Self {
            provider,
            id: Some(id),
        };
        for variable in variables {
            subscription.provider.add_variable(id, variable.as_str())?;
        }
        subscription.provider.subscribe(id, sample_interval)?;
        info!(
            "Subscription {id} open: {kind:?}, {} variables, sample interval {sample_interval:?}",
            variables.len()
        );
        Ok(subscription)
    }

    /// Provider id, `None` once closed.
    pub fn id(&self) -> Option<SubscriptionId> {
        self.id
    }

    /// True until closed.
    pub fn is_open(&self) -> bool {
        self.id.is_some()
    }

    /// Poll once and correlate metadata with values.
    pub fn poll(&self) -> Result<Vec<SubscriptionRecord>, SubscriptionError> {
        let id = self.id.ok_or(SubscriptionError::NotOpen)?;
        let (infos, values) = self.provider.poll(id)?;
        if infos.len() != values.len() {
            return Err(SubscriptionError::LengthMismatch {
                infos: infos.len(),
                values: values.len(),
            });
        }
        Ok(infos
            .into_iter()
            .zip(values)
            .map(|(info, value)| SubscriptionRecord {
                name: info.name,
                value,
            })
            .collect())
    }

    /// Delete the subscription. Returns `false` if already closed.
    pub fn close(&mut self) -> bool {
        let Some(id) = self.id.take() else {
            return false;
        };
        match self.provider.delete_subscription(id) {
            Ok(()) => info!("Subscription {id} deleted"),
            Err(e) => warn!("Subscription {id}: {e}"),
        }
        true
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

// ─── Tracked values ─────────────────────────────────────────────────

/// Last known value per tracked variable.
#[derive(Debug, Clone)]
pub struct TrackedVariables {
    entries: Vec<(PortName, Variant)>,
}

impl TrackedVariables {
    /// All `names` start as [`Variant::Void`].
    pub fn new(names: &[PortName]) -> Self {
        Self {
            entries: names.iter().map(|n| (n.clone(), Variant::Void)).collect(),
        }
    }

    /// Copy matching records in. Returns how many values changed hands.
    ///
    /// Unmatched names are ignored; a `Void` value keeps the previous one.
    pub fn apply(&mut self, records: &[SubscriptionRecord]) -> usize {
        let mut updated = 0;
        for record in records {
            let Some((name, value)) = self
                .entries
                .iter_mut()
                .find(|(name, _)| name.as_str() == record.name)
            else {
                debug!("Ignoring untracked variable {}", record.name);
                continue;
            };
            if record.value.is_void() {
                info!("{name}: value not available yet, keeping previous");
                continue;
            }
            *value = record.value.clone();
            updated += 1;
        }
        updated
    }

    /// Current value of `name`.
    pub fn get(&self, name: &str) -> Option<&Variant> {
        self.entries
            .iter()
            .find(|(n, _)| n.as_str() == name)
            .map(|(_, v)| v)
    }

    /// Entries in configuration order.
    pub fn iter(&self) -> impl Iterator<Item = (&PortName, &Variant)> {
        self.entries.iter().map(|(n, v)| (n, v))
    }
}

// ─── Worker ─────────────────────────────────────────────────────────

struct WorkerState {
    subscription: Option<Subscription>,
    tracked: TrackedVariables,
}

/// Poll loop over one subscription.
pub struct SubscriptionWorker {
    provider: Arc<dyn SubscriptionProvider>,
    config: SubscriptionConfig,
    processing: AtomicBool,
    state: Mutex<WorkerState>,
}

impl SubscriptionWorker {
    /// Idle worker. Nothing is created until [`Self::start`].
    pub fn new(provider: Arc<dyn SubscriptionProvider>, config: SubscriptionConfig) -> Self {
        let tracked = TrackedVariables::new(&config.variables);
        Self {
            provider,
            config,
            processing: AtomicBool::new(false),
            state: Mutex::new(WorkerState {
                subscription: None,
                tracked,
            }),
        }
    }

    /// Open the subscription and start polling. No-op when already open.
    pub fn start(&self) -> Result<(), SubscriptionError> {
        let mut state = self.state.lock();
        if state.subscription.is_some() {
            debug!("Subscription already open");
            return Ok(());
        }
        let subscription = Subscription::open(
            self.provider.clone(),
            self.config.kind,
            &self.config.variables,
            self.config.sample_interval(),
        )?;
        state.subscription = Some(subscription);
        self.processing.store(true, Ordering::Release);
        Ok(())
    }

    /// Stop polling and delete the subscription. Idempotent.
    pub fn stop(&self) {
        self.processing.store(false, Ordering::Release);
        if let Some(mut subscription) = self.state.lock().subscription.take() {
            subscription.close();
        }
    }

    /// True between start and stop.
    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    /// Poll once and log every tracked value.
    ///
    /// Returns the number of updated values; 0 while stopped.
    pub fn tick(&self) -> Result<usize, SubscriptionError> {
        if !self.is_processing() {
            return Ok(0);
        }
        let mut state = self.state.lock();
        let WorkerState {
            subscription,
            tracked,
        } = &mut *state;
        let Some(subscription) = subscription.as_ref() else {
            return Ok(0);
        };

        let records = subscription.poll()?;
        let updated = tracked.apply(&records);
        for (name, value) in tracked.iter() {
            info!(target: "fbio::subscription", "{name}: Value: {value}");
        }
        Ok(updated)
    }

    /// Snapshot of the tracked values.
    pub fn values(&self) -> Vec<(PortName, Variant)> {
        self.state
            .lock()
            .tracked
            .iter()
            .map(|(n, v)| (n.clone(), v.clone()))
            .collect()
    }

    /// Tick every poll interval until `alive` clears.
    pub fn run(&self, alive: &AtomicBool) {
        let interval = self.config.poll_interval();
        debug!("Subscription loop started ({interval:?})");
        while alive.load(Ordering::Acquire) {
            if let Err(e) = self.tick() {
                warn!("Subscription tick skipped: {e}");
            }
            thread::park_timeout(interval);
        }
        debug!("Subscription loop finished");
    }
}

impl fmt::Debug for SubscriptionWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionWorker")
            .field("processing", &self.is_processing())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<PortName> {
        list.iter().map(|s| s.parse().unwrap()).collect()
    }

    fn record(name: &str, value: Variant) -> SubscriptionRecord {
        SubscriptionRecord {
            name: name.to_string(),
            value,
        }
    }

    #[test]
    fn kind_serde_names() {
        #[derive(Deserialize)]
        struct Wrap {
            kind: SubscriptionKind,
        }
        let w: Wrap = toml::from_str("kind = \"direct_read\"").unwrap();
        assert_eq!(w.kind, SubscriptionKind::DirectRead);
        assert_eq!(SubscriptionKind::default(), SubscriptionKind::HighPerformance);
    }

    #[test]
    fn apply_updates_matching_names() {
        let mut tracked = TrackedVariables::new(&names(&["P/I.A", "P/I.B"]));
        let updated = tracked.apply(&[
            record("P/I.B", Variant::I32(2)),
            record("P/I.Z", Variant::I32(9)),
        ]);
        assert_eq!(updated, 1);
        assert_eq!(tracked.get("P/I.B"), Some(&Variant::I32(2)));
        assert_eq!(tracked.get("P/I.A"), Some(&Variant::Void));
        assert_eq!(tracked.get("P/I.Z"), None);
    }

    #[test]
    fn void_keeps_previous_value() {
        let mut tracked = TrackedVariables::new(&names(&["P/I.A"]));
        tracked.apply(&[record("P/I.A", Variant::Bool(true))]);
        assert_eq!(tracked.apply(&[record("P/I.A", Variant::Void)]), 0);
        assert_eq!(tracked.get("P/I.A"), Some(&Variant::Bool(true)));
    }
}
