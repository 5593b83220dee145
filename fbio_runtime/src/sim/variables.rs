//! In-process subscription provider.

use std::collections::HashMap;
use std::time::Duration;

use fbio::variant::Variant;
use parking_lot::Mutex;
use tracing::debug;

use crate::subscription::{
    SubscriptionError, SubscriptionId, SubscriptionKind, SubscriptionProvider, VariableInfo,
};

#[derive(Debug)]
struct SubscriptionEntry {
    kind: SubscriptionKind,
    variables: Vec<String>,
    sample_interval: Option<Duration>,
}

#[derive(Debug, Default)]
struct State {
    next_id: u64,
    values: HashMap<String, Variant>,
    subscriptions: HashMap<u64, SubscriptionEntry>,
}

/// Process-variable store serving subscriptions.
///
/// A variable reads as [`Variant::Void`] until it is first published.
#[derive(Debug, Default)]
pub struct SimulatedVariables {
    state: Mutex<State>,
}

impl SimulatedVariables {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the current value of `name`.
    pub fn publish(&self, name: &str, value: Variant) {
        self.state.lock().values.insert(name.to_string(), value);
    }

    /// Current value of `name`.
    pub fn value(&self, name: &str) -> Variant {
        self.state.lock().values.get(name).cloned().unwrap_or_default()
    }

    /// Open subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.state.lock().subscriptions.len()
    }
}

fn unknown(operation: &'static str, id: SubscriptionId) -> SubscriptionError {
    SubscriptionError::Provider {
        operation,
        message: format!("unknown subscription {id}"),
    }
}

impl SubscriptionProvider for SimulatedVariables {
    fn create_subscription(&self, kind: SubscriptionKind) -> Result<SubscriptionId, SubscriptionError> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.subscriptions.insert(
            id,
            SubscriptionEntry {
                kind,
                variables: Vec::new(),
                sample_interval: None,
            },
        );
        debug!("Created subscription #{id} ({kind:?})");
        Ok(SubscriptionId::new(id))
    }

    fn add_variable(&self, id: SubscriptionId, name: &str) -> Result<(), SubscriptionError> {
        let mut state = self.state.lock();
        let entry = state
            .subscriptions
            .get_mut(&id.get())
            .ok_or_else(|| unknown("add_variable", id))?;
        if entry.sample_interval.is_some() {
            return Err(SubscriptionError::AddVariable {
                name: name.to_string(),
                message: "subscription already active".into(),
            });
        }
        entry.variables.push(name.to_string());
        Ok(())
    }

    fn subscribe(&self, id: SubscriptionId, sample_interval: Duration) -> Result<(), SubscriptionError> {
        let mut state = self.state.lock();
        let entry = state
            .subscriptions
            .get_mut(&id.get())
            .ok_or_else(|| unknown("subscribe", id))?;
        if sample_interval.is_zero() {
            return Err(SubscriptionError::Provider {
                operation: "subscribe",
                message: "zero sample interval".into(),
            });
        }
        entry.sample_interval = Some(sample_interval);
        debug!(
            "Subscription {id} ({:?}) active every {sample_interval:?}",
            entry.kind
        );
        Ok(())
    }

    fn poll(&self, id: SubscriptionId) -> Result<(Vec<VariableInfo>, Vec<Variant>), SubscriptionError> {
        let state = self.state.lock();
        let entry = state
            .subscriptions
            .get(&id.get())
            .ok_or_else(|| unknown("poll", id))?;
        if entry.sample_interval.is_none() {
            return Err(SubscriptionError::Provider {
                operation: "poll",
                message: format!("subscription {id} not subscribed"),
            });
        }
        let values: Vec<Variant> = entry
            .variables
            .iter()
            .map(|name| state.values.get(name).cloned().unwrap_or_default())
            .collect();
        let infos = entry
            .variables
            .iter()
            .zip(&values)
            .map(|(name, value)| VariableInfo {
                name: name.clone(),
                kind: value.kind(),
            })
            .collect();
        Ok((infos, values))
    }

    fn delete_subscription(&self, id: SubscriptionId) -> Result<(), SubscriptionError> {
        self.state
            .lock()
            .subscriptions
            .remove(&id.get())
            .map(|_| ())
            .ok_or_else(|| unknown("delete_subscription", id))
    }
}
