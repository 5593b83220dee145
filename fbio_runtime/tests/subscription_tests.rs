//! Subscription correlation and teardown against a scripted provider

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use fbio::io::PortName;
use fbio::variant::{ValueKind, Variant};
use fbio_runtime::config::SubscriptionConfig;
use fbio_runtime::subscription::{
    Subscription, SubscriptionError, SubscriptionId, SubscriptionKind, SubscriptionProvider,
    SubscriptionWorker, TrackedVariables, VariableInfo,
};
use parking_lot::Mutex;

// ─── Helpers ────────────────────────────────────────────────────────

const A: &str = "Plc.Eclr/MyProgramInst.VarA";
const B: &str = "Plc.Eclr/MyProgramInst.VarB";
const C: &str = "Plc.Eclr/MyProgramInst.VarC";

type Poll = (Vec<VariableInfo>, Vec<Variant>);

#[derive(Default)]
struct Scripted {
    polls: Mutex<VecDeque<Poll>>,
    calls: Mutex<Vec<String>>,
    fail_subscribe: bool,
}

impl Scripted {
    fn failing_subscribe() -> Self {
        Self {
            fail_subscribe: true,
            ..Self::default()
        }
    }

    fn push(&self, names: &[&str], values: Vec<Variant>) {
        let infos = names
            .iter()
            .zip(values.iter().map(Variant::kind).chain(std::iter::repeat(ValueKind::Void)))
            .map(|(name, kind)| VariableInfo {
                name: name.to_string(),
                kind,
            })
            .collect();
        self.polls.lock().push_back((infos, values));
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn deletes(&self) -> usize {
        self.calls().iter().filter(|c| c.starts_with("delete")).count()
    }
}

impl SubscriptionProvider for Scripted {
    fn create_subscription(&self, kind: SubscriptionKind) -> Result<SubscriptionId, SubscriptionError> {
        self.calls.lock().push(format!("create {kind:?}"));
        Ok(SubscriptionId::new(7))
    }

    fn add_variable(&self, _id: SubscriptionId, name: &str) -> Result<(), SubscriptionError> {
        self.calls.lock().push(format!("add {name}"));
        Ok(())
    }

    fn subscribe(&self, _id: SubscriptionId, sample_interval: Duration) -> Result<(), SubscriptionError> {
        if self.fail_subscribe {
            return Err(SubscriptionError::Provider {
                operation: "subscribe",
                message: "scripted failure".into(),
            });
        }
        self.calls.lock().push(format!("subscribe {sample_interval:?}"));
        Ok(())
    }

    fn poll(&self, _id: SubscriptionId) -> Result<Poll, SubscriptionError> {
        self.polls.lock().pop_front().ok_or(SubscriptionError::Provider {
            operation: "poll",
            message: "script exhausted".into(),
        })
    }

    fn delete_subscription(&self, id: SubscriptionId) -> Result<(), SubscriptionError> {
        self.calls.lock().push(format!("delete {id}"));
        Ok(())
    }
}

fn ports(names: &[&str]) -> Vec<PortName> {
    names.iter().map(|n| n.parse().unwrap()).collect()
}

fn worker(provider: Arc<Scripted>) -> SubscriptionWorker {
    let config = SubscriptionConfig {
        variables: ports(&[A, B, C]),
        ..SubscriptionConfig::default()
    };
    SubscriptionWorker::new(provider, config)
}

fn value_of(worker: &SubscriptionWorker, name: &str) -> Variant {
    worker
        .values()
        .into_iter()
        .find(|(n, _)| n.as_str() == name)
        .map(|(_, v)| v)
        .unwrap()
}

// ─── Setup and correlation ──────────────────────────────────────────

#[test]
fn open_runs_create_add_subscribe_in_order() {
    let provider = Arc::new(Scripted::default());
    let sub = Subscription::open(
        provider.clone(),
        SubscriptionKind::HighPerformance,
        &ports(&[A, B, C]),
        Duration::from_secs(1),
    )
    .unwrap();
    assert_eq!(sub.id(), Some(SubscriptionId::new(7)));
    assert_eq!(
        provider.calls(),
        [
            "create HighPerformance".to_string(),
            format!("add {A}"),
            format!("add {B}"),
            format!("add {C}"),
            "subscribe 1s".to_string(),
        ]
    );
}

#[test]
fn values_are_correlated_by_position() {
    let provider = Arc::new(Scripted::default());
    provider.push(&[A, B, C], vec![Variant::I32(1), Variant::I32(2), Variant::I32(3)]);
    let worker = worker(provider);
    worker.start().unwrap();

    assert_eq!(worker.tick().unwrap(), 3);
    assert_eq!(value_of(&worker, B), Variant::I32(2));
}

#[test]
fn length_mismatch_skips_tick_and_keeps_values() {
    let provider = Arc::new(Scripted::default());
    provider.push(&[A, B, C], vec![Variant::I32(1), Variant::I32(2), Variant::I32(3)]);
    provider.push(&[A, B], vec![Variant::I32(10), Variant::I32(20), Variant::I32(30)]);
    let worker = worker(provider);
    worker.start().unwrap();
    worker.tick().unwrap();

    assert_eq!(
        worker.tick(),
        Err(SubscriptionError::LengthMismatch { infos: 2, values: 3 })
    );
    assert_eq!(value_of(&worker, A), Variant::I32(1));
    assert_eq!(value_of(&worker, B), Variant::I32(2));
}

#[test]
fn void_value_keeps_previous() {
    let provider = Arc::new(Scripted::default());
    provider.push(&[A, B, C], vec![Variant::Void, Variant::Void, Variant::Void]);
    provider.push(&[A, B, C], vec![Variant::Bool(true), Variant::Void, Variant::Void]);
    provider.push(&[A, B, C], vec![Variant::Void, Variant::Void, Variant::Void]);
    let worker = worker(provider);
    worker.start().unwrap();

    assert_eq!(worker.tick().unwrap(), 0);
    assert_eq!(value_of(&worker, A), Variant::Void);
    assert_eq!(worker.tick().unwrap(), 1);
    assert_eq!(worker.tick().unwrap(), 0);
    assert_eq!(value_of(&worker, A), Variant::Bool(true));
}

#[test]
fn unmatched_names_are_ignored() {
    let mut tracked = TrackedVariables::new(&ports(&[A]));
    let provider = Arc::new(Scripted::default());
    provider.push(&["Other/Inst.X", A], vec![Variant::U8(9), Variant::U8(4)]);
    let sub = Subscription::open(provider, SubscriptionKind::RealTime, &ports(&[A]), Duration::from_secs(1)).unwrap();

    assert_eq!(tracked.apply(&sub.poll().unwrap()), 1);
    assert_eq!(tracked.get(A), Some(&Variant::U8(4)));
}

// ─── Teardown ───────────────────────────────────────────────────────

#[test]
fn close_is_idempotent() {
    let provider = Arc::new(Scripted::default());
    let mut sub =
        Subscription::open(provider.clone(), SubscriptionKind::DirectRead, &ports(&[A]), Duration::from_secs(1)).unwrap();

    assert!(sub.close());
    assert!(!sub.close());
    assert_eq!(sub.id(), None);
    assert_eq!(sub.poll(), Err(SubscriptionError::NotOpen));
    drop(sub);
    assert_eq!(provider.deletes(), 1);
}

#[test]
fn drop_deletes_open_subscription() {
    let provider = Arc::new(Scripted::default());
    {
        let _sub =
            Subscription::open(provider.clone(), SubscriptionKind::Recording, &ports(&[A]), Duration::from_secs(1))
                .unwrap();
    }
    assert_eq!(provider.deletes(), 1);
}

#[test]
fn failed_open_deletes_what_it_created() {
    let provider = Arc::new(Scripted::failing_subscribe());
    let result = Subscription::open(provider.clone(), SubscriptionKind::HighPerformance, &ports(&[A]), Duration::from_secs(1));
    assert!(matches!(result, Err(SubscriptionError::Provider { operation: "subscribe", .. })));
    assert_eq!(provider.deletes(), 1);
}

#[test]
fn worker_stop_is_idempotent_and_restartable() {
    let provider = Arc::new(Scripted::default());
    let worker = worker(provider.clone());

    worker.stop();
    assert_eq!(provider.deletes(), 0);

    worker.start().unwrap();
    worker.start().unwrap();
    assert!(worker.is_processing());
    worker.stop();
    worker.stop();
    assert!(!worker.is_processing());
    assert_eq!(provider.deletes(), 1);
    assert_eq!(worker.tick(), Ok(0));

    worker.start().unwrap();
    assert_eq!(provider.calls().iter().filter(|c| c.starts_with("create")).count(), 2);
}
