//! Monitor Loop.
//!
//! A tokio task that re-evaluates the system every interval and publishes
//! each [`SystemStatus`] to subscribers. Evaluation itself is synchronous
//! and runs on the blocking pool. [`Monitor::check_now`] shares the same
//! evaluation path as the timer.

pub mod errors;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::health::SystemStatus;

pub use errors::MonitorError;

/// Produces a fresh system status; called once per cycle.
pub trait StatusSource: Send + Sync + 'static {
    fn check(&self) -> SystemStatus;
}

/// Receiving end of one subscription.
pub struct Subscription {
    pub id: u64,
    pub receiver: mpsc::UnboundedReceiver<Arc<SystemStatus>>,
}

struct Subscriber {
    id: u64,
    sender: mpsc::UnboundedSender<Arc<SystemStatus>>,
}

struct Shared {
    source: Arc<dyn StatusSource>,
    subscribers: Mutex<Vec<Subscriber>>,
    last: Mutex<Option<Arc<SystemStatus>>>,
    next_id: AtomicU64,
}

impl Shared {
    async fn run_check(self: &Arc<Self>) -> Result<Arc<SystemStatus>, MonitorError> {
        let source = Arc::clone(&self.source);
        let status = tokio::task::spawn_blocking(move || source.check())
            .await
            .map_err(|e| MonitorError::CheckFailed {
                message: e.to_string(),
            })?;
        let status = Arc::new(status);
        self.publish(Arc::clone(&status));
        Ok(status)
    }

    fn publish(&self, status: Arc<SystemStatus>) {
        let previous = self
            .last
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .replace(Arc::clone(&status));

        match previous {
            Some(previous) if previous.overall != status.overall => info!(
                event = "core.monitor.status_changed",
                from = %previous.overall,
                to = %status.overall
            ),
            None => info!(event = "core.monitor.status_changed", to = %status.overall),
            _ => {}
        }

        let mut subscribers = self.subscribers.lock().unwrap_or_else(|e| e.into_inner());
        subscribers.retain(|s| {
            let delivered = s.sender.send(Arc::clone(&status)).is_ok();
            if !delivered {
                debug!(event = "core.monitor.subscriber_pruned", subscriber_id = s.id);
            }
            delivered
        });
    }
}

pub struct Monitor {
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Monitor {
    pub fn new(source: Arc<dyn StatusSource>) -> Self {
        Self {
            shared: Arc::new(Shared {
                source,
                subscribers: Mutex::new(Vec::new()),
                last: Mutex::new(None),
                next_id: AtomicU64::new(1),
            }),
            task: Mutex::new(None),
        }
    }

    /// Start the periodic task. Must be called from within a tokio runtime.
    ///
    /// The first check runs immediately.
    pub fn start(&self, period: Duration) -> Result<(), MonitorError> {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Err(MonitorError::AlreadyRunning);
        }

        info!(
            event = "core.monitor.start_completed",
            interval_secs = period.as_secs()
        );
        let shared = Arc::clone(&self.shared);
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = shared.run_check().await {
                    warn!(event = "core.monitor.check_failed", error = %e);
                }
            }
        }));
        Ok(())
    }

    /// Abort the periodic task. Subscriptions stay open.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().unwrap_or_else(|e| e.into_inner()).take() {
            task.abort();
            info!(event = "core.monitor.stop_completed");
        }
    }

    pub fn is_running(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|t| !t.is_finished())
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Subscriber { id, sender });
        debug!(event = "core.monitor.subscribe_completed", subscriber_id = id);
        Subscription { id, receiver }
    }

    /// Returns false for unknown ids.
    pub fn unsubscribe(&self, id: u64) -> bool {
        let mut subscribers = self
            .shared
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        let before = subscribers.len();
        subscribers.retain(|s| s.id != id);
        before != subscribers.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Status of the most recent cycle, if any ran yet.
    pub fn last_status(&self) -> Option<Arc<SystemStatus>> {
        self.shared
            .last
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Run one check outside the timer and publish it like a timed one.
    pub async fn check_now(&self) -> Result<Arc<SystemStatus>, MonitorError> {
        self.shared.run_check().await
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().ok().and_then(Option::take) {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthLevel;
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;

    /// Reports the scripted levels in order, then repeats the last one.
    struct ScriptedSource {
        levels: Vec<HealthLevel>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(levels: Vec<HealthLevel>) -> Arc<Self> {
            Arc::new(Self {
                levels,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl StatusSource for ScriptedSource {
        fn check(&self) -> SystemStatus {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let level = self.levels[call.min(self.levels.len() - 1)];
            SystemStatus {
                overall: level,
                clients: vec![],
                checked_at: Utc::now(),
            }
        }
    }

    #[tokio::test]
    async fn test_check_now_publishes_to_subscribers() {
        let monitor = Monitor::new(ScriptedSource::new(vec![HealthLevel::Minor]));
        let mut first = monitor.subscribe();
        let mut second = monitor.subscribe();
        assert_ne!(first.id, second.id);

        let status = monitor.check_now().await.unwrap();
        assert_eq!(status.overall, HealthLevel::Minor);
        assert_eq!(first.receiver.recv().await.unwrap().overall, HealthLevel::Minor);
        assert_eq!(second.receiver.recv().await.unwrap().overall, HealthLevel::Minor);
        assert_eq!(monitor.last_status().unwrap().overall, HealthLevel::Minor);
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery() {
        let monitor = Monitor::new(ScriptedSource::new(vec![HealthLevel::Healthy]));
        let mut sub = monitor.subscribe();
        assert!(monitor.unsubscribe(sub.id));
        assert!(!monitor.unsubscribe(sub.id));

        monitor.check_now().await.unwrap();
        assert!(sub.receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropped_receivers_are_pruned() {
        let monitor = Monitor::new(ScriptedSource::new(vec![HealthLevel::Healthy]));
        let sub = monitor.subscribe();
        let _kept = monitor.subscribe();
        drop(sub.receiver);

        monitor.check_now().await.unwrap();
        assert_eq!(monitor.subscriber_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_checks_publish_each_cycle() {
        let source = ScriptedSource::new(vec![
            HealthLevel::Healthy,
            HealthLevel::Major,
            HealthLevel::Healthy,
        ]);
        let monitor = Monitor::new(source.clone());
        let mut sub = monitor.subscribe();
        monitor.start(Duration::from_secs(60)).unwrap();
        assert!(matches!(
            monitor.start(Duration::from_secs(60)),
            Err(MonitorError::AlreadyRunning)
        ));

        let levels = [
            sub.receiver.recv().await.unwrap().overall,
            sub.receiver.recv().await.unwrap().overall,
            sub.receiver.recv().await.unwrap().overall,
        ];
        assert_eq!(
            levels,
            [HealthLevel::Healthy, HealthLevel::Major, HealthLevel::Healthy]
        );

        monitor.stop();
        assert!(!monitor.is_running());
    }

    #[tokio::test]
    async fn test_last_status_empty_before_first_cycle() {
        let monitor = Monitor::new(ScriptedSource::new(vec![HealthLevel::Healthy]));
        assert!(monitor.last_status().is_none());
    }
}
