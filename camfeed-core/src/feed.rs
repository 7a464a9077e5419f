//! Timer-driven multicast feeds.
//!
//! A [`FeedHub`] owns two independent feeds over the camera API: the latest
//! snapshot image and the motion/sound event stream. Each feed is an
//! idle/active state machine: the first subscriber starts a poll task, every
//! tick issues exactly one upstream fetch whose outcome is broadcast to all
//! subscribers, and the task is torn down when the last subscriber detaches.
//!
//! The event feed additionally deduplicates ticks: two consecutive ticks
//! whose event lists have the same length are treated as unchanged and the
//! second produces no emission. When a tick is distinct, only the newest
//! (last) event is emitted. The comparison is by length alone; ticks that
//! return the same number of events with different content are not detected
//! as changed.

use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};

use crate::model::CameraEvent;
use crate::resource::{FetchError, ResourceClient};

/// Default poll interval for the snapshot feed.
pub const DEFAULT_SNAPSHOT_INTERVAL: Duration = Duration::from_millis(5000);

/// Default poll interval for the event feed.
pub const DEFAULT_EVENT_INTERVAL: Duration = Duration::from_millis(3000);

/// Default broadcast buffer per feed.
const DEFAULT_CAPACITY: usize = 16;

/// Error delivered to feed subscribers.
#[derive(Debug, Clone, Error)]
pub enum FeedError {
    /// The tick's upstream fetch failed. The feed keeps polling; the next
    /// tick retries with freshly acquired credentials.
    #[error("feed fetch failed: {0}")]
    Fetch(Arc<FetchError>),

    /// This subscriber fell behind and missed the given number of messages.
    /// Only the lagging subscriber observes this; others are unaffected.
    #[error("subscriber lagged behind by {0} messages")]
    Lagged(u64),

    /// The feed stopped after the configured number of consecutive failed
    /// ticks. The subscription completes after this message.
    #[error("feed stopped after {0} consecutive failures")]
    FailureThreshold(u32),
}

/// Tuning knobs for a [`FeedHub`].
#[derive(Debug, Clone)]
pub struct FeedOptions {
    /// Poll interval for the snapshot feed.
    pub snapshot_interval: Duration,

    /// Poll interval for the event feed.
    pub event_interval: Duration,

    /// Stop a feed after this many consecutive failed ticks. `None` keeps
    /// the best-effort posture: every failure is reported and the feed polls
    /// forever.
    pub failure_threshold: Option<u32>,

    /// Broadcast buffer per feed; slow subscribers past this lag receive
    /// [`FeedError::Lagged`].
    pub capacity: usize,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            snapshot_interval: DEFAULT_SNAPSHOT_INTERVAL,
            event_interval: DEFAULT_EVENT_INTERVAL,
            failure_threshold: None,
            capacity: DEFAULT_CAPACITY,
        }
    }
}

type FeedItem<T> = Result<T, FeedError>;

struct ActiveFeed<T> {
    tx: broadcast::Sender<FeedItem<T>>,
    subscribers: usize,
    task: JoinHandle<()>,
    /// Distinguishes this activation from earlier ones, so a guard from a
    /// torn-down generation cannot decrement a successor's count.
    generation: u64,
}

struct SlotInner<T> {
    active: Option<ActiveFeed<T>>,
    next_generation: u64,
}

/// One feed's idle/active slot. Idle is `None`; active tracks the broadcast
/// sender, the live subscriber count, and the poll task.
struct FeedSlot<T> {
    inner: Mutex<SlotInner<T>>,
}

impl<T> FeedSlot<T> {
    fn new() -> Self {
        Self {
            inner: Mutex::new(SlotInner {
                active: None,
                next_generation: 0,
            }),
        }
    }

    /// Torn down by the poll task itself when it stops on its own.
    ///
    /// Generation-checked like [`detach`](Self::detach): a task that was
    /// already replaced by a newer activation must leave the successor
    /// untouched.
    fn clear(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if let Some(active) = inner.active.as_ref() {
            if active.generation == generation {
                inner.active.take();
            }
        }
    }

    fn detach(&self, generation: u64) {
        let mut inner = self.inner.lock();
        if let Some(active) = inner.active.as_mut() {
            if active.generation != generation {
                return;
            }
            active.subscribers = active.subscribers.saturating_sub(1);
            if active.subscribers == 0 {
                if let Some(active) = inner.active.take() {
                    active.task.abort();
                    debug!("last subscriber detached; feed torn down");
                }
            }
        }
    }
}

impl<T: Clone + Send + 'static> FeedSlot<T> {
    fn attach(
        slot: &Arc<Self>,
        capacity: usize,
        spawn: impl FnOnce(broadcast::Sender<FeedItem<T>>, Weak<FeedSlot<T>>, u64) -> JoinHandle<()>,
    ) -> FeedSubscription<T> {
        let mut inner = slot.inner.lock();
        let (rx, generation) = match inner.active.as_mut() {
            Some(active) => {
                active.subscribers += 1;
                (active.tx.subscribe(), active.generation)
            }
            None => {
                let generation = inner.next_generation;
                inner.next_generation += 1;

                let (tx, rx) = broadcast::channel(capacity);
                let task = spawn(tx.clone(), Arc::downgrade(slot), generation);
                debug!("first subscriber attached; feed started");
                inner.active = Some(ActiveFeed {
                    tx,
                    subscribers: 1,
                    task,
                    generation,
                });
                (rx, generation)
            }
        };
        drop(inner);

        FeedSubscription {
            rx,
            _guard: SlotGuard {
                slot: Arc::clone(slot),
                generation,
            },
        }
    }
}

/// Decrements the subscriber count on drop.
struct SlotGuard<T> {
    slot: Arc<FeedSlot<T>>,
    generation: u64,
}

impl<T> Drop for SlotGuard<T> {
    fn drop(&mut self) {
        self.slot.detach(self.generation);
    }
}

/// A live subscription to one feed.
///
/// Dropping the subscription detaches it; when the last subscription for a
/// feed is dropped, the poll timer stops and any retained dedup state is
/// discarded.
pub struct FeedSubscription<T> {
    rx: broadcast::Receiver<FeedItem<T>>,
    _guard: SlotGuard<T>,
}

impl<T: Clone + Send + 'static> FeedSubscription<T> {
    /// Receive the next tick outcome.
    ///
    /// Returns `None` once the feed has stopped and no buffered messages
    /// remain.
    pub async fn recv(&mut self) -> Option<FeedItem<T>> {
        match self.rx.recv().await {
            Ok(item) => Some(item),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                Some(Err(FeedError::Lagged(skipped)))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }

    /// Convert the subscription into a [`Stream`] of tick outcomes.
    pub fn into_stream(self) -> impl Stream<Item = FeedItem<T>> {
        let Self { rx, _guard } = self;
        BroadcastStream::new(rx).map(move |item| {
            // the guard's lifetime is tied to the stream's
            let _ = &_guard;
            match item {
                Ok(value) => value,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => Err(FeedError::Lagged(skipped)),
            }
        })
    }
}

/// Owns the snapshot and event feeds over one camera.
///
/// Any number of independent subscriptions may be taken per feed; each
/// tick's upstream fetch is shared among them, never repeated per
/// subscriber.
pub struct FeedHub {
    resource: Arc<ResourceClient>,
    options: FeedOptions,
    snapshots: Arc<FeedSlot<Bytes>>,
    events: Arc<FeedSlot<CameraEvent>>,
}

impl FeedHub {
    /// Create a hub with default options.
    pub fn new(resource: Arc<ResourceClient>) -> Self {
        Self::with_options(resource, FeedOptions::default())
    }

    /// Create a hub with explicit options.
    pub fn with_options(resource: Arc<ResourceClient>, options: FeedOptions) -> Self {
        Self {
            resource,
            options,
            snapshots: Arc::new(FeedSlot::new()),
            events: Arc::new(FeedSlot::new()),
        }
    }

    /// Subscribe to the latest-snapshot feed.
    ///
    /// Each tick delivers the current snapshot image to every subscriber.
    pub fn subscribe_snapshots(&self) -> FeedSubscription<Bytes> {
        let resource = Arc::clone(&self.resource);
        let period = self.options.snapshot_interval;
        let threshold = self.options.failure_threshold;

        FeedSlot::attach(
            &self.snapshots,
            self.options.capacity,
            move |tx, slot, generation| {
                tokio::spawn(run_snapshot_feed(
                    resource, tx, slot, generation, period, threshold,
                ))
            },
        )
    }

    /// Subscribe to the motion/sound event feed.
    ///
    /// Deduplicated: a tick whose event list length matches the previous
    /// tick's produces no emission; a distinct tick emits only the newest
    /// event.
    pub fn subscribe_events(&self) -> FeedSubscription<CameraEvent> {
        let resource = Arc::clone(&self.resource);
        let period = self.options.event_interval;
        let threshold = self.options.failure_threshold;

        FeedSlot::attach(
            &self.events,
            self.options.capacity,
            move |tx, slot, generation| {
                tokio::spawn(run_event_feed(
                    resource, tx, slot, generation, period, threshold,
                ))
            },
        )
    }
}

/// Track consecutive failures against the optional threshold.
///
/// Returns `true` when the feed should stop.
fn register_failure(failures: &mut u32, threshold: Option<u32>) -> bool {
    *failures += 1;
    matches!(threshold, Some(limit) if *failures >= limit)
}

async fn run_snapshot_feed(
    resource: Arc<ResourceClient>,
    tx: broadcast::Sender<FeedItem<Bytes>>,
    slot: Weak<FeedSlot<Bytes>>,
    generation: u64,
    period: Duration,
    threshold: Option<u32>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures = 0u32;

    loop {
        ticker.tick().await;
        match resource.fetch_latest_snapshot().await {
            Ok(image) => {
                failures = 0;
                let _ = tx.send(Ok(image));
            }
            Err(err) => {
                let _ = tx.send(Err(FeedError::Fetch(Arc::new(err))));
                if register_failure(&mut failures, threshold) {
                    warn!(failures, "snapshot feed exceeded failure threshold; stopping");
                    let _ = tx.send(Err(FeedError::FailureThreshold(failures)));
                    break;
                }
            }
        }
    }

    if let Some(slot) = slot.upgrade() {
        slot.clear(generation);
    }
}

async fn run_event_feed(
    resource: Arc<ResourceClient>,
    tx: broadcast::Sender<FeedItem<CameraEvent>>,
    slot: Weak<FeedSlot<CameraEvent>>,
    generation: u64,
    period: Duration,
    threshold: Option<u32>,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures = 0u32;

    // Length of the previous tick's event list. Lives here so teardown
    // resets it along with the task.
    let mut last_len: Option<usize> = None;

    loop {
        ticker.tick().await;
        match resource.fetch_events(None, None).await {
            Ok(events) => {
                failures = 0;
                let distinct = last_len != Some(events.len());
                last_len = Some(events.len());

                if distinct {
                    if let Some(newest) = events.last() {
                        let _ = tx.send(Ok(newest.clone()));
                    }
                }
            }
            Err(err) => {
                let _ = tx.send(Err(FeedError::Fetch(Arc::new(err))));
                if register_failure(&mut failures, threshold) {
                    warn!(failures, "event feed exceeded failure threshold; stopping");
                    let _ = tx.send(Err(FeedError::FailureThreshold(failures)));
                    break;
                }
            }
        }
    }

    if let Some(slot) = slot.upgrade() {
        slot.clear(generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_failure_unlimited() {
        let mut failures = 0;
        for _ in 0..100 {
            assert!(!register_failure(&mut failures, None));
        }
        assert_eq!(failures, 100);
    }

    #[test]
    fn test_register_failure_threshold() {
        let mut failures = 0;
        assert!(!register_failure(&mut failures, Some(3)));
        assert!(!register_failure(&mut failures, Some(3)));
        assert!(register_failure(&mut failures, Some(3)));
    }

    #[tokio::test]
    async fn test_stale_clear_leaves_successor_feed_active() {
        let slot: Arc<FeedSlot<u32>> = Arc::new(FeedSlot::new());

        // First activation stops on its own (as a threshold-stopped task
        // does), then a new subscriber starts a second activation.
        let first = FeedSlot::attach(&slot, 4, |_tx, _slot, _generation| tokio::spawn(async {}));
        slot.clear(0);
        let second = FeedSlot::attach(&slot, 4, |_tx, _slot, _generation| tokio::spawn(async {}));

        // A clear arriving late from the stopped activation must not
        // discard the successor.
        slot.clear(0);
        assert!(slot.inner.lock().active.is_some());

        // Likewise the stale subscriber's drop must not decrement the
        // successor's count.
        drop(first);
        assert!(slot.inner.lock().active.is_some());

        drop(second);
        assert!(slot.inner.lock().active.is_none());
    }

    #[test]
    fn test_default_options() {
        let options = FeedOptions::default();
        assert_eq!(options.snapshot_interval, Duration::from_millis(5000));
        assert_eq!(options.event_interval, Duration::from_millis(3000));
        assert!(options.failure_threshold.is_none());
    }
}
