//! In-memory priority queue with a retry scheduler.
//!
//! Jobs are ordered by `(priority desc, scheduled_for asc)` in a
//! `Mutex`-guarded binary heap; a periodic tick drains due jobs subject to a
//! `Semaphore`-enforced concurrency cap, mirroring the teacher's
//! `JobScheduler` tick-and-shutdown shape.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{watch, Mutex, Notify, RwLock, Semaphore};
use tokio::task::JoinHandle;

use domain::models::DeliveryJob;

use crate::error::QueueError;

/// Default interval between queue ticks.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Callback bound to the queue to process due jobs.
#[async_trait]
pub trait JobProcessor: Send + Sync {
    async fn process(&self, job: DeliveryJob);

    /// Called when `process` panics instead of returning normally — the
    /// `InternalProcessorBug` case. `message` is the captured panic payload.
    /// The default implementation only logs; a real processor should log a
    /// failed delivery record and reschedule the job.
    async fn handle_panic(&self, job: DeliveryJob, message: String) {
        tracing::error!(delivery_id = %job.delivery_id, %message, "job processor panicked; no recovery handler installed");
    }
}

/// Point-in-time queue occupancy.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
}

struct QueueEntry(DeliveryJob);

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.0.priority == other.0.priority && self.0.scheduled_for == other.0.scheduled_for
    }
}
impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    /// Higher priority first; for equal priority, earlier `scheduled_for`
    /// first. `BinaryHeap` is a max-heap, so the "earlier wins" tie-break is
    /// expressed by reversing the `scheduled_for` comparison.
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .priority
            .cmp(&other.0.priority)
            .then_with(|| other.0.scheduled_for.cmp(&self.0.scheduled_for))
    }
}

/// The priority queue and its retry scheduler.
pub struct PriorityQueue {
    heap: Arc<Mutex<BinaryHeap<QueueEntry>>>,
    processing: Arc<AtomicUsize>,
    semaphore: Arc<Semaphore>,
    processor: Arc<RwLock<Option<Arc<dyn JobProcessor>>>>,
    notify: Arc<Notify>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tick_interval: Duration,
    handle: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl PriorityQueue {
    pub fn new(max_concurrent: usize, tick_interval: Duration) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            heap: Arc::new(Mutex::new(BinaryHeap::new())),
            processing: Arc::new(AtomicUsize::new(0)),
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            processor: Arc::new(RwLock::new(None)),
            notify: Arc::new(Notify::new()),
            shutdown_tx,
            shutdown_rx,
            tick_interval,
            handle: std::sync::Mutex::new(None),
        }
    }

    /// Binds the worker callback invoked for each due job.
    pub async fn set_processor(&self, processor: Arc<dyn JobProcessor>) {
        *self.processor.write().await = Some(processor);
    }

    /// Inserts `job` and wakes the tick loop immediately for low-latency
    /// first delivery.
    pub async fn enqueue(&self, job: DeliveryJob) {
        self.heap.lock().await.push(QueueEntry(job));
        self.notify.notify_one();
    }

    /// Inserts a retry job cloned from `job`: incremented attempt, reset
    /// priority, a fresh `deliveryId`, scheduled `delay` in the future.
    pub async fn schedule_retry(&self, job: &DeliveryJob, delay: Duration) -> Result<(), QueueError> {
        if job.attempt >= job.max_attempts {
            return Err(QueueError::ExhaustedRetries(job.delivery_id));
        }
        let chrono_delay = chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        let retry = job.retry(chrono_delay, Utc::now());
        self.enqueue(retry).await;
        Ok(())
    }

    /// Current queue occupancy.
    pub async fn stats(&self) -> QueueStats {
        QueueStats {
            pending: self.heap.lock().await.len(),
            processing: self.processing.load(AtomicOrdering::SeqCst),
        }
    }

    /// Starts the periodic tick loop. `stop` leaves the in-memory queue
    /// intact but prevents further ticks.
    pub fn start(&self) {
        let heap = Arc::clone(&self.heap);
        let processing = Arc::clone(&self.processing);
        let semaphore = Arc::clone(&self.semaphore);
        let processor = Arc::clone(&self.processor);
        let notify = Arc::clone(&self.notify);
        let mut shutdown_rx = self.shutdown_rx.clone();
        let tick_interval = self.tick_interval;

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick_interval);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = notify.notified() => {}
                    _ = shutdown_rx.changed() => {
                        if *shutdown_rx.borrow() {
                            tracing::info!("priority queue shutting down");
                            break;
                        }
                    }
                }

                drain_due(&heap, &processing, &semaphore, &processor).await;

                metrics::gauge!("webhook_queue_pending").set(heap.lock().await.len() as f64);
                metrics::gauge!("webhook_queue_processing").set(processing.load(AtomicOrdering::SeqCst) as f64);
            }
        });

        *self.handle.lock().expect("queue handle mutex is never poisoned") = Some(task);
    }

    /// Signals shutdown. Does not wait for in-flight jobs to finish; callers
    /// that need draining should join the handle separately.
    pub fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

async fn drain_due(
    heap: &Arc<Mutex<BinaryHeap<QueueEntry>>>,
    processing: &Arc<AtomicUsize>,
    semaphore: &Arc<Semaphore>,
    processor: &Arc<RwLock<Option<Arc<dyn JobProcessor>>>>,
) {
    let Some(proc) = processor.read().await.clone() else {
        return;
    };

    loop {
        let due_job = {
            let mut guard = heap.lock().await;
            match guard.peek() {
                Some(entry) if entry.0.scheduled_for <= Utc::now() => guard.pop().map(|e| e.0),
                _ => None,
            }
        };
        let Some(job) = due_job else {
            break;
        };

        let permit = match Arc::clone(semaphore).try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                // At capacity: put the job back and wait for the next tick.
                heap.lock().await.push(QueueEntry(job));
                break;
            }
        };

        processing.fetch_add(1, AtomicOrdering::SeqCst);
        let proc = Arc::clone(&proc);
        let processing = Arc::clone(processing);
        tokio::spawn(async move {
            let _permit = permit;
            let job_for_panic = job.clone();
            let proc_for_run = Arc::clone(&proc);

            // A nested spawn isolates a panicking processor: tokio converts
            // the panic into a `JoinError` instead of unwinding this task,
            // so one misbehaving processor can't take down the tick loop.
            let outcome = tokio::spawn(async move { proc_for_run.process(job).await }).await;
            processing.fetch_sub(1, AtomicOrdering::SeqCst);

            if let Err(join_error) = outcome {
                tracing::error!(error = %join_error, delivery_id = %job_for_panic.delivery_id, "job processor panicked");
                proc.handle_panic(job_for_panic, join_error.to_string()).await;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::models::DispatchOptions;
    use std::sync::atomic::AtomicUsize as StdAtomicUsize;

    struct CountingProcessor {
        count: Arc<StdAtomicUsize>,
    }

    #[async_trait]
    impl JobProcessor for CountingProcessor {
        async fn process(&self, _job: DeliveryJob) {
            self.count.fetch_add(1, AtomicOrdering::SeqCst);
        }
    }

    fn job(priority: i32) -> DeliveryJob {
        let mut j = DeliveryJob::first_attempt(1, "content.created", serde_json::json!({}), DispatchOptions::default(), Utc::now());
        j.priority = priority;
        j
    }

    #[test]
    fn test_ordering_prefers_higher_priority() {
        let mut heap = BinaryHeap::new();
        heap.push(QueueEntry(job(0)));
        heap.push(QueueEntry(job(5)));
        heap.push(QueueEntry(job(1)));
        let popped: Vec<i32> = std::iter::from_fn(|| heap.pop().map(|e| e.0.priority)).collect();
        assert_eq!(popped, vec![5, 1, 0]);
    }

    #[test]
    fn test_ordering_prefers_earlier_scheduled_for_at_equal_priority() {
        let now = Utc::now();
        let mut earlier = job(0);
        earlier.scheduled_for = now;
        let mut later = job(0);
        later.scheduled_for = now + chrono::Duration::seconds(10);

        let mut heap = BinaryHeap::new();
        heap.push(QueueEntry(later));
        heap.push(QueueEntry(earlier));

        let first = heap.pop().unwrap();
        assert_eq!(first.0.scheduled_for, now);
    }

    #[tokio::test]
    async fn test_enqueue_increments_pending() {
        let queue = PriorityQueue::new(4, Duration::from_millis(50));
        queue.enqueue(job(1)).await;
        let stats = queue.stats().await;
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.processing, 0);
    }

    #[tokio::test]
    async fn test_schedule_retry_rejects_exhausted_job() {
        let queue = PriorityQueue::new(4, Duration::from_millis(50));
        let mut exhausted = job(0);
        exhausted.attempt = exhausted.max_attempts;
        let result = queue.schedule_retry(&exhausted, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(QueueError::ExhaustedRetries(_))));
    }

    #[tokio::test]
    async fn test_schedule_retry_enqueues_incremented_job() {
        let queue = PriorityQueue::new(4, Duration::from_millis(50));
        let first = job(1);
        queue.schedule_retry(&first, Duration::from_millis(10)).await.unwrap();
        assert_eq!(queue.stats().await.pending, 1);
    }

    #[tokio::test]
    async fn test_queue_processes_due_job() {
        let count = Arc::new(StdAtomicUsize::new(0));
        let queue = Arc::new(PriorityQueue::new(4, Duration::from_millis(20)));
        queue
            .set_processor(Arc::new(CountingProcessor { count: Arc::clone(&count) }))
            .await;
        queue.start();
        queue.enqueue(job(1)).await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        queue.stop();

        assert_eq!(count.load(AtomicOrdering::SeqCst), 1);
    }

    struct PanickingProcessor {
        panic_count: Arc<StdAtomicUsize>,
    }

    #[async_trait]
    impl JobProcessor for PanickingProcessor {
        async fn process(&self, _job: DeliveryJob) {
            panic!("processor bug");
        }

        async fn handle_panic(&self, _job: DeliveryJob, _message: String) {
            self.panic_count.fetch_add(1, AtomicOrdering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_panicking_processor_invokes_handle_panic() {
        let panic_count = Arc::new(StdAtomicUsize::new(0));
        let queue = Arc::new(PriorityQueue::new(4, Duration::from_millis(20)));
        queue
            .set_processor(Arc::new(PanickingProcessor { panic_count: Arc::clone(&panic_count) }))
            .await;
        queue.start();
        queue.enqueue(job(1)).await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        queue.stop();

        assert_eq!(panic_count.load(AtomicOrdering::SeqCst), 1);
    }

    #[allow(dead_code)]
    fn assert_send_sync<T: Send + Sync>() {}
    #[test]
    fn test_priority_queue_is_send_sync() {
        assert_send_sync::<PriorityQueue>();
    }
}
