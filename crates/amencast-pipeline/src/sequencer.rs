//! Per-stream ordered work queues.
//!
//! Every stream gets one task draining one FIFO, so items of a stream are
//! processed strictly one after another while streams run in parallel. A
//! graceful finish is queued behind pending items; a forced stop cancels
//! the task and drops whatever is queued or in flight.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use amencast_core::{SessionRegistry, StreamId};

use crate::errors::PipelineError;

/// How a stream worker ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// Everything queued before the finish was processed.
    Drained {
        /// Upstream failure forwarded with the finish signal.
        error: Option<String>,
    },
    /// Forced stop; pending work was discarded.
    Stopped,
    /// An item failed in a way the stream cannot survive.
    Failed(String),
}

/// Notification that a worker task has ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerExit {
    /// Owning stream.
    pub stream_id: StreamId,
    /// Worker generation, for releasing the right registry entry.
    pub generation: u64,
    /// How it ended.
    pub outcome: WorkerOutcome,
}

/// The per-item step of a stage.
#[async_trait]
pub trait StreamProcessor: Send + 'static {
    /// Queue item type.
    type Item: Send + 'static;

    /// Process one item. An error ends the stream as [`WorkerOutcome::Failed`].
    async fn process(&mut self, item: Self::Item) -> Result<(), PipelineError>;

    /// Runs exactly once when the worker ends, whatever the outcome.
    async fn finish(&mut self, outcome: &WorkerOutcome);
}

enum Work<T> {
    Item(T),
    Finish(Option<String>),
}

/// Handle to one stream's worker task.
pub struct StreamWorker<T> {
    generation: u64,
    queue: mpsc::UnboundedSender<Work<T>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl<T: Send + 'static> StreamWorker<T> {
    /// Spawn a worker driving `processor`; its exit is reported on `exits`.
    pub fn spawn<P>(
        stream_id: StreamId,
        generation: u64,
        processor: P,
        exits: mpsc::UnboundedSender<WorkerExit>,
    ) -> Self
    where
        P: StreamProcessor<Item = T>,
    {
        let (queue, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(drain(
            stream_id,
            generation,
            processor,
            rx,
            cancel.clone(),
            exits,
        ));
        Self {
            generation,
            queue,
            cancel,
            task,
        }
    }

    /// Worker generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Queue an item. `false` once the worker has stopped accepting work.
    pub fn enqueue(&self, item: T) -> bool {
        !self.cancel.is_cancelled() && self.queue.send(Work::Item(item)).is_ok()
    }

    /// Queue a graceful finish behind everything already queued.
    pub fn finish(&self, error: Option<String>) -> bool {
        !self.cancel.is_cancelled() && self.queue.send(Work::Finish(error)).is_ok()
    }

    /// Forced stop. Returns the task so callers can await teardown.
    pub fn stop(self) -> JoinHandle<()> {
        self.cancel.cancel();
        self.task
    }
}

async fn drain<P: StreamProcessor>(
    stream_id: StreamId,
    generation: u64,
    mut processor: P,
    mut queue: mpsc::UnboundedReceiver<Work<P::Item>>,
    cancel: CancellationToken,
    exits: mpsc::UnboundedSender<WorkerExit>,
) {
    let outcome = loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => break WorkerOutcome::Stopped,
            next = queue.recv() => next,
        };
        match next {
            Some(Work::Item(item)) => {
                let result = tokio::select! {
                    biased;
                    () = cancel.cancelled() => break WorkerOutcome::Stopped,
                    result = processor.process(item) => result,
                };
                if let Err(e) = result {
                    warn!(stream_id = %stream_id, error = %e, "stream failed");
                    break WorkerOutcome::Failed(e.to_string());
                }
            }
            Some(Work::Finish(error)) => break WorkerOutcome::Drained { error },
            None => break WorkerOutcome::Stopped,
        }
    };

    // Stop accepting anything still in flight towards this worker.
    queue.close();
    let discarded = std::iter::from_fn(|| queue.try_recv().ok()).count();
    if discarded > 0 {
        debug!(stream_id = %stream_id, discarded, "queued work discarded");
    }

    processor.finish(&outcome).await;
    debug!(stream_id = %stream_id, generation, ?outcome, "stream worker finished");
    let _ = exits.send(WorkerExit {
        stream_id,
        generation,
        outcome,
    });
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

/// One stage's registry of stream workers.
///
/// Entries are created by [`StreamWorkers::start`] and removed either by
/// [`StreamWorkers::stop`] or by [`StreamWorkers::release`] once the worker
/// reports its exit.
pub struct StreamWorkers<T> {
    stage: &'static str,
    workers: SessionRegistry<StreamWorker<T>>,
    next_generation: AtomicU64,
    exits: mpsc::UnboundedSender<WorkerExit>,
}

impl<T: Send + 'static> StreamWorkers<T> {
    /// Empty registry and the receiver worker exits arrive on.
    pub fn new(stage: &'static str) -> (Self, mpsc::UnboundedReceiver<WorkerExit>) {
        let (exits, rx) = mpsc::unbounded_channel();
        (
            Self {
                stage,
                workers: SessionRegistry::new(),
                next_generation: AtomicU64::new(1),
                exits,
            },
            rx,
        )
    }

    /// Start a worker for `stream_id` unless one already exists.
    ///
    /// `make` is only called when the stream is new.
    pub fn start<P, F>(&self, stream_id: &StreamId, make: F) -> bool
    where
        P: StreamProcessor<Item = T>,
        F: FnOnce() -> P,
    {
        if self.workers.contains(stream_id) {
            warn!(stage = self.stage, stream_id = %stream_id, "stream already active, ignoring start");
            return false;
        }
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let worker = StreamWorker::spawn(stream_id.clone(), generation, make(), self.exits.clone());
        if let Err(rejected) = self.workers.insert_new(stream_id.clone(), worker) {
            let _ = rejected.stop();
            warn!(stage = self.stage, stream_id = %stream_id, "stream already active, ignoring start");
            return false;
        }
        info!(stage = self.stage, stream_id = %stream_id, generation, "stream started");
        true
    }

    /// Queue an item. Late items for unknown streams are logged and dropped.
    pub fn enqueue(&self, stream_id: &StreamId, item: T) -> bool {
        let queued = self
            .workers
            .with(stream_id, |w| w.enqueue(item))
            .unwrap_or(false);
        if !queued {
            debug!(stage = self.stage, stream_id = %stream_id, "no active stream, item discarded");
        }
        queued
    }

    /// Graceful finish once the queue drains.
    pub fn finish(&self, stream_id: &StreamId, error: Option<String>) -> bool {
        let queued = self
            .workers
            .with(stream_id, |w| w.finish(error))
            .unwrap_or(false);
        if queued {
            info!(stage = self.stage, stream_id = %stream_id, "draining stream");
        } else {
            debug!(stage = self.stage, stream_id = %stream_id, "finish for inactive stream");
        }
        queued
    }

    /// Forced stop. Removes the entry immediately; idempotent.
    pub fn stop(&self, stream_id: &StreamId) -> Option<JoinHandle<()>> {
        let worker = self.workers.remove(stream_id)?;
        info!(stage = self.stage, stream_id = %stream_id, "stream stopped");
        Some(worker.stop())
    }

    /// Remove the entry for an exited worker, unless a newer one replaced it.
    pub fn release(&self, exit: &WorkerExit) -> bool {
        self.workers
            .remove_if(&exit.stream_id, |w| w.generation() == exit.generation)
            .is_some()
    }

    /// Force-stop every stream.
    pub fn stop_all(&self) -> Vec<JoinHandle<()>> {
        self.workers
            .drain()
            .into_iter()
            .map(|(_, worker)| worker.stop())
            .collect()
    }

    /// Whether `stream_id` has a worker.
    pub fn is_active(&self, stream_id: &StreamId) -> bool {
        self.workers.contains(stream_id)
    }

    /// Number of active streams.
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether no stream is active.
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;

    /// Records items after a per-item delay.
    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
        delays: Vec<u64>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl StreamProcessor for Recorder {
        type Item = &'static str;

        async fn process(&mut self, item: &'static str) -> Result<(), PipelineError> {
            let delay = if self.delays.is_empty() {
                0
            } else {
                self.delays.remove(0)
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if self.fail_on == Some(item) {
                return Err(PipelineError::SubscriptionClosed);
            }
            self.log.lock().push(item.to_string());
            Ok(())
        }

        async fn finish(&mut self, outcome: &WorkerOutcome) {
            self.log.lock().push(format!("finish:{outcome:?}"));
        }
    }

    fn recorder(delays: Vec<u64>) -> (Recorder, Arc<Mutex<Vec<String>>>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        (
            Recorder {
                log: Arc::clone(&log),
                delays,
                fail_on: None,
            },
            log,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn items_are_processed_in_order_despite_latency() {
        let (workers, mut exits) = StreamWorkers::new("test");
        let id = StreamId::from("s1");
        let (proc, log) = recorder(vec![300, 200, 100]);
        assert!(workers.start(&id, || proc));

        for item in ["A", "B", "C"] {
            assert!(workers.enqueue(&id, item));
        }
        assert!(workers.finish(&id, None));

        let exit = exits.recv().await.unwrap();
        assert_eq!(exit.outcome, WorkerOutcome::Drained { error: None });
        assert!(workers.release(&exit));
        assert!(!workers.is_active(&id));
        assert_eq!(
            *log.lock(),
            vec!["A", "B", "C", "finish:Drained { error: None }"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_start_is_ignored() {
        let (workers, _exits) = StreamWorkers::<&'static str>::new("test");
        let id = StreamId::from("s1");
        let (first, _) = recorder(vec![]);
        assert!(workers.start(&id, || first));
        let mut made = false;
        assert!(!workers.start(&id, || {
            made = true;
            recorder(vec![]).0
        }));
        assert!(!made);
        assert_eq!(workers.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_discards_pending_and_in_flight_work() {
        let (workers, mut exits) = StreamWorkers::new("test");
        let id = StreamId::from("s1");
        let (proc, log) = recorder(vec![1000, 0]);
        assert!(workers.start(&id, || proc));
        assert!(workers.enqueue(&id, "A"));
        assert!(workers.enqueue(&id, "B"));

        tokio::time::sleep(Duration::from_millis(10)).await;
        let task = workers.stop(&id).unwrap();
        assert!(!workers.is_active(&id));
        task.await.unwrap();

        let exit = exits.recv().await.unwrap();
        assert_eq!(exit.outcome, WorkerOutcome::Stopped);
        // Already removed by the stop.
        assert!(!workers.release(&exit));
        assert_eq!(*log.lock(), vec!["finish:Stopped"]);

        // Idempotent.
        assert!(workers.stop(&id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn late_items_are_discarded() {
        let (workers, _exits) = StreamWorkers::<&'static str>::new("test");
        assert!(!workers.enqueue(&StreamId::from("gone"), "A"));
        assert!(!workers.finish(&StreamId::from("gone"), None));
    }

    #[tokio::test(start_paused = true)]
    async fn failing_item_ends_the_stream() {
        let (workers, mut exits) = StreamWorkers::new("test");
        let id = StreamId::from("s1");
        let (mut proc, log) = recorder(vec![]);
        proc.fail_on = Some("B");
        assert!(workers.start(&id, || proc));
        for item in ["A", "B", "C"] {
            let _ = workers.enqueue(&id, item);
        }

        let exit = exits.recv().await.unwrap();
        assert_eq!(
            exit.outcome,
            WorkerOutcome::Failed("subscription closed".into())
        );
        assert_eq!(log.lock()[0], "A");
        assert_eq!(log.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn streams_drain_in_parallel() {
        let (workers, mut exits) = StreamWorkers::new("test");
        let (slow, _) = recorder(vec![1000]);
        let (fast, fast_log) = recorder(vec![10]);
        let slow_id = StreamId::from("slow");
        let fast_id = StreamId::from("fast");
        assert!(workers.start(&slow_id, || slow));
        assert!(workers.start(&fast_id, || fast));
        let _ = workers.enqueue(&slow_id, "S");
        let _ = workers.enqueue(&fast_id, "F");
        let _ = workers.finish(&slow_id, None);
        let _ = workers.finish(&fast_id, None);

        let first = exits.recv().await.unwrap();
        assert_eq!(first.stream_id, fast_id);
        assert_eq!(fast_log.lock()[0], "F");
    }
}
