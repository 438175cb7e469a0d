//! Frame pipeline coordination.
//!
//! Capture is fast and happens every frame; resolution is slow and
//! unbounded. The coordinator keeps the two apart with a pair of capacity-1
//! channels: capture submits with `try_send` and drops the frame when a job
//! is already pending (latency is bounded by never queueing more than one),
//! and a single worker publishes results the consumer polls for. The
//! one-job-in-flight design is the only backpressure mechanism; a slow
//! resolution simply delays the next result.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::frame::Frame;

const WORKER_IDLE_POLL: Duration = Duration::from_millis(10);
const DEFAULT_SHUTDOWN_WAIT: Duration = Duration::from_secs(2);

struct FrameJob {
    index: u64,
    frame: Frame,
}

/// A completed unit of work, tagged with the frame it came from.
#[derive(Debug)]
pub struct FrameResult<T> {
    pub index: u64,
    pub outcome: T,
}

/// Monotonicity guard: results are applied strictly in frame order, so a
/// result that raced past a restart can never roll state backwards.
#[derive(Debug, Default)]
pub struct ResultGate {
    last_applied: Option<u64>,
}

impl ResultGate {
    pub fn admit(&mut self, index: u64) -> bool {
        match self.last_applied {
            Some(last) if index <= last => false,
            _ => {
                self.last_applied = Some(index);
                true
            }
        }
    }

    pub fn last_applied(&self) -> Option<u64> {
        self.last_applied
    }
}

/// Handle to the background worker and its channels.
pub struct Coordinator<T> {
    job_tx: Option<SyncSender<FrameJob>>,
    result_rx: Option<Receiver<FrameResult<T>>>,
    done_rx: Receiver<()>,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    gate: ResultGate,
}

impl<T: Send + 'static> Coordinator<T> {
    /// Spawn the worker. `process` runs on the worker thread, one frame at
    /// a time, and owns whatever state resolution needs.
    pub fn spawn<F>(mut process: F) -> Self
    where
        F: FnMut(&Frame) -> T + Send + 'static,
    {
        let (job_tx, job_rx) = mpsc::sync_channel::<FrameJob>(1);
        let (result_tx, result_rx) = mpsc::sync_channel::<FrameResult<T>>(1);
        let (done_tx, done_rx) = mpsc::channel::<()>();
        let stop = Arc::new(AtomicBool::new(false));

        let worker_stop = Arc::clone(&stop);
        let worker = std::thread::spawn(move || {
            loop {
                if worker_stop.load(Ordering::Relaxed) {
                    break;
                }
                match job_rx.recv_timeout(WORKER_IDLE_POLL) {
                    Ok(job) => {
                        let outcome = process(&job.frame);
                        // Blocks until the consumer drains the slot; if the
                        // consumer is gone, there is nobody left to serve.
                        if result_tx
                            .send(FrameResult {
                                index: job.index,
                                outcome,
                            })
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => continue,
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            let _ = done_tx.send(());
        });

        Self {
            job_tx: Some(job_tx),
            result_rx: Some(result_rx),
            done_rx,
            stop,
            worker: Some(worker),
            gate: ResultGate::default(),
        }
    }

    /// Offer a frame to the worker. Returns false when a job is already
    /// pending — the frame is dropped, not queued.
    pub fn submit(&self, index: u64, frame: Frame) -> bool {
        let Some(job_tx) = &self.job_tx else {
            return false;
        };
        match job_tx.try_send(FrameJob { index, frame }) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::debug!("pipeline busy, dropping frame {}", index);
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                log::warn!("pipeline worker is gone, dropping frame {}", index);
                false
            }
        }
    }

    /// Take the newest ready result, if any. Results older than the last
    /// applied one are discarded.
    pub fn poll(&mut self) -> Option<FrameResult<T>> {
        let result_rx = self.result_rx.as_ref()?;
        let mut latest = None;
        while let Ok(result) = result_rx.try_recv() {
            latest = Some(result);
        }
        let result = latest?;
        if self.gate.admit(result.index) {
            Some(result)
        } else {
            log::debug!("discarding stale result for frame {}", result.index);
            None
        }
    }

    /// Best-effort shutdown: the worker finishes its current job (if any)
    /// and exits; we wait a bounded time and proceed regardless. Returns
    /// whether the worker was actually joined.
    pub fn shutdown(self) -> bool {
        self.shutdown_within(DEFAULT_SHUTDOWN_WAIT)
    }

    pub fn shutdown_within(mut self, wait: Duration) -> bool {
        self.stop.store(true, Ordering::Relaxed);
        // Closing both channels unblocks the worker wherever it is.
        self.job_tx.take();
        self.result_rx.take();

        match self.done_rx.recv_timeout(wait) {
            Ok(()) => {
                if let Some(worker) = self.worker.take() {
                    let _ = worker.join();
                }
                true
            }
            Err(_) => {
                log::warn!("pipeline worker did not stop within {:?}; detaching", wait);
                // The handle drops here; the thread is left to finish alone.
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::Sender;

    fn frame() -> Frame {
        Frame::new(vec![0u8; 12], 2, 2).unwrap()
    }

    /// Worker that reports when it picks up a job and blocks until released.
    fn gated_coordinator() -> (Coordinator<u64>, Receiver<u64>, Sender<()>) {
        let (started_tx, started_rx) = mpsc::channel::<u64>();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let mut next = 0u64;
        let coordinator = Coordinator::spawn(move |_frame| {
            let index = next;
            next += 1;
            let _ = started_tx.send(index);
            let _ = release_rx.recv();
            index
        });
        (coordinator, started_rx, release_tx)
    }

    #[test]
    fn result_gate_is_monotonic() {
        let mut gate = ResultGate::default();
        assert!(gate.admit(0));
        assert!(gate.admit(3));
        assert!(!gate.admit(3));
        assert!(!gate.admit(1));
        assert!(gate.admit(4));
        assert_eq!(gate.last_applied(), Some(4));
    }

    #[test]
    fn at_most_one_job_queues_while_worker_is_busy() {
        let (coordinator, started_rx, release_tx) = gated_coordinator();

        // Worker picks up job 0 and blocks inside it.
        assert!(coordinator.submit(0, frame()));
        started_rx.recv_timeout(Duration::from_secs(1)).unwrap();

        // One more job fits the queue slot; the next is dropped.
        assert!(coordinator.submit(1, frame()));
        assert!(!coordinator.submit(2, frame()));

        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();
        coordinator.shutdown();
    }

    #[test]
    fn poll_returns_results_in_frame_order() {
        let (mut coordinator, started_rx, release_tx) = gated_coordinator();

        assert!(coordinator.submit(0, frame()));
        started_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        release_tx.send(()).unwrap();

        let first = wait_for_result(&mut coordinator);
        assert_eq!(first.index, 0);

        assert!(coordinator.submit(1, frame()));
        started_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        release_tx.send(()).unwrap();

        let second = wait_for_result(&mut coordinator);
        assert_eq!(second.index, 1);

        coordinator.shutdown();
    }

    #[test]
    fn shutdown_waits_for_an_idle_worker() {
        let coordinator = Coordinator::spawn(|_frame: &Frame| 0u64);
        assert!(coordinator.shutdown());
    }

    #[test]
    fn shutdown_finishes_the_in_flight_job_first() {
        let (coordinator, started_rx, release_tx) = gated_coordinator();

        assert!(coordinator.submit(0, frame()));
        started_rx.recv_timeout(Duration::from_secs(1)).unwrap();

        // Release the job right before shutdown; the worker completes it
        // and exits cleanly.
        release_tx.send(()).unwrap();
        assert!(coordinator.shutdown());
    }

    #[test]
    fn shutdown_gives_up_on_a_hung_worker() {
        let (coordinator, started_rx, _release_tx) = gated_coordinator();

        assert!(coordinator.submit(0, frame()));
        started_rx.recv_timeout(Duration::from_secs(1)).unwrap();

        // Worker never gets released; shutdown must not block forever.
        assert!(!coordinator.shutdown_within(Duration::from_millis(100)));
    }

    fn wait_for_result(coordinator: &mut Coordinator<u64>) -> FrameResult<u64> {
        for _ in 0..200 {
            if let Some(result) = coordinator.poll() {
                return result;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("no result within deadline");
    }
}
