//! Cross-thread hand-off of one-shot jobs to the owning thread.
//!
//! # Thread Safety
//!
//! - [`InvokeQueue::enqueue`] may be called from any thread; it only holds the lock for one push
//! - [`InvokeQueue::drain`] must be called from the owning thread
//!
//! # Lifecycle
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ any thread     ──enqueue──┐                                │
//! │ any thread     ──enqueue──┼──► InvokeQueue                 │
//! │ owning thread  ──enqueue──┘        │                       │
//! │                                    │ drain (owning thread) │
//! │                     swap buffer ◄──┘                       │
//! │                          └──► run jobs in enqueue order    │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! A drain swaps the whole buffer out before running anything, so a job that enqueues another
//! job (on the same queue) defers it to the next drain instead of growing the current pass.
//! A job that tries to drain its own queue is rejected with [`LoopError::ReentrantDrain`].

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use parking_lot::Mutex;

use crate::core::{
    error::LoopError,
    fault::{self, FaultOrigin, FaultSink},
    phase::Phase,
    thread::ThreadAffinity,
};

/// A queued one-shot job.
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// FIFO of jobs produced on any thread and run on the owning thread.
pub struct InvokeQueue {
    phase: Phase,
    jobs: Mutex<Vec<Job>>,
    draining: AtomicBool,
    affinity: Arc<ThreadAffinity>,
    sink: Arc<dyn FaultSink>,
}

/// Clears the draining flag when a drain ends.
struct Draining<'a>(&'a AtomicBool);

impl Drop for Draining<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl InvokeQueue {
    pub(crate) fn new(
        phase: Phase,
        affinity: Arc<ThreadAffinity>,
        sink: Arc<dyn FaultSink>,
    ) -> Self {
        Self {
            phase,
            jobs: Mutex::new(Vec::new()),
            draining: AtomicBool::new(false),
            affinity,
            sink,
        }
    }

    /// The phase whose advance drains this queue.
    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Append a job. Callable from any thread.
    pub fn enqueue<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.jobs.lock().push(Box::new(job));
    }

    /// Number of jobs waiting for the next drain.
    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }

    /// `true` if the calling thread owns the loop and may drain.
    #[inline]
    pub fn is_owning_thread(&self) -> bool {
        self.affinity.is_owner()
    }

    /// `true` if the calling thread must go through [`enqueue`](Self::enqueue) to reach the
    /// owning thread.
    #[inline]
    pub fn invoke_required(&self) -> bool {
        !self.is_owning_thread()
    }

    /// Run every job enqueued before this call, in enqueue order. Returns how many ran.
    ///
    /// A panicking job is reported to the fault sink and the remaining jobs still run.
    pub fn drain(&self) -> Result<usize, LoopError> {
        self.affinity.require("InvokeQueue::drain")?;
        if self.draining.swap(true, Ordering::AcqRel) {
            return Err(LoopError::ReentrantDrain(self.phase));
        }
        let _draining = Draining(&self.draining);

        let jobs = std::mem::take(&mut *self.jobs.lock());
        let count = jobs.len();
        let origin = FaultOrigin::Invoke(self.phase);
        for job in jobs {
            fault::guard(origin, &*self.sink, || {
                job();
                Ok(())
            });
        }
        Ok(count)
    }
}

impl std::fmt::Debug for InvokeQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InvokeQueue")
            .field("phase", &self.phase)
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Barrier, thread};

    use super::*;
    use crate::core::fault::RecordingSink;

    fn owned_queue() -> (Arc<InvokeQueue>, Arc<RecordingSink>) {
        let affinity = Arc::new(ThreadAffinity::new());
        affinity.establish("test").unwrap();
        let sink = Arc::new(RecordingSink::new());
        let queue = Arc::new(InvokeQueue::new(Phase::Update, affinity, sink.clone()));
        (queue, sink)
    }

    #[test]
    fn drain_runs_in_enqueue_order() {
        let (queue, _) = owned_queue();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..5 {
            let order = Arc::clone(&order);
            queue.enqueue(move || order.lock().push(i));
        }

        assert_eq!(queue.len(), 5);
        assert_eq!(queue.drain().unwrap(), 5);
        assert_eq!(*order.lock(), vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
        assert_eq!(queue.drain().unwrap(), 0);
    }

    #[test]
    fn fifo_preserved_across_producer_threads() {
        let (queue, _) = owned_queue();
        let order = Arc::new(Mutex::new(Vec::new()));
        let enqueued = Arc::new(Mutex::new(Vec::new()));
        let start = Barrier::new(4);

        thread::scope(|s| {
            for producer in 0..4 {
                let queue = Arc::clone(&queue);
                let order = Arc::clone(&order);
                let enqueued = Arc::clone(&enqueued);
                let start = &start;
                s.spawn(move || {
                    start.wait();
                    for seq in 0..50 {
                        let id = (producer, seq);
                        let order = Arc::clone(&order);
                        // Record the enqueue order under the same lock as the push.
                        let mut enqueued = enqueued.lock();
                        queue.enqueue(move || order.lock().push(id));
                        enqueued.push(id);
                    }
                });
            }
        });

        assert_eq!(queue.drain().unwrap(), 200);
        assert_eq!(*order.lock(), *enqueued.lock());
    }

    #[test]
    fn job_enqueued_during_drain_waits_for_next_drain() {
        let (queue, _) = owned_queue();
        let ran = Arc::new(Mutex::new(Vec::new()));

        {
            let inner_queue = Arc::clone(&queue);
            let ran = Arc::clone(&ran);
            queue.enqueue(move || {
                ran.lock().push("outer");
                let ran = Arc::clone(&ran);
                inner_queue.enqueue(move || ran.lock().push("inner"));
            });
        }

        assert_eq!(queue.drain().unwrap(), 1);
        assert_eq!(*ran.lock(), vec!["outer"]);
        assert_eq!(queue.len(), 1);

        assert_eq!(queue.drain().unwrap(), 1);
        assert_eq!(*ran.lock(), vec!["outer", "inner"]);
    }

    #[test]
    fn job_cannot_drain_its_own_queue() {
        let (queue, _) = owned_queue();
        let nested = Arc::new(Mutex::new(None));

        {
            let inner_queue = Arc::clone(&queue);
            let nested = Arc::clone(&nested);
            queue.enqueue(move || {
                inner_queue.enqueue(|| {});
                *nested.lock() = Some(inner_queue.drain());
            });
        }

        assert_eq!(queue.drain().unwrap(), 1);
        assert!(matches!(
            nested.lock().take(),
            Some(Err(LoopError::ReentrantDrain(Phase::Update)))
        ));
        // The job queued by the outer pass is still waiting.
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain().unwrap(), 1);
    }

    #[test]
    fn panicking_job_is_isolated() {
        let (queue, sink) = owned_queue();
        let ran = Arc::new(Mutex::new(0));

        queue.enqueue(|| panic!("job failed"));
        {
            let ran = Arc::clone(&ran);
            queue.enqueue(move || *ran.lock() += 1);
        }

        assert_eq!(queue.drain().unwrap(), 2);
        assert_eq!(*ran.lock(), 1);
        let faults = sink.faults();
        assert_eq!(faults.len(), 1);
        assert_eq!(faults[0].origin(), FaultOrigin::Invoke(Phase::Update));
    }

    #[test]
    fn foreign_thread_may_enqueue_but_not_drain() {
        let (queue, _) = owned_queue();

        thread::scope(|s| {
            s.spawn(|| {
                assert!(queue.invoke_required());
                queue.enqueue(|| {});
                assert!(matches!(
                    queue.drain(),
                    Err(LoopError::ThreadViolation(err)) if err.operation == "InvokeQueue::drain"
                ));
            });
        });

        assert!(queue.is_owning_thread());
        assert_eq!(queue.drain().unwrap(), 1);
    }
}
