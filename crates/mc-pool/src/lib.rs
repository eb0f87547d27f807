//! `mc-pool` - Fixed-size barrier-synchronized thread pool.
//!
//! A pool of worker threads that all execute one shared unit of work per
//! round. `schedule` installs the work and wakes every worker; `sync` blocks
//! until the round has fully drained. Workers receive their 0-based id and
//! decide themselves which slice of the problem to handle - the pool imposes
//! no chunking policy.
//!
//! The pool is general purpose and has no dependency on the matrix crates.

use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

/// Upper bound on the worker count: one bit per worker id in the pending
/// and submit bitsets.
pub const MAX_WORKERS: usize = 64;

type WorkFn = Arc<dyn Fn(usize) + Send + Sync + 'static>;

#[derive(Default)]
struct WorkState {
    /// Bit set for each worker id that has not finished the current round.
    pending: u64,
    /// Bits of all live worker ids; `schedule` copies it into `pending`.
    submit_mask: u64,
    /// The shared unit of work. `None` on wake is the exit signal.
    work: Option<WorkFn>,
}

struct WorkContext {
    state: Mutex<WorkState>,
    cv_submitted: Condvar,
    cv_finished: Condvar,
}

impl WorkContext {
    fn new() -> Self {
        WorkContext {
            state: Mutex::new(WorkState::default()),
            cv_submitted: Condvar::new(),
            cv_finished: Condvar::new(),
        }
    }
}

/// Barrier-synchronized pool of worker threads.
///
/// Created empty; a zero-worker pool is legal and `schedule`/`sync` on it
/// return immediately. Dropping the pool runs the exit protocol and joins
/// every worker.
pub struct ThreadPool {
    workers: Vec<JoinHandle<()>>,
    ctx: Arc<WorkContext>,
}

impl ThreadPool {
    /// Create an empty pool. Call [`resize`](Self::resize) to spawn workers.
    pub fn new() -> Self {
        ThreadPool {
            workers: Vec::new(),
            ctx: Arc::new(WorkContext::new()),
        }
    }

    /// Number of live workers.
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Bits of all live worker ids. Exposed for tests.
    pub fn submit_mask(&self) -> u64 {
        self.ctx.state.lock().unwrap().submit_mask
    }

    /// Stop and join all current workers, then spawn exactly `n` new ones
    /// with fixed ids `0..n`.
    ///
    /// Blocks until any in-flight round has finished.
    ///
    /// # Panics
    /// Panics if `n > MAX_WORKERS`.
    pub fn resize(&mut self, n: usize) {
        assert!(n <= MAX_WORKERS, "pool size {} exceeds {}", n, MAX_WORKERS);

        self.exit_workers();

        {
            let mut st = self.ctx.state.lock().unwrap();
            st.work = None;
            st.pending = 0;
            st.submit_mask = 0;
        }

        self.workers.reserve(n);
        for worker_id in 0..n {
            self.ctx.state.lock().unwrap().submit_mask |= 1 << worker_id;
            let ctx = Arc::clone(&self.ctx);
            let handle = thread::Builder::new()
                .name(format!("mc-pool-{}", worker_id))
                .spawn(move || idle(worker_id, &ctx))
                .expect("failed to spawn pool worker");
            self.workers.push(handle);
        }
    }

    /// Install `work` as the shared unit of work for the next round and wake
    /// all workers. Each worker is called once with its id.
    ///
    /// Blocks until the previous round has fully drained. With zero workers
    /// this is a no-op.
    pub fn schedule<F>(&self, work: F)
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.submit(Some(Arc::new(work)));
    }

    /// Block until every worker has finished the current round.
    ///
    /// No caller-visible effect of the round may be observed before this
    /// returns, and the next round cannot begin until it would.
    pub fn sync(&self) {
        if self.workers.is_empty() {
            return;
        }

        let mut st = self.ctx.state.lock().unwrap();
        while st.pending != 0 {
            st = self.ctx.cv_finished.wait(st).unwrap();
        }
    }

    /// Ask all workers to exit and join them. Called automatically on drop;
    /// calling it again is a no-op.
    pub fn exit_workers(&mut self) {
        self.submit(None);

        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }

    fn submit(&self, work: Option<WorkFn>) {
        if self.workers.is_empty() {
            return;
        }

        {
            let mut st = self.ctx.state.lock().unwrap();
            // Wait for the previous round to finish.
            while st.pending != 0 {
                st = self.ctx.cv_finished.wait(st).unwrap();
            }

            st.work = work;
            st.pending = st.submit_mask;
        }

        self.ctx.cv_submitted.notify_all();
    }
}

impl Default for ThreadPool {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.exit_workers();
    }
}

/// Worker main loop: wait for this id's pending bit, run the shared work,
/// clear the bit, notify the barrier when last out. An empty work slot on
/// wake means exit.
fn idle(worker_id: usize, ctx: &WorkContext) {
    let bit = 1u64 << worker_id;

    log::trace!("worker {} up", worker_id);

    loop {
        let work = {
            let mut st = ctx.state.lock().unwrap();
            while st.pending & bit == 0 {
                st = ctx.cv_submitted.wait(st).unwrap();
            }

            match st.work.clone() {
                Some(work) => work,
                None => {
                    log::trace!("worker {} exiting", worker_id);
                    st.pending &= !bit;
                    return;
                }
            }
        };

        log::trace!("worker {} working", worker_id);
        work(worker_id);

        let last = {
            let mut st = ctx.state.lock().unwrap();
            st.pending &= !bit;
            st.pending == 0
        };

        if last {
            log::trace!("worker {} closes the round", worker_id);
            ctx.cv_finished.notify_all();
        }
    }
}
