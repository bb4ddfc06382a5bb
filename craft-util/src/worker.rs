//! Fixed-size worker pool: each thread owns a FIFO job queue; an idle worker
//! makes a few bounded attempts to steal from a random peer before parking.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use rand::Rng;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

const STEAL_ATTEMPTS: usize = 4;
const PARK_TIMEOUT: Duration = Duration::from_millis(50);

struct Queue {
    jobs: Mutex<VecDeque<Job>>,
    condvar: Condvar,
}

impl Queue {
    fn new() -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
        }
    }

    fn push(&self, job: Job) {
        self.jobs.lock().unwrap().push_back(job);
        self.condvar.notify_one();
    }

    fn pop_front(&self) -> Option<Job> {
        self.jobs.lock().unwrap().pop_front()
    }

    fn steal(&self) -> Option<Job> {
        self.jobs.lock().unwrap().pop_back()
    }
}

/// A fixed pool of worker threads sharing no state but the queues
/// themselves. Submitted jobs round-robin across queues; workers steal from
/// each other when their own queue runs dry.
pub struct WorkerPool {
    queues: Vec<Arc<Queue>>,
    next: AtomicUsize,
    shutdown: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Self {
        let threads = threads.max(1);
        let queues: Vec<Arc<Queue>> = (0..threads).map(|_| Arc::new(Queue::new())).collect();
        let shutdown = Arc::new(AtomicBool::new(false));
        let handles = (0..threads)
            .map(|id| {
                let queues = queues.clone();
                let shutdown = shutdown.clone();
                std::thread::Builder::new()
                    .name(format!("craft-worker-{id}"))
                    .spawn(move || worker_loop(id, queues, shutdown))
                    .expect("failed to spawn worker thread")
            })
            .collect();
        Self {
            queues,
            next: AtomicUsize::new(0),
            shutdown,
            handles,
        }
    }

    pub fn threads(&self) -> usize {
        self.queues.len()
    }

    pub fn submit<F: FnOnce() + Send + 'static>(&self, job: F) {
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.queues.len();
        self.queues[idx].push(Box::new(job));
    }

    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for queue in &self.queues {
            queue.condvar.notify_all();
        }
        for handle in self.handles {
            let _ = handle.join();
        }
    }
}

fn worker_loop(id: usize, queues: Vec<Arc<Queue>>, shutdown: Arc<AtomicBool>) {
    let own = &queues[id];
    let mut rng = rand::thread_rng();
    loop {
        if let Some(job) = own.pop_front() {
            job();
            continue;
        }
        let mut stolen = None;
        for _ in 0..STEAL_ATTEMPTS.min(queues.len().saturating_sub(1)) {
            let victim = rng.gen_range(0..queues.len());
            if victim == id {
                continue;
            }
            if let Some(job) = queues[victim].steal() {
                stolen = Some(job);
                break;
            }
        }
        if let Some(job) = stolen {
            job();
            continue;
        }
        if shutdown.load(Ordering::SeqCst) {
            return;
        }
        let guard = own.jobs.lock().unwrap();
        let _ = own.condvar.wait_timeout(guard, PARK_TIMEOUT).unwrap();
        if shutdown.load(Ordering::SeqCst) && own.jobs.lock().unwrap().is_empty() {
            return;
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::Barrier;

    #[test]
    fn submitted_jobs_all_run() {
        let pool = WorkerPool::new(3);
        let counter = Arc::new(AtomicU32::new(0));
        for _ in 0..50 {
            let counter = counter.clone();
            pool.submit(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        // give workers time to drain; shutdown joins cleanly either way.
        std::thread::sleep(Duration::from_millis(200));
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }

    #[test]
    fn steals_work_from_a_busy_peer() {
        let pool = WorkerPool::new(2);
        let barrier = Arc::new(Barrier::new(2));
        let ran = Arc::new(AtomicBool::new(false));
        {
            let barrier = barrier.clone();
            pool.submit(move || {
                barrier.wait();
            });
        }
        {
            let ran = ran.clone();
            pool.submit(move || {
                ran.store(true, Ordering::SeqCst);
            });
        }
        barrier.wait();
        std::thread::sleep(Duration::from_millis(200));
        pool.shutdown();
        assert!(ran.load(Ordering::SeqCst));
    }
}
