//! Fixed-pool task scheduler with a per-frame completion barrier.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

type Task = Box<dyn FnOnce() + Send + 'static>;

struct TaskQueue {
    tasks: VecDeque<Task>,
    is_running: bool,
}

struct Shared {
    queue: Mutex<TaskQueue>,
    task_available: Condvar,
    /// Tasks submitted but not yet finished executing. Decremented only once
    /// a task has returned, so a zero reading means every submitted task has
    /// completed.
    outstanding: AtomicUsize,
}

/// Executes submitted tasks on a fixed pool of worker threads.
///
/// Tasks must be self-contained: they may not borrow from stack frames that
/// return before [`TaskScheduler::wait`]. Tasks may submit further tasks.
/// No ordering between tasks is guaranteed.
pub struct TaskScheduler {
    shared: Arc<Shared>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl TaskScheduler {
    /// Creates the pool with `floor(hardware_concurrency * hardware_priority)`
    /// workers, `hardware_priority` clamped into `0..=1`. A result of zero
    /// workers would leave submitted tasks unrunnable, so the count floors at
    /// one.
    pub fn new(hardware_priority: f32) -> TaskScheduler {
        let priority = hardware_priority.max(0.0).min(1.0);
        let requested = (num_cpus::get() as f32 * priority) as usize;
        let worker_count = requested.max(1);

        if requested == 0 {
            warn!(
                "hardware priority {} yields no workers, clamping to one",
                hardware_priority
            );
        }

        let shared = Arc::new(Shared {
            queue: Mutex::new(TaskQueue {
                tasks: VecDeque::new(),
                is_running: true,
            }),
            task_available: Condvar::new(),
            outstanding: AtomicUsize::new(0),
        });

        let workers = (0..worker_count)
            .map(|index| {
                let shared = shared.clone();

                thread::Builder::new()
                    .name(format!("ona.thread.{}", index))
                    .spawn(move || worker_loop(&shared))
                    .expect("failed to spawn scheduler worker")
            })
            .collect();

        debug!("task scheduler running {} workers", worker_count);

        TaskScheduler { shared, workers }
    }

    /// Enqueues `task` and wakes one worker.
    pub fn execute<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        // Counted before it becomes visible to workers, otherwise a fast
        // worker could finish and decrement first, letting `wait` observe
        // zero while the task is still queued.
        self.shared.outstanding.fetch_add(1, Ordering::SeqCst);

        {
            let mut queue = self.shared.queue.lock().unwrap();
            queue.tasks.push_back(Box::new(task));
        }

        self.shared.task_available.notify_one();
    }

    /// Blocks until every task submitted so far has finished executing.
    pub fn wait(&self) {
        while self.shared.outstanding.load(Ordering::SeqCst) != 0 {
            thread::yield_now();
        }
    }
}

impl Drop for TaskScheduler {
    fn drop(&mut self) {
        {
            let mut queue = self.shared.queue.lock().unwrap();
            queue.is_running = false;
        }

        self.shared.task_available.notify_all();

        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let task = {
            let mut queue = shared.queue.lock().unwrap();

            loop {
                if let Some(task) = queue.tasks.pop_front() {
                    break task;
                }

                if !queue.is_running {
                    return;
                }

                queue = shared.task_available.wait(queue).unwrap();
            }
        };

        task();
        shared.outstanding.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn wait_is_a_completion_barrier() {
        let scheduler = TaskScheduler::new(0.5);
        let completed: Arc<Vec<AtomicBool>> =
            Arc::new((0..64).map(|_| AtomicBool::new(false)).collect());

        for index in 0..completed.len() {
            let completed = completed.clone();

            scheduler.execute(move || {
                // Uneven task durations to give stragglers a chance to be
                // missed by a broken barrier.
                if index % 7 == 0 {
                    thread::sleep(Duration::from_millis(2));
                }

                completed[index].store(true, Ordering::SeqCst);
            });
        }

        scheduler.wait();

        assert!(completed.iter().all(|flag| flag.load(Ordering::SeqCst)));
    }

    #[test]
    fn tasks_may_submit_tasks() {
        let scheduler = Arc::new(TaskScheduler::new(0.25));
        let counter = Arc::new(AtomicUsize::new(0));

        {
            let scheduler = scheduler.clone();
            let counter = counter.clone();

            scheduler.clone().execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);

                let counter = counter.clone();
                scheduler.execute(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            });
        }

        scheduler.wait();

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn wait_with_nothing_outstanding_returns() {
        let scheduler = TaskScheduler::new(0.0);
        scheduler.wait();
    }

    #[test]
    fn shutdown_drains_pending_tasks() {
        let counter = Arc::new(AtomicUsize::new(0));

        {
            let scheduler = TaskScheduler::new(0.25);

            for _ in 0..32 {
                let counter = counter.clone();

                scheduler.execute(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }

            scheduler.wait();
        }

        assert_eq!(counter.load(Ordering::SeqCst), 32);
    }
}
