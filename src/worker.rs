//! Worker pools for the per-document passes
//!
//! A [`WorkQueue`] takes producer items through a bounded channel, so the
//! producer blocks while it is full, and follow-up work from workers through
//! an unbounded one, since a worker must never wait on a queue only workers
//! drain. Workers stop once the queue is closed and every item has been
//! handed out and finished, or at the next item boundary after the
//! cancellation token fires.

use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{bail, Result};
use crossbeam_channel::{select, Receiver, Sender};
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

pub struct WorkQueue<T> {
    items: Sender<T>,
    next_item: Receiver<T>,
    follow_ups: Sender<T>,
    next_follow_up: Receiver<T>,
    /// Dropped on shutdown; every blocked caller also waits on `finished`
    done: Mutex<Option<Sender<()>>>,
    finished: Receiver<()>,
    /// Items queued or in flight
    pending: AtomicUsize,
    closed: AtomicBool,
    cancel: CancellationToken,
}

impl<T> WorkQueue<T> {
    pub fn new(capacity: usize, cancel: CancellationToken) -> Self {
        let (items, next_item) = crossbeam_channel::bounded(capacity.max(1));
        let (follow_ups, next_follow_up) = crossbeam_channel::unbounded();
        let (done, finished) = crossbeam_channel::bounded(0);
        Self {
            items,
            next_item,
            follow_ups,
            next_follow_up,
            done: Mutex::new(Some(done)),
            finished,
            pending: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            cancel,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Enqueue from the producer, blocking while the queue is full. Returns
    /// false if the work was dropped because the pass was cancelled.
    pub fn push(&self, item: T) -> bool {
        if self.is_cancelled() {
            self.shutdown();
            return false;
        }
        self.pending.fetch_add(1, Ordering::SeqCst);
        select! {
            send(self.items, item) -> sent => {
                if sent.is_err() {
                    self.finish();
                }
                sent.is_ok()
            }
            recv(self.finished) -> _ => {
                self.finish();
                false
            }
        }
    }

    /// Enqueue follow-up work from a worker. Never blocks.
    pub fn push_follow_up(&self, item: T) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        // The queue holds both ends, so the channel cannot be disconnected
        if self.follow_ups.send(item).is_err() {
            self.finish();
        }
    }

    /// Producer is done; workers exit once the queue drains
    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        if self.pending.load(Ordering::SeqCst) == 0 {
            self.shutdown();
        }
    }

    /// Take the next item, blocking until one is available. `None` means the
    /// queue is drained or the pass was cancelled.
    pub fn pop(&self) -> Option<Job<'_, T>> {
        if self.is_cancelled() {
            self.shutdown();
            return None;
        }
        // Drain fan-out before taking new producer work
        let item = match self.next_follow_up.try_recv() {
            Ok(item) => item,
            Err(_) => select! {
                recv(self.next_follow_up) -> item => item.ok()?,
                recv(self.next_item) -> item => item.ok()?,
                recv(self.finished) -> _ => return None,
            },
        };
        Some(Job {
            queue: self,
            item: Some(item),
        })
    }

    fn finish(&self) {
        let remaining = self.pending.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 && self.closed.load(Ordering::SeqCst) {
            self.shutdown();
        }
    }

    /// Wake every blocked caller for good
    fn shutdown(&self) {
        self.done.lock().take();
    }
}

/// An item handed to a worker. Dropping it marks the item finished.
pub struct Job<'a, T> {
    queue: &'a WorkQueue<T>,
    item: Option<T>,
}

impl<T> Deref for Job<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.item.as_ref().expect("job item is only taken on drop")
    }
}

impl<T> Drop for Job<'_, T> {
    fn drop(&mut self) {
        self.item.take();
        self.queue.finish();
    }
}

/// Run `width` workers over `items`, collecting what each call returns
pub fn run_pool<T, R, F>(
    items: Vec<T>,
    width: usize,
    cancel: &CancellationToken,
    work: F,
) -> Result<Vec<R>>
where
    T: Send,
    R: Send,
    F: Fn(&T) -> R + Sync,
{
    let width = width.clamp(1, items.len().max(1));
    let queue = WorkQueue::new(width * 2, cancel.clone());

    std::thread::scope(|s| {
        let mut workers = Vec::with_capacity(width);
        for _ in 0..width {
            let queue = &queue;
            let work = &work;
            workers.push(s.spawn(move || {
                let mut local = Vec::new();
                while let Some(job) = queue.pop() {
                    local.push(work(&*job));
                }
                local
            }));
        }

        for item in items {
            if !queue.push(item) {
                break;
            }
        }
        queue.close();

        let mut results = Vec::new();
        let mut panicked = 0;
        for worker in workers {
            match worker.join() {
                Ok(local) => results.extend(local),
                Err(_) => panicked += 1,
            }
        }
        if panicked > 0 {
            bail!("{} compiler workers panicked", panicked);
        }
        Ok(results)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_run_pool_visits_every_item() {
        let cancel = CancellationToken::new();
        let mut results = run_pool((0..100).collect(), 4, &cancel, |n: &i32| n * 2).unwrap();
        results.sort();
        assert_eq!(results.len(), 100);
        assert_eq!(results[99], 198);
    }

    #[test]
    fn test_run_pool_empty() {
        let cancel = CancellationToken::new();
        let results: Vec<i32> = run_pool(Vec::new(), 4, &cancel, |n: &i32| *n).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_run_pool_reports_panics() {
        let cancel = CancellationToken::new();
        let result = run_pool((0..8).collect(), 2, &cancel, |n: &i32| {
            if *n == 3 {
                panic!("bad item");
            }
            *n
        });
        assert!(result.unwrap_err().to_string().contains("panicked"));
    }

    #[test]
    fn test_follow_up_work_is_drained() {
        let queue = WorkQueue::new(1, CancellationToken::new());
        let seen = AtomicUsize::new(0);
        assert!(queue.push(3usize));
        queue.close();

        std::thread::scope(|s| {
            for _ in 0..3 {
                s.spawn(|| {
                    while let Some(job) = queue.pop() {
                        seen.fetch_add(1, Ordering::SeqCst);
                        // Each item fans out into a smaller one
                        if *job > 0 {
                            queue.push_follow_up(*job - 1);
                        }
                    }
                });
            }
        });
        assert_eq!(seen.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_closing_an_empty_queue_releases_workers() {
        let queue: WorkQueue<usize> = WorkQueue::new(1, CancellationToken::new());
        std::thread::scope(|s| {
            let waiter = s.spawn(|| queue.pop().is_none());
            queue.close();
            assert!(waiter.join().unwrap());
        });
    }

    #[test]
    fn test_cancelled_queue_stops() {
        let cancel = CancellationToken::new();
        let queue = WorkQueue::new(1, cancel.clone());
        assert!(queue.push(1));
        cancel.cancel();
        assert!(queue.pop().is_none());
        assert!(!queue.push(2));
    }
}
