use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// A boxed action run later against a context of type `C`.
pub type Action<C> = Box<dyn FnOnce(&mut C) + Send>;

/// A FIFO of actions submitted from any thread and run on the thread that
/// owns `C`, once per frame.
///
/// Clones share the same queue. Pushing never blocks on the consumer beyond
/// the brief lock around the push itself.
pub struct DeferredQueue<C: ?Sized> {
    inner: Arc<Mutex<VecDeque<Action<C>>>>,
}

impl<C: ?Sized> Clone for DeferredQueue<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: ?Sized> Default for DeferredQueue<C> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::new())),
        }
    }
}

impl<C: ?Sized> std::fmt::Debug for DeferredQueue<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredQueue")
            .field("pending", &self.len())
            .finish()
    }
}

impl<C: ?Sized> DeferredQueue<C> {
    pub fn new() -> Self {
        Self::default()
    }

    // A panicking action never runs while the lock is held, so a poisoned
    // queue still holds consistent data.
    fn lock(&self) -> MutexGuard<'_, VecDeque<Action<C>>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn push(&self, action: impl FnOnce(&mut C) + Send + 'static) {
        self.lock().push_back(Box::new(action));
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Remove everything queued so far, in submission order.
    pub fn take_batch(&self) -> Vec<Action<C>> {
        self.lock().drain(..).collect()
    }

    /// Run the current batch against `ctx`. Actions queued while draining
    /// wait for the next call. Returns how many ran.
    pub fn drain(&self, ctx: &mut C) -> usize {
        let batch = self.take_batch();
        let count = batch.len();
        for action in batch {
            action(&mut *ctx);
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_fifo_order() {
        let queue: DeferredQueue<Vec<u32>> = DeferredQueue::new();
        for i in 0..5 {
            queue.push(move |log: &mut Vec<u32>| log.push(i));
        }
        let mut log = Vec::new();
        assert_eq!(queue.drain(&mut log), 5);
        assert_eq!(log, vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn clones_share_the_queue_across_threads() {
        let queue: DeferredQueue<u64> = DeferredQueue::new();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let q = queue.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        q.push(|sum: &mut u64| *sum += 1);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(queue.len(), 100);
        let mut sum = 0;
        queue.drain(&mut sum);
        assert_eq!(sum, 100);
    }

    #[test]
    fn unsized_context() {
        trait Counter {
            fn bump(&mut self);
        }
        impl Counter for u32 {
            fn bump(&mut self) {
                *self += 1;
            }
        }
        let queue: DeferredQueue<dyn Counter> = DeferredQueue::new();
        queue.push(|c| c.bump());
        queue.push(|c| c.bump());
        let mut n = 0u32;
        assert_eq!(queue.drain(&mut n), 2);
        assert_eq!(n, 2);
    }
}
