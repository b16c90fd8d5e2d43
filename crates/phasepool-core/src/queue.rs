//! FIFO job queue
//!
//! Holds submitted `{task, result handle}` records as one unit, so the
//! task side and the result side can never fall out of step. The queue is
//! not synchronised itself; it lives inside the pool's `Monitor`.

use std::collections::VecDeque;

/// FIFO of pending jobs
#[derive(Debug)]
pub struct JobQueue<J> {
    jobs: VecDeque<J>,
}

impl<J> JobQueue<J> {
    pub fn new() -> Self {
        Self { jobs: VecDeque::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            jobs: VecDeque::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn push(&mut self, job: J) {
        self.jobs.push_back(job);
    }

    #[inline]
    pub fn pop(&mut self) -> Option<J> {
        self.jobs.pop_front()
    }

    /// Remove up to `n` jobs from the front, in order
    pub fn take_batch(&mut self, n: usize) -> Vec<J> {
        let n = n.min(self.jobs.len());
        self.jobs.drain(..n).collect()
    }

    /// Remove every pending job, in order
    pub fn take_all(&mut self) -> Vec<J> {
        self.jobs.drain(..).collect()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

impl<J> Default for JobQueue<J> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut queue = JobQueue::new();
        for i in 0..4 {
            queue.push(i);
        }
        assert_eq!(queue.pop(), Some(0));
        assert_eq!(queue.pop(), Some(1));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_take_batch_bounds() {
        let mut queue = JobQueue::with_capacity(8);
        for i in 0..5 {
            queue.push(i);
        }
        assert_eq!(queue.take_batch(3), vec![0, 1, 2]);
        assert_eq!(queue.take_batch(10), vec![3, 4]);
        assert!(queue.is_empty());
        assert!(queue.take_batch(1).is_empty());
    }

    #[test]
    fn test_take_all() {
        let mut queue: JobQueue<&str> = JobQueue::default();
        queue.push("a");
        queue.push("b");
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.take_all(), vec!["a", "b"]);
        assert_eq!(queue.pop(), None);
    }
}
