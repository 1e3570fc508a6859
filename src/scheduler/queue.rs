//! Pending Queue Module
//!
//! Priority-ordered list of tasks waiting for a concurrency slot.

use std::collections::VecDeque;

use crate::scheduler::DownloadTask;

// == Pending Queue ==
/// Tasks in non-increasing priority order, FIFO within a priority.
#[derive(Debug, Default)]
pub struct PendingQueue {
    tasks: VecDeque<DownloadTask>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // == Insert ==
    /// Inserts before the first task of strictly lower priority.
    pub fn insert(&mut self, task: DownloadTask) {
        let index = self
            .tasks
            .iter()
            .position(|queued| queued.priority < task.priority)
            .unwrap_or(self.tasks.len());
        self.tasks.insert(index, task);
    }

    pub fn pop_front(&mut self) -> Option<DownloadTask> {
        self.tasks.pop_front()
    }

    /// Removes the task with the given id, if queued.
    pub fn remove(&mut self, id: &str) -> Option<DownloadTask> {
        let index = self.tasks.iter().position(|task| task.id == id)?;
        self.tasks.remove(index)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.iter().any(|task| task.id == id)
    }

    pub fn drain(&mut self) -> impl Iterator<Item = DownloadTask> + '_ {
        self.tasks.drain(..)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Queued ids in admission order.
    #[cfg(test)]
    pub fn ids(&self) -> Vec<String> {
        self.tasks.iter().map(|task| task.id.clone()).collect()
    }
}
