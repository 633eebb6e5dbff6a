//! Hardware locks: mutual exclusion with a FIFO wait queue.

use std::collections::VecDeque;

use xcsim_support::Ticks;

use crate::resource::{ResRef, ResourceState, ResourceType, ThreadRef};
use crate::system::SystemState;
use crate::thread::PauseReason;

#[derive(Debug, Clone, Default)]
pub struct Lock {
    pub res: ResourceState,
    pub held_by: Option<u8>,
    pub queue: VecDeque<u8>,
}

impl Lock {
    pub fn alloc(&mut self, owner: u8) {
        self.res = ResourceState { in_use: true, owner };
        self.held_by = None;
        self.queue.clear();
    }

    pub fn try_free(&mut self) -> bool {
        if self.held_by.is_some() || !self.queue.is_empty() {
            return false;
        }
        self.res.in_use = false;
        true
    }
}

/// `IN` acquires, `OUT` releases.
impl SystemState {
    pub fn lock_acquire(&mut self, core: usize, num: usize, thread: u8) -> Option<u32> {
        let lock = &mut self.cores[core].locks[num];
        if lock.held_by.is_none() {
            lock.held_by = Some(thread);
            return Some(crate::resource::ResourceId::local(num as u32, ResourceType::Lock).0);
        }
        lock.queue.push_back(thread);
        self.cores[core].threads[thread as usize].paused_on =
            PauseReason::Resource(ResRef::new(core, ResourceType::Lock, num));
        None
    }

    /// Releasing a lock the caller does not hold is an illegal-resource
    /// error.
    pub fn lock_release(&mut self, core: usize, num: usize, thread: u8, time: Ticks) -> bool {
        let lock = &mut self.cores[core].locks[num];
        if lock.held_by != Some(thread) {
            return false;
        }
        match lock.queue.pop_front() {
            None => lock.held_by = None,
            Some(next) => {
                lock.held_by = Some(next);
                self.wake_thread(ThreadRef::new(core, next as usize), time);
            }
        }
        true
    }
}
