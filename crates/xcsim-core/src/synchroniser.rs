//! Synchronisers: thread fork/join. A master forks children with `GETST`,
//! synchronises with `MSYNC` and collects them with `MJOIN`; children mark
//! the barrier with `SSYNC` and terminate with `FREET`.

use xcsim_support::Ticks;

use crate::resource::{ResRef, ResourceState, ResourceType, ThreadRef};
use crate::system::SystemState;
use crate::thread::PauseReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Join {
    MSync,
    MJoin,
}

#[derive(Debug, Clone, Default)]
pub struct Synchroniser {
    pub res: ResourceState,
    pub master: u8,
    pub children: Vec<u8>,
    /// The master is parked waiting for the barrier or the join.
    pub master_paused: Option<Join>,
}

impl Synchroniser {
    pub fn alloc(&mut self, owner: u8) {
        self.res = ResourceState { in_use: true, owner };
        self.master = owner;
        self.children.clear();
        self.master_paused = None;
    }

    pub fn try_free(&mut self) -> bool {
        if !self.children.is_empty() {
            return false;
        }
        self.res.in_use = false;
        true
    }
}

impl SystemState {
    fn all_children_synced(&self, core: usize, num: usize) -> bool {
        self.cores[core].syncs[num]
            .children
            .iter()
            .all(|&t| self.cores[core].threads[t as usize].in_ssync)
    }

    /// `MSYNC`: release the barrier if every child has reached it,
    /// otherwise park the master. Returns false when the master parks.
    pub fn sync_msync(&mut self, core: usize, num: usize, thread: u8, time: Ticks) -> bool {
        if self.all_children_synced(core, num) {
            self.sync_release_children(core, num, time);
            return true;
        }
        self.cores[core].syncs[num].master_paused = Some(Join::MSync);
        self.cores[core].threads[thread as usize].paused_on =
            PauseReason::Resource(ResRef::new(core, ResourceType::Sync, num));
        false
    }

    /// `MJOIN`: wait until every child is back at the barrier; children
    /// stay parked. Returns false when the master parks.
    pub fn sync_mjoin(&mut self, core: usize, num: usize, thread: u8) -> bool {
        if self.all_children_synced(core, num) {
            return true;
        }
        self.cores[core].syncs[num].master_paused = Some(Join::MJoin);
        self.cores[core].threads[thread as usize].paused_on =
            PauseReason::Resource(ResRef::new(core, ResourceType::Sync, num));
        false
    }

    /// `SSYNC` from child `thread`: park at the barrier and, if this
    /// completes it, resume the master (and the children, for `MSYNC`).
    pub fn sync_ssync(&mut self, core: usize, num: usize, thread: u8, time: Ticks) {
        self.cores[core].threads[thread as usize].in_ssync = true;
        self.sync_barrier_check(core, num, time);
    }

    /// A child terminated (`FREET`) or reached the barrier: resume the
    /// master if it is parked and the barrier is now complete.
    pub(crate) fn sync_barrier_check(&mut self, core: usize, num: usize, time: Ticks) {
        if !self.all_children_synced(core, num) {
            return;
        }
        let Some(join) = self.cores[core].syncs[num].master_paused else { return };
        let master = self.cores[core].syncs[num].master;
        self.cores[core].syncs[num].master_paused = None;
        self.wake_thread(ThreadRef::new(core, master as usize), time);
        if join == Join::MSync {
            self.sync_release_children(core, num, time);
        }
    }

    /// Restart every child from its synchronisation point. A starting
    /// thread's pc was parked one unit short, so step it forward.
    fn sync_release_children(&mut self, core: usize, num: usize, time: Ticks) {
        let children = self.cores[core].syncs[num].children.clone();
        for child in children {
            let t = &mut self.cores[core].threads[child as usize];
            t.in_ssync = false;
            t.pc = t.pc.wrapping_add(1);
            self.wake_thread(ThreadRef::new(core, child as usize), time);
        }
    }

    /// A child thread executed `FREET`: drop it from its synchroniser and
    /// back into the free pool.
    pub fn thread_free(&mut self, core: usize, thread: u8, time: Ticks) {
        let sync = self.cores[core].threads[thread as usize].sync;
        let t = &mut self.cores[core].threads[thread as usize];
        t.in_use = false;
        t.in_ssync = true;
        t.sync = None;
        if let Some(num) = sync {
            let sync = &mut self.cores[core].syncs[num as usize];
            sync.children.retain(|&c| c != thread);
            self.sync_barrier_check(core, num as usize, time);
        }
    }
}
