//! Timers: reads of the reference clock, optionally conditioned on a
//! comparand being reached.

use xcsim_support::ticks::{reference_time, time_of_reference};
use xcsim_support::Ticks;

use crate::resource::{EventState, ResRef, ResourceId, ResourceState, ResourceType};
use crate::system::SystemState;
use crate::thread::PauseReason;

#[derive(Debug, Clone, Default)]
pub struct Timer {
    pub res: ResourceState,
    pub ev: EventState,
    /// Condition: wait until the reference time is at or after `data`.
    pub after: bool,
    pub data: u32,
}

impl Timer {
    pub fn alloc(&mut self, owner: u8, id: ResourceId) {
        self.res = ResourceState { in_use: true, owner };
        self.ev = EventState { env: id.0, ..EventState::default() };
        self.after = false;
        self.data = 0;
    }

    pub fn try_free(&mut self) -> bool {
        self.res.in_use = false;
        true
    }

    /// Condition evaluated at `time`. Comparison is wrapping, as the
    /// architectural counter is 32 bits.
    pub fn condition_met(&self, time: Ticks) -> bool {
        !self.after || (reference_time(time).wrapping_sub(self.data) as i32) >= 0
    }

    /// Earliest time at which the condition will hold.
    pub fn trigger_time(&self, now: Ticks) -> Ticks {
        if self.condition_met(now) {
            now
        } else {
            time_of_reference(now, self.data)
        }
    }
}

impl SystemState {
    /// `IN` on a timer: the reference time, or a pause until the comparand
    /// is reached.
    pub fn timer_in(&mut self, core: usize, num: usize, thread: u8, time: Ticks) -> Option<u32> {
        let timer = &self.cores[core].timers[num];
        if timer.condition_met(time) {
            return Some(reference_time(time));
        }
        let trigger = timer.trigger_time(time);
        self.cores[core].threads[thread as usize].paused_on =
            PauseReason::Resource(ResRef::new(core, ResourceType::Timer, num));
        self.schedule_resource(ResRef::new(core, ResourceType::Timer, num), trigger);
        None
    }

    pub fn timer_setd(&mut self, core: usize, num: usize, value: u32) {
        self.cores[core].timers[num].data = value;
    }

    /// Wheel callback: the comparand time has arrived.
    pub(crate) fn timer_run(&mut self, core: usize, num: usize, time: Ticks) {
        let timer = &self.cores[core].timers[num];
        if !timer.res.in_use || !timer.condition_met(time) {
            return;
        }
        let ev = timer.ev.clone();
        let owner = timer.res.owner;
        if ev.enabled && self.event_deliverable(core, owner, ev.interrupt) {
            let res = ResRef::new(core, ResourceType::Timer, num);
            self.deliver_event(core, owner, &ev, res, time);
            return;
        }
        // A thread parked on the timer input resumes and re-reads.
        let owner_ref = crate::resource::ThreadRef::new(core, owner as usize);
        let parked = self.cores[core].threads[owner as usize].paused_on
            == PauseReason::Resource(ResRef::new(core, ResourceType::Timer, num));
        if parked {
            self.wake_thread(owner_ref, time);
        }
    }

    /// Events enabled on the timer: fire now or arm the wheel.
    pub(crate) fn timer_see_event_enable(&mut self, core: usize, num: usize, time: Ticks) {
        let timer = &self.cores[core].timers[num];
        if timer.condition_met(time) {
            let ev = timer.ev.clone();
            let owner = timer.res.owner;
            let res = ResRef::new(core, ResourceType::Timer, num);
            self.deliver_event(core, owner, &ev, res, time);
        } else {
            let trigger = timer.trigger_time(time);
            self.schedule_resource(ResRef::new(core, ResourceType::Timer, num), trigger);
        }
    }
}
