//! Per-thread architectural state.

use xcsim_isa::{Register, REGISTER_FILE_SIZE};
use xcsim_support::Ticks;

use crate::resource::ResRef;

bitflags::bitflags! {
    /// Thread status register.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct StatusReg: u32 {
        /// Events enabled.
        const EEBLE = 1 << 0;
        /// Interrupts enabled.
        const IEBLE = 1 << 1;
        /// Thread is in an event or interrupt enabling sequence.
        const INENB = 1 << 2;
        /// Thread is in an interrupt handler.
        const ININT = 1 << 3;
        /// Thread is in kernel mode.
        const INK = 1 << 4;
        /// Fast mode: issue instructions without descheduling.
        const FAST = 1 << 5;
        /// Thread is paused waiting for an event.
        const WAITING = 1 << 6;
        /// Debug interrupts disabled in kernel mode.
        const KEDI = 1 << 7;
        /// Kernel-mode sticky bit.
        const SINK = 1 << 8;
        /// Debug interrupts disabled.
        const DI = 1 << 9;
        /// Event break point pending.
        const EBP = 1 << 10;
        /// Step break point pending.
        const SBP = 1 << 11;
    }
}

/// An event or interrupt latched for delivery at the next safe point.
#[derive(Debug, Clone, Copy)]
pub struct PendingEvent {
    /// Vector in decode units.
    pub vector: u32,
    /// Environment word for ED.
    pub env: u32,
    pub interrupt: bool,
}

/// Why a descheduled thread is parked, and on which resource. The resource
/// holds the only back-pointer to the thread; it clears it on wake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    None,
    Resource(ResRef),
    /// Waiting for an event with no single owning resource (`WAITEU`).
    Event,
}

#[derive(Debug, Clone)]
pub struct Thread {
    pub in_use: bool,
    pub regs: [u32; REGISTER_FILE_SIZE],
    pub sr: StatusReg,
    /// Program counter in decode units.
    pub pc: u32,
    /// This thread's simulated time. Monotonically non-decreasing.
    pub time: Ticks,
    pub pending: Option<PendingEvent>,
    /// Synchroniser this thread is a child of, if any.
    pub sync: Option<u8>,
    /// Paused at a synchronisation point (freshly created, or after
    /// `SSYNC`), waiting for the master.
    pub in_ssync: bool,
    /// Pre-validated branch target that turned out illegal; reported when
    /// the illegal-pc trap fires.
    pub illegal_pc: u32,
    /// On the runnable queue.
    pub queued: bool,
    pub paused_on: PauseReason,
}

impl Default for Thread {
    fn default() -> Thread {
        Thread {
            in_use: false,
            regs: [0; REGISTER_FILE_SIZE],
            sr: StatusReg::empty(),
            pc: 0,
            time: 0,
            pending: None,
            sync: None,
            in_ssync: false,
            illegal_pc: 0,
            queued: false,
            paused_on: PauseReason::None,
        }
    }
}

impl Thread {
    /// Reset architectural state for (re)allocation. Time is preserved:
    /// a thread created now cannot run in the past.
    pub fn alloc(&mut self, time: Ticks) {
        self.in_use = true;
        self.regs = [0; REGISTER_FILE_SIZE];
        self.sr = StatusReg::empty();
        self.pc = 0;
        self.time = self.time.max(time);
        self.pending = None;
        self.sync = None;
        self.in_ssync = true;
        self.illegal_pc = 0;
        self.queued = false;
        self.paused_on = PauseReason::None;
    }

    pub fn reg(&self, r: Register) -> u32 {
        debug_assert!(r != Register::Sr);
        self.regs[r.index()]
    }

    pub fn set_reg(&mut self, r: Register, value: u32) {
        debug_assert!(r != Register::Sr);
        self.regs[r.index()] = value;
    }

    /// Events are deliverable when enabled and not masked.
    pub fn events_permitted(&self) -> bool {
        self.sr.contains(StatusReg::EEBLE)
    }

    pub fn interrupts_permitted(&self) -> bool {
        self.sr.contains(StatusReg::IEBLE) && !self.sr.contains(StatusReg::INK)
    }

    pub fn is_waiting(&self) -> bool {
        self.sr.contains(StatusReg::WAITING)
    }
}
