//! Whole-system state: the node and core arenas, the runnable queue, the
//! time-ordered event wheel, event/interrupt plumbing and the generic
//! resource operations shared by the instruction set.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, VecDeque};

use xcsim_support::Ticks;

use crate::clock::REF_CLOCK;
use crate::core::{Core, NUM_CHANENDS, NUM_CLKBLKS, NUM_LOCKS, NUM_SYNCS, NUM_TIMERS};
use crate::node::{Node, NodeKind};
use crate::resource::{
    setc, Condition, EventState, ResRef, ResourceId, ResourceType, ThreadRef, WheelEntry,
};
use crate::syscall::SyscallHandler;
use crate::thread::{PauseReason, PendingEvent, StatusReg, Thread};
use crate::trace::Tracer;
use crate::waveform::WaveformTracer;

/// Cycles a thread may run before a sync instruction hands over to the
/// next runnable thread.
pub const TIME_SLICE_CYCLES: Ticks = 100;

/// Why the scheduler stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunResult {
    /// A thread performed an exit syscall.
    Exit(i32),
    /// The configured timeout elapsed.
    Timeout,
    /// Nothing left to run and no deferred work.
    NoRunnableThreads,
}

/// How a breakpointed address is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakpointKind {
    Syscall,
    Exception,
    User,
}

pub struct SystemState {
    pub nodes: Vec<Node>,
    pub cores: Vec<Core>,

    pub runnable: VecDeque<ThreadRef>,
    wheel: BinaryHeap<Reverse<WheelEntry>>,
    wheel_seq: u64,

    /// Latest observed thread time; monotonically non-decreasing.
    pub latest_time: Ticks,
    pub timeout: Option<Ticks>,
    slice_end: Ticks,

    pub(crate) tracer: Option<Box<dyn Tracer>>,
    pub waveform: Option<WaveformTracer>,
    pub syscalls: SyscallHandler,
    pub breakpoint_kinds: HashMap<(usize, u32), BreakpointKind>,
    pub exit_code: Option<i32>,
}

impl Default for SystemState {
    fn default() -> SystemState {
        SystemState::new()
    }
}

impl SystemState {
    pub fn new() -> SystemState {
        SystemState {
            nodes: Vec::new(),
            cores: Vec::new(),
            runnable: VecDeque::new(),
            wheel: BinaryHeap::new(),
            wheel_seq: 0,
            latest_time: 0,
            timeout: None,
            slice_end: TIME_SLICE_CYCLES,
            tracer: None,
            waveform: None,
            syscalls: SyscallHandler::default(),
            breakpoint_kinds: HashMap::new(),
            exit_code: None,
        }
    }

    pub fn set_tracer(&mut self, tracer: Box<dyn Tracer>) {
        self.tracer = Some(tracer);
    }

    pub fn tracing(&self) -> bool {
        self.tracer.is_some()
    }

    /// Run a tracer callback with the tracer temporarily detached so it can
    /// observe system state.
    pub(crate) fn trace(&mut self, f: impl FnOnce(&mut dyn Tracer, &SystemState)) {
        if let Some(mut tracer) = self.tracer.take() {
            f(tracer.as_mut(), self);
            self.tracer = Some(tracer);
        }
    }

    pub fn add_node(&mut self, kind: NodeKind, num_xlinks: usize) -> usize {
        self.nodes.push(Node::new(kind, num_xlinks));
        self.nodes.len() - 1
    }

    pub fn add_core(&mut self, node: usize, mut core: Core) -> usize {
        core.node = node;
        let index = self.cores.len();
        // Clock block pools carry the fixed reference clock past the
        // allocatable entries, and every port starts attached to it.
        debug_assert_eq!(core.clock_blocks.len(), NUM_CLKBLKS);
        core.clock_blocks.push(crate::clock::ClockBlock::reference());
        let ports: Vec<u8> = (0..core.ports.len() as u8).collect();
        core.clock_blocks[REF_CLOCK].attached = ports;
        self.cores.push(core);
        self.nodes[node].cores.push(index);
        index
    }

    pub fn thread(&self, t: ThreadRef) -> &Thread {
        &self.cores[t.core as usize].threads[t.num as usize]
    }

    pub fn thread_mut(&mut self, t: ThreadRef) -> &mut Thread {
        &mut self.cores[t.core as usize].threads[t.num as usize]
    }

    /// Queue deferred resource work.
    pub(crate) fn schedule_resource(&mut self, res: ResRef, time: Ticks) {
        self.wheel_seq += 1;
        self.wheel.push(Reverse(WheelEntry { time, res, seq: self.wheel_seq }));
    }

    /// Make a thread runnable at `time`. Idempotent for queued threads.
    pub(crate) fn wake_thread(&mut self, t: ThreadRef, time: Ticks) {
        let thread = self.thread_mut(t);
        thread.time = thread.time.max(time);
        thread.sr.remove(StatusReg::WAITING);
        thread.paused_on = PauseReason::None;
        if !thread.queued {
            thread.queued = true;
            self.runnable.push_back(t);
        }
    }

    /// Make a freshly initialised thread runnable (`TSTART`, `MSYNC`
    /// release paths go through `wake_thread`).
    pub fn schedule_thread(&mut self, t: ThreadRef, time: Ticks) {
        self.wake_thread(t, time);
    }

    // ------------------------------------------------------------------
    // Events and interrupts.

    /// Can an event/interrupt be delivered to this thread right now?
    pub(crate) fn event_deliverable(&self, core: usize, thread: u8, interrupt: bool) -> bool {
        let t = &self.cores[core].threads[thread as usize];
        if interrupt {
            t.interrupts_permitted()
        } else {
            t.events_permitted()
        }
    }

    /// Deliver a resource's event to its owner: immediately when the owner
    /// is waiting, latched otherwise.
    pub(crate) fn deliver_event(
        &mut self,
        core: usize,
        thread: u8,
        ev: &EventState,
        res: ResRef,
        time: Ticks,
    ) {
        let tref = ThreadRef::new(core, thread as usize);
        let pending = PendingEvent { vector: ev.vector, env: ev.env, interrupt: ev.interrupt };
        if self.thread(tref).is_waiting() {
            self.take_event(tref, pending, Some(res), time);
            self.wake_thread(tref, time);
        } else {
            self.thread_mut(tref).pending = Some(pending);
        }
    }

    /// Redirect a thread into its event or interrupt vector.
    pub(crate) fn take_event(
        &mut self,
        tref: ThreadRef,
        pending: PendingEvent,
        res: Option<ResRef>,
        time: Ticks,
    ) {
        use xcsim_isa::Register::*;
        let core = &self.cores[tref.core as usize];
        let from_pc = core.from_pc(self.thread(tref).pc);
        let t = self.thread_mut(tref);
        t.pending = None;
        t.time = t.time.max(time);
        if pending.interrupt {
            let old_sr = t.sr;
            t.set_reg(Spc, from_pc);
            t.regs[Ssr.index()] = old_sr.bits();
            let old_ed = t.reg(Ed);
            t.set_reg(Sed, old_ed);
            t.set_reg(Ed, pending.env);
            t.sr.remove(StatusReg::EEBLE);
            t.sr.remove(StatusReg::IEBLE);
            t.sr.insert(StatusReg::INK);
            t.sr.insert(StatusReg::ININT);
            t.pc = pending.vector;
            let (ssr, spc, sed, ed) =
                (t.regs[Ssr.index()], t.reg(Spc), t.reg(Sed), t.reg(Ed));
            if let Some(res) = res {
                self.trace(|tr, sys| {
                    tr.interrupt(sys, tref, res, pending.vector, ssr, spc, sed, ed)
                });
            }
        } else {
            t.set_reg(Ed, pending.env);
            t.sr.remove(StatusReg::EEBLE);
            t.pc = pending.vector;
            if let Some(res) = res {
                self.trace(|tr, sys| tr.event(sys, tref, res, pending.vector, pending.env));
            }
        }
    }

    /// Take a latched event at an instruction boundary.
    pub(crate) fn take_pending_event(&mut self, tref: ThreadRef, time: Ticks) -> bool {
        let Some(pending) = self.thread(tref).pending else { return false };
        self.take_event(tref, pending, None, time);
        true
    }

    pub(crate) fn has_pending_event(&self, tref: ThreadRef) -> bool {
        let t = self.thread(tref);
        match t.pending {
            Some(p) if p.interrupt => t.interrupts_permitted(),
            Some(_) => t.events_permitted(),
            None => false,
        }
    }

    /// Event enable status changed on the thread (`SETSR`, `WAITEU`...):
    /// give owned, enabled resources a chance to fire on existing state.
    pub(crate) fn see_thread_event_enable(&mut self, tref: ThreadRef, time: Ticks) {
        let core = tref.core as usize;
        let owner = tref.num;
        for num in 0..NUM_CHANENDS {
            let ce = &self.cores[core].chanends[num];
            if ce.res.in_use && ce.res.owner == owner && ce.ev.enabled {
                let interrupt = ce.ev.interrupt;
                if self.event_deliverable(core, owner, interrupt) {
                    self.chanend_see_event_enable(core, num, time);
                }
            }
            if self.thread(tref).pending.is_some() {
                return;
            }
        }
        for num in 0..NUM_TIMERS {
            let timer = &self.cores[core].timers[num];
            if timer.res.in_use && timer.res.owner == owner && timer.ev.enabled {
                let interrupt = timer.ev.interrupt;
                if self.event_deliverable(core, owner, interrupt) {
                    self.timer_see_event_enable(core, num, time);
                }
            }
            if self.thread(tref).pending.is_some() {
                return;
            }
        }
        for num in 0..self.cores[core].ports.len() {
            let port = &self.cores[core].ports[num];
            if port.res.in_use && port.res.owner == owner && port.ev.enabled {
                let interrupt = port.ev.interrupt;
                if self.event_deliverable(core, owner, interrupt) {
                    self.port_see_event_enable(core, num, time);
                }
            }
            if self.thread(tref).pending.is_some() {
                return;
            }
        }
    }

    /// Event state of an eventable resource, with in-use validation.
    pub(crate) fn eventable_mut(
        &mut self,
        core: usize,
        id: ResourceId,
    ) -> Option<(&mut EventState, &mut u8)> {
        let num = id.num() as usize;
        match id.ty()? {
            ResourceType::Chanend => {
                let ce = self.cores[core].chanends.get_mut(num % NUM_CHANENDS)?;
                if !ce.res.in_use {
                    return None;
                }
                Some((&mut ce.ev, &mut ce.res.owner))
            }
            ResourceType::Timer => {
                let t = self.cores[core].timers.get_mut(num)?;
                if !t.res.in_use {
                    return None;
                }
                Some((&mut t.ev, &mut t.res.owner))
            }
            ResourceType::Port => {
                let idx = self.cores[core].port_index(id.width(), num as u32)?;
                let p = &mut self.cores[core].ports[idx];
                if !p.res.in_use {
                    return None;
                }
                Some((&mut p.ev, &mut p.res.owner))
            }
            _ => None,
        }
    }

    /// `SETV`.
    pub fn eventable_set_vector(&mut self, core: usize, id: ResourceId, vector: u32) -> bool {
        match self.eventable_mut(core, id) {
            Some((ev, _)) => {
                ev.vector = vector;
                true
            }
            None => false,
        }
    }

    /// `SETEV`.
    pub fn eventable_set_env(&mut self, core: usize, id: ResourceId, value: u32) -> bool {
        match self.eventable_mut(core, id) {
            Some((ev, _)) => {
                ev.env = value;
                true
            }
            None => false,
        }
    }

    /// `EEU` / `EET` / `EEF` enable path.
    pub fn eventable_enable(&mut self, core: usize, id: ResourceId, thread: u8, time: Ticks) -> bool {
        let Some((ev, owner)) = self.eventable_mut(core, id) else { return false };
        ev.enabled = true;
        *owner = thread;
        let interrupt = ev.interrupt;
        if self.event_deliverable(core, thread, interrupt) {
            self.resource_see_event_enable(core, id, time);
        }
        true
    }

    pub fn eventable_disable(&mut self, core: usize, id: ResourceId) -> bool {
        match self.eventable_mut(core, id) {
            Some((ev, _)) => {
                ev.enabled = false;
                true
            }
            None => false,
        }
    }

    fn resource_see_event_enable(&mut self, core: usize, id: ResourceId, time: Ticks) {
        match id.ty() {
            Some(ResourceType::Chanend) => {
                self.chanend_see_event_enable(core, (id.num() as usize) % NUM_CHANENDS, time)
            }
            Some(ResourceType::Timer) => self.timer_see_event_enable(core, id.num() as usize, time),
            Some(ResourceType::Port) => {
                if let Some(idx) = self.cores[core].port_index(id.width(), id.num()) {
                    self.port_see_event_enable(core, idx, time);
                }
            }
            _ => {}
        }
    }

    /// `CLRE`: disable events and interrupts on every resource owned by the
    /// thread and drop anything latched.
    pub fn clear_thread_events(&mut self, tref: ThreadRef) {
        let core = tref.core as usize;
        let owner = tref.num;
        self.thread_mut(tref).pending = None;
        for ce in &mut self.cores[core].chanends {
            if ce.res.in_use && ce.res.owner == owner {
                ce.ev.enabled = false;
            }
        }
        for t in &mut self.cores[core].timers {
            if t.res.in_use && t.res.owner == owner {
                t.ev.enabled = false;
            }
        }
        for p in &mut self.cores[core].ports {
            if p.res.in_use && p.res.owner == owner {
                p.ev.enabled = false;
            }
        }
    }

    // ------------------------------------------------------------------
    // Allocation.

    /// `GETR`: allocate a resource of the requested type.
    pub fn alloc_resource(&mut self, core: usize, thread: u8, ty: ResourceType, time: Ticks) -> Option<ResourceId> {
        match ty {
            ResourceType::Chanend => {
                let num = self.cores[core].chanends.iter().position(|c| !c.res.in_use)?;
                let id = self.chanend_id(core, num);
                self.cores[core].chanends[num].alloc(thread, id);
                Some(id)
            }
            ResourceType::Timer => {
                let num = self.cores[core].timers.iter().position(|t| !t.res.in_use)?;
                let id = ResourceId::local(num as u32, ResourceType::Timer);
                self.cores[core].timers[num].alloc(thread, id);
                Some(id)
            }
            ResourceType::Lock => {
                let num = self.cores[core].locks.iter().position(|l| !l.res.in_use)?;
                self.cores[core].locks[num].alloc(thread);
                Some(ResourceId::local(num as u32, ResourceType::Lock))
            }
            ResourceType::Sync => {
                let num = self.cores[core].syncs.iter().position(|s| !s.res.in_use)?;
                self.cores[core].syncs[num].alloc(thread);
                Some(ResourceId::local(num as u32, ResourceType::Sync))
            }
            ResourceType::ClkBlk => {
                let num = self.cores[core]
                    .clock_blocks
                    .iter()
                    .take(NUM_CLKBLKS)
                    .position(|c| !c.res.in_use)?;
                self.clock_set_in_use(core, num, true, thread, time);
                Some(ResourceId::local(num as u32, ResourceType::ClkBlk))
            }
            ResourceType::Thread => {
                let num = self.alloc_thread(core)?;
                Some(ResourceId::local(num as u32, ResourceType::Thread))
            }
            ResourceType::Port | ResourceType::Config => None,
        }
    }

    /// The globally routable id of a chanend.
    pub fn chanend_id(&self, core: usize, num: usize) -> ResourceId {
        let node = self.cores[core].node;
        let node_id = self.nodes[node].id;
        let core_number = self.cores[core].core_number;
        ResourceId::new(node_id, core_number * NUM_CHANENDS as u32 + num as u32, ResourceType::Chanend)
    }

    pub(crate) fn alloc_thread(&mut self, core: usize) -> Option<usize> {
        let time = self.latest_time;
        let num = self.cores[core].threads.iter().position(|t| !t.in_use)?;
        self.cores[core].threads[num].alloc(time);
        Some(num)
    }

    /// `FREER`.
    pub fn free_resource(&mut self, core: usize, thread: u8, id: ResourceId, time: Ticks) -> bool {
        let num = id.num() as usize;
        match id.ty() {
            Some(ResourceType::Chanend) => self
                .cores[core]
                .chanends
                .get_mut(num % NUM_CHANENDS)
                .map(|c| c.res.in_use && c.try_free())
                .unwrap_or(false),
            Some(ResourceType::Timer) if num < NUM_TIMERS => {
                let t = &mut self.cores[core].timers[num];
                t.res.in_use && t.res.owner == thread && t.try_free()
            }
            Some(ResourceType::Lock) if num < NUM_LOCKS => {
                let l = &mut self.cores[core].locks[num];
                l.res.in_use && l.try_free()
            }
            Some(ResourceType::Sync) if num < NUM_SYNCS => {
                let s = &mut self.cores[core].syncs[num];
                s.res.in_use && s.try_free()
            }
            Some(ResourceType::ClkBlk) if num < NUM_CLKBLKS => {
                if !self.cores[core].clock_blocks[num].res.in_use {
                    return false;
                }
                self.clock_set_in_use(core, num, false, thread, time);
                true
            }
            Some(ResourceType::Port) => {
                let Some(idx) = self.cores[core].port_index(id.width(), id.num()) else {
                    return false;
                };
                if !self.cores[core].ports[idx].res.in_use {
                    return false;
                }
                self.port_set_in_use(core, idx, false, thread, time);
                true
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // SETC dispatch.

    /// `SETC res[id], value`. False reports an illegal resource.
    pub fn set_resource_control(
        &mut self,
        core: usize,
        thread: u8,
        id: ResourceId,
        value: u32,
        time: Ticks,
    ) -> bool {
        match id.ty() {
            Some(ResourceType::Chanend) => {
                let num = id.num() as usize % NUM_CHANENDS;
                match value {
                    setc::INUSE_ON => {
                        let cid = self.chanend_id(core, num);
                        let ce = &mut self.cores[core].chanends[num];
                        if !ce.res.in_use {
                            ce.alloc(thread, cid);
                        }
                        true
                    }
                    setc::INUSE_OFF => self.cores[core].chanends[num].try_free(),
                    setc::IE_MODE_EVENT | setc::IE_MODE_INTERRUPT => {
                        let ce = &mut self.cores[core].chanends[num];
                        if !ce.res.in_use {
                            return false;
                        }
                        ce.ev.interrupt = value == setc::IE_MODE_INTERRUPT;
                        true
                    }
                    _ => false,
                }
            }
            Some(ResourceType::Timer) => {
                let num = id.num() as usize;
                let Some(timer) = self.cores[core].timers.get_mut(num) else { return false };
                if !timer.res.in_use {
                    return false;
                }
                match value {
                    setc::INUSE_OFF => timer.try_free(),
                    setc::COND_AFTER => {
                        timer.after = true;
                        true
                    }
                    setc::COND_FULL => {
                        timer.after = false;
                        true
                    }
                    setc::IE_MODE_EVENT | setc::IE_MODE_INTERRUPT => {
                        timer.ev.interrupt = value == setc::IE_MODE_INTERRUPT;
                        true
                    }
                    _ => false,
                }
            }
            Some(ResourceType::ClkBlk) => {
                let num = id.num() as usize;
                if num >= NUM_CLKBLKS {
                    return false;
                }
                match value {
                    setc::INUSE_ON => {
                        self.clock_set_in_use(core, num, true, thread, time);
                        true
                    }
                    setc::INUSE_OFF => {
                        self.clock_set_in_use(core, num, false, thread, time);
                        true
                    }
                    setc::RUN_STARTR => {
                        self.clock_start(core, num, time);
                        true
                    }
                    setc::RUN_STOPR => {
                        self.clock_stop(core, num, time);
                        true
                    }
                    _ => false,
                }
            }
            Some(ResourceType::Port) => {
                let Some(idx) = self.cores[core].port_index(id.width(), id.num()) else {
                    return false;
                };
                if value == setc::INUSE_ON {
                    self.port_set_in_use(core, idx, true, thread, time);
                    return true;
                }
                if !self.cores[core].ports[idx].res.in_use {
                    return false;
                }
                match value {
                    setc::INUSE_OFF => {
                        self.port_set_in_use(core, idx, false, thread, time);
                        true
                    }
                    setc::COND_FULL
                    | setc::COND_EQ
                    | setc::COND_NEQ
                    | setc::COND_PINSEQ
                    | setc::COND_PINSNEQ => {
                        let cond = Condition::from_setc(value).unwrap_or(Condition::Full);
                        self.port_set_condition(core, idx, cond, time)
                    }
                    setc::IE_MODE_EVENT | setc::IE_MODE_INTERRUPT => {
                        self.cores[core].ports[idx].ev.interrupt =
                            value == setc::IE_MODE_INTERRUPT;
                        true
                    }
                    setc::RUN_CLRBUF => {
                        self.port_clear_buf(core, idx, time);
                        true
                    }
                    setc::BUF_BUFFERS => self.port_set_buffered(core, idx, true, time),
                    setc::BUF_NOBUFFERS => self.port_set_buffered(core, idx, false, time),
                    setc::RDY_NOREADY => {
                        self.port_set_ready_mode(core, idx, crate::port::ReadyMode::NoReady, time);
                        true
                    }
                    setc::RDY_STROBED => {
                        self.port_set_ready_mode(core, idx, crate::port::ReadyMode::Strobed, time);
                        true
                    }
                    setc::RDY_HANDSHAKE => {
                        self.port_set_ready_mode(core, idx, crate::port::ReadyMode::Handshake, time);
                        true
                    }
                    setc::MS_MASTER => {
                        self.port_set_master_slave(core, idx, crate::port::MasterSlave::Master, time);
                        true
                    }
                    setc::MS_SLAVE => {
                        self.port_set_master_slave(core, idx, crate::port::MasterSlave::Slave, time);
                        true
                    }
                    setc::PORT_DATAPORT => {
                        self.port_set_port_type(core, idx, crate::port::PortType::Data, time);
                        true
                    }
                    setc::PORT_CLOCKPORT => {
                        self.port_set_port_type(core, idx, crate::port::PortType::Clock, time);
                        true
                    }
                    setc::PORT_READYPORT => {
                        self.port_set_port_type(core, idx, crate::port::PortType::Ready, time);
                        true
                    }
                    _ => false,
                }
            }
            Some(ResourceType::Lock) => {
                let num = id.num() as usize;
                match value {
                    setc::INUSE_OFF if num < NUM_LOCKS => self.cores[core].locks[num].try_free(),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    // ------------------------------------------------------------------
    // Scheduler.

    pub fn set_timeout(&mut self, max_cycles: Ticks) {
        self.timeout = Some(max_cycles);
    }

    fn observe_time(&mut self, time: Ticks) {
        self.latest_time = self.latest_time.max(time);
    }

    pub(crate) fn begin_slice(&mut self, t: ThreadRef) {
        self.slice_end = self.thread(t).time + TIME_SLICE_CYCLES;
    }

    /// True when the running thread should yield at its next sync point.
    pub(crate) fn time_slice_expired(&self, time: Ticks) -> bool {
        time >= self.slice_end && !self.runnable.is_empty()
    }

    fn run_resource(&mut self, res: ResRef, time: Ticks) {
        match res.ty {
            ResourceType::Timer => self.timer_run(res.core as usize, res.num as usize, time),
            ResourceType::Port => self.port_run(res.core as usize, res.num as usize, time),
            _ => {}
        }
    }

    fn timed_out(&self) -> bool {
        self.timeout.is_some_and(|limit| self.latest_time >= limit)
    }

    /// The main loop: interleave runnable threads, falling back to the
    /// event wheel when every thread is parked.
    pub fn run(&mut self) -> RunResult {
        loop {
            if let Some(code) = self.exit_code {
                return RunResult::Exit(code);
            }
            if self.timed_out() {
                let time = self.latest_time;
                self.trace(|t, sys| t.timeout(sys, time));
                return RunResult::Timeout;
            }
            let Some(tref) = self.runnable.pop_front() else {
                // Nothing runnable: advance time to the next deferred
                // event.
                let Some(Reverse(entry)) = self.wheel.pop() else {
                    self.trace(|t, sys| t.no_runnable_threads(sys));
                    return RunResult::NoRunnableThreads;
                };
                self.observe_time(entry.time);
                if self.timed_out() {
                    let time = self.latest_time;
                    self.trace(|t, sys| t.timeout(sys, time));
                    return RunResult::Timeout;
                }
                self.run_resource(entry.res, entry.time);
                continue;
            };
            self.thread_mut(tref).queued = false;
            if !self.thread(tref).in_use {
                continue;
            }
            self.begin_slice(tref);
            crate::exec::run_thread(self, tref);
            let time = self.thread(tref).time;
            self.observe_time(time);
        }
    }
}
