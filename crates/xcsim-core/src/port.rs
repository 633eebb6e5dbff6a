//! Ports: clocked, condition-filtered, timed pin I/O.
//!
//! A port advances only at edges of its clock block. Output data moves
//! `transfer register -> shift register -> pins`, one port-width slice per
//! falling edge; input data moves `pins -> shift register -> transfer
//! register`, one slice per rising edge. Threads park on the port until the
//! transfer register is free (output) or full with its condition met
//! (input).

use xcsim_support::bits::make_mask;
use xcsim_support::{EdgeKind, Signal, Ticks};

use crate::clock::REF_CLOCK;
use crate::resource::{
    Condition, EventState, ResRef, ResourceId, ResourceState, ResourceType,
};
use crate::system::SystemState;
use crate::thread::PauseReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadyMode {
    #[default]
    NoReady,
    Strobed,
    Handshake,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MasterSlave {
    #[default]
    Master,
    Slave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PortType {
    #[default]
    Data,
    Ready,
    Clock,
}

#[derive(Debug, Clone)]
pub struct Port {
    pub res: ResourceState,
    pub ev: EventState,
    pub width: u32,
    pub num: u32,

    pub output: bool,
    pub buffered: bool,
    pub transfer_width: u32,
    pub condition: Condition,
    /// Condition comparand.
    pub data: u32,
    /// Clock block pool index.
    pub clock: u8,

    pub port_counter: u16,
    pub shift_reg: u32,
    /// Output: slices still to drive. Input: slices sampled so far.
    pub shift_count: u32,
    pub transfer_reg: u32,
    pub transfer_valid: bool,
    pub time_reg: u16,
    pub time_reg_valid: bool,
    pub timestamp_reg: u16,

    pub ready_out: bool,
    /// Value currently driven while in output mode.
    pub output_value: u32,
    /// Externally driven pin value while in input mode.
    pub pins_input: Signal,
    /// Time the port has been advanced to.
    pub time: Ticks,
    in_update: bool,

    pub paused_in: Option<u8>,
    pub paused_out: Option<u8>,
    pub paused_sync: Option<u8>,

    /// Clock blocks driven by this port's pins.
    pub source_of: Vec<u8>,
    /// Clock blocks using this port as ready-in.
    pub ready_in_of: Vec<u8>,
    /// 1-bit port carrying this port's ready-out.
    pub ready_port: Option<u8>,
    /// Port whose ready-out this port carries.
    pub ready_out_of: Option<u8>,

    pub port_type: PortType,
    pub ready_mode: ReadyMode,
    pub master_slave: MasterSlave,

    /// Input pins wired to another port's output.
    pub loopback: Option<(u16, u8)>,
    /// Waveform tracer wants pin changes.
    pub watched: bool,
}

impl Port {
    pub fn new(width: u32, num: u32) -> Port {
        Port {
            res: ResourceState::default(),
            ev: EventState::default(),
            width,
            num,
            output: false,
            buffered: false,
            transfer_width: width,
            condition: Condition::Full,
            data: 0,
            clock: REF_CLOCK as u8,
            port_counter: 0,
            shift_reg: 0,
            shift_count: 0,
            transfer_reg: 0,
            transfer_valid: false,
            time_reg: 0,
            time_reg_valid: false,
            timestamp_reg: 0,
            ready_out: false,
            output_value: 0,
            pins_input: Signal::constant(0),
            time: 0,
            in_update: false,
            paused_in: None,
            paused_out: None,
            paused_sync: None,
            source_of: Vec::new(),
            ready_in_of: Vec::new(),
            ready_port: None,
            ready_out_of: None,
            port_type: PortType::Data,
            ready_mode: ReadyMode::NoReady,
            master_slave: MasterSlave::Master,
            loopback: None,
            watched: false,
        }
    }

    pub fn id(&self) -> ResourceId {
        ResourceId::port(self.width, self.num)
    }

    pub fn width_mask(&self) -> u32 {
        make_mask(self.width)
    }

    pub fn transfer_mask(&self) -> u32 {
        make_mask(self.transfer_width)
    }

    /// Port-width slices per transfer.
    pub fn slices(&self) -> u32 {
        (self.transfer_width / self.width).max(1)
    }

    pub fn use_ready_in(&self) -> bool {
        self.ready_mode == ReadyMode::Handshake
            || (self.ready_mode == ReadyMode::Strobed && self.master_slave == MasterSlave::Slave)
    }

    pub fn use_ready_out(&self) -> bool {
        self.ready_mode == ReadyMode::Handshake
            || (self.ready_mode == ReadyMode::Strobed && self.master_slave == MasterSlave::Master)
    }

    fn value_meets_condition(&self, value: u32) -> bool {
        let masked = value & self.transfer_mask();
        let comparand = self.data & self.transfer_mask();
        match self.condition {
            Condition::Full => true,
            Condition::Eq | Condition::PinsEq => masked == comparand,
            Condition::Neq | Condition::PinsNeq => masked != comparand,
            Condition::After => false,
        }
    }

    fn condition_met(&self) -> bool {
        if !self.transfer_valid {
            return false;
        }
        match self.condition {
            Condition::Full => true,
            _ => self.value_meets_condition(self.transfer_reg),
        }
    }

    fn time_met(&self) -> bool {
        self.transfer_valid && (!self.time_reg_valid || self.timestamp_reg == self.time_reg)
    }

    fn input_ready(&self) -> bool {
        self.time_met() && self.condition_met()
    }

    /// Output pipeline drained.
    fn output_idle(&self) -> bool {
        self.shift_count == 0 && !self.transfer_valid
    }
}

impl SystemState {
    /// The signal currently on the port's pins.
    pub(crate) fn port_pins_signal(&self, core: usize, p: usize) -> Signal {
        let port = &self.cores[core].ports[p];
        if port.output {
            Signal::constant(port.output_value)
        } else {
            port.pins_input
        }
    }

    /// Advance the port to `time`, processing every clock edge in between.
    pub fn port_update(&mut self, core: usize, p: usize, time: Ticks) {
        let port = &mut self.cores[core].ports[p];
        if port.in_update || time <= port.time {
            return;
        }
        port.in_update = true;
        let clk = port.clock as usize;
        let signal = self.cores[core].clock_blocks[clk].signal();
        loop {
            let cursor = self.cores[core].ports[p].time;
            let Some(edge) = signal.next_edge(cursor) else { break };
            if edge.time > time {
                break;
            }
            self.cores[core].ports[p].time = edge.time;
            self.port_edge(core, p, edge.kind, edge.time);
        }
        let port = &mut self.cores[core].ports[p];
        port.time = time;
        port.in_update = false;
    }

    /// An externally generated edge (port-driven clock). Advances state as
    /// if the edge came from the fixed clock.
    pub(crate) fn port_see_edge(&mut self, core: usize, p: usize, kind: EdgeKind, time: Ticks) {
        self.cores[core].ports[p].time = time;
        self.port_edge(core, p, kind, time);
    }

    fn port_edge(&mut self, core: usize, p: usize, kind: EdgeKind, time: Ticks) {
        if !self.cores[core].ports[p].res.in_use {
            return;
        }
        match kind {
            EdgeKind::Falling => self.port_falling_edge(core, p, time),
            EdgeKind::Rising => self.port_rising_edge(core, p, time),
        }
    }

    fn port_falling_edge(&mut self, core: usize, p: usize, time: Ticks) {
        let port = &mut self.cores[core].ports[p];
        port.port_counter = port.port_counter.wrapping_add(1);
        if !port.output {
            return;
        }
        // Drive the next slice.
        let mut pins_changed = false;
        if port.shift_count > 0 {
            let new_pins = port.shift_reg & port.width_mask();
            pins_changed = new_pins != port.output_value;
            port.output_value = new_pins;
            port.shift_reg = (port.shift_reg as u64 >> port.width) as u32;
            port.shift_count -= 1;
        }
        // Reload from the transfer register once the shift register drains.
        let mut woke_writer = None;
        if port.shift_count == 0
            && port.transfer_valid
            && (!port.time_reg_valid || port.port_counter == port.time_reg)
        {
            port.shift_reg = port.transfer_reg & port.transfer_mask();
            port.shift_count = port.slices();
            port.transfer_valid = false;
            port.time_reg_valid = false;
            port.timestamp_reg = port.port_counter;
            woke_writer = port.paused_out.take();
        }
        let mut woke_sync = None;
        if port.output_idle() {
            woke_sync = port.paused_sync.take();
        }
        let ready = port.shift_count > 0;
        let ready_changed = port.use_ready_out() && ready != port.ready_out;
        port.ready_out = ready;
        let ready_port = port.ready_port;
        if pins_changed {
            self.port_pins_changed(core, p, time);
        }
        if ready_changed {
            if let Some(rp) = ready_port {
                self.port_drive_ready(core, rp as usize, ready, time);
            }
        }
        if let Some(t) = woke_writer {
            self.wake_thread(crate::resource::ThreadRef::new(core, t as usize), time);
        }
        if let Some(t) = woke_sync {
            self.wake_thread(crate::resource::ThreadRef::new(core, t as usize), time);
        }
    }

    fn port_rising_edge(&mut self, core: usize, p: usize, time: Ticks) {
        let port = &self.cores[core].ports[p];
        if port.output {
            return;
        }
        // Ready-in gating: a strobed slave samples only when its clock's
        // ready-in is asserted.
        if port.use_ready_in() {
            let clk = port.clock as usize;
            let ready = self.cores[core].clock_blocks[clk].ready_in_value.value_at(time);
            if ready == 0 {
                return;
            }
        }
        let sample = self.port_pins_signal(core, p).value_at(time)
            & self.cores[core].ports[p].width_mask();
        let port = &mut self.cores[core].ports[p];
        if !port.buffered {
            port.transfer_reg = sample;
            port.transfer_valid = true;
            port.timestamp_reg = port.port_counter;
        } else if port.condition != Condition::Full {
            // Conditional input latches the first matching sample whole.
            if port.value_meets_condition(sample) {
                port.transfer_reg = sample;
                port.transfer_valid = true;
                port.timestamp_reg = port.port_counter;
            }
        } else {
            port.shift_reg = (port.shift_reg as u64 >> port.width) as u32
                | (sample << (port.transfer_width - port.width));
            port.shift_count += 1;
            if port.shift_count >= port.slices() {
                port.shift_count = 0;
                if !port.time_reg_valid || port.port_counter == port.time_reg {
                    port.transfer_reg = port.shift_reg & port.transfer_mask();
                    port.transfer_valid = true;
                    port.timestamp_reg = port.port_counter;
                }
            }
        }
        if self.cores[core].ports[p].input_ready() {
            self.port_input_became_ready(core, p, time);
        }
    }

    /// Data is waiting with its condition satisfied: deliver the event or
    /// wake the parked reader.
    fn port_input_became_ready(&mut self, core: usize, p: usize, time: Ticks) {
        let port = &self.cores[core].ports[p];
        let ev = port.ev.clone();
        let owner = port.res.owner;
        if ev.enabled && self.event_deliverable(core, owner, ev.interrupt) {
            // The condition is consumed by the event.
            self.cores[core].ports[p].condition = Condition::Full;
            let res = ResRef::new(core, ResourceType::Port, p);
            self.deliver_event(core, owner, &ev, res, time);
            return;
        }
        let port = &mut self.cores[core].ports[p];
        if let Some(t) = port.paused_in.take() {
            self.wake_thread(crate::resource::ThreadRef::new(core, t as usize), time);
        }
    }

    /// The pins this port drives changed: loopback peers, watching
    /// tracers and driven clock blocks all observe it.
    fn port_pins_changed(&mut self, core: usize, p: usize, time: Ticks) {
        let port = &self.cores[core].ports[p];
        let value = port.output_value;
        let signal = Signal::constant(value);
        let loopback = port.loopback;
        let source_of = port.source_of.clone();
        let ready_in_of = port.ready_in_of.clone();
        let watched = port.watched;
        if watched {
            self.note_pins_change(core, p, value, time);
        }
        for clk in source_of {
            self.clock_set_value(core, clk as usize, signal, time);
        }
        for clk in ready_in_of {
            self.clock_set_ready_in_value(core, clk as usize, signal, time);
        }
        if let Some((peer_core, peer)) = loopback {
            self.port_set_pins(peer_core as usize, peer as usize, signal, time);
        }
    }

    /// External pin drive (loopback or peripheral).
    pub fn port_set_pins(&mut self, core: usize, p: usize, signal: Signal, time: Ticks) {
        self.port_update(core, p, time);
        {
            let port = &mut self.cores[core].ports[p];
            port.pins_input = signal;
        }
        let port = &self.cores[core].ports[p];
        let source_of = port.source_of.clone();
        let ready_in_of = port.ready_in_of.clone();
        if !port.output {
            for clk in source_of {
                self.clock_set_value(core, clk as usize, signal, time);
            }
            for clk in ready_in_of {
                self.clock_set_ready_in_value(core, clk as usize, signal, time);
            }
        }
        self.port_schedule_if_needed(core, p);
    }

    fn port_drive_ready(&mut self, core: usize, rp: usize, value: bool, time: Ticks) {
        let port = &mut self.cores[core].ports[rp];
        let new = value as u32;
        if port.output_value == new {
            return;
        }
        port.output = true;
        port.output_value = new;
        self.port_pins_changed(core, rp, time);
    }

    /// `IN` / `INSHR` entry point. Returns the transfer value or parks the
    /// thread.
    pub fn port_in(&mut self, core: usize, p: usize, thread: u8, time: Ticks) -> Option<u32> {
        self.port_update(core, p, time);
        let port = &mut self.cores[core].ports[p];
        if port.output {
            // Turning the port around discards the output pipeline.
            port.output = false;
            port.shift_count = 0;
            port.transfer_valid = false;
        }
        if port.input_ready() {
            let value = port.transfer_reg & port.transfer_mask();
            port.transfer_valid = false;
            port.time_reg_valid = false;
            port.condition = Condition::Full;
            if port.buffered {
                port.shift_count = 0;
            }
            return Some(value);
        }
        port.paused_in = Some(thread);
        self.cores[core].threads[thread as usize].paused_on =
            PauseReason::Resource(ResRef::new(core, ResourceType::Port, p));
        self.port_schedule_if_needed(core, p);
        None
    }

    /// `OUT` / `OUTSHR` entry point. Parks while a previous transfer is
    /// still pending on a buffered port.
    pub fn port_out(&mut self, core: usize, p: usize, thread: u8, value: u32, time: Ticks) -> bool {
        self.port_update(core, p, time);
        let port = &mut self.cores[core].ports[p];
        if !port.output {
            port.output = true;
            port.shift_count = 0;
            port.transfer_valid = false;
        }
        if port.buffered && port.transfer_valid {
            port.paused_out = Some(thread);
            self.cores[core].threads[thread as usize].paused_on =
                PauseReason::Resource(ResRef::new(core, ResourceType::Port, p));
            self.port_schedule_if_needed(core, p);
            return false;
        }
        port.transfer_reg = value & port.transfer_mask();
        port.transfer_valid = true;
        self.port_schedule_if_needed(core, p);
        true
    }

    /// `SYNCR`: wait for the output pipeline to drain.
    pub fn port_sync(&mut self, core: usize, p: usize, thread: u8, time: Ticks) -> bool {
        self.port_update(core, p, time);
        let port = &mut self.cores[core].ports[p];
        if !port.output || port.output_idle() {
            return true;
        }
        port.paused_sync = Some(thread);
        self.cores[core].threads[thread as usize].paused_on =
            PauseReason::Resource(ResRef::new(core, ResourceType::Port, p));
        self.port_schedule_if_needed(core, p);
        false
    }

    pub fn port_set_port_time(&mut self, core: usize, p: usize, value: u32, time: Ticks) {
        self.port_update(core, p, time);
        let port = &mut self.cores[core].ports[p];
        port.time_reg = value as u16;
        port.time_reg_valid = true;
        self.port_schedule_if_needed(core, p);
    }

    pub fn port_clear_port_time(&mut self, core: usize, p: usize, time: Ticks) {
        self.port_update(core, p, time);
        self.cores[core].ports[p].time_reg_valid = false;
    }

    pub fn port_get_timestamp(&mut self, core: usize, p: usize, time: Ticks) -> u32 {
        self.port_update(core, p, time);
        self.cores[core].ports[p].timestamp_reg as u32
    }

    pub fn port_set_transfer_width(&mut self, core: usize, p: usize, width: u32, time: Ticks) -> bool {
        self.port_update(core, p, time);
        let port = &mut self.cores[core].ports[p];
        if width < port.width || width > 32 || width % port.width != 0 {
            return false;
        }
        port.transfer_width = width;
        port.shift_count = 0;
        port.transfer_valid = false;
        true
    }

    pub fn port_set_condition(&mut self, core: usize, p: usize, cond: Condition, time: Ticks) -> bool {
        if cond == Condition::After {
            return false;
        }
        self.port_update(core, p, time);
        self.cores[core].ports[p].condition = cond;
        self.port_schedule_if_needed(core, p);
        true
    }

    /// `SETD`: the condition comparand.
    pub fn port_set_data(&mut self, core: usize, p: usize, value: u32, time: Ticks) {
        self.port_update(core, p, time);
        self.cores[core].ports[p].data = value;
    }

    /// `SETCLK` targeting a port: attach it to a clock block.
    pub fn port_set_clock(&mut self, core: usize, p: usize, clk: usize, time: Ticks) -> bool {
        self.port_update(core, p, time);
        let old = self.cores[core].ports[p].clock as usize;
        self.cores[core].clock_blocks[old].attached.retain(|&x| x as usize != p);
        let port = &mut self.cores[core].ports[p];
        port.clock = clk as u8;
        port.port_counter = 0;
        self.cores[core].clock_blocks[clk].attached.push(p as u8);
        self.port_schedule_if_needed(core, p);
        true
    }

    /// `SETRDY`: `rp` becomes the 1-bit strobe carrying `p`'s ready-out.
    pub fn port_set_ready_port(&mut self, core: usize, p: usize, rp: usize, time: Ticks) -> bool {
        if self.cores[core].ports[rp].width != 1 || rp == p {
            return false;
        }
        self.port_update(core, p, time);
        if let Some(old) = self.cores[core].ports[p].ready_port {
            self.cores[core].ports[old as usize].ready_out_of = None;
        }
        self.cores[core].ports[p].ready_port = Some(rp as u8);
        self.cores[core].ports[rp].ready_out_of = Some(p as u8);
        true
    }

    pub fn port_set_buffered(&mut self, core: usize, p: usize, buffered: bool, time: Ticks) -> bool {
        self.port_update(core, p, time);
        let port = &mut self.cores[core].ports[p];
        // An unbuffered port cannot have a wide transfer.
        if !buffered && port.transfer_width != port.width {
            return false;
        }
        port.buffered = buffered;
        true
    }

    pub fn port_set_ready_mode(&mut self, core: usize, p: usize, mode: ReadyMode, time: Ticks) {
        self.port_update(core, p, time);
        self.cores[core].ports[p].ready_mode = mode;
    }

    pub fn port_set_master_slave(&mut self, core: usize, p: usize, ms: MasterSlave, time: Ticks) {
        self.port_update(core, p, time);
        self.cores[core].ports[p].master_slave = ms;
    }

    pub fn port_set_port_type(&mut self, core: usize, p: usize, ty: PortType, time: Ticks) {
        self.port_update(core, p, time);
        self.cores[core].ports[p].port_type = ty;
    }

    /// `SETC RUN_CLRBUF`.
    pub fn port_clear_buf(&mut self, core: usize, p: usize, time: Ticks) {
        self.port_update(core, p, time);
        let port = &mut self.cores[core].ports[p];
        port.shift_count = 0;
        port.transfer_valid = false;
    }

    pub fn port_set_in_use(&mut self, core: usize, p: usize, on: bool, owner: u8, time: Ticks) {
        self.port_update(core, p, time);
        let id = self.cores[core].ports[p].id();
        let port = &mut self.cores[core].ports[p];
        port.res = ResourceState { in_use: on, owner };
        port.ev = EventState { env: id.0, ..EventState::default() };
        port.output = false;
        port.buffered = false;
        port.transfer_width = port.width;
        port.condition = Condition::Full;
        port.data = 0;
        port.shift_count = 0;
        port.transfer_valid = false;
        port.time_reg_valid = false;
        port.port_counter = 0;
        port.paused_in = None;
        port.paused_out = None;
        port.paused_sync = None;
        port.ready_mode = ReadyMode::NoReady;
        port.master_slave = MasterSlave::Master;
        port.port_type = PortType::Data;
        if on {
            self.port_schedule_if_needed(core, p);
        }
    }

    /// Clock state changed under the port: resynchronise edge tracking.
    pub(crate) fn port_see_clock_change(&mut self, core: usize, p: usize, time: Ticks) {
        self.cores[core].ports[p].time = time;
        self.port_schedule_if_needed(core, p);
    }

    pub(crate) fn port_see_clock_start(&mut self, core: usize, p: usize, time: Ticks) {
        let port = &mut self.cores[core].ports[p];
        port.time = time;
        port.port_counter = 0;
        self.port_schedule_if_needed(core, p);
    }

    /// Events newly enabled: a ready input fires immediately.
    pub(crate) fn port_see_event_enable(&mut self, core: usize, p: usize, time: Ticks) {
        self.port_update(core, p, time);
        if self.cores[core].ports[p].input_ready() {
            self.port_input_became_ready(core, p, time);
        } else {
            self.port_schedule_if_needed(core, p);
        }
    }

    /// Arm the event wheel for the next edge that can do work.
    pub(crate) fn port_schedule_if_needed(&mut self, core: usize, p: usize) {
        let port = &self.cores[core].ports[p];
        if !port.res.in_use {
            return;
        }
        let clk = port.clock as usize;
        let cb = &self.cores[core].clock_blocks[clk];
        if !cb.running || !cb.is_fixed_frequency() {
            return;
        }
        let signal = cb.signal();
        if !signal.is_clock() {
            return;
        }
        let wanted = if port.output {
            port.shift_count > 0 || port.transfer_valid || port.paused_sync.is_some()
        } else {
            port.paused_in.is_some() || port.ev.enabled
        };
        if !wanted {
            return;
        }
        if let Some(edge) = signal.next_edge(port.time) {
            self.schedule_resource(ResRef::new(core, ResourceType::Port, p), edge.time);
        }
    }

    /// Wheel callback.
    pub(crate) fn port_run(&mut self, core: usize, p: usize, time: Ticks) {
        self.port_update(core, p, time);
        self.port_schedule_if_needed(core, p);
    }
}
