//! Clock blocks: programmable dividers off the reference clock, or edge
//! forwarders driven by a 1-bit port. Every state change first drains the
//! attached ports up to the current time, then applies the change, then
//! lets the ports observe it.

use xcsim_support::{Signal, Ticks, CYCLES_PER_TICK};

use crate::core::NUM_CLKBLKS;
use crate::resource::ResourceState;
use crate::system::SystemState;

/// Pool index of the free-running reference clock. Not allocatable.
pub const REF_CLOCK: usize = NUM_CLKBLKS;

/// Resource number addressing the reference clock in `SETCLK`.
pub const REF_CLOCK_NUM: u32 = NUM_CLKBLKS as u32;

#[derive(Debug, Clone)]
pub struct ClockBlock {
    pub res: ResourceState,
    /// 1-bit port driving this block, forcing divide to 1.
    pub source: Option<u8>,
    pub ready_in: Option<u8>,
    pub ready_in_value: Signal,
    pub running: bool,
    /// Stored divide: 1, or twice the programmed value.
    pub divide: u32,
    pub value: Signal,
    /// Ports clocked by this block.
    pub attached: Vec<u8>,
}

impl Default for ClockBlock {
    fn default() -> ClockBlock {
        ClockBlock {
            res: ResourceState::default(),
            source: None,
            ready_in: None,
            ready_in_value: Signal::constant(1),
            running: false,
            divide: 1,
            value: Signal::constant(0),
            attached: Vec::new(),
        }
    }
}

impl ClockBlock {
    /// The always-on reference clock.
    pub fn reference() -> ClockBlock {
        ClockBlock {
            running: true,
            value: Signal::clock(half_period(1), 0),
            ..ClockBlock::default()
        }
    }

    pub fn half_period(&self) -> Ticks {
        half_period(self.divide)
    }

    pub fn is_fixed_frequency(&self) -> bool {
        self.source.is_none()
    }

    /// Signal seen by attached ports: a stopped clock reads constant 0.
    pub fn signal(&self) -> Signal {
        if self.running {
            self.value
        } else {
            Signal::constant(0)
        }
    }
}

/// Half period in ticks of a divided reference clock. Divide 1 yields the
/// reference frequency itself.
pub fn half_period(divide: u32) -> Ticks {
    (divide as u64 * CYCLES_PER_TICK as u64) / 2
}

impl SystemState {
    fn update_attached_ports(&mut self, core: usize, clk: usize, time: Ticks) {
        let attached = self.cores[core].clock_blocks[clk].attached.clone();
        for p in attached {
            self.port_update(core, p as usize, time);
        }
    }

    fn attached_see_change(&mut self, core: usize, clk: usize, time: Ticks) {
        if !self.cores[core].clock_blocks[clk].running {
            return;
        }
        let attached = self.cores[core].clock_blocks[clk].attached.clone();
        for p in attached {
            self.port_see_clock_change(core, p as usize, time);
        }
    }

    /// Claim or release the block. Releasing resets it to a stopped
    /// divide-1 reference clock.
    pub fn clock_set_in_use(&mut self, core: usize, clk: usize, on: bool, owner: u8, time: Ticks) {
        self.update_attached_ports(core, clk, time);
        let cb = &mut self.cores[core].clock_blocks[clk];
        cb.running = false;
        cb.divide = 1;
        cb.ready_in_value = Signal::constant(1);
        let old_ready = cb.ready_in.take();
        let old_source = cb.source.take();
        cb.value = Signal::constant(0);
        cb.res = ResourceState { in_use: on, owner };
        if let Some(p) = old_ready {
            self.cores[core].ports[p as usize].ready_in_of.retain(|&c| c as usize != clk);
        }
        if let Some(p) = old_source {
            self.cores[core].ports[p as usize].source_of.retain(|&c| c as usize != clk);
        }
        self.attached_see_change(core, clk, time);
    }

    /// Drive the block from a 1-bit port. Fails unless divide is 1.
    pub fn clock_set_source_port(&mut self, core: usize, clk: usize, port: usize, time: Ticks) -> bool {
        if self.cores[core].clock_blocks[clk].divide != 1 {
            return false;
        }
        if self.cores[core].ports[port].width != 1 {
            return false;
        }
        self.port_update(core, port, time);
        self.update_attached_ports(core, clk, time);
        let old = self.cores[core].clock_blocks[clk].source.replace(port as u8);
        if let Some(p) = old {
            self.cores[core].ports[p as usize].source_of.retain(|&c| c as usize != clk);
        }
        self.cores[core].ports[port].source_of.push(clk as u8);
        let pins = self.port_pins_signal(core, port);
        self.clock_set_value(core, clk, pins, time);
        true
    }

    /// Clock the block from the divided reference clock.
    pub fn clock_set_source_ref(&mut self, core: usize, clk: usize, time: Ticks) {
        self.update_attached_ports(core, clk, time);
        let old = self.cores[core].clock_blocks[clk].source.take();
        if let Some(p) = old {
            self.cores[core].ports[p as usize].source_of.retain(|&c| c as usize != clk);
        }
        let cb = &self.cores[core].clock_blocks[clk];
        let mut value = cb.value;
        value.change_frequency(time, cb.half_period());
        self.clock_set_value(core, clk, value, time);
    }

    /// Program the divider. Fails while the block is port-driven.
    pub fn clock_set_data(&mut self, core: usize, clk: usize, raw: u32, time: Ticks) -> bool {
        if self.cores[core].clock_blocks[clk].source.is_some() {
            return false;
        }
        let raw = raw & 0xff;
        let cb = &mut self.cores[core].clock_blocks[clk];
        cb.divide = if raw == 0 { 1 } else { 2 * raw };
        let mut value = cb.value;
        let hp = cb.half_period();
        value.change_frequency(time, hp);
        self.clock_set_value(core, clk, value, time);
        true
    }

    pub(crate) fn clock_set_value(&mut self, core: usize, clk: usize, new: Signal, time: Ticks) {
        let cb = &self.cores[core].clock_blocks[clk];
        if new == cb.value {
            return;
        }
        if cb.is_fixed_frequency() || new.is_clock() {
            self.update_attached_ports(core, clk, time);
        }
        let cb = &mut self.cores[core].clock_blocks[clk];
        let old_value = cb.value.value_at(time);
        cb.value = new;
        if !cb.running {
            return;
        }
        let new_value = new.value_at(time);
        let fixed = cb.is_fixed_frequency();
        if new_value != old_value {
            let kind = if old_value == 0 {
                xcsim_support::EdgeKind::Rising
            } else {
                xcsim_support::EdgeKind::Falling
            };
            let attached = self.cores[core].clock_blocks[clk].attached.clone();
            for p in attached {
                self.port_see_edge(core, p as usize, kind, time);
            }
        }
        if fixed {
            self.attached_see_change(core, clk, time);
        }
    }

    /// Attach a 1-bit port as the block's ready-in.
    pub fn clock_set_ready(&mut self, core: usize, clk: usize, port: usize, time: Ticks) -> bool {
        self.update_attached_ports(core, clk, time);
        self.port_update(core, port, time);
        if self.cores[core].ports[port].width != 1 {
            return false;
        }
        let old = self.cores[core].clock_blocks[clk].ready_in.replace(port as u8);
        if let Some(p) = old {
            self.cores[core].ports[p as usize].ready_in_of.retain(|&c| c as usize != clk);
        }
        self.cores[core].ports[port].ready_in_of.push(clk as u8);
        let pins = self.port_pins_signal(core, port);
        self.cores[core].clock_blocks[clk].ready_in_value = pins;
        self.attached_see_change(core, clk, time);
        true
    }

    pub(crate) fn clock_set_ready_in_value(&mut self, core: usize, clk: usize, value: Signal, time: Ticks) {
        self.update_attached_ports(core, clk, time);
        self.cores[core].clock_blocks[clk].ready_in_value = value;
        self.attached_see_change(core, clk, time);
    }

    pub fn clock_start(&mut self, core: usize, clk: usize, time: Ticks) {
        self.update_attached_ports(core, clk, time);
        let cb = &mut self.cores[core].clock_blocks[clk];
        cb.running = true;
        if cb.source.is_none() {
            let hp = cb.half_period();
            // Restart low: the first edge after the start is rising.
            cb.value = Signal::clock(hp, time % (2 * hp));
        }
        let attached = self.cores[core].clock_blocks[clk].attached.clone();
        for p in attached {
            self.port_see_clock_start(core, p as usize, time);
        }
    }

    pub fn clock_stop(&mut self, core: usize, clk: usize, time: Ticks) {
        if !self.cores[core].clock_blocks[clk].running {
            return;
        }
        self.update_attached_ports(core, clk, time);
        self.cores[core].clock_blocks[clk].running = false;
        self.attached_see_change(core, clk, time);
    }
}
